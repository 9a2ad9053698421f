//! Shared fixtures for serving-layer tests

use riskscore_core::artifact::ArtifactPaths;
use riskscore_core::gbdt::{Node, Tree};
use riskscore_core::{
    ActivePointer, FeatureManifest, FeatureSchema, FlatModel, Model, ModelMetrics, TransformSpec,
};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Write a two-feature artifact and point the active record at it.
/// The single tree splits on `metric_debt_load30 <= 0.5`.
pub fn write_minimal_artifact(model_dir: &Path, tag: &str, bias: f64) {
    let dir = model_dir.join(tag);
    fs::create_dir_all(&dir).unwrap();
    let paths = ArtifactPaths::new(&dir);

    let tree = Tree::new(
        vec![
            Node::internal(0, 0, 0.5, 1, 2),
            Node::leaf(1, -1.0),
            Node::leaf(2, 1.0),
        ],
        1.0,
    );
    let mut importance = BTreeMap::new();
    importance.insert("metric_debt_load30".to_string(), 3.0);
    importance.insert("metric_net_cash30".to_string(), 1.0);

    let model = Model::new(
        vec![
            "metric_debt_load30".to_string(),
            "metric_net_cash30".to_string(),
        ],
        bias,
        vec![tree],
        importance.clone(),
    );
    model.save(&paths.native_model()).unwrap();
    FlatModel::from(&model)
        .save(&paths.optimized_model())
        .unwrap();

    let manifest = FeatureManifest {
        schema: FeatureSchema::new(1, model.feature_names.clone()),
        transform: TransformSpec::default(),
    };
    manifest.save(&paths.features()).unwrap();

    let metrics = ModelMetrics {
        roc_auc: 0.8,
        pr_auc: 0.7,
        accuracy: 0.75,
        f1: 0.6,
        feature_importance: importance,
    };
    fs::write(
        paths.metrics(),
        serde_json::to_vec_pretty(&metrics).unwrap(),
    )
    .unwrap();

    ActivePointer::new(tag.to_string(), dir)
        .swap(model_dir)
        .unwrap();
}
