//! Periodic batch scoring worker
//!
//! Scores many subjects in sub-batches. Each subject is a bulkhead: a
//! feature-extraction failure, scoring error, or timeout marks that subject
//! failed or skipped and the batch moves on. A pacing delay between
//! sub-batches bounds load on the scoring endpoint; it is backpressure, not
//! a correctness requirement.

use crate::client::ScoreClient;
use crate::errors::Result;
use crate::types::{ScoringRequest, ScoringResponse};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Narrow interface to per-subject feature extraction.
/// `Ok(None)` means the subject has insufficient data and is skipped.
pub trait SubjectFeatureSource: Send + Sync {
    fn features_for(&self, subject_id: &str) -> Result<Option<BTreeMap<String, f64>>>;
}

/// Narrow interface to the downstream score audit store
pub trait ScoreSink: Send + Sync {
    fn record(&self, response: &ScoringResponse) -> Result<()>;
}

/// Sink that drops scores (dry runs)
pub struct NullSink;

impl ScoreSink for NullSink {
    fn record(&self, _response: &ScoringResponse) -> Result<()> {
        Ok(())
    }
}

/// Worker configuration
#[derive(Debug, Clone)]
pub struct BatchWorkerConfig {
    /// Subjects per sub-batch
    pub sub_batch_size: usize,
    /// Pacing delay between sub-batches
    pub pacing: Duration,
}

impl Default for BatchWorkerConfig {
    fn default() -> Self {
        Self {
            sub_batch_size: 50,
            pacing: Duration::from_millis(100),
        }
    }
}

/// Per-run statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchStats {
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Batch scoring worker over an injected client
pub struct BatchWorker {
    client: Arc<dyn ScoreClient>,
    config: BatchWorkerConfig,
}

impl BatchWorker {
    pub fn new(client: Arc<dyn ScoreClient>, config: BatchWorkerConfig) -> Self {
        Self { client, config }
    }

    /// Score every subject once, isolating per-subject failures.
    pub async fn run(
        &self,
        subjects: &[String],
        features: &dyn SubjectFeatureSource,
        sink: &dyn ScoreSink,
    ) -> BatchStats {
        let mut stats = BatchStats::default();
        info!(
            subjects = subjects.len(),
            sub_batch = self.config.sub_batch_size,
            "Batch scoring starting"
        );

        for (chunk_idx, chunk) in subjects.chunks(self.config.sub_batch_size.max(1)).enumerate() {
            if chunk_idx > 0 && !self.config.pacing.is_zero() {
                tokio::time::sleep(self.config.pacing).await;
            }

            for subject_id in chunk {
                stats.processed += 1;
                self.process_subject(subject_id, features, sink, &mut stats)
                    .await;
            }
        }

        info!(
            processed = stats.processed,
            succeeded = stats.succeeded,
            failed = stats.failed,
            skipped = stats.skipped,
            "Batch scoring complete"
        );
        stats
    }

    async fn process_subject(
        &self,
        subject_id: &str,
        features: &dyn SubjectFeatureSource,
        sink: &dyn ScoreSink,
        stats: &mut BatchStats,
    ) {
        let feature_map = match features.features_for(subject_id) {
            Ok(Some(map)) => map,
            Ok(None) => {
                warn!(subject = %subject_id, "Skipping subject with insufficient data");
                stats.skipped += 1;
                return;
            }
            Err(e) => {
                warn!(subject = %subject_id, error = %e, "Feature extraction failed");
                stats.failed += 1;
                return;
            }
        };

        let request = ScoringRequest {
            subject_id: subject_id.to_string(),
            features: feature_map,
            persist: true,
        };

        let response = match self.client.score(request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(subject = %subject_id, error = %e, "Scoring failed");
                stats.failed += 1;
                return;
            }
        };

        match sink.record(&response) {
            Ok(()) => stats.succeeded += 1,
            Err(e) => {
                warn!(subject = %subject_id, error = %e, "Failed to persist score");
                stats.failed += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ServiceError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct MapFeatures(BTreeMap<String, Option<BTreeMap<String, f64>>>);

    impl SubjectFeatureSource for MapFeatures {
        fn features_for(&self, subject_id: &str) -> Result<Option<BTreeMap<String, f64>>> {
            match self.0.get(subject_id) {
                Some(features) => Ok(features.clone()),
                None => Err(ServiceError::Scoring(format!("no data for {subject_id}"))),
            }
        }
    }

    /// Client that fails specific subjects
    struct FlakyClient {
        fail_for: Vec<String>,
    }

    #[async_trait]
    impl ScoreClient for FlakyClient {
        async fn score(&self, request: ScoringRequest) -> Result<ScoringResponse> {
            if self.fail_for.contains(&request.subject_id) {
                return Err(ServiceError::Timeout { timeout_ms: 10 });
            }
            Ok(ScoringResponse {
                subject_id: request.subject_id,
                score: 42,
                raw_output: -0.3,
                top_features: Vec::new(),
            })
        }
    }

    struct CollectingSink(Mutex<Vec<String>>);

    impl ScoreSink for CollectingSink {
        fn record(&self, response: &ScoringResponse) -> Result<()> {
            self.0
                .lock()
                .map_err(|_| ServiceError::Sink("poisoned".to_string()))?
                .push(response.subject_id.clone());
            Ok(())
        }
    }

    fn features() -> BTreeMap<String, f64> {
        let mut map = BTreeMap::new();
        map.insert("metric_debt_load30".to_string(), 0.4);
        map
    }

    #[tokio::test(start_paused = true)]
    async fn one_failing_subject_does_not_abort_the_batch() {
        let mut data = BTreeMap::new();
        data.insert("good_1".to_string(), Some(features()));
        data.insert("timeout_1".to_string(), Some(features()));
        data.insert("no_data_1".to_string(), None);
        data.insert("good_2".to_string(), Some(features()));

        let client = Arc::new(FlakyClient {
            fail_for: vec!["timeout_1".to_string()],
        });
        let worker = BatchWorker::new(client, BatchWorkerConfig::default());
        let sink = CollectingSink(Mutex::new(Vec::new()));

        let subjects: Vec<String> = ["good_1", "timeout_1", "no_data_1", "broken_1", "good_2"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let stats = worker.run(&subjects, &MapFeatures(data), &sink).await;

        assert_eq!(stats.processed, 5);
        assert_eq!(stats.succeeded, 2);
        // timeout_1 (scoring) + broken_1 (feature extraction)
        assert_eq!(stats.failed, 2);
        assert_eq!(stats.skipped, 1);

        let recorded = sink.0.lock().unwrap();
        assert_eq!(*recorded, vec!["good_1".to_string(), "good_2".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn pacing_delay_runs_between_sub_batches() {
        let mut data = BTreeMap::new();
        for i in 0..4 {
            data.insert(format!("u{i}"), Some(features()));
        }
        let client = Arc::new(FlakyClient { fail_for: vec![] });
        let worker = BatchWorker::new(
            client,
            BatchWorkerConfig {
                sub_batch_size: 2,
                pacing: Duration::from_millis(250),
            },
        );

        let subjects: Vec<String> = (0..4).map(|i| format!("u{i}")).collect();
        let started = tokio::time::Instant::now();
        let stats = worker
            .run(&subjects, &MapFeatures(data), &NullSink)
            .await;

        assert_eq!(stats.succeeded, 4);
        // One pacing gap between the two sub-batches (paused clock)
        assert!(started.elapsed() >= Duration::from_millis(250));
    }
}
