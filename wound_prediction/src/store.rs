use crate::{error::PredictionError, labels::ClassLabel, scoring::ClassificationResult};
use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub class: ClassLabel,
    pub confidence: f64,
    #[serde(rename = "userId", skip_serializing_if = "Option::is_none")]
    pub submitter_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl PredictionRecord {
    /// Stamps the record at microsecond precision, the finest the store
    /// keeps.
    pub fn new(result: ClassificationResult, submitter_id: Option<String>) -> Self {
        Self {
            class: result.class,
            confidence: result.confidence,
            submitter_id,
            created_at: Utc::now().trunc_subsecs(6),
        }
    }
}

/// A record as read back from the store, with its document id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredPrediction {
    pub id: String,
    #[serde(flatten)]
    pub record: PredictionRecord,
}

#[async_trait]
pub trait PredictionStore: Send + Sync + 'static {
    /// Appends a record, returning the id the store assigned to it.
    async fn append(&self, record: &PredictionRecord) -> Result<String, PredictionError>;

    async fn list_by_submitter(
        &self,
        submitter_id: &str,
    ) -> Result<Vec<StoredPrediction>, PredictionError>;
}

pub struct ResultRecorder<S: PredictionStore> {
    store: S,
}

impl<S: PredictionStore> ResultRecorder<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn record(
        &self,
        result: ClassificationResult,
        submitter_id: Option<String>,
    ) -> Result<PredictionRecord, PredictionError> {
        let record = PredictionRecord::new(result, submitter_id);
        let id = self.store.append(&record).await?;
        tracing::info!(
            "Recorded prediction {} (class={}, confidence={:.2})",
            id,
            record.class,
            record.confidence
        );
        Ok(record)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    records: Mutex<Vec<StoredPrediction>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<StoredPrediction> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl PredictionStore for InMemoryStore {
    async fn append(&self, record: &PredictionRecord) -> Result<String, PredictionError> {
        let mut records = self
            .records
            .lock()
            .map_err(|e| PredictionError::StoreUnavailable(e.to_string()))?;
        let id = format!("{:020}", records.len());
        records.push(StoredPrediction {
            id: id.clone(),
            record: record.clone(),
        });
        Ok(id)
    }

    async fn list_by_submitter(
        &self,
        submitter_id: &str,
    ) -> Result<Vec<StoredPrediction>, PredictionError> {
        let records = self
            .records
            .lock()
            .map_err(|e| PredictionError::StoreUnavailable(e.to_string()))?;
        Ok(records
            .iter()
            .filter(|stored| stored.record.submitter_id.as_deref() == Some(submitter_id))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(class: ClassLabel, confidence: f64) -> ClassificationResult {
        ClassificationResult { class, confidence }
    }

    #[tokio::test]
    async fn test_record_stamps_metadata() {
        let recorder = ResultRecorder::new(InMemoryStore::new());

        let before = Utc::now().trunc_subsecs(6);
        let record = recorder
            .record(
                result(ClassLabel::WoundImages, 88.5),
                Some("user-1".to_string()),
            )
            .await
            .unwrap();
        let after = Utc::now();

        assert_eq!(record.class, ClassLabel::WoundImages);
        assert_eq!(record.confidence, 88.5);
        assert_eq!(record.submitter_id.as_deref(), Some("user-1"));
        assert!(before <= record.created_at && record.created_at <= after);
        assert_eq!(record.created_at.timestamp_subsec_nanos() % 1_000, 0);

        let stored = recorder.store().records();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].record, record);
    }

    #[tokio::test]
    async fn test_list_by_submitter() {
        let store = InMemoryStore::new();
        for (class, user) in [
            (ClassLabel::AbnormalUlcer, Some("a")),
            (ClassLabel::NormalHealthySkin, Some("b")),
            (ClassLabel::WoundImages, Some("a")),
            (ClassLabel::WoundImages, None),
        ] {
            let record = PredictionRecord::new(result(class, 50.0), user.map(String::from));
            store.append(&record).await.unwrap();
        }

        let for_a = store.list_by_submitter("a").await.unwrap();
        assert_eq!(for_a.len(), 2);
        assert_eq!(for_a[0].record.class, ClassLabel::AbnormalUlcer);
        assert_eq!(for_a[1].record.class, ClassLabel::WoundImages);
        assert_ne!(for_a[0].id, for_a[1].id);

        assert!(store.list_by_submitter("c").await.unwrap().is_empty());
    }

    #[test]
    fn test_record_json_shape() {
        let mut record = PredictionRecord::new(result(ClassLabel::AbnormalUlcer, 97.5), None);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["class"], "Abnormal(Ulcer)");
        assert_eq!(json["confidence"], 97.5);
        assert!(json.get("userId").is_none());
        assert!(json["created_at"].as_str().unwrap().contains('T'));

        record.submitter_id = Some("user-9".to_string());
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["userId"], "user-9");
    }
}
