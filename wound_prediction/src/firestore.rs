use crate::{
    config::StoreConfig,
    error::PredictionError,
    gcp_auth::{ServiceAccountKey, TokenProvider},
    labels::ClassLabel,
    store::{PredictionRecord, PredictionStore, StoredPrediction},
};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use std::{collections::HashMap, time::Duration};

/// Appends prediction documents to a Firestore collection over the REST API.
pub struct FirestoreStore {
    client: reqwest::Client,
    database_url: String,
    collection: String,
    token_provider: Option<TokenProvider>,
}

impl FirestoreStore {
    pub fn new(config: &StoreConfig) -> Result<Self, PredictionError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        let token_provider = match &config.credentials_path {
            Some(path) => {
                let key = ServiceAccountKey::from_file(path)?;
                if let Some(key_project) = key.project_id.as_deref() {
                    if key_project != config.project_id {
                        tracing::warn!(
                            "Service account belongs to project {:?} but store targets {:?}",
                            key_project,
                            config.project_id
                        );
                    }
                }
                let provider = TokenProvider::new(key, client.clone())?;
                tracing::info!("Authenticating to Firestore as {}", provider.client_email());
                Some(provider)
            }
            None => {
                tracing::warn!("No Firestore credentials configured, sending unauthenticated requests");
                None
            }
        };

        Ok(Self {
            client,
            database_url: database_url(config),
            collection: config.collection.clone(),
            token_provider,
        })
    }

    async fn authorize(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::RequestBuilder, PredictionError> {
        match &self.token_provider {
            Some(provider) => Ok(request.bearer_auth(provider.access_token().await?)),
            None => Ok(request),
        }
    }
}

fn database_url(config: &StoreConfig) -> String {
    format!(
        "{}/projects/{}/databases/{}/documents",
        config.base_url.trim_end_matches('/'),
        config.project_id,
        config.database
    )
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, PredictionError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(PredictionError::StoreUnavailable(format!(
        "Firestore responded with {}: {}",
        status, body
    )))
}

#[async_trait]
impl PredictionStore for FirestoreStore {
    #[tracing::instrument(skip(self, record), fields(collection = %self.collection))]
    async fn append(&self, record: &PredictionRecord) -> Result<String, PredictionError> {
        let url = format!("{}/{}", self.database_url, self.collection);
        let request = self.client.post(&url).json(&encode_document(record));

        let response = self.authorize(request).await?.send().await?;
        let document: Document = check_status(response).await?.json().await?;

        Ok(document_id(&document.name).to_string())
    }

    #[tracing::instrument(skip(self), fields(collection = %self.collection))]
    async fn list_by_submitter(
        &self,
        submitter_id: &str,
    ) -> Result<Vec<StoredPrediction>, PredictionError> {
        let url = format!("{}:runQuery", self.database_url);
        let request = self
            .client
            .post(&url)
            .json(&submitter_query(&self.collection, submitter_id));

        let response = self.authorize(request).await?.send().await?;
        let results: Vec<QueryResult> = check_status(response).await?.json().await?;

        Ok(decode_results(results))
    }
}

pub fn encode_document(record: &PredictionRecord) -> Value {
    let mut fields = json!({
        "class": { "stringValue": record.class.as_str() },
        "confidence": { "doubleValue": record.confidence },
        "created_at": {
            "stringValue": record.created_at.to_rfc3339_opts(SecondsFormat::Micros, true)
        },
    });
    if let Some(submitter_id) = &record.submitter_id {
        fields["userId"] = json!({ "stringValue": submitter_id });
    }
    json!({ "fields": fields })
}

fn submitter_query(collection: &str, submitter_id: &str) -> Value {
    json!({
        "structuredQuery": {
            "from": [{ "collectionId": collection }],
            "where": {
                "fieldFilter": {
                    "field": { "fieldPath": "userId" },
                    "op": "EQUAL",
                    "value": { "stringValue": submitter_id }
                }
            }
        }
    })
}

#[derive(Debug, Deserialize)]
struct QueryResult {
    document: Option<Document>,
}

#[derive(Debug, Deserialize)]
struct Document {
    name: String,
    #[serde(default)]
    fields: HashMap<String, FieldValue>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FieldValue {
    string_value: Option<String>,
    double_value: Option<f64>,
    // Firestore sends 64-bit integers as strings.
    integer_value: Option<String>,
    timestamp_value: Option<String>,
}

fn document_id(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

fn malformed(name: &str, detail: &str) -> PredictionError {
    PredictionError::StoreUnavailable(format!("malformed document {}: {}", name, detail))
}

/// Accepts RFC 3339 as well as offset-less ISO-8601, read as UTC.
fn parse_created_at(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|naive| naive.and_utc())
        })
}

/// Undecodable documents are logged and left out of the listing.
fn decode_results(results: Vec<QueryResult>) -> Vec<StoredPrediction> {
    results
        .into_iter()
        .filter_map(|result| result.document)
        .filter_map(|document| match decode_document(&document) {
            Ok(stored) => Some(stored),
            Err(e) => {
                tracing::warn!("Skipping prediction document: {}", e);
                None
            }
        })
        .collect()
}

fn decode_document(document: &Document) -> Result<StoredPrediction, PredictionError> {
    let name = document.name.as_str();
    let field = |key: &str| document.fields.get(key);

    let class = field("class")
        .and_then(|v| v.string_value.as_deref())
        .ok_or_else(|| malformed(name, "missing class"))
        .and_then(|s| ClassLabel::try_from(s).map_err(|e| malformed(name, &e)))?;

    let confidence = field("confidence")
        .and_then(|v| {
            v.double_value
                .or_else(|| v.integer_value.as_deref().and_then(|i| i.parse().ok()))
        })
        .ok_or_else(|| malformed(name, "missing confidence"))?;

    let created_at = field("created_at")
        .and_then(|v| v.string_value.as_deref().or(v.timestamp_value.as_deref()))
        .and_then(parse_created_at)
        .ok_or_else(|| malformed(name, "missing or invalid created_at"))?;

    let submitter_id = field("userId").and_then(|v| v.string_value.clone());

    Ok(StoredPrediction {
        id: document_id(name).to_string(),
        record: PredictionRecord {
            class,
            confidence,
            submitter_id,
            created_at,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::StoreBackend, scoring::ClassificationResult};
    use chrono::TimeZone;

    fn store_config() -> StoreConfig {
        StoreConfig {
            backend: StoreBackend::Firestore,
            project_id: "wound-care".to_string(),
            database: "(default)".to_string(),
            collection: "predictions".to_string(),
            base_url: "http://localhost:8081/v1/".to_string(),
            credentials_path: None,
            timeout_secs: 5,
        }
    }

    #[test]
    fn test_database_url() {
        assert_eq!(
            database_url(&store_config()),
            "http://localhost:8081/v1/projects/wound-care/databases/(default)/documents"
        );
    }

    #[test]
    fn test_new_without_credentials() {
        let store = FirestoreStore::new(&store_config()).unwrap();
        assert!(store.token_provider.is_none());
        assert_eq!(store.collection, "predictions");
    }

    #[test]
    fn test_encode_document() {
        let record = PredictionRecord {
            class: ClassLabel::NormalHealthySkin,
            confidence: 91.25,
            submitter_id: Some("user-7".to_string()),
            created_at: Utc.with_ymd_and_hms(2024, 6, 1, 10, 30, 0).unwrap(),
        };

        let document = encode_document(&record);

        assert_eq!(
            document,
            json!({
                "fields": {
                    "class": { "stringValue": "Normal(Healthy skin)" },
                    "confidence": { "doubleValue": 91.25 },
                    "created_at": { "stringValue": "2024-06-01T10:30:00.000000Z" },
                    "userId": { "stringValue": "user-7" }
                }
            })
        );
    }

    #[test]
    fn test_encode_document_without_submitter() {
        let record = PredictionRecord {
            class: ClassLabel::WoundImages,
            confidence: 60.0,
            submitter_id: None,
            created_at: Utc::now(),
        };

        let document = encode_document(&record);

        assert!(document["fields"].get("userId").is_none());
    }

    #[test]
    fn test_decode_query_results() {
        let body = r#"[
            {
                "document": {
                    "name": "projects/wound-care/databases/(default)/documents/predictions/abc123",
                    "fields": {
                        "class": { "stringValue": "Abnormal(Ulcer)" },
                        "confidence": { "doubleValue": 99.1 },
                        "userId": { "stringValue": "user-1" },
                        "created_at": { "stringValue": "2024-06-01T10:30:00.123456" }
                    },
                    "createTime": "2024-06-01T10:30:00.200000Z",
                    "updateTime": "2024-06-01T10:30:00.200000Z"
                },
                "readTime": "2024-06-02T00:00:00Z"
            },
            { "readTime": "2024-06-02T00:00:00Z" }
        ]"#;

        let results: Vec<QueryResult> = serde_json::from_str(body).unwrap();
        let decoded = decode_results(results);

        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].id, "abc123");
        assert_eq!(decoded[0].record.class, ClassLabel::AbnormalUlcer);
        assert_eq!(decoded[0].record.confidence, 99.1);
        assert_eq!(decoded[0].record.submitter_id.as_deref(), Some("user-1"));
        assert_eq!(
            decoded[0].record.created_at.timestamp(),
            Utc.with_ymd_and_hms(2024, 6, 1, 10, 30, 0).unwrap().timestamp()
        );
    }

    #[test]
    fn test_encoded_record_decodes_unchanged() {
        let record = PredictionRecord::new(
            ClassificationResult {
                class: ClassLabel::WoundImages,
                confidence: 73.125,
            },
            Some("user-3".to_string()),
        );
        let mut document = encode_document(&record);
        document["name"] = json!("projects/p/databases/(default)/documents/predictions/r1");
        let document: Document = serde_json::from_value(document).unwrap();

        let decoded = decode_document(&document).unwrap();

        assert_eq!(decoded.id, "r1");
        assert_eq!(decoded.record, record);
        assert_eq!(
            serde_json::to_value(&decoded.record).unwrap()["created_at"],
            serde_json::to_value(&record).unwrap()["created_at"]
        );
    }

    #[test]
    fn test_decode_rejects_unknown_class() {
        let document: Document = serde_json::from_value(json!({
            "name": "projects/p/databases/(default)/documents/predictions/x",
            "fields": {
                "class": { "stringValue": "Burn" },
                "confidence": { "doubleValue": 50.0 },
                "created_at": { "stringValue": "2024-06-01T10:30:00Z" }
            }
        }))
        .unwrap();

        assert!(matches!(
            decode_document(&document),
            Err(PredictionError::StoreUnavailable(_))
        ));
    }

    #[test]
    fn test_listing_skips_undecodable_documents() {
        let results: Vec<QueryResult> = serde_json::from_value(json!([
            {
                "document": {
                    "name": "projects/p/databases/(default)/documents/predictions/legacy",
                    "fields": {
                        "class": { "stringValue": "Burn" },
                        "confidence": { "doubleValue": 50.0 },
                        "userId": { "stringValue": "user-1" },
                        "created_at": { "stringValue": "2024-06-01T10:30:00Z" }
                    }
                }
            },
            {
                "document": {
                    "name": "projects/p/databases/(default)/documents/predictions/no-date",
                    "fields": {
                        "class": { "stringValue": "Wound Images" },
                        "confidence": { "integerValue": "80" },
                        "userId": { "stringValue": "user-1" }
                    }
                }
            },
            {
                "document": {
                    "name": "projects/p/databases/(default)/documents/predictions/ok",
                    "fields": {
                        "class": { "stringValue": "Wound Images" },
                        "confidence": { "integerValue": "80" },
                        "userId": { "stringValue": "user-1" },
                        "created_at": { "stringValue": "2024-06-01T10:30:00Z" }
                    }
                }
            }
        ]))
        .unwrap();

        let decoded = decode_results(results);

        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].id, "ok");
        assert_eq!(decoded[0].record.class, ClassLabel::WoundImages);
        assert_eq!(decoded[0].record.confidence, 80.0);
    }

    #[test]
    fn test_submitter_query() {
        let query = submitter_query("predictions", "user-1");
        let filter = &query["structuredQuery"]["where"]["fieldFilter"];
        assert_eq!(filter["field"]["fieldPath"], "userId");
        assert_eq!(filter["op"], "EQUAL");
        assert_eq!(filter["value"]["stringValue"], "user-1");
        assert_eq!(
            query["structuredQuery"]["from"][0]["collectionId"],
            "predictions"
        );
    }
}
