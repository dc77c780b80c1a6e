//! Shipment records: the canonical schema and the on-disk record list.
//!
//! The JSON file grew two spellings for some fields over time
//! (`tracking_code`/`trackingNumber`, `type`/`method`,
//! `arrival_port`/`destination_port`). They are folded into one
//! [`ShipmentRecord`] here, so nothing past the store boundary sees the raw shape.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::{errors::Error, Result};

/// Canonical shipment record.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ShipmentRecord {
    /// Code as stored (any case); shown back to the user.
    pub tracking_code: String,
    /// Legacy `trackingNumber` when it differs from `tracking_code`.
    pub alternate_code: Option<String>,
    pub kind: Option<String>,
    pub status: Option<String>,
    pub departure_date: Option<String>,
    pub arrival_location: Option<String>,
    pub expected_arrival: Option<String>,
}

impl ShipmentRecord {
    /// Case-insensitive match against either stored code.
    pub fn matches(&self, code: &str) -> bool {
        self.tracking_code.eq_ignore_ascii_case(code)
            || self
                .alternate_code
                .as_deref()
                .is_some_and(|alt| alt.eq_ignore_ascii_case(code))
    }
}

/// Raw entry as found in the JSON file.
///
/// Values stay untyped so one odd field (a number, a null) does not make the
/// whole file unreadable.
#[derive(Debug, Deserialize)]
struct RawShipment {
    tracking_code: Option<Value>,
    #[serde(rename = "trackingNumber")]
    tracking_number: Option<Value>,
    #[serde(rename = "type")]
    kind: Option<Value>,
    method: Option<Value>,
    status: Option<Value>,
    departure_date: Option<Value>,
    arrival_port: Option<Value>,
    destination_port: Option<Value>,
    expected_arrival: Option<Value>,
}

impl RawShipment {
    fn normalize(self) -> Option<ShipmentRecord> {
        let primary = field_text(self.tracking_code);
        let legacy = field_text(self.tracking_number);

        let (tracking_code, alternate_code) = match (primary, legacy) {
            (Some(p), Some(l)) if p.eq_ignore_ascii_case(&l) => (p, None),
            (Some(p), legacy) => (p, legacy),
            (None, Some(l)) => (l, None),
            (None, None) => return None,
        };

        Some(ShipmentRecord {
            tracking_code,
            alternate_code,
            kind: field_text(self.kind).or_else(|| field_text(self.method)),
            status: field_text(self.status),
            departure_date: field_text(self.departure_date),
            arrival_location: field_text(self.arrival_port)
                .or_else(|| field_text(self.destination_port)),
            expected_arrival: field_text(self.expected_arrival),
        })
    }
}

/// Render a raw JSON value as display text, treating "empty" values as absent.
fn field_text(v: Option<Value>) -> Option<String> {
    match v? {
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s),
        Value::Number(n) if n.as_f64() == Some(0.0) => None,
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(true) => Some("true".to_string()),
        Value::Bool(false) | Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Parse the record list file contents into canonical records.
pub fn parse_records(json: &str) -> Result<Vec<ShipmentRecord>> {
    let value: Value = serde_json::from_str(json)?;
    let Value::Array(entries) = value else {
        return Err(Error::Store(
            "shipment list must be a JSON array".to_string(),
        ));
    };

    let total = entries.len();
    let records = entries
        .into_iter()
        .filter(Value::is_object)
        .filter_map(|entry| serde_json::from_value::<RawShipment>(entry).ok())
        .filter_map(RawShipment::normalize)
        .collect::<Vec<_>>();

    if records.len() != total {
        debug!(
            total,
            usable = records.len(),
            "skipped shipment entries without a tracking code"
        );
    }
    Ok(records)
}

/// Source of shipment records, read fresh for every lookup.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Load the current records. Never fails: an unreadable source is an empty list.
    async fn load(&self) -> Vec<ShipmentRecord>;
}

/// Record store backed by a JSON array on disk.
#[derive(Clone, Debug)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn try_load(&self) -> Result<Vec<ShipmentRecord>> {
        let contents = tokio::fs::read_to_string(&self.path).await?;
        parse_records(&contents)
    }
}

#[async_trait]
impl RecordStore for JsonFileStore {
    async fn load(&self) -> Vec<ShipmentRecord> {
        match self.try_load().await {
            Ok(records) => records,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "failed to read shipment list");
                Vec::new()
            }
        }
    }
}
