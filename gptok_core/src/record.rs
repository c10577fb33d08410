//! Records as they flow in and out of a batch.

use crate::error::ItemError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One item of a batch: the JSON payload plus failure details when it was skipped.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub json: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RecordError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paired_item: Option<PairedItem>,
}

/// Back-reference from a skipped clone to the batch position it came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairedItem {
    pub item: usize,
}

/// Serializable form of an [`ItemError`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordError {
    pub message: String,
    pub kind: String,
    pub item_index: usize,
}

impl From<&ItemError> for RecordError {
    fn from(e: &ItemError) -> Self {
        RecordError {
            message: e.source.to_string(),
            kind: e.source.kind().to_owned(),
            item_index: e.item_index,
        }
    }
}

/// Keys of a serialized [`Record`].
const ENVELOPE_KEYS: [&str; 3] = ["json", "error", "pairedItem"];

impl Record {
    pub fn new(json: Map<String, Value>) -> Self {
        Record {
            json,
            ..Default::default()
        }
    }

    /// Wraps any JSON value: objects become the payload, anything else lands under `data`.
    ///
    /// An object shaped like a written record (`{"json": {...}}`, optionally with
    /// `error` and `pairedItem`) is unwrapped to its payload, so one run's output
    /// can be fed to the next. Its old `error` and `pairedItem` are dropped.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(mut map) if is_envelope(&map) => match map.remove("json") {
                Some(Value::Object(json)) => Record::new(json),
                _ => Record::new(map),
            },
            Value::Object(json) => Record::new(json),
            other => {
                let mut json = Map::new();
                json.insert("data".to_owned(), other);
                Record::new(json)
            }
        }
    }

    /// A copy of this record's payload carrying `error` and its original position.
    pub fn failed_clone(&self, error: &ItemError) -> Record {
        Record {
            json: self.json.clone(),
            error: Some(RecordError::from(error)),
            paired_item: Some(PairedItem {
                item: error.item_index,
            }),
        }
    }
}

fn is_envelope(map: &Map<String, Value>) -> bool {
    matches!(map.get("json"), Some(Value::Object(_)))
        && map.keys().all(|k| ENVELOPE_KEYS.contains(&k.as_str()))
}
