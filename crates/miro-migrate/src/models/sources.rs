//! Upstream records the indices are built from
//!
//! Each arrives as one JSON object per line in an export file. Fields the
//! pipeline does not read are carried through untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A record that knows the document id it is stored under
pub trait SourceRecord {
    fn record_id(&self) -> &str;
}

/// Catalogue metadata for one Miro image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceData {
    /// Miro id, e.g. `L0055001`
    pub id: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl SourceRecord for SourceData {
    fn record_id(&self) -> &str {
        &self.id
    }
}

/// One object in the Miro source bucket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MiroFile {
    pub s3_key: String,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl SourceRecord for MiroFile {
    fn record_id(&self) -> &str {
        &self.s3_key
    }
}

/// What to do with one source object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub s3_key: String,
    /// Miro id the object is an image of, when one could be matched
    #[serde(default)]
    pub miro_id: Option<String>,
    /// Group the object is packaged under
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub skip: bool,
    #[serde(default)]
    pub notes: Vec<String>,
}

impl Decision {
    /// Objects that are neither skipped nor without a destination get transferred
    pub fn transfer_group(&self) -> Option<&str> {
        if self.skip {
            None
        } else {
            self.destination.as_deref()
        }
    }
}

impl SourceRecord for Decision {
    fn record_id(&self) -> &str {
        &self.s3_key
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sourcedata_keeps_unknown_fields() {
        let record: SourceData = serde_json::from_value(json!({
            "id": "L0055001",
            "image_title": "Anatomical drawing",
            "image_library_dept": "Library"
        }))
        .unwrap();

        assert_eq!(record.record_id(), "L0055001");
        let back = serde_json::to_value(&record).unwrap();
        assert_eq!(back["image_title"], "Anatomical drawing");
    }

    #[test]
    fn test_decision_transfer_group() {
        let mut decision: Decision = serde_json::from_value(json!({
            "s3_key": "L0055000/L0055001.jpg",
            "miro_id": "L0055001",
            "destination": "library/L Images/L0055000"
        }))
        .unwrap();
        assert_eq!(decision.transfer_group(), Some("library/L Images/L0055000"));

        decision.skip = true;
        assert!(decision.transfer_group().is_none());

        decision.skip = false;
        decision.destination = None;
        assert!(decision.transfer_group().is_none());
    }
}
