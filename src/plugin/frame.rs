//! Tabular data frames returned by `QueryData`
//!
//! A frame is a named set of equal-length, column-oriented fields. Frames
//! cross the wire as JSON so every transport produces byte-identical shapes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Error raised when two frames cannot be merged row-wise
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameMergeError {
    #[error("field count mismatch: frame has {existing} fields, partition frame has {incoming}")]
    FieldCountMismatch { existing: usize, incoming: usize },
}

/// Display configuration attached to a field
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name_from_ds: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

/// Frame-level metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameMeta {
    /// The query as executed against the backing store
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executed_query_string: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom: Option<Value>,
}

/// One column of a frame
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<FieldConfig>,
    #[serde(default)]
    pub values: Vec<Value>,
}

impl Field {
    pub fn new(name: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            values,
            ..Default::default()
        }
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn display_name(&self) -> Option<&str> {
        self.config
            .as_ref()
            .and_then(|config| config.display_name_from_ds.as_deref())
    }

    /// `name{k1="v1", k2="v2"}`, labels in key order
    pub fn labelled_name(&self) -> String {
        if self.labels.is_empty() {
            return self.name.clone();
        }
        let labels = self
            .labels
            .iter()
            .map(|(k, v)| format!("{k}=\"{v}\""))
            .collect::<Vec<_>>()
            .join(", ");
        format!("{}{{{}}}", self.name, labels)
    }
}

/// A named table of fields
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Frame {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<Field>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<FrameMeta>,
}

impl Frame {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    pub fn with_meta(mut self, meta: FrameMeta) -> Self {
        self.meta = Some(meta);
        self
    }

    /// Row count, taken from the first field
    pub fn rows(&self) -> usize {
        self.fields.first().map(Field::len).unwrap_or(0)
    }

    pub fn executed_query_string(&self) -> Option<&str> {
        self.meta
            .as_ref()
            .and_then(|meta| meta.executed_query_string.as_deref())
    }

    /// Append the rows of `other` field by field.
    ///
    /// Both frames must have the same number of fields; on mismatch `self`
    /// is left untouched.
    pub fn append_rows(&mut self, other: Frame) -> Result<(), FrameMergeError> {
        if self.fields.len() != other.fields.len() {
            return Err(FrameMergeError::FieldCountMismatch {
                existing: self.fields.len(),
                incoming: other.fields.len(),
            });
        }
        for (field, incoming) in self.fields.iter_mut().zip(other.fields) {
            field.values.extend(incoming.values);
        }
        Ok(())
    }

    pub fn to_json_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}
