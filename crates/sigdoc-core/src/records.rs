//! Record selection helpers: manual-entry validation, batch
//! classification, and the search filter used by the selection list.

use crate::error::{Error, Result};
use crate::model::Record;
use serde::{Deserialize, Serialize};

/// Unvalidated values from the manual-entry form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordDraft {
    pub name: String,
    pub asset_name: String,
    pub asset_id: String,
    #[serde(default)]
    pub additional_assets: Vec<String>,
}

impl RecordDraft {
    /// Trim every field and turn the draft into a [`Record`].
    /// Blank additional assets are dropped.
    pub fn validate(&self) -> Result<Record> {
        let record = Record::new(
            self.name.trim(),
            self.asset_name.trim(),
            self.asset_id.trim(),
        )
        .with_extra_items(
            self.additional_assets
                .iter()
                .map(|s| s.trim())
                .filter(|s| !s.is_empty()),
        );
        record.ensure_complete()?;
        Ok(record)
    }
}

/// What the UI should do with a freshly loaded list of records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordBatch {
    Empty,
    /// Exactly one record: skip selection and go straight to signing.
    Single(Record),
    /// Several records: show the selection list.
    Many(Vec<Record>),
}

impl RecordBatch {
    pub fn classify(mut records: Vec<Record>) -> Self {
        match records.len() {
            0 => RecordBatch::Empty,
            1 => RecordBatch::Single(records.remove(0)),
            _ => RecordBatch::Many(records),
        }
    }

    /// Reject an empty batch with the message the upload screen shows.
    pub fn non_empty(self) -> Result<Self> {
        match self {
            RecordBatch::Empty => Err(Error::RecordSource(
                "No valid data found. Please ensure your CSV has columns: name, assetName, assetId"
                    .to_string(),
            )),
            other => Ok(other),
        }
    }
}

/// Records whose name, asset name or asset id contains `query`,
/// compared case-insensitively. An empty query keeps everything.
pub fn filter_records<'a>(records: &'a [Record], query: &str) -> Vec<&'a Record> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return records.iter().collect();
    }
    records
        .iter()
        .filter(|r| {
            r.name.to_lowercase().contains(&needle)
                || r.asset_name.to_lowercase().contains(&needle)
                || r.asset_id.to_lowercase().contains(&needle)
        })
        .collect()
}
