//! Sentence evaluation records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One evaluation of a sentence against a model
///
/// Records are never deduplicated: evaluating the same text twice yields two
/// records with distinct ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentenceRecord {
    pub id: u64,
    pub sentence: String,
    pub model: String,
    pub created_at: DateTime<Utc>,
}

impl SentenceRecord {
    pub fn new(id: u64, sentence: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            id,
            sentence: sentence.into(),
            model: model.into(),
            created_at: Utc::now(),
        }
    }
}
