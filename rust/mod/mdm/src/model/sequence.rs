use serde::{Deserialize, Serialize};

/// A named, persistent counter that mints business codes.
///
/// `PART_PS` with prefix `PS-`, padding 5 and next number 1 issues
/// `PS-00001`, then `PS-00002`, and so on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SequenceDefinition {
    #[serde(default)]
    pub key: String,

    #[serde(default)]
    pub prefix: String,

    /// Minimum digit width. Longer numbers are never truncated.
    #[serde(default)]
    pub padding: u32,

    pub next_number: u64,

    /// `nextNumber` when the series was defined. Prefix and padding can only
    /// change while `nextNumber` is still here.
    #[serde(default)]
    pub start_number: u64,

    /// Grouping label for the admin screen. Descriptive only.
    #[serde(default)]
    pub scope: String,

    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

impl SequenceDefinition {
    pub fn new(key: &str, prefix: &str, padding: u32, next_number: u64, scope: &str) -> Self {
        Self {
            key: key.to_string(),
            prefix: prefix.to_string(),
            padding,
            next_number,
            start_number: next_number,
            scope: scope.to_string(),
            created_at: String::new(),
            updated_at: String::new(),
        }
    }
}

/// Partial update of a sequence. `nextNumber` may only move forward, and
/// `prefix`/`padding` are fixed once it has moved.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SequencePatch {
    pub prefix: Option<String>,
    pub padding: Option<u32>,
    pub next_number: Option<u64>,
    pub scope: Option<String>,
}
