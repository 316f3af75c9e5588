//! Library borrow records.

use serde::{Deserialize, Serialize};

/// A single item lent to a student by the campus library.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BorrowRecord {
    pub id: i64,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub barcode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub borrowed_at: String,
    pub due_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub returned_at: Option<String>,
}
