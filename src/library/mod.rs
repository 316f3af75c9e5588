//! Library borrow lookups for the signed-in student.

use async_trait::async_trait;

use crate::errors::AppError;
use crate::models::{BorrowRecord, Identity};

/// Source of borrow records for a student.
#[async_trait]
pub trait BorrowSource: Send + Sync {
    /// Items the student still holds.
    async fn current_borrows(&self, student_id: &str) -> Result<Vec<BorrowRecord>, AppError>;

    /// Every item the student has borrowed, returned or not.
    async fn borrow_history(&self, student_id: &str) -> Result<Vec<BorrowRecord>, AppError>;
}

/// Currently borrowed items for the caller.
///
/// Any lookup failure is reported as a generic server error.
pub async fn get_current<B>(source: &B, caller: &Identity) -> Result<Vec<BorrowRecord>, AppError>
where
    B: BorrowSource + ?Sized,
{
    source
        .current_borrows(&caller.student_id)
        .await
        .map_err(|e| server_error("current borrows", caller, e))
}

/// Borrow history for the caller.
pub async fn get_history<B>(source: &B, caller: &Identity) -> Result<Vec<BorrowRecord>, AppError>
where
    B: BorrowSource + ?Sized,
{
    source
        .borrow_history(&caller.student_id)
        .await
        .map_err(|e| server_error("borrow history", caller, e))
}

fn server_error(what: &str, caller: &Identity, err: AppError) -> AppError {
    tracing::error!(student_id = %caller.student_id, "Failed to fetch {}: {}", what, err);
    AppError::Internal("server error".to_string())
}
