//! Library borrow endpoints.

use axum::extract::State;

use super::{success, ApiResult};
use crate::auth::CurrentUser;
use crate::library;
use crate::models::BorrowRecord;
use crate::AppState;

/// GET /api/library/borrow/current - Items the caller still holds.
pub async fn get_current_borrows(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
) -> ApiResult<Vec<BorrowRecord>> {
    let list = library::get_current(state.repo.as_ref(), &caller).await?;
    success(list)
}

/// GET /api/library/borrow/history - Everything the caller has borrowed.
pub async fn get_borrow_history(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
) -> ApiResult<Vec<BorrowRecord>> {
    let list = library::get_history(state.repo.as_ref(), &caller).await?;
    success(list)
}
