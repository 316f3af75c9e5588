//! Student-facing theme endpoints.

use axum::extract::State;

use super::{success, ApiResult, JsonBody};
use crate::auth::CurrentUser;
use crate::models::{SelectThemeRequest, ThemeOverview};
use crate::themes;
use crate::AppState;

/// GET /api/theme - The caller's selectable themes and current selection.
pub async fn get_my_themes(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
) -> ApiResult<ThemeOverview> {
    let store = state.repo.as_ref();
    let permission = themes::get_theme_permission(store, &caller.student_id).await?;
    let themes = themes::get_themes(store, &permission).await?;

    success(ThemeOverview {
        current_theme_id: permission.current_theme_id,
        themes,
    })
}

/// GET /api/theme/names - Names of the caller's selectable themes.
pub async fn get_my_theme_names(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
) -> ApiResult<Vec<String>> {
    let store = state.repo.as_ref();
    let permission = themes::get_theme_permission(store, &caller.student_id).await?;
    success(themes::get_theme_names(store, &permission).await?)
}

/// PUT /api/theme/current - Select one of the caller's granted themes.
pub async fn select_current_theme(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    JsonBody(request): JsonBody<SelectThemeRequest>,
) -> ApiResult<()> {
    themes::update_current_theme(state.repo.as_ref(), request.theme_id, &caller.student_id)
        .await?;
    success(())
}
