//! Admin endpoints for the theme catalog, theme grants and student registration.

use axum::extract::{Path, State};

use super::{success, ApiResult, JsonBody};
use crate::errors::AppError;
use crate::models::{
    CreateThemeRequest, GrantThemeRequest, GrantThemeResponse, RegisterStudentRequest, Student,
    Theme, ThemePermission,
};
use crate::themes;
use crate::AppState;

/// GET /api/admin/themes - List the theme catalog.
pub async fn list_themes(State(state): State<AppState>) -> ApiResult<Vec<Theme>> {
    success(state.repo.list_themes().await?)
}

/// POST /api/admin/themes - Add a theme to the catalog.
pub async fn create_theme(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<CreateThemeRequest>,
) -> ApiResult<Theme> {
    if request.name.trim().is_empty() {
        return Err(AppError::Validation("Theme name is required".to_string()));
    }
    if request.theme_type.trim().is_empty() {
        return Err(AppError::Validation("Theme type is required".to_string()));
    }

    success(state.repo.create_theme(&request).await?)
}

/// POST /api/admin/theme/permissions - Grant a theme to a roster, or to everyone.
pub async fn grant_theme(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<GrantThemeRequest>,
) -> ApiResult<GrantThemeResponse> {
    let invalid_student_ids =
        themes::add_theme_permission(state.repo.as_ref(), request.theme_id, &request.student_ids)
            .await?;

    success(GrantThemeResponse {
        invalid_student_ids,
    })
}

/// GET /api/admin/theme/permissions/{student_id} - A student's permission record.
pub async fn get_theme_permission(
    State(state): State<AppState>,
    Path(student_id): Path<String>,
) -> ApiResult<ThemePermission> {
    success(themes::get_theme_permission(state.repo.as_ref(), &student_id).await?)
}

/// DELETE /api/admin/theme/permissions/{student_id} - Remove a student's permission record.
pub async fn delete_theme_permission(
    State(state): State<AppState>,
    Path(student_id): Path<String>,
) -> ApiResult<()> {
    themes::delete_theme_permission(state.repo.as_ref(), &student_id).await?;
    success(())
}

/// POST /api/admin/theme/permissions/{student_id}/default - Grant the default themes.
pub async fn add_default_theme_permission(
    State(state): State<AppState>,
    Path(student_id): Path<String>,
) -> ApiResult<ThemePermission> {
    let store = state.repo.as_ref();
    themes::add_default_theme_permission(store, &student_id).await?;
    success(themes::get_theme_permission(store, &student_id).await?)
}

/// POST /api/admin/students - Register a student and grant the default themes.
pub async fn register_student(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<RegisterStudentRequest>,
) -> ApiResult<Student> {
    let student_id = request.student_id.trim();
    if student_id.is_empty() {
        return Err(AppError::Validation("Student ID is required".to_string()));
    }

    let student = state.repo.create_student(student_id).await?;

    match themes::add_default_theme_permission(state.repo.as_ref(), student_id).await {
        Ok(()) => {}
        // The student stays registered; defaults can be granted once the catalog has them.
        Err(AppError::Configuration(msg)) => {
            tracing::warn!(student_id, "Registered without default themes: {}", msg);
        }
        Err(e) => {
            tracing::error!(
                student_id,
                "Student registered but default theme bootstrap failed: {}",
                e
            );
            return Err(e);
        }
    }

    success(student)
}
