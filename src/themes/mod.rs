//! Theme permission synchronization.
//!
//! Grants catalog themes to students, keeps each student's permitted set in
//! step with the requested roster and enforces that a student only selects a
//! theme they were granted. All storage goes through an injected [`ThemeStore`].

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;

use crate::errors::AppError;
use crate::models::{Theme, ThemePermission, ThemeSet, DEFAULT_THEME_TYPE};

/// Number of permission rows written per storage call.
pub const SAVE_BATCH_SIZE: usize = 100;

/// Storage operations the synchronizer depends on.
///
/// Single-row reads return `Ok(None)` when the row is missing; the caller
/// decides whether that is an error.
#[async_trait]
pub trait ThemeStore: Send + Sync {
    /// Which of `student_ids` belong to registered students.
    async fn existing_student_ids(&self, student_ids: &[String]) -> Result<Vec<String>, AppError>;

    async fn all_student_ids(&self) -> Result<Vec<String>, AppError>;

    /// Permission rows for the given students. Students without a row are omitted.
    async fn permissions_for(
        &self,
        student_ids: &[String],
    ) -> Result<Vec<ThemePermission>, AppError>;

    async fn find_permission(&self, student_id: &str)
        -> Result<Option<ThemePermission>, AppError>;

    /// Insert or replace one batch of permission rows in a single write.
    async fn save_permissions(&self, batch: &[ThemePermission]) -> Result<(), AppError>;

    async fn create_permission(&self, permission: &ThemePermission) -> Result<(), AppError>;

    /// Overwrite only the current-theme field.
    async fn set_current_theme(&self, student_id: &str, theme_id: i64) -> Result<(), AppError>;

    /// Delete the row if present. Deleting a missing row is not an error.
    async fn delete_permission(&self, student_id: &str) -> Result<(), AppError>;

    async fn themes_by_ids(&self, ids: &[i64]) -> Result<Vec<Theme>, AppError>;

    async fn themes_by_type(&self, theme_type: &str) -> Result<Vec<Theme>, AppError>;
}

/// Grant `theme_id` to every valid student in `requested`, or to every
/// registered student when `requested` is empty.
///
/// Returns the requested IDs that are not registered students, in request
/// order. Every valid student's row is written, including rows that already
/// held the theme, in batches of [`SAVE_BATCH_SIZE`]; batches that were
/// written before a failing one stay written.
pub async fn add_theme_permission<S>(
    store: &S,
    theme_id: i64,
    requested: &[String],
) -> Result<Vec<String>, AppError>
where
    S: ThemeStore + ?Sized,
{
    let (valid, invalid): (Vec<String>, Vec<String>) = if requested.is_empty() {
        (store.all_student_ids().await?, Vec::new())
    } else {
        let existing: HashSet<String> = store
            .existing_student_ids(requested)
            .await?
            .into_iter()
            .collect();
        requested
            .iter()
            .cloned()
            .partition(|id| existing.contains(id))
    };

    let mut by_student: HashMap<String, ThemePermission> = store
        .permissions_for(&valid)
        .await?
        .into_iter()
        .map(|p| (p.student_id.clone(), p))
        .collect();

    let mut touched = Vec::new();
    let mut created = 0usize;
    let mut seen = HashSet::new();
    for student_id in &valid {
        if !seen.insert(student_id.as_str()) {
            continue;
        }
        match by_student.remove(student_id) {
            None => {
                touched.push(ThemePermission::granting(student_id, theme_id));
                created += 1;
            }
            Some(mut permission) => {
                permission.permitted.insert(theme_id);
                touched.push(permission);
            }
        }
    }

    save_in_batches(store, &touched).await?;

    tracing::info!(
        theme_id,
        granted = touched.len(),
        created,
        invalid = invalid.len(),
        "Theme permission granted"
    );
    Ok(invalid)
}

async fn save_in_batches<S>(store: &S, permissions: &[ThemePermission]) -> Result<(), AppError>
where
    S: ThemeStore + ?Sized,
{
    for (index, batch) in permissions.chunks(SAVE_BATCH_SIZE).enumerate() {
        if let Err(e) = store.save_permissions(batch).await {
            tracing::warn!(
                batch = index + 1,
                committed = index * SAVE_BATCH_SIZE,
                "Theme permission batch failed: {}",
                e
            );
            return Err(e);
        }
        tracing::debug!(batch = index + 1, rows = batch.len(), "Saved theme permission batch");
    }
    Ok(())
}

/// Select `theme_id` as the student's current theme.
pub async fn update_current_theme<S>(
    store: &S,
    theme_id: i64,
    student_id: &str,
) -> Result<(), AppError>
where
    S: ThemeStore + ?Sized,
{
    let permission = get_theme_permission(store, student_id).await?;

    if !permission.permitted.contains(theme_id) {
        return Err(AppError::Validation(format!(
            "Theme {} is not in the student's permission list",
            theme_id
        )));
    }

    store.set_current_theme(student_id, theme_id).await
}

pub async fn delete_theme_permission<S>(store: &S, student_id: &str) -> Result<(), AppError>
where
    S: ThemeStore + ?Sized,
{
    store.delete_permission(student_id).await
}

pub async fn get_theme_permission<S>(
    store: &S,
    student_id: &str,
) -> Result<ThemePermission, AppError>
where
    S: ThemeStore + ?Sized,
{
    store.find_permission(student_id).await?.ok_or_else(|| {
        AppError::NotFound(format!(
            "Theme permission for student {} not found",
            student_id
        ))
    })
}

/// Catalog entries for every theme the permission grants.
pub async fn get_themes<S>(store: &S, permission: &ThemePermission) -> Result<Vec<Theme>, AppError>
where
    S: ThemeStore + ?Sized,
{
    store.themes_by_ids(permission.permitted.ids()).await
}

pub async fn get_theme_names<S>(
    store: &S,
    permission: &ThemePermission,
) -> Result<Vec<String>, AppError>
where
    S: ThemeStore + ?Sized,
{
    let themes = get_themes(store, permission).await?;
    Ok(themes.into_iter().map(|t| t.name).collect())
}

/// Give a student every default theme, selecting the first one.
///
/// Does nothing if the student already has a permission row.
pub async fn add_default_theme_permission<S>(store: &S, student_id: &str) -> Result<(), AppError>
where
    S: ThemeStore + ?Sized,
{
    if store.find_permission(student_id).await?.is_some() {
        return Ok(());
    }

    let defaults = store.themes_by_type(DEFAULT_THEME_TYPE).await?;
    let permitted = ThemeSet::from_ids(defaults.iter().map(|t| t.id).collect());
    let Some(current_theme_id) = permitted.first() else {
        return Err(AppError::Configuration(
            "no default themes configured".to_string(),
        ));
    };

    store
        .create_permission(&ThemePermission {
            student_id: student_id.to_string(),
            current_theme_id,
            permitted,
        })
        .await?;

    tracing::info!(student_id, current_theme_id, "Default theme permission created");
    Ok(())
}
