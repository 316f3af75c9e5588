//! Theme catalog and per-student theme permission models.

use serde::{Deserialize, Serialize};

/// Catalog tag marking themes every student receives by default.
pub const DEFAULT_THEME_TYPE: &str = "all";

/// A visual theme from the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Theme {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub theme_type: String,
}

/// Ordered set of theme IDs a student may select.
///
/// Duplicates are not rejected on construction; `insert` only appends IDs that
/// are not already present, so merging a grant never duplicates an entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThemeSet(Vec<i64>);

/// Column representation of a [`ThemeSet`].
#[derive(Serialize, Deserialize)]
struct PermissionPayload {
    theme_ids: Vec<i64>,
}

impl ThemeSet {
    pub fn from_ids(ids: Vec<i64>) -> Self {
        Self(ids)
    }

    pub fn singleton(id: i64) -> Self {
        Self(vec![id])
    }

    pub fn contains(&self, id: i64) -> bool {
        self.0.contains(&id)
    }

    /// Append `id` unless present. Returns whether the set changed.
    pub fn insert(&mut self, id: i64) -> bool {
        if self.contains(id) {
            return false;
        }
        self.0.push(id);
        true
    }

    pub fn ids(&self) -> &[i64] {
        &self.0
    }

    pub fn first(&self) -> Option<i64> {
        self.0.first().copied()
    }

    /// Decode the stored `{"theme_ids":[...]}` column value.
    pub fn decode(payload: &str) -> Result<Self, serde_json::Error> {
        let decoded: PermissionPayload = serde_json::from_str(payload)?;
        Ok(Self(decoded.theme_ids))
    }

    /// Encode into the stored column value.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&PermissionPayload {
            theme_ids: self.0.clone(),
        })
    }
}

/// A student's theme permission record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemePermission {
    pub student_id: String,
    pub current_theme_id: i64,
    #[serde(rename = "themeIds")]
    pub permitted: ThemeSet,
}

impl ThemePermission {
    /// A fresh record granting exactly `theme_id` and selecting it.
    pub fn granting(student_id: &str, theme_id: i64) -> Self {
        Self {
            student_id: student_id.to_string(),
            current_theme_id: theme_id,
            permitted: ThemeSet::singleton(theme_id),
        }
    }
}

/// Request body for creating a catalog theme.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateThemeRequest {
    pub name: String,
    #[serde(rename = "type")]
    pub theme_type: String,
}

/// Request body for granting a theme to a roster of students.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantThemeRequest {
    pub theme_id: i64,
    /// Empty or missing grants the theme to every student
    #[serde(default)]
    pub student_ids: Vec<String>,
}

/// Result of a roster grant.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantThemeResponse {
    pub invalid_student_ids: Vec<String>,
}

/// Request body for selecting the caller's current theme.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectThemeRequest {
    pub theme_id: i64,
}

/// The caller's selectable themes and current selection.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemeOverview {
    pub current_theme_id: i64,
    pub themes: Vec<Theme>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_appends_only_missing() {
        let mut set = ThemeSet::from_ids(vec![5]);
        assert!(set.insert(7));
        assert!(!set.insert(5));
        assert!(!set.insert(7));
        assert_eq!(set.ids(), &[5, 7]);
    }

    #[test]
    fn test_decode_stored_payload() {
        let set = ThemeSet::decode(r#"{"theme_ids":[3,1,2]}"#).unwrap();
        assert_eq!(set.ids(), &[3, 1, 2]);
        assert_eq!(set.first(), Some(3));
        assert_eq!(set.encode().unwrap(), r#"{"theme_ids":[3,1,2]}"#);
    }

    #[test]
    fn test_decode_rejects_malformed_payload() {
        assert!(ThemeSet::decode("[1,2").is_err());
        assert!(ThemeSet::decode(r#"{"theme_ids":"x"}"#).is_err());
    }

    #[test]
    fn test_permission_serializes_ids_as_array() {
        let permission = ThemePermission::granting("S1", 7);
        let value = serde_json::to_value(&permission).unwrap();
        assert_eq!(value["studentId"], "S1");
        assert_eq!(value["currentThemeId"], 7);
        assert_eq!(value["themeIds"], serde_json::json!([7]));
    }
}
