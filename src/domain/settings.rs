//! User settings document.
//!
//! Every field has a serde default so a settings file written by an older
//! schema version gains newly introduced fields on load.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Single record of user configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Bot API credential; empty means unconfigured
    #[serde(default)]
    pub token: String,

    #[serde(default = "default_theme")]
    pub theme_name: String,

    /// Visibility gate for sensitive content
    #[serde(default)]
    pub nsfw_enabled: bool,

    #[serde(default)]
    pub show_favorites_only: bool,

    /// Last-used sort key, restored on startup
    #[serde(default = "default_sort")]
    pub sort_by: String,

    /// Cover overrides keyed by view id (e.g. `collection_<name>`)
    #[serde(default)]
    pub custom_covers: HashMap<String, String>,

    /// Opaque theme payload owned by the UI collaborator; preserved as-is
    #[serde(default)]
    pub custom_theme_data: serde_json::Value,
}

fn default_theme() -> String {
    "Classic".to_string()
}

fn default_sort() -> String {
    "recency".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            token: String::new(),
            theme_name: default_theme(),
            nsfw_enabled: false,
            show_favorites_only: false,
            sort_by: default_sort(),
            custom_covers: HashMap::new(),
            custom_theme_data: serde_json::Value::Null,
        }
    }
}

impl Settings {
    /// Whether a remote credential is configured
    pub fn has_token(&self) -> bool {
        !self.token.trim().is_empty()
    }

    /// Set or clear the cover override for a named view
    /// (e.g. `collection_<name>`). Empty or missing path clears it.
    pub fn set_view_cover(&mut self, view: impl Into<String>, path: Option<&str>) {
        let view = view.into();
        match path.map(str::trim).filter(|p| !p.is_empty()) {
            Some(p) => {
                self.custom_covers.insert(view, p.to_string());
            }
            None => {
                self.custom_covers.remove(&view);
            }
        }
    }

    /// Cover override for a named view, if any
    pub fn view_cover(&self, view: &str) -> Option<&str> {
        self.custom_covers.get(view).map(|s| s.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sparse_document_backfills() {
        // Only the token was present in the old schema
        let settings: Settings = serde_json::from_str(r#"{"token": "abc"}"#).unwrap();
        assert_eq!(settings.token, "abc");
        assert_eq!(settings.theme_name, "Classic");
        assert!(!settings.nsfw_enabled);
        assert!(settings.custom_covers.is_empty());
    }

    #[test]
    fn test_unknown_theme_data_preserved() {
        let raw = r##"{"custom_theme_data": {"accent": "#ff0000"}}"##;
        let settings: Settings = serde_json::from_str(raw).unwrap();
        let round = serde_json::to_string(&settings).unwrap();
        let back: Settings = serde_json::from_str(&round).unwrap();
        assert_eq!(back.custom_theme_data["accent"], "#ff0000");
    }

    #[test]
    fn test_view_cover_set_and_clear() {
        let mut s = Settings::default();
        s.set_view_cover("collection_cats", Some("/covers/cats.webp"));
        assert_eq!(s.view_cover("collection_cats"), Some("/covers/cats.webp"));

        // Blank path clears, as does None
        s.set_view_cover("collection_cats", Some("  "));
        assert_eq!(s.view_cover("collection_cats"), None);

        s.set_view_cover("favorites", Some("/covers/fav.webp"));
        s.set_view_cover("favorites", None);
        assert!(s.custom_covers.is_empty());
    }

    #[test]
    fn test_has_token() {
        let mut s = Settings::default();
        assert!(!s.has_token());
        s.token = "  ".to_string();
        assert!(!s.has_token());
        s.token = "123:abc".to_string();
        assert!(s.has_token());
    }
}
