//! Data structures for the pack library.
//!
//! All persisted records live here: `Pack`, `Item`, the `Library` document
//! and the user `Settings` document. Fields added after the first release
//! carry `#[serde(default)]` so older documents gain them on load.

pub mod pack;
pub mod settings;

pub use pack::{push_tag, Item, Library, Pack, PackId};
pub use settings::Settings;

/// Tags assigned by the system (classifier output + sensitive-content
/// marker). These are excluded from free-text tag autocomplete.
pub const SYSTEM_TAGS: [&str; 4] = ["Animated", "Static", "Video", "NSFW"];

/// Tag used to gate sensitive content before any other filter.
pub const NSFW_TAG: &str = "NSFW";

/// Check whether a tag is system-assigned.
pub fn is_system_tag(tag: &str) -> bool {
    SYSTEM_TAGS.contains(&tag)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_tags() {
        assert!(is_system_tag("Animated"));
        assert!(is_system_tag("NSFW"));
        assert!(!is_system_tag("cats"));
        assert!(!is_system_tag("animated"));
    }
}
