//! Pack and item records plus the library document.
//!
//! The on-disk library is a bare JSON array of packs, so `Library` is a
//! transparent wrapper. A pack's canonical identifier is the remote-assigned
//! name; it is the dedup key and the link key for collections.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Canonical pack identifier (remote-assigned, unique within the library)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PackId(String);

impl PackId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the raw string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PackId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for PackId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// One media asset belonging to a pack, addressed by its position in the
/// pack's item list. Stored files are named `item_<index>.<ext>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    /// Remote file reference used to resolve the download descriptor
    pub file_id: String,

    /// Emoji associated with the item by the remote API
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emoji: Option<String>,

    /// Format + user tags (deduplicated)
    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub is_favorite: bool,

    /// How many times the item has been used (copy/export)
    #[serde(default)]
    pub usage_count: u64,

    /// User-assigned display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used: Option<DateTime<Utc>>,
}

impl Item {
    /// Create an item from a remote file reference, seeding its tag set
    /// with the associated emoji when present.
    pub fn new(file_id: impl Into<String>, emoji: Option<String>) -> Self {
        let mut tags = Vec::new();
        if let Some(ref e) = emoji {
            let e = e.trim();
            if !e.is_empty() {
                tags.push(e.to_string());
            }
        }
        Self {
            file_id: file_id.into(),
            emoji,
            tags,
            is_favorite: false,
            usage_count: 0,
            custom_name: None,
            last_used: None,
        }
    }

    /// Record a use of this item
    pub fn record_use(&mut self) {
        self.usage_count += 1;
        self.last_used = Some(Utc::now());
    }
}

/// A named pack of items ingested as one unit from the remote API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pack {
    /// Display name (user-renamable)
    pub name: String,

    /// Canonical identifier
    pub id: PackId,

    /// Original share URL
    #[serde(default)]
    pub url: String,

    /// Ordered item list; positional index is stable for the pack's lifetime
    #[serde(default)]
    pub items: Vec<Item>,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub is_favorite: bool,

    /// Symmetric links to other packs (collection edges)
    #[serde(default)]
    pub linked_packs: Vec<PackId>,

    /// Custom collection fields, redundantly stored on every member of a
    /// linked component
    #[serde(default)]
    pub custom_collection_name: String,
    #[serde(default)]
    pub custom_collection_cover: String,
    #[serde(default)]
    pub custom_collection_tags: Vec<String>,

    pub added: DateTime<Utc>,
    pub updated: DateTime<Utc>,

    #[serde(default)]
    pub downloaded: bool,

    /// Thumbnail override; empty means "pick one of the stored items"
    #[serde(default)]
    pub thumbnail_path: String,
}

impl Pack {
    /// Create a new pack shell (items attached by the ingest pipeline)
    pub fn new(id: PackId, name: impl Into<String>, items: Vec<Item>) -> Self {
        let now = Utc::now();
        let url = format!("t.me/addstickers/{}", id);
        Self {
            name: name.into(),
            id,
            url,
            items,
            tags: Vec::new(),
            is_favorite: false,
            linked_packs: Vec::new(),
            custom_collection_name: String::new(),
            custom_collection_cover: String::new(),
            custom_collection_tags: Vec::new(),
            added: now,
            updated: now,
            downloaded: false,
            thumbnail_path: String::new(),
        }
    }

    /// Number of items in the pack
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Whether this pack is linked to the given identifier
    pub fn is_linked_to(&self, other: &PackId) -> bool {
        self.linked_packs.contains(other)
    }

    /// Mark the pack as touched by a mutation
    pub fn touch(&mut self) {
        self.updated = Utc::now();
    }
}

/// Add a tag to a tag set if not already present. Returns true if added.
pub fn push_tag(tags: &mut Vec<String>, tag: impl Into<String>) -> bool {
    let tag = tag.into();
    if tags.contains(&tag) {
        false
    } else {
        tags.push(tag);
        true
    }
}

/// The authoritative in-memory library document: an ordered collection of
/// packs, serialized as one JSON array.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Library {
    pub packs: Vec<Pack>,
}

impl Library {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a pack by canonical identifier
    pub fn get(&self, id: &PackId) -> Option<&Pack> {
        self.packs.iter().find(|p| &p.id == id)
    }

    /// Mutable lookup by canonical identifier
    pub fn get_mut(&mut self, id: &PackId) -> Option<&mut Pack> {
        self.packs.iter_mut().find(|p| &p.id == id)
    }

    pub fn contains(&self, id: &PackId) -> bool {
        self.get(id).is_some()
    }

    /// Insert a pack. Returns false (and leaves the library unchanged) if a
    /// pack with the same identifier already exists.
    pub fn insert(&mut self, pack: Pack) -> bool {
        if self.contains(&pack.id) {
            return false;
        }
        self.packs.push(pack);
        true
    }

    /// Remove a pack by identifier, returning it if present
    pub fn remove(&mut self, id: &PackId) -> Option<Pack> {
        let pos = self.packs.iter().position(|p| &p.id == id)?;
        Some(self.packs.remove(pos))
    }

    pub fn len(&self) -> usize {
        self.packs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packs.is_empty()
    }
}
