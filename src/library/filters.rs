//! Read-side view logic: filtering, sorting and pagination.
//!
//! Pure functions over an in-memory library snapshot; nothing here mutates
//! or persists. The sensitive-content visibility gate is evaluated before
//! any tag filter, so a gated pack or item never reaches the include/exclude
//! matching at all.

use rand::seq::SliceRandom;
use serde::Serialize;

use crate::domain::{Item, Library, Pack, PackId, NSFW_TAG};
use crate::graph::{resolve_component, VirtualFolder};

/// What the caller is looking at
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewMode {
    /// Top-level packs plus folded virtual collections
    Library,
    /// Members of the component containing the given pack
    Collection(PackId),
    /// Flattened items across a scope
    Gallery(GalleryScope),
}

/// Scope for the gallery view
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GalleryScope {
    All,
    Pack(PackId),
    Collection(PackId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TagMatch {
    #[default]
    All,
    Any,
}

/// Item-level format filter (gallery only)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileTypeFilter {
    #[default]
    All,
    Animated,
    Static,
    Video,
}

impl FileTypeFilter {
    fn matches(self, tags: &[String]) -> bool {
        let wanted = match self {
            FileTypeFilter::All => return true,
            FileTypeFilter::Animated => "Animated",
            FileTypeFilter::Static => "Static",
            FileTypeFilter::Video => "Video",
        };
        tags.iter().any(|t| t == wanted)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    Recency,
    Alphabetical,
    ItemCount,
    Usage,
    Random,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Ascending,
    #[default]
    Descending,
}

/// Filter, sort and pagination options for one view request
#[derive(Debug, Clone)]
pub struct FilterOptions {
    /// Case-insensitive substring search
    pub query: String,
    pub include_tags: Vec<String>,
    pub exclude_tags: Vec<String>,
    pub tag_match: TagMatch,
    pub favorites_only: bool,
    pub file_type: FileTypeFilter,
    pub sort_by: SortKey,
    pub order: SortOrder,
    /// Sensitive-content visibility gate; evaluated before tag filters
    pub nsfw_enabled: bool,
    /// 1-indexed page number, clamped to the available range
    pub page: usize,
    pub page_size: usize,
}

impl Default for FilterOptions {
    fn default() -> Self {
        Self {
            query: String::new(),
            include_tags: Vec::new(),
            exclude_tags: Vec::new(),
            tag_match: TagMatch::default(),
            favorites_only: false,
            file_type: FileTypeFilter::default(),
            sort_by: SortKey::default(),
            order: SortOrder::default(),
            nsfw_enabled: false,
            page: 1,
            page_size: 50,
        }
    }
}

/// One flattened gallery entry
#[derive(Debug, Clone, Serialize)]
pub struct GalleryItem {
    pub pack_id: PackId,
    pub index: usize,
    pub item: Item,
}

/// One entry in a view page
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Entry {
    Pack(Pack),
    Folder(VirtualFolder),
    Item(GalleryItem),
}

impl Entry {
    pub fn name(&self) -> &str {
        match self {
            Entry::Pack(p) => &p.name,
            Entry::Folder(f) => &f.name,
            Entry::Item(g) => g.item.custom_name.as_deref().unwrap_or(""),
        }
    }

    fn sort_count(&self) -> usize {
        match self {
            Entry::Pack(p) => p.item_count(),
            Entry::Folder(f) => f.count,
            Entry::Item(_) => 1,
        }
    }

    fn sort_usage(&self) -> u64 {
        match self {
            Entry::Pack(p) => p.items.iter().map(|i| i.usage_count).sum(),
            Entry::Folder(_) => 0,
            Entry::Item(g) => g.item.usage_count,
        }
    }
}

/// One page of view results
#[derive(Debug, Clone, Serialize)]
pub struct Page {
    pub entries: Vec<Entry>,
    pub total: usize,
    pub page: usize,
    pub pages: usize,
}

/// Evaluate a view request against a library snapshot
pub fn apply_filters(library: &Library, mode: &ViewMode, opts: &FilterOptions) -> Page {
    let entries = match mode {
        ViewMode::Library => library_entries(library, opts),
        ViewMode::Collection(root) => collection_entries(library, root, opts),
        ViewMode::Gallery(scope) => gallery_entries(library, scope, opts),
    };
    paginate(sort_entries(entries, mode, opts), opts)
}

/// Exclude short-circuits on first match; include honors the match mode
fn check_tags(tags: &[String], opts: &FilterOptions) -> bool {
    if opts.exclude_tags.iter().any(|t| tags.contains(t)) {
        return false;
    }
    if opts.include_tags.is_empty() {
        return true;
    }
    match opts.tag_match {
        TagMatch::Any => opts.include_tags.iter().any(|t| tags.contains(t)),
        TagMatch::All => opts.include_tags.iter().all(|t| tags.contains(t)),
    }
}

fn query_matches(query: &str, haystack: &str) -> bool {
    query.is_empty() || haystack.to_lowercase().contains(query)
}

fn is_sensitive(tags: &[String]) -> bool {
    tags.iter().any(|t| t == NSFW_TAG)
}

fn pack_passes(pack: &Pack, query: &str, opts: &FilterOptions) -> bool {
    // Visibility gate runs before anything else
    if !opts.nsfw_enabled && is_sensitive(&pack.tags) {
        return false;
    }
    if !query_matches(query, &pack.name) {
        return false;
    }
    if opts.favorites_only && !pack.is_favorite {
        return false;
    }
    check_tags(&pack.tags, opts)
}

fn library_entries(library: &Library, opts: &FilterOptions) -> Vec<Entry> {
    let query = opts.query.to_lowercase();
    let mut processed: std::collections::HashSet<PackId> = std::collections::HashSet::new();
    let mut entries = Vec::new();

    for pack in &library.packs {
        if processed.contains(&pack.id) {
            continue;
        }

        let members = resolve_component(library, &pack.id);
        if members.len() > 1 {
            for m in &members {
                processed.insert(m.id.clone());
            }

            // Gate: a folder disappears only when every member is sensitive
            if !opts.nsfw_enabled && members.iter().all(|m| is_sensitive(&m.tags)) {
                continue;
            }

            let folder = VirtualFolder::synthesize(&members);
            if opts.favorites_only && !folder.is_favorite {
                continue;
            }
            if !query.is_empty() {
                let name_hit = query_matches(&query, &folder.name);
                let member_hit = members.iter().any(|m| query_matches(&query, &m.name));
                if !name_hit && !member_hit {
                    continue;
                }
            }
            // Tag filtering on folders keys off the root's collection tags
            if !check_tags(&folder.tags, opts) {
                continue;
            }
            entries.push(Entry::Folder(folder));
        } else {
            processed.insert(pack.id.clone());
            if pack_passes(pack, &query, opts) {
                entries.push(Entry::Pack(pack.clone()));
            }
        }
    }

    entries
}

fn collection_entries(library: &Library, root: &PackId, opts: &FilterOptions) -> Vec<Entry> {
    let query = opts.query.to_lowercase();
    resolve_component(library, root)
        .into_iter()
        .filter(|p| pack_passes(p, &query, opts))
        .map(Entry::Pack)
        .collect()
}

fn gallery_entries(library: &Library, scope: &GalleryScope, opts: &FilterOptions) -> Vec<Entry> {
    let query = opts.query.to_lowercase();

    let pool: Vec<Pack> = match scope {
        GalleryScope::All => library.packs.clone(),
        GalleryScope::Pack(id) => library.get(id).cloned().into_iter().collect(),
        GalleryScope::Collection(root) => resolve_component(library, root),
    };

    let mut entries = Vec::new();
    for pack in &pool {
        // A sensitive pack hides all of its items
        if !opts.nsfw_enabled && is_sensitive(&pack.tags) {
            continue;
        }
        for (index, item) in pack.items.iter().enumerate() {
            if !opts.nsfw_enabled && is_sensitive(&item.tags) {
                continue;
            }
            if opts.favorites_only && !item.is_favorite {
                continue;
            }
            if !opts.file_type.matches(&item.tags) {
                continue;
            }
            if !check_tags(&item.tags, opts) {
                continue;
            }
            if !query.is_empty() {
                let name_hit = item
                    .custom_name
                    .as_deref()
                    .map(|n| query_matches(&query, n))
                    .unwrap_or(false);
                let tag_hit = query_matches(&query, &item.tags.join(" "));
                if !name_hit && !tag_hit {
                    continue;
                }
            }
            entries.push(Entry::Item(GalleryItem {
                pack_id: pack.id.clone(),
                index,
                item: item.clone(),
            }));
        }
    }

    entries
}

fn sort_entries(mut entries: Vec<Entry>, mode: &ViewMode, opts: &FilterOptions) -> Vec<Entry> {
    let gallery = matches!(mode, ViewMode::Gallery(_));

    match opts.sort_by {
        SortKey::Random => {
            entries.shuffle(&mut rand::thread_rng());
            return entries;
        }
        SortKey::Usage => {
            entries.sort_by_key(|e| e.sort_usage());
        }
        SortKey::Alphabetical if !gallery => {
            entries.sort_by(|a, b| a.name().to_lowercase().cmp(&b.name().to_lowercase()));
        }
        SortKey::ItemCount if !gallery => {
            entries.sort_by_key(|a| a.sort_count());
        }
        SortKey::Recency if !gallery => {
            entries.sort_by_key(|e| match e {
                Entry::Pack(p) => p.added,
                Entry::Folder(f) => f.added,
                // Items never appear outside gallery mode; constant sentinel
                Entry::Item(_) => chrono::DateTime::<chrono::Utc>::MIN_UTC,
            });
        }
        // Gallery non-usage sorts key off (pack, positional index); the
        // direction flag applies like any other key
        _ => {
            entries.sort_by(|a, b| match (a, b) {
                (Entry::Item(x), Entry::Item(y)) => {
                    (x.pack_id.as_str(), x.index).cmp(&(y.pack_id.as_str(), y.index))
                }
                _ => std::cmp::Ordering::Equal,
            });
        }
    }

    if opts.order == SortOrder::Descending {
        entries.reverse();
    }
    entries
}

fn paginate(entries: Vec<Entry>, opts: &FilterOptions) -> Page {
    let total = entries.len();
    let size = opts.page_size.max(1);
    let pages = (total + size - 1) / size;
    let pages = pages.max(1);
    let page = opts.page.clamp(1, pages);

    let start = (page - 1) * size;
    let page_entries: Vec<Entry> = entries.into_iter().skip(start).take(size).collect();

    Page {
        entries: page_entries,
        total,
        page,
        pages,
    }
}
