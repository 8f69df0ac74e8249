//! Write side of the library: mutation operations over the canonical
//! in-memory document.
//!
//! Every mutation follows the same shape: apply the change, persist the
//! document through the store, then rebuild the derived tag index by a full
//! rescan. The rescan guarantees no orphaned tag survives a removal.

use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio::sync::RwLock;
use tracing::info;

use crate::domain::{is_system_tag, push_tag, Library, PackId, NSFW_TAG};
use crate::graph;
use crate::library::filters::{apply_filters, FilterOptions, Page, ViewMode};
use crate::store::Store;

/// Derived tag autocomplete sets, rebuilt by full rescan
#[derive(Debug, Clone, Default)]
pub struct TagIndex {
    /// Pack tags plus collection tags
    pub pack_tags: BTreeSet<String>,
    /// Item tags, system tags excluded
    pub item_tags: BTreeSet<String>,
}

impl TagIndex {
    /// Wipe and rebuild from what actually exists in the library
    pub fn rebuild(library: &Library) -> Self {
        let mut index = Self::default();
        index.item_tags.insert(NSFW_TAG.to_string());

        for pack in &library.packs {
            for tag in &pack.tags {
                index.pack_tags.insert(tag.clone());
            }
            for tag in &pack.custom_collection_tags {
                index.pack_tags.insert(tag.clone());
            }
            for item in &pack.items {
                for tag in &item.tags {
                    if !is_system_tag(tag) {
                        index.item_tags.insert(tag.clone());
                    }
                }
            }
        }
        index
    }
}

/// Owns the canonical in-memory library and its derived indices
pub struct LibraryController {
    library: Arc<RwLock<Library>>,
    tags: Arc<RwLock<TagIndex>>,
    store: Store,
}

impl LibraryController {
    /// Load the library document and build the initial index
    pub async fn load(store: Store) -> Self {
        let library = store.load_library().await;
        let tags = TagIndex::rebuild(&library);
        Self {
            library: Arc::new(RwLock::new(library)),
            tags: Arc::new(RwLock::new(tags)),
            store,
        }
    }

    /// Shared handle to the library document
    pub fn library(&self) -> Arc<RwLock<Library>> {
        self.library.clone()
    }

    /// Shared handle to the tag autocomplete index
    pub fn tags(&self) -> Arc<RwLock<TagIndex>> {
        self.tags.clone()
    }

    pub fn store(&self) -> Store {
        self.store.clone()
    }

    /// Persist the document and rebuild derived indices
    async fn commit(&self) -> Result<()> {
        let library = self.library.read().await;
        self.store
            .save_library(&library)
            .await
            .context("Failed to persist library")?;
        *self.tags.write().await = TagIndex::rebuild(&library);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Read operations
    // ------------------------------------------------------------------

    /// Evaluate a view over the current snapshot
    pub async fn view(&self, mode: &ViewMode, opts: &FilterOptions) -> Page {
        let library = self.library.read().await;
        apply_filters(&library, mode, opts)
    }

    // ------------------------------------------------------------------
    // Renaming
    // ------------------------------------------------------------------

    pub async fn rename_pack(&self, id: &PackId, new_name: &str) -> Result<()> {
        {
            let mut library = self.library.write().await;
            let pack = library.get_mut(id).with_context(|| format!("No such pack: {}", id))?;
            pack.name = new_name.trim().to_string();
            pack.touch();
        }
        self.commit().await
    }

    /// Rename an item; empty or None clears the custom name
    pub async fn rename_item(
        &self,
        id: &PackId,
        index: usize,
        new_name: Option<&str>,
    ) -> Result<()> {
        {
            let mut library = self.library.write().await;
            let pack = library.get_mut(id).with_context(|| format!("No such pack: {}", id))?;
            let item = pack
                .items
                .get_mut(index)
                .with_context(|| format!("No item {} in pack {}", index, id))?;
            item.custom_name = new_name
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty());
            pack.touch();
        }
        self.commit().await
    }

    /// Set the custom collection name on every member of the component
    /// containing `root`; empty clears it.
    pub async fn rename_collection(&self, root: &PackId, new_name: &str) -> Result<()> {
        let cleaned = new_name.trim().to_string();
        {
            let mut library = self.library.write().await;
            let member_ids: Vec<PackId> = graph::resolve_component(&library, root)
                .iter()
                .map(|p| p.id.clone())
                .collect();
            if member_ids.is_empty() {
                bail!("No such pack: {}", root);
            }
            for id in &member_ids {
                if let Some(pack) = library.get_mut(id) {
                    pack.custom_collection_name = cleaned.clone();
                    pack.touch();
                }
            }
        }
        self.commit().await
    }

    // ------------------------------------------------------------------
    // Tags
    // ------------------------------------------------------------------

    pub async fn add_pack_tag(&self, id: &PackId, tag: &str) -> Result<()> {
        let tag = validate_user_tag(tag)?;
        {
            let mut library = self.library.write().await;
            let pack = library.get_mut(id).with_context(|| format!("No such pack: {}", id))?;
            push_tag(&mut pack.tags, tag);
            pack.touch();
        }
        self.commit().await
    }

    pub async fn remove_pack_tag(&self, id: &PackId, tag: &str) -> Result<()> {
        {
            let mut library = self.library.write().await;
            let pack = library.get_mut(id).with_context(|| format!("No such pack: {}", id))?;
            pack.tags.retain(|t| t != tag);
            pack.touch();
        }
        self.commit().await
    }

    /// Collection tags live on the component root
    pub async fn add_collection_tag(&self, root: &PackId, tag: &str) -> Result<()> {
        let tag = validate_user_tag(tag)?;
        {
            let mut library = self.library.write().await;
            let pack = library
                .get_mut(root)
                .with_context(|| format!("No such pack: {}", root))?;
            push_tag(&mut pack.custom_collection_tags, tag);
            pack.touch();
        }
        self.commit().await
    }

    pub async fn remove_collection_tag(&self, root: &PackId, tag: &str) -> Result<()> {
        {
            let mut library = self.library.write().await;
            let pack = library
                .get_mut(root)
                .with_context(|| format!("No such pack: {}", root))?;
            pack.custom_collection_tags.retain(|t| t != tag);
            pack.touch();
        }
        self.commit().await
    }

    pub async fn add_item_tag(&self, id: &PackId, index: usize, tag: &str) -> Result<()> {
        let tag = validate_user_tag(tag)?;
        {
            let mut library = self.library.write().await;
            let pack = library.get_mut(id).with_context(|| format!("No such pack: {}", id))?;
            let item = pack
                .items
                .get_mut(index)
                .with_context(|| format!("No item {} in pack {}", index, id))?;
            push_tag(&mut item.tags, tag);
            pack.touch();
        }
        self.commit().await
    }

    pub async fn remove_item_tag(&self, id: &PackId, index: usize, tag: &str) -> Result<()> {
        {
            let mut library = self.library.write().await;
            let pack = library.get_mut(id).with_context(|| format!("No such pack: {}", id))?;
            let item = pack
                .items
                .get_mut(index)
                .with_context(|| format!("No item {} in pack {}", index, id))?;
            item.tags.retain(|t| t != tag);
            pack.touch();
        }
        self.commit().await
    }

    /// Toggle the sensitive-content marker on a pack. The marker is a system
    /// tag, so it goes through its own operation instead of the free-text
    /// tag path.
    pub async fn toggle_pack_sensitive(&self, id: &PackId) -> Result<bool> {
        let now_sensitive;
        {
            let mut library = self.library.write().await;
            let pack = library.get_mut(id).with_context(|| format!("No such pack: {}", id))?;
            if pack.tags.iter().any(|t| t == NSFW_TAG) {
                pack.tags.retain(|t| t != NSFW_TAG);
                now_sensitive = false;
            } else {
                pack.tags.push(NSFW_TAG.to_string());
                now_sensitive = true;
            }
            pack.touch();
        }
        self.commit().await?;
        Ok(now_sensitive)
    }

    // ------------------------------------------------------------------
    // Linking / collections
    // ------------------------------------------------------------------

    pub async fn link_packs(&self, a: &PackId, b: &PackId) -> Result<()> {
        {
            let mut library = self.library.write().await;
            if !graph::link(&mut library, a, b) {
                bail!("Cannot link {} and {}", a, b);
            }
        }
        info!("Linked packs {} <-> {}", a, b);
        self.commit().await
    }

    pub async fn unlink_packs(&self, a: &PackId, b: &PackId) -> Result<()> {
        {
            let mut library = self.library.write().await;
            graph::unlink(&mut library, a, b);
        }
        self.commit().await
    }

    /// Detach one pack from its component, preserving sibling links
    pub async fn remove_from_collection(&self, id: &PackId) -> Result<()> {
        {
            let mut library = self.library.write().await;
            if !library.contains(id) {
                bail!("No such pack: {}", id);
            }
            graph::remove_member(&mut library, id);
        }
        self.commit().await
    }

    /// Clear links and custom collection fields on every member of the
    /// component containing `root`
    pub async fn disband_collection(&self, root: &PackId) -> Result<usize> {
        let cleared;
        {
            let mut library = self.library.write().await;
            let member_ids: Vec<PackId> = graph::resolve_component(&library, root)
                .iter()
                .map(|p| p.id.clone())
                .collect();
            if member_ids.is_empty() {
                bail!("No such pack: {}", root);
            }
            cleared = member_ids.len();
            graph::disband(&mut library, &member_ids);
        }
        info!("Disbanded collection of {} packs", cleared);
        self.commit().await?;
        Ok(cleared)
    }

    // ------------------------------------------------------------------
    // Favorites
    // ------------------------------------------------------------------

    pub async fn toggle_pack_favorite(&self, id: &PackId) -> Result<bool> {
        let state;
        {
            let mut library = self.library.write().await;
            let pack = library.get_mut(id).with_context(|| format!("No such pack: {}", id))?;
            pack.is_favorite = !pack.is_favorite;
            state = pack.is_favorite;
            pack.touch();
        }
        self.commit().await?;
        Ok(state)
    }

    /// Toggle favorite across a whole component: the folder state is the OR
    /// of its members, and toggling sets every member to the new state.
    pub async fn toggle_collection_favorite(&self, root: &PackId) -> Result<bool> {
        let state;
        {
            let mut library = self.library.write().await;
            let members = graph::resolve_component(&library, root);
            if members.is_empty() {
                bail!("No such pack: {}", root);
            }
            state = !members.iter().any(|p| p.is_favorite);
            for id in members.iter().map(|p| p.id.clone()).collect::<Vec<_>>() {
                if let Some(pack) = library.get_mut(&id) {
                    pack.is_favorite = state;
                    pack.touch();
                }
            }
        }
        self.commit().await?;
        Ok(state)
    }

    pub async fn toggle_item_favorite(&self, id: &PackId, index: usize) -> Result<bool> {
        let state;
        {
            let mut library = self.library.write().await;
            let pack = library.get_mut(id).with_context(|| format!("No such pack: {}", id))?;
            let item = pack
                .items
                .get_mut(index)
                .with_context(|| format!("No item {} in pack {}", index, id))?;
            item.is_favorite = !item.is_favorite;
            state = item.is_favorite;
            pack.touch();
        }
        self.commit().await?;
        Ok(state)
    }

    // ------------------------------------------------------------------
    // Covers
    // ------------------------------------------------------------------

    /// Set or clear the pack thumbnail override
    pub async fn set_pack_cover(&self, id: &PackId, path: Option<&str>) -> Result<()> {
        {
            let mut library = self.library.write().await;
            let pack = library.get_mut(id).with_context(|| format!("No such pack: {}", id))?;
            pack.thumbnail_path = path.unwrap_or_default().to_string();
            pack.touch();
        }
        self.commit().await
    }

    /// Set or clear the collection cover on every member of the component
    pub async fn set_collection_cover(&self, root: &PackId, path: Option<&str>) -> Result<()> {
        let value = path.unwrap_or_default().to_string();
        {
            let mut library = self.library.write().await;
            let member_ids: Vec<PackId> = graph::resolve_component(&library, root)
                .iter()
                .map(|p| p.id.clone())
                .collect();
            if member_ids.is_empty() {
                bail!("No such pack: {}", root);
            }
            for id in &member_ids {
                if let Some(pack) = library.get_mut(id) {
                    pack.custom_collection_cover = value.clone();
                    pack.touch();
                }
            }
        }
        self.commit().await
    }

    // ------------------------------------------------------------------
    // Removal / usage
    // ------------------------------------------------------------------

    /// Remove a pack: strips only its own edges from the link graph (never
    /// cascading to siblings), deletes the record, persists and reindexes.
    pub async fn remove_pack(&self, id: &PackId) -> Result<()> {
        {
            let mut library = self.library.write().await;
            if !library.contains(id) {
                bail!("No such pack: {}", id);
            }
            graph::remove_member(&mut library, id);
            library.remove(id);
        }
        info!("Removed pack {}", id);
        self.commit().await
    }

    /// Bump an item's usage counter and last-used timestamp
    pub async fn record_item_use(&self, id: &PackId, index: usize) -> Result<()> {
        {
            let mut library = self.library.write().await;
            let pack = library.get_mut(id).with_context(|| format!("No such pack: {}", id))?;
            let item = pack
                .items
                .get_mut(index)
                .with_context(|| format!("No item {} in pack {}", index, id))?;
            item.record_use();
        }
        self.commit().await
    }
}

/// Reject empty or system-reserved tags for free-text tag operations
fn validate_user_tag(tag: &str) -> Result<String> {
    let tag = tag.trim();
    if tag.is_empty() {
        bail!("Tag is empty");
    }
    if is_system_tag(tag) {
        bail!("'{}' is a reserved system tag", tag);
    }
    Ok(tag.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Paths;
    use crate::domain::{Item, Pack};
    use tempfile::TempDir;

    async fn controller_with(packs: Vec<Pack>) -> (LibraryController, TempDir) {
        let temp = TempDir::new().unwrap();
        let store = Store::new(&Paths::at(temp.path()));
        let mut library = Library::new();
        for p in packs {
            library.insert(p);
        }
        store.save_library(&library).await.unwrap();
        (LibraryController::load(store).await, temp)
    }

    fn pack(id: &str, items: usize) -> Pack {
        let items = (0..items).map(|i| Item::new(format!("f{}", i), None)).collect();
        Pack::new(PackId::from(id), id.to_uppercase(), items)
    }

    #[tokio::test]
    async fn test_mutations_persist() {
        let (ctl, _temp) = controller_with(vec![pack("a", 2)]).await;
        ctl.rename_pack(&PackId::from("a"), "Renamed").await.unwrap();

        // Reload from disk through a fresh controller
        let reloaded = LibraryController::load(ctl.store()).await;
        let lib = reloaded.library();
        let lib = lib.read().await;
        assert_eq!(lib.get(&PackId::from("a")).unwrap().name, "Renamed");
    }

    #[tokio::test]
    async fn test_tag_index_rebuild_drops_orphans() {
        let (ctl, _temp) = controller_with(vec![pack("a", 1), pack("b", 1)]).await;
        ctl.add_pack_tag(&PackId::from("a"), "cute").await.unwrap();
        assert!(ctl.tags().read().await.pack_tags.contains("cute"));

        ctl.remove_pack(&PackId::from("a")).await.unwrap();
        // Full rescan: the tag does not survive the removal
        assert!(!ctl.tags().read().await.pack_tags.contains("cute"));
    }

    #[tokio::test]
    async fn test_system_tags_rejected_for_user_tagging() {
        let (ctl, _temp) = controller_with(vec![pack("a", 1)]).await;
        assert!(ctl.add_pack_tag(&PackId::from("a"), "Animated").await.is_err());
        assert!(ctl.add_item_tag(&PackId::from("a"), 0, "NSFW").await.is_err());
        assert!(ctl.add_pack_tag(&PackId::from("a"), "  ").await.is_err());
    }

    #[tokio::test]
    async fn test_item_tags_excluded_from_autocomplete_when_system() {
        let (ctl, _temp) = controller_with(vec![pack("a", 1)]).await;
        ctl.add_item_tag(&PackId::from("a"), 0, "funny").await.unwrap();

        let tags = ctl.tags();
        let tags = tags.read().await;
        assert!(tags.item_tags.contains("funny"));
        // NSFW is seeded, classifier tags are not
        assert!(tags.item_tags.contains("NSFW"));
        assert!(!tags.item_tags.contains("Animated"));
    }

    #[tokio::test]
    async fn test_remove_pack_clears_partner_links() {
        let (ctl, _temp) = controller_with(vec![pack("a", 1), pack("b", 1)]).await;
        ctl.link_packs(&PackId::from("a"), &PackId::from("b")).await.unwrap();
        ctl.remove_pack(&PackId::from("a")).await.unwrap();

        let lib = ctl.library();
        let lib = lib.read().await;
        assert!(lib.get(&PackId::from("a")).is_none());
        assert!(lib.get(&PackId::from("b")).unwrap().linked_packs.is_empty());
    }

    #[tokio::test]
    async fn test_collection_favorite_toggles_all_members() {
        let (ctl, _temp) = controller_with(vec![pack("a", 1), pack("b", 1)]).await;
        ctl.link_packs(&PackId::from("a"), &PackId::from("b")).await.unwrap();

        let state = ctl.toggle_collection_favorite(&PackId::from("a")).await.unwrap();
        assert!(state);
        {
            let lib = ctl.library();
            let lib = lib.read().await;
            assert!(lib.get(&PackId::from("a")).unwrap().is_favorite);
            assert!(lib.get(&PackId::from("b")).unwrap().is_favorite);
        }

        let state = ctl.toggle_collection_favorite(&PackId::from("b")).await.unwrap();
        assert!(!state);
    }

    #[tokio::test]
    async fn test_record_item_use() {
        let (ctl, _temp) = controller_with(vec![pack("a", 1)]).await;
        ctl.record_item_use(&PackId::from("a"), 0).await.unwrap();
        ctl.record_item_use(&PackId::from("a"), 0).await.unwrap();

        let lib = ctl.library();
        let lib = lib.read().await;
        let item = &lib.get(&PackId::from("a")).unwrap().items[0];
        assert_eq!(item.usage_count, 2);
        assert!(item.last_used.is_some());
    }

    #[tokio::test]
    async fn test_rename_collection_propagates() {
        let (ctl, _temp) = controller_with(vec![pack("a", 1), pack("b", 1)]).await;
        ctl.link_packs(&PackId::from("a"), &PackId::from("b")).await.unwrap();
        ctl.rename_collection(&PackId::from("a"), "Shared Name").await.unwrap();

        let lib = ctl.library();
        let lib = lib.read().await;
        assert_eq!(lib.get(&PackId::from("a")).unwrap().custom_collection_name, "Shared Name");
        assert_eq!(lib.get(&PackId::from("b")).unwrap().custom_collection_name, "Shared Name");
    }
}
