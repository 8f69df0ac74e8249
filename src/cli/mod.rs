//! Command-line interface for packstash.
//!
//! Provides commands for downloading packs, browsing and searching the
//! library, managing collections, tags and favorites, and configuration.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use crate::adapters::{PackSource, TelegramClient};
use crate::config::Paths;
use crate::domain::PackId;
use crate::ingest::{DownloadQueue, QueueNotice};
use crate::library::{
    Entry, FileTypeFilter, FilterOptions, GalleryScope, LibraryController, SortKey, SortOrder,
    TagMatch, ViewMode,
};
use crate::store::Store;

/// packstash - sticker pack library manager
#[derive(Parser, Debug)]
#[command(name = "packstash")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download one or more packs by name or share URL
    Add {
        /// Pack names or t.me/addstickers/... URLs
        references: Vec<String>,
    },

    /// Re-download a pack, or check every pack against the remote
    Update {
        /// Pack identifier
        id: Option<String>,

        /// Update every pack whose remote item count changed
        #[arg(long)]
        all: bool,
    },

    /// List packs and collections
    List {
        /// Case-insensitive name search
        #[arg(short, long, default_value = "")]
        query: String,

        /// Require these tags (repeatable)
        #[arg(short, long)]
        tag: Vec<String>,

        /// Exclude these tags (repeatable)
        #[arg(short = 'x', long)]
        exclude_tag: Vec<String>,

        /// Match any required tag instead of all
        #[arg(long)]
        any_tag: bool,

        /// Favorites only (on by default when saved in settings)
        #[arg(short, long)]
        favorites: bool,

        /// Include sensitive-tagged packs (on by default when enabled in
        /// settings)
        #[arg(long)]
        nsfw: bool,

        /// Sort key; defaults to the one saved in settings
        #[arg(short, long, value_enum)]
        sort: Option<SortArg>,

        /// Sort ascending instead of descending
        #[arg(long)]
        ascending: bool,

        #[arg(short, long, default_value = "1")]
        page: usize,

        #[arg(long, default_value = "50")]
        page_size: usize,
    },

    /// Browse items across the library or one pack/collection
    Gallery {
        /// Limit to one pack (or its collection with --collection)
        id: Option<String>,

        /// Treat the pack as a collection root
        #[arg(short, long)]
        collection: bool,

        /// Search item names and tags
        #[arg(short, long, default_value = "")]
        query: String,

        #[arg(short, long)]
        tag: Vec<String>,

        #[arg(short, long)]
        favorites: bool,

        #[arg(long)]
        nsfw: bool,

        /// Filter by stored format
        #[arg(long, value_enum, default_value = "all")]
        file_type: FileTypeArg,

        /// Sort key; defaults to the one saved in settings
        #[arg(short, long, value_enum)]
        sort: Option<SortArg>,

        /// Sort ascending instead of descending
        #[arg(long)]
        ascending: bool,

        #[arg(short, long, default_value = "1")]
        page: usize,

        #[arg(long, default_value = "50")]
        page_size: usize,
    },

    /// Search packs and collections by name
    Search {
        query: String,
    },

    /// Show details of one pack
    Show {
        id: String,
    },

    /// Link two packs into a collection
    Link {
        a: String,
        b: String,
    },

    /// Remove the link between two packs
    Unlink {
        a: String,
        b: String,
    },

    /// Dissolve the collection containing a pack
    Disband {
        id: String,
    },

    /// Remove a pack from the library (stored files are kept)
    Remove {
        id: String,
    },

    /// Toggle favorite on a pack, item or collection
    Fav {
        id: String,

        /// Item index within the pack
        #[arg(short, long)]
        item: Option<usize>,

        /// Toggle the whole collection
        #[arg(short, long)]
        collection: bool,
    },

    /// Add or remove a tag on a pack, item or collection
    Tag {
        id: String,
        tag: String,

        /// Item index within the pack
        #[arg(short, long)]
        item: Option<usize>,

        /// Apply to the collection instead of the pack
        #[arg(short, long)]
        collection: bool,

        /// Remove instead of add
        #[arg(short, long)]
        remove: bool,
    },

    /// Rename a pack, item or collection
    Rename {
        id: String,
        name: String,

        /// Item index within the pack
        #[arg(short, long)]
        item: Option<usize>,

        /// Rename the collection instead of the pack
        #[arg(short, long)]
        collection: bool,
    },

    /// Set or clear a cover image on a pack or collection
    Cover {
        id: String,

        /// Path to the cover image; omit with --clear
        path: Option<String>,

        /// Apply to the collection instead of the pack
        #[arg(short, long)]
        collection: bool,

        /// Treat the identifier as a view name and store the override in
        /// settings (e.g. `collection_<name>`)
        #[arg(long)]
        view: bool,

        /// Clear the override
        #[arg(long)]
        clear: bool,
    },

    /// Toggle the sensitive-content marker on a pack
    Nsfw {
        id: String,
    },

    /// Detach a pack from its collection, keeping sibling links intact
    Detach {
        id: String,
    },

    /// Record a use of an item (bumps usage counters)
    Use {
        id: String,
        index: usize,
    },

    /// Store the bot API token
    SetToken {
        token: String,
    },

    /// Show resolved configuration
    Config,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SortArg {
    Recency,
    Alpha,
    Count,
    Usage,
    Random,
}

impl From<SortArg> for SortKey {
    fn from(s: SortArg) -> Self {
        match s {
            SortArg::Recency => SortKey::Recency,
            SortArg::Alpha => SortKey::Alphabetical,
            SortArg::Count => SortKey::ItemCount,
            SortArg::Usage => SortKey::Usage,
            SortArg::Random => SortKey::Random,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum FileTypeArg {
    All,
    Animated,
    Static,
    Video,
}

impl From<FileTypeArg> for FileTypeFilter {
    fn from(f: FileTypeArg) -> Self {
        match f {
            FileTypeArg::All => FileTypeFilter::All,
            FileTypeArg::Animated => FileTypeFilter::Animated,
            FileTypeArg::Static => FileTypeFilter::Static,
            FileTypeArg::Video => FileTypeFilter::Video,
        }
    }
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        let paths = Paths::resolve()?;
        paths.init_dirs()?;
        let store = Store::new(&paths);

        match self.command {
            Commands::Add { references } => add_packs(paths, store, references).await,
            Commands::Update { id, all } => update_packs(paths, store, id, all).await,
            Commands::List {
                query,
                tag,
                exclude_tag,
                any_tag,
                favorites,
                nsfw,
                sort,
                ascending,
                page,
                page_size,
            } => {
                let settings = store.load_settings().await;
                let opts = FilterOptions {
                    query,
                    include_tags: tag,
                    exclude_tags: exclude_tag,
                    tag_match: if any_tag { TagMatch::Any } else { TagMatch::All },
                    favorites_only: favorites || settings.show_favorites_only,
                    nsfw_enabled: nsfw || settings.nsfw_enabled,
                    sort_by: sort
                        .map(SortKey::from)
                        .unwrap_or_else(|| sort_key_from_name(&settings.sort_by)),
                    order: if ascending {
                        SortOrder::Ascending
                    } else {
                        SortOrder::Descending
                    },
                    page,
                    page_size,
                    ..Default::default()
                };
                list_library(store, opts).await
            }
            Commands::Gallery {
                id,
                collection,
                query,
                tag,
                favorites,
                nsfw,
                file_type,
                sort,
                ascending,
                page,
                page_size,
            } => {
                let scope = match id {
                    Some(id) if collection => GalleryScope::Collection(PackId::new(id)),
                    Some(id) => GalleryScope::Pack(PackId::new(id)),
                    None => GalleryScope::All,
                };
                let settings = store.load_settings().await;
                let opts = FilterOptions {
                    query,
                    include_tags: tag,
                    favorites_only: favorites || settings.show_favorites_only,
                    nsfw_enabled: nsfw || settings.nsfw_enabled,
                    file_type: file_type.into(),
                    sort_by: sort
                        .map(SortKey::from)
                        .unwrap_or_else(|| sort_key_from_name(&settings.sort_by)),
                    order: if ascending {
                        SortOrder::Ascending
                    } else {
                        SortOrder::Descending
                    },
                    page,
                    page_size,
                    ..Default::default()
                };
                show_gallery(store, scope, opts).await
            }
            Commands::Search { query } => {
                let settings = store.load_settings().await;
                let opts = FilterOptions {
                    query,
                    favorites_only: settings.show_favorites_only,
                    nsfw_enabled: settings.nsfw_enabled,
                    sort_by: sort_key_from_name(&settings.sort_by),
                    ..Default::default()
                };
                list_library(store, opts).await
            }
            Commands::Show { id } => show_pack(store, &PackId::new(id)).await,
            Commands::Link { a, b } => {
                let controller = LibraryController::load(store).await;
                controller
                    .link_packs(&PackId::new(a.clone()), &PackId::new(b.clone()))
                    .await?;
                println!("Linked {} <-> {}", a, b);
                Ok(())
            }
            Commands::Unlink { a, b } => {
                let controller = LibraryController::load(store).await;
                controller
                    .unlink_packs(&PackId::new(a.clone()), &PackId::new(b.clone()))
                    .await?;
                println!("Unlinked {} and {}", a, b);
                Ok(())
            }
            Commands::Disband { id } => {
                let controller = LibraryController::load(store).await;
                let count = controller.disband_collection(&PackId::new(id)).await?;
                println!("Disbanded collection of {} packs", count);
                Ok(())
            }
            Commands::Remove { id } => {
                let controller = LibraryController::load(store).await;
                controller.remove_pack(&PackId::new(id.clone())).await?;
                println!("Removed {} (stored files kept on disk)", id);
                Ok(())
            }
            Commands::Fav {
                id,
                item,
                collection,
            } => toggle_favorite(store, &PackId::new(id), item, collection).await,
            Commands::Tag {
                id,
                tag,
                item,
                collection,
                remove,
            } => apply_tag(store, &PackId::new(id), &tag, item, collection, remove).await,
            Commands::Rename {
                id,
                name,
                item,
                collection,
            } => rename(store, &PackId::new(id), &name, item, collection).await,
            Commands::Cover {
                id,
                path,
                collection,
                view,
                clear,
            } => {
                let value = if clear { None } else { path.as_deref() };
                if value.is_none() && !clear {
                    anyhow::bail!("Pass a cover path or --clear");
                }
                if view {
                    let mut settings = store.load_settings().await;
                    settings.set_view_cover(id, value);
                    store.save_settings(&settings).await?;
                } else {
                    let controller = LibraryController::load(store).await;
                    let id = PackId::new(id);
                    if collection {
                        controller.set_collection_cover(&id, value).await?;
                    } else {
                        controller.set_pack_cover(&id, value).await?;
                    }
                }
                println!("Cover {}", if clear { "cleared" } else { "set" });
                Ok(())
            }
            Commands::Nsfw { id } => {
                let controller = LibraryController::load(store).await;
                let state = controller.toggle_pack_sensitive(&PackId::new(id)).await?;
                println!("Sensitive: {}", state);
                Ok(())
            }
            Commands::Detach { id } => {
                let controller = LibraryController::load(store).await;
                controller.remove_from_collection(&PackId::new(id.clone())).await?;
                println!("Detached {}", id);
                Ok(())
            }
            Commands::Use { id, index } => {
                let controller = LibraryController::load(store).await;
                controller.record_item_use(&PackId::new(id), index).await?;
                Ok(())
            }
            Commands::SetToken { token } => set_token(store, token).await,
            Commands::Config => show_config(paths, store).await,
        }
    }
}

/// Map the sort name persisted in settings to a sort key; unknown names
/// fall back to recency.
fn sort_key_from_name(name: &str) -> SortKey {
    match name.to_ascii_lowercase().as_str() {
        "alpha" | "alphabetical" | "name" => SortKey::Alphabetical,
        "count" | "items" => SortKey::ItemCount,
        "usage" => SortKey::Usage,
        "random" => SortKey::Random,
        _ => SortKey::Recency,
    }
}

/// Build the remote client from the stored token
async fn remote_client(store: &Store) -> TelegramClient {
    let settings = store.load_settings().await;
    TelegramClient::new(settings.token)
}

/// Queue downloads and report progress until the queue drains
async fn add_packs(paths: Paths, store: Store, references: Vec<String>) -> Result<()> {
    if references.is_empty() {
        anyhow::bail!("No pack references given");
    }

    let client = Arc::new(remote_client(&store).await);
    let controller = LibraryController::load(store.clone()).await;
    let (queue, mut notices) = DownloadQueue::new(
        client,
        controller.library(),
        controller.tags(),
        store,
        paths,
    );

    for reference in &references {
        let outcome = queue
            .enqueue_new(reference)
            .await
            .with_context(|| format!("Failed to queue {}", reference))?;
        eprintln!("Queued {} ({:?})", reference, outcome);
    }

    report_progress(&mut notices).await;
    Ok(())
}

/// Re-download one pack, or with --all every pack whose remote item count
/// no longer matches the stored one.
async fn update_packs(paths: Paths, store: Store, id: Option<String>, all: bool) -> Result<()> {
    let client = Arc::new(remote_client(&store).await);
    let controller = LibraryController::load(store.clone()).await;
    let (queue, mut notices) = DownloadQueue::new(
        client.clone(),
        controller.library(),
        controller.tags(),
        store,
        paths,
    );

    if all {
        let local: Vec<(PackId, usize)> = {
            let library = controller.library();
            let library = library.read().await;
            library
                .packs
                .iter()
                .map(|p| (p.id.clone(), p.item_count()))
                .collect()
        };

        let mut queued = 0;
        for (id, count) in local {
            match client.fetch_pack(id.as_str()).await {
                Ok(remote) if remote.stickers.len() != count => {
                    eprintln!(
                        "{}: {} -> {} items, updating",
                        id,
                        count,
                        remote.stickers.len()
                    );
                    queue.enqueue_update(&id).await?;
                    queued += 1;
                }
                Ok(_) => {}
                Err(e) => eprintln!("{}: check failed ({})", id, e),
            }
        }
        if queued == 0 {
            println!("All packs are up to date");
            return Ok(());
        }
    } else {
        let id = id.context("Pass a pack identifier or --all")?;
        queue.enqueue_update(&PackId::new(id)).await?;
    }

    report_progress(&mut notices).await;
    Ok(())
}

/// Print queue notices until idle
async fn report_progress(notices: &mut tokio::sync::mpsc::UnboundedReceiver<QueueNotice>) {
    while let Some(notice) = notices.recv().await {
        match notice {
            QueueNotice::PackAdded(id) => eprintln!("Added {}", id),
            QueueNotice::Progress {
                id,
                completed,
                total,
            } => eprintln!("  {} {}/{}", id, completed, total),
            QueueNotice::PackReady(id) => println!("{} ready", id),
            QueueNotice::PackFailed { id, error } => eprintln!("{} failed: {}", id, error),
            QueueNotice::Idle => break,
        }
    }
}

/// Render a library view as a table
async fn list_library(store: Store, opts: FilterOptions) -> Result<()> {
    let controller = LibraryController::load(store).await;
    let page = controller.view(&ViewMode::Library, &opts).await;

    if page.entries.is_empty() {
        println!("No matching packs. Use 'packstash add <name>' to download one.");
        return Ok(());
    }

    println!("{:<12} {:<28} {:<32} {:>6}", "KIND", "ID", "NAME", "ITEMS");
    println!("{}", "-".repeat(82));
    for entry in &page.entries {
        match entry {
            Entry::Pack(p) => {
                let fav = if p.is_favorite { "*" } else { "" };
                println!(
                    "{:<12} {:<28} {:<32} {:>6}",
                    "pack",
                    p.id.as_str(),
                    truncate(&format!("{}{}", p.name, fav), 32),
                    p.item_count()
                );
            }
            Entry::Folder(f) => {
                let fav = if f.is_favorite { "*" } else { "" };
                println!(
                    "{:<12} {:<28} {:<32} {:>6}",
                    "collection",
                    format!("({} packs)", f.pack_count),
                    truncate(&format!("{}{}", f.name, fav), 32),
                    f.count
                );
            }
            Entry::Item(_) => {}
        }
    }
    println!("\nPage {}/{} ({} total)", page.page, page.pages, page.total);
    Ok(())
}

/// Render a gallery view
async fn show_gallery(store: Store, scope: GalleryScope, opts: FilterOptions) -> Result<()> {
    let controller = LibraryController::load(store).await;
    let page = controller.view(&ViewMode::Gallery(scope), &opts).await;

    if page.entries.is_empty() {
        println!("No matching items");
        return Ok(());
    }

    println!("{:<28} {:>5} {:<24} {:<24}", "PACK", "IDX", "NAME", "TAGS");
    println!("{}", "-".repeat(84));
    for entry in &page.entries {
        if let Entry::Item(g) = entry {
            let name = g.item.custom_name.as_deref().unwrap_or("");
            println!(
                "{:<28} {:>5} {:<24} {:<24}",
                g.pack_id.as_str(),
                g.index,
                truncate(name, 24),
                truncate(&g.item.tags.join(","), 24)
            );
        }
    }
    println!("\nPage {}/{} ({} total)", page.page, page.pages, page.total);
    Ok(())
}

/// Show details of one pack
async fn show_pack(store: Store, id: &PackId) -> Result<()> {
    let controller = LibraryController::load(store).await;
    let library = controller.library();
    let library = library.read().await;
    let pack = library
        .get(id)
        .with_context(|| format!("No such pack: {}", id))?;

    println!("Name: {}", pack.name);
    println!("ID: {}", pack.id);
    println!("URL: {}", pack.url);
    println!("Items: {}", pack.item_count());
    println!("Downloaded: {}", pack.downloaded);
    println!("Favorite: {}", pack.is_favorite);
    if !pack.tags.is_empty() {
        println!("Tags: {}", pack.tags.join(", "));
    }
    println!("Added: {}", pack.added);
    println!("Updated: {}", pack.updated);
    if !pack.linked_packs.is_empty() {
        let linked: Vec<&str> = pack.linked_packs.iter().map(|p| p.as_str()).collect();
        println!("Linked: {}", linked.join(", "));
        if !pack.custom_collection_name.is_empty() {
            println!("Collection: {}", pack.custom_collection_name);
        }
    }
    Ok(())
}

async fn toggle_favorite(
    store: Store,
    id: &PackId,
    item: Option<usize>,
    collection: bool,
) -> Result<()> {
    let controller = LibraryController::load(store).await;
    let state = match item {
        Some(index) => controller.toggle_item_favorite(id, index).await?,
        None if collection => controller.toggle_collection_favorite(id).await?,
        None => controller.toggle_pack_favorite(id).await?,
    };
    println!("Favorite: {}", state);
    Ok(())
}

async fn apply_tag(
    store: Store,
    id: &PackId,
    tag: &str,
    item: Option<usize>,
    collection: bool,
    remove: bool,
) -> Result<()> {
    let controller = LibraryController::load(store).await;
    match (item, collection, remove) {
        (Some(index), _, false) => controller.add_item_tag(id, index, tag).await?,
        (Some(index), _, true) => controller.remove_item_tag(id, index, tag).await?,
        (None, true, false) => controller.add_collection_tag(id, tag).await?,
        (None, true, true) => controller.remove_collection_tag(id, tag).await?,
        (None, false, false) => controller.add_pack_tag(id, tag).await?,
        (None, false, true) => controller.remove_pack_tag(id, tag).await?,
    }
    println!("{} '{}'", if remove { "Removed" } else { "Added" }, tag);
    Ok(())
}

async fn rename(
    store: Store,
    id: &PackId,
    name: &str,
    item: Option<usize>,
    collection: bool,
) -> Result<()> {
    let controller = LibraryController::load(store).await;
    match item {
        Some(index) => controller.rename_item(id, index, Some(name)).await?,
        None if collection => controller.rename_collection(id, name).await?,
        None => controller.rename_pack(id, name).await?,
    }
    println!("Renamed to '{}'", name);
    Ok(())
}

/// Store the bot API token in the settings document
async fn set_token(store: Store, token: String) -> Result<()> {
    let mut settings = store.load_settings().await;
    settings.token = token.trim().to_string();
    store.save_settings(&settings).await?;
    println!("Token saved");
    Ok(())
}

/// Show resolved paths and settings
async fn show_config(paths: Paths, store: Store) -> Result<()> {
    let settings = store.load_settings().await;

    println!("Home: {}", paths.home.display());
    println!("Library: {}", paths.library_file().display());
    println!("Settings: {}", paths.settings_file().display());
    println!("Packs: {}", paths.packs_dir().display());
    println!();
    println!(
        "Token: {}",
        if settings.has_token() {
            "configured"
        } else {
            "(not set)"
        }
    );
    println!("Theme: {}", settings.theme_name);
    println!("NSFW enabled: {}", settings.nsfw_enabled);
    println!("Favorites only: {}", settings.show_favorites_only);
    println!("Sort: {}", settings.sort_by);
    if !settings.custom_covers.is_empty() {
        println!("View covers:");
        for (view, path) in &settings.custom_covers {
            println!("  {}: {}", view, path);
        }
    }
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let cut: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    } else {
        s.to_string()
    }
}
