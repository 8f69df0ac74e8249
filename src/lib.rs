//! packstash - sticker pack library manager
//!
//! Downloads sticker packs from the Telegram Bot API into a local library,
//! normalizes their media, and manages them as a browsable, taggable
//! collection graph.
//!
//! # Architecture
//!
//! - One in-memory library document is the source of truth; every mutation
//!   persists the whole document atomically and rebuilds derived indices
//! - Ingestion goes through a FIFO download queue with per-pack fan-out
//! - Collections are symmetric links between packs, resolved on the fly as
//!   connected components; no collection entity is stored
//!
//! # Modules
//!
//! - `adapters`: remote pack API (Telegram) behind the `PackSource` trait
//! - `assets`: media classification and conversion
//! - `config`: filesystem layout
//! - `domain`: pack, item, library and settings records
//! - `graph`: link-graph operations and virtual folders
//! - `ingest`: the asynchronous download queue
//! - `library`: write-side controller and read-side view logic
//! - `store`: atomic JSON persistence
//! - `cli`: command-line interface
//!
//! # Usage
//!
//! ```bash
//! packstash set-token <BOT_TOKEN>
//! packstash add t.me/addstickers/SomePack
//! packstash list --tag cute
//! packstash link SomePack OtherPack
//! ```

pub mod adapters;
pub mod assets;
pub mod cli;
pub mod config;
pub mod domain;
pub mod graph;
pub mod ingest;
pub mod library;
pub mod store;

// Re-export main types at crate root for convenience
pub use adapters::{PackSource, TelegramClient};
pub use domain::{Item, Library, Pack, PackId, Settings};
pub use ingest::{DownloadQueue, QueueNotice};
pub use library::{FilterOptions, LibraryController, Page, ViewMode};
pub use store::Store;
