//! Library controller: the write and read surface over the in-memory
//! library document.
//!
//! - `controller`: mutation operations (mutate → persist → reindex) and the
//!   derived tag autocomplete index
//! - `filters`: pure read operations (filter/sort/paginate) over a snapshot

pub mod controller;
pub mod filters;

pub use controller::{LibraryController, TagIndex};
pub use filters::{
    apply_filters, Entry, FileTypeFilter, FilterOptions, GalleryItem, GalleryScope, Page,
    SortKey, SortOrder, TagMatch, ViewMode,
};
