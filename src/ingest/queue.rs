//! Asynchronous download queue.
//!
//! All ingestion funnels through one FIFO queue drained by a single worker
//! task. Within a pack, item downloads fan out over a bounded pool; packs
//! themselves are strictly sequential, so the library only ever grows one
//! pack at a time and progress reporting stays simple.
//!
//! Duplicate suppression happens at enqueue time: a pack identifier is
//! reserved the moment its task is accepted and released when the task
//! finishes, so two rapid submissions of the same reference can never
//! produce two downloads.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use rand::Rng;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex, RwLock, Semaphore};
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::adapters::{normalize_pack_ref, PackSource};
use crate::assets::{classify_and_store, AssetClass, StoredAsset};
use crate::config::{find_item_file, Paths};
use crate::domain::{push_tag, Item, Pack, PackId};
use crate::domain::Library;
use crate::library::TagIndex;
use crate::store::Store;

/// Concurrent item downloads per pack
const MAX_CONCURRENT_DOWNLOADS: usize = 8;

/// Errors surfaced synchronously at enqueue time
#[derive(Debug, Error)]
pub enum QueueError {
    /// Rejected before any task is queued; no network call is made
    #[error("no bot token configured")]
    MissingToken,

    #[error("empty pack reference")]
    EmptyReference,

    #[error("pack not in library: {0}")]
    UnknownPack(PackId),
}

/// Outcome of an enqueue call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueued {
    /// Queued as a new-pack download
    New,
    /// Queued as a re-download of an existing pack
    Update,
    /// The reference is already in the library; queued as an update instead
    Coalesced,
    /// A task for this pack is already queued or running
    AlreadyQueued,
}

/// Progress events emitted by the worker
#[derive(Debug, Clone)]
pub enum QueueNotice {
    /// Pack metadata landed in the library; items are still downloading
    PackAdded(PackId),
    /// One more item attempt finished (success or skip)
    Progress {
        id: PackId,
        completed: usize,
        total: usize,
    },
    /// All item downloads for the pack are done and the record is persisted
    PackReady(PackId),
    /// The whole task failed; nothing further will happen for this reference
    PackFailed { id: PackId, error: String },
    /// The queue drained
    Idle,
}

#[derive(Debug, Clone)]
enum Task {
    NewPack(PackId),
    Update(PackId),
}

impl Task {
    fn id(&self) -> &PackId {
        match self {
            Task::NewPack(id) | Task::Update(id) => id,
        }
    }
}

#[derive(Default)]
struct QueueState {
    tasks: VecDeque<Task>,
    /// Reserved identifiers: queued or currently downloading
    pending: HashSet<PackId>,
    /// Whether a worker task is alive
    running: bool,
}

/// Handle to the download queue. Cheap to clone; all clones share state.
#[derive(Clone)]
pub struct DownloadQueue {
    source: Arc<dyn PackSource>,
    library: Arc<RwLock<Library>>,
    tags: Arc<RwLock<TagIndex>>,
    store: Store,
    paths: Paths,
    state: Arc<Mutex<QueueState>>,
    notices: mpsc::UnboundedSender<QueueNotice>,
}

impl DownloadQueue {
    /// Create a queue and the receiver for its progress notices
    pub fn new(
        source: Arc<dyn PackSource>,
        library: Arc<RwLock<Library>>,
        tags: Arc<RwLock<TagIndex>>,
        store: Store,
        paths: Paths,
    ) -> (Self, mpsc::UnboundedReceiver<QueueNotice>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let queue = Self {
            source,
            library,
            tags,
            store,
            paths,
            state: Arc::new(Mutex::new(QueueState::default())),
            notices: tx,
        };
        (queue, rx)
    }

    fn notify(&self, notice: QueueNotice) {
        // Receiver may be gone (fire-and-forget callers); that is fine
        let _ = self.notices.send(notice);
    }

    /// Queue a pack by name or pasted share URL. If the pack is already in
    /// the library the task is coalesced into an update.
    pub async fn enqueue_new(&self, reference: &str) -> Result<Enqueued, QueueError> {
        if !self.source.is_configured() {
            return Err(QueueError::MissingToken);
        }
        let name = normalize_pack_ref(reference);
        if name.is_empty() {
            return Err(QueueError::EmptyReference);
        }
        let id = PackId::new(name);

        let mut state = self.state.lock().await;
        if state.pending.contains(&id) {
            return Ok(Enqueued::AlreadyQueued);
        }

        let (task, outcome) = if self.library.read().await.contains(&id) {
            (Task::Update(id.clone()), Enqueued::Coalesced)
        } else {
            (Task::NewPack(id.clone()), Enqueued::New)
        };

        state.pending.insert(id);
        state.tasks.push_back(task);
        self.ensure_worker(&mut state);
        Ok(outcome)
    }

    /// Queue a re-download of a pack already in the library
    pub async fn enqueue_update(&self, id: &PackId) -> Result<Enqueued, QueueError> {
        if !self.source.is_configured() {
            return Err(QueueError::MissingToken);
        }
        if !self.library.read().await.contains(id) {
            return Err(QueueError::UnknownPack(id.clone()));
        }

        let mut state = self.state.lock().await;
        if state.pending.contains(id) {
            return Ok(Enqueued::AlreadyQueued);
        }
        state.pending.insert(id.clone());
        state.tasks.push_back(Task::Update(id.clone()));
        self.ensure_worker(&mut state);
        Ok(Enqueued::Update)
    }

    /// Number of queued or running tasks
    pub async fn pending_count(&self) -> usize {
        self.state.lock().await.pending.len()
    }

    /// Spawn the worker if none is alive. Called with the state lock held.
    fn ensure_worker(&self, state: &mut QueueState) {
        if !state.running {
            state.running = true;
            let queue = self.clone();
            tokio::spawn(queue.worker());
        }
    }

    /// Drain the queue in FIFO order, then announce idle and exit
    async fn worker(self) {
        loop {
            let task = {
                let mut state = self.state.lock().await;
                match state.tasks.pop_front() {
                    Some(task) => task,
                    None => {
                        state.running = false;
                        break;
                    }
                }
            };

            let id = task.id().clone();
            let result = match &task {
                Task::NewPack(id) => self.process_new(id).await,
                Task::Update(id) => self.process_update(id).await,
            };
            if let Err(e) = result {
                warn!("Download of {} failed: {:#}", id, e);
                self.notify(QueueNotice::PackFailed {
                    id: id.clone(),
                    error: format!("{:#}", e),
                });
            }

            // Release the reservation whether the task succeeded or not
            self.state.lock().await.pending.remove(&id);
        }
        self.notify(QueueNotice::Idle);
    }

    /// Fetch metadata, insert the pack shell, then download its items
    async fn process_new(&self, id: &PackId) -> anyhow::Result<()> {
        let remote = self.source.fetch_pack(id.as_str()).await?;
        let id = PackId::new(remote.name.clone());

        // The pack may have landed since the task was queued
        if self.library.read().await.contains(&id) {
            return self.process_update(&id).await;
        }

        let items: Vec<Item> = remote
            .stickers
            .iter()
            .map(|s| Item::new(s.file_id.clone(), s.emoji.clone()))
            .collect();
        let count = items.len();
        let pack = Pack::new(id.clone(), remote.title, items);

        {
            let mut library = self.library.write().await;
            library.insert(pack);
            self.store.save_library(&library).await?;
        }
        info!("Added pack {} ({} items)", id, count);
        self.notify(QueueNotice::PackAdded(id.clone()));

        self.download_items(&id).await
    }

    /// Re-fetch metadata and re-download, carrying per-item user data over
    /// by remote file reference.
    async fn process_update(&self, id: &PackId) -> anyhow::Result<()> {
        let remote = self.source.fetch_pack(id.as_str()).await?;

        {
            let mut library = self.library.write().await;
            let Some(pack) = library.get_mut(id) else {
                anyhow::bail!("pack {} disappeared before update", id);
            };

            let mut old = std::mem::take(&mut pack.items);
            pack.items = remote
                .stickers
                .iter()
                .map(|s| match old.iter().position(|i| i.file_id == s.file_id) {
                    Some(pos) => old.remove(pos),
                    None => Item::new(s.file_id.clone(), s.emoji.clone()),
                })
                .collect();
            pack.downloaded = false;
            pack.touch();
            self.store.save_library(&library).await?;
        }
        info!("Updating pack {} ({} items)", id, remote.stickers.len());

        self.download_items(id).await
    }

    /// Download every item of the pack over a bounded pool, merge the
    /// classifier tags, and mark the pack downloaded. Individual item
    /// failures are logged and skipped.
    async fn download_items(&self, id: &PackId) -> anyhow::Result<()> {
        let file_ids: Vec<String> = {
            let library = self.library.read().await;
            match library.get(id) {
                Some(pack) => pack.items.iter().map(|i| i.file_id.clone()).collect(),
                None => anyhow::bail!("pack {} disappeared before download", id),
            }
        };
        let total = file_ids.len();
        let dest = self.paths.pack_dir(id);

        let semaphore = Arc::new(Semaphore::new(MAX_CONCURRENT_DOWNLOADS));
        let mut tasks: JoinSet<(usize, Result<StoredAsset, String>)> = JoinSet::new();

        for (index, file_id) in file_ids.into_iter().enumerate() {
            let semaphore = semaphore.clone();
            let source = self.source.clone();
            let dest = dest.clone();
            tasks.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(e) => return (index, Err(e.to_string())),
                };
                let result = match source.fetch_item_bytes(&file_id).await {
                    Ok((bytes, remote_path)) => tokio::task::spawn_blocking(move || {
                        classify_and_store(&bytes, &remote_path, &dest, index)
                    })
                    .await
                    .map_err(|e| e.to_string())
                    .and_then(|stored| stored.map_err(|e| e.to_string())),
                    Err(e) => Err(e.to_string()),
                };
                (index, result)
            });
        }

        let mut stored: Vec<(usize, AssetClass)> = Vec::new();
        let mut completed = 0;
        while let Some(joined) = tasks.join_next().await {
            completed += 1;
            match joined {
                Ok((index, Ok(asset))) => stored.push((index, asset.class)),
                Ok((index, Err(e))) => {
                    warn!("Item {} of {} failed: {}; skipping", index, id, e);
                }
                Err(e) => warn!("Item task for {} panicked: {}", id, e),
            }
            self.notify(QueueNotice::Progress {
                id: id.clone(),
                completed,
                total,
            });
        }

        {
            let mut library = self.library.write().await;
            let Some(pack) = library.get_mut(id) else {
                anyhow::bail!("pack {} disappeared during download", id);
            };

            for (index, class) in &stored {
                if let Some(item) = pack.items.get_mut(*index) {
                    push_tag(&mut item.tags, class.tag());
                }
            }
            pack.downloaded = true;
            if pack.thumbnail_path.is_empty() && !pack.items.is_empty() {
                let pick = rand::thread_rng().gen_range(0..pack.items.len());
                let thumb = find_item_file(&dest, pick)
                    .or_else(|| (0..pack.items.len()).find_map(|i| find_item_file(&dest, i)));
                if let Some(path) = thumb {
                    pack.thumbnail_path = path.display().to_string();
                }
            }
            pack.touch();

            self.store.save_library(&library).await?;
            *self.tags.write().await = TagIndex::rebuild(&library);
        }

        info!("Pack {} ready ({}/{} items stored)", id, stored.len(), total);
        self.notify(QueueNotice::PackReady(id.clone()));
        Ok(())
    }
}
