//! Collaborators the engine orchestrates.
//!
//! Every collaborator is a blocking trait object; the engine only ever calls
//! the slow ones from background work. Default implementations live in
//! `crate::local`.

use std::sync::Arc;
use tokio::sync::mpsc::{UnboundedSender, WeakUnboundedSender};

use crate::controller::Message;
use crate::error::Result;
use crate::generation::Generation;
use crate::icons::IconKey;
use crate::model::{FolderDescriptor, IconImage, ItemAttributes, ListItem, ViewSettings};
use crate::reconcile::{ChangeEvent, ChangeType, WatchFailure};
use crate::search::SearchQuery;

/// Turns typed paths into locations.
#[cfg_attr(test, mockall::automock)]
pub trait FolderResolver: Send + Sync {
    /// Fails with `NotFound`, `AccessDenied` or `InvalidPath`. A file target
    /// resolves to `FolderDescriptor::LocalFile`.
    fn resolve(&self, path: &str) -> Result<FolderDescriptor>;

    fn exists(&self, path: &str) -> bool;
}

/// Result of listing a folder.
#[derive(Debug, Clone, Default)]
pub struct Enumeration {
    pub items: Vec<ListItem>,
    /// Full path of the item matching the selection hint, if listed.
    pub selected: Option<String>,
}

pub trait Enumerator: Send + Sync {
    /// List `folder`. Implementations check `generation` while scanning and
    /// return `Err(Cancelled)` once it is no longer current.
    fn enumerate(
        &self,
        folder: &FolderDescriptor,
        selection_hint: Option<&str>,
        generation: &Generation,
    ) -> Result<Enumeration>;

    /// Fresh entry for a single path, `None` if it does not exist.
    fn probe(&self, full_path: &str) -> Result<Option<ListItem>>;

    fn load_attributes(&self, item: &ListItem) -> Result<ItemAttributes>;
}

/// Keeps a watch alive; dropping it stops delivery.
pub trait WatchSubscription: Send {}

impl<T: Send> WatchSubscription for T {}

pub trait ChangeWatcher: Send + Sync {
    fn watch(&self, path: &str, sink: ChangeSink) -> Result<Box<dyn WatchSubscription>>;
}

pub trait ViewSettingsStore: Send + Sync {
    fn get(&self, path: &str) -> Result<Option<ViewSettings>>;
    fn save(&self, path: &str, settings: &ViewSettings) -> Result<()>;
}

/// External fast-search service. Submission is fire-and-forget; the reply
/// arrives later through `replies`, tagged with `query.id`.
pub trait SearchService: Send + Sync {
    fn is_available(&self) -> bool;
    fn search(&self, query: SearchQuery, replies: SearchReplySink) -> Result<()>;
}

#[cfg_attr(test, mockall::automock)]
pub trait IconProvider: Send + Sync {
    fn small_icon(&self, key: &IconKey) -> Result<IconImage>;
    fn large_icon(&self, key: &IconKey) -> Result<IconImage>;
    fn thumbnail(&self, path: &str, size: u32) -> Result<IconImage>;
}

/// The full set of collaborators.
#[derive(Clone)]
pub struct Services {
    pub resolver: Arc<dyn FolderResolver>,
    pub enumerator: Arc<dyn Enumerator>,
    pub watcher: Arc<dyn ChangeWatcher>,
    pub settings: Arc<dyn ViewSettingsStore>,
    pub search: Arc<dyn SearchService>,
    pub icons: Arc<dyn IconProvider>,
}

/// Where a watcher delivers changes for one watched root.
///
/// Holds only a weak link to the engine, so a forgotten subscription cannot
/// keep a stopped engine alive.
#[derive(Debug, Clone)]
pub struct ChangeSink {
    generation: u64,
    root: String,
    tx: WeakUnboundedSender<Message>,
}

impl ChangeSink {
    pub(crate) fn new(generation: &Generation, root: &str, tx: &UnboundedSender<Message>) -> Self {
        Self {
            generation: generation.id(),
            root: root.to_string(),
            tx: tx.downgrade(),
        }
    }

    /// The watched root this sink belongs to.
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Returns false once the engine is gone.
    pub fn send(&self, event: ChangeEvent) -> bool {
        match self.tx.upgrade() {
            Some(tx) => tx
                .send(Message::Watch {
                    generation: self.generation,
                    event,
                })
                .is_ok(),
            None => false,
        }
    }

    pub fn root_lost(&self) -> bool {
        self.send(ChangeEvent {
            path: self.root.clone(),
            change: ChangeType::Error(WatchFailure::RootLost),
        })
    }

    pub fn error(&self, message: impl Into<String>) -> bool {
        self.send(ChangeEvent {
            path: self.root.clone(),
            change: ChangeType::Error(WatchFailure::Other(message.into())),
        })
    }
}

/// Inbound channel for search replies.
#[derive(Debug, Clone)]
pub struct SearchReplySink {
    tx: WeakUnboundedSender<Message>,
}

impl SearchReplySink {
    pub(crate) fn new(tx: &UnboundedSender<Message>) -> Self {
        Self { tx: tx.downgrade() }
    }

    pub fn reply(&self, id: u64, matched_paths: Vec<String>) -> bool {
        match self.tx.upgrade() {
            Some(tx) => tx
                .send(Message::SearchReply {
                    id,
                    paths: matched_paths,
                })
                .is_ok(),
            None => false,
        }
    }
}
