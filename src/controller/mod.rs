//! The navigation controller.
//!
//! A single coordinating task owns the listing, history, selection and
//! generation counter. Requests from [`NavigationHandle`]s, watcher events,
//! search replies and background results all arrive through one FIFO inbox
//! and are handled in order, so the published state only ever changes on that
//! task. Slow collaborator calls run on the blocking pool and report back
//! through the same inbox, tagged with the generation they were started for.

mod details;
mod engine;
mod navigation;
mod search;
mod watch;

use serde::Serialize;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::config::EngineConfig;
use crate::error::{Result, ViewError};
use crate::model::{FolderDescriptor, IconRef, ItemAttributes, ListItem, ViewChange, ViewSettings};
use crate::reconcile::ChangeEvent;
use crate::services::{Enumeration, SearchReplySink, Services};

use engine::Engine;

const EVENT_CAPACITY: usize = 256;

/// Start a navigation engine on the current tokio runtime.
///
/// The engine starts on an empty Home location; nothing is listed until the
/// first navigation. It stops on [`NavigationHandle::shutdown`] or once every
/// handle has been dropped.
pub fn spawn(services: Services, config: EngineConfig) -> NavigationHandle {
    let (tx, rx) = mpsc::unbounded_channel();
    let (events, _) = broadcast::channel(EVENT_CAPACITY);
    let engine = Engine::new(services, config, tx.downgrade(), events.clone());
    tokio::spawn(engine.run(rx));
    NavigationHandle { tx, events }
}

/// Whether the view is browsing a folder or showing search results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ViewMode {
    Browse,
    Search,
}

/// Notifications about published state, for presentation layers.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewEvent {
    NavigationStarted { generation: u64, path: Option<String> },
    ListingReplaced { generation: u64, location: FolderDescriptor, count: usize },
    ItemAdded(String),
    ItemRemoved(String),
    ItemRenamed { from: String, to: String },
    ItemUpdated(String),
    SelectionChanged(Vec<String>),
    HistoryChanged { can_go_back: bool, can_go_forward: bool },
    SettingsChanged(ViewSettings),
    FolderIcon(IconRef),
    SearchStarted { id: u64, text: String },
    /// A file was opened; launching it is up to the host.
    OpenRequested(String),
    Error(String),
}

/// Read-only copy of the published state.
#[derive(Debug, Clone, Serialize)]
pub struct ViewSnapshot {
    pub location: FolderDescriptor,
    pub mode: ViewMode,
    pub items: Vec<ListItem>,
    pub selected: Vec<String>,
    /// Generation of the navigation that produced `items`.
    pub listing_generation: u64,
    pub generation: u64,
    /// A navigation is waiting for its listing.
    pub loading: bool,
    pub can_go_back: bool,
    pub can_go_forward: bool,
    pub can_go_to_upper_level: bool,
    pub back_text: Option<String>,
    pub forward_text: Option<String>,
    pub history: Vec<String>,
    pub next_index: usize,
    pub history_count: usize,
    pub settings: ViewSettings,
    pub last_error: Option<String>,
    /// Attribute/icon jobs started for the current generation.
    pub detail_jobs: usize,
    pub search_id: u64,
    #[serde(skip)]
    pub folder_icon: Option<IconRef>,
}

impl ViewSnapshot {
    pub fn full_path(&self) -> &str {
        self.location.full_path()
    }

    pub fn item(&self, full_path: &str) -> Option<&ListItem> {
        self.items.iter().find(|item| item.full_path == full_path)
    }

    pub fn names(&self) -> Vec<&str> {
        self.items.iter().map(|item| item.name.as_str()).collect()
    }
}

/// Reply to a request. Awaiting it is optional; the request was already
/// queued when the handle method returned.
#[must_use = "requests are queued either way; await to observe the outcome"]
pub struct Pending<T> {
    rx: Option<oneshot::Receiver<T>>,
}

impl<T> Pending<T> {
    fn stopped() -> Self {
        Self { rx: None }
    }
}

impl<T> Future for Pending<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.rx.as_mut() {
            Some(rx) => Pin::new(rx).poll(cx).map(|reply| reply.map_err(|_| ViewError::EngineStopped)),
            None => Poll::Ready(Err(ViewError::EngineStopped)),
        }
    }
}

pub(crate) type Reply<T> = oneshot::Sender<T>;

pub(crate) enum Message {
    LoadDirectory {
        path: Option<String>,
        record_history: bool,
        selection_hint: Option<String>,
        reply: Option<Reply<bool>>,
    },
    GoBack(Reply<bool>),
    GoForward(Reply<bool>),
    GoToUpperLevel(Reply<bool>),
    Refresh(Reply<bool>),
    OpenItem {
        path: String,
        reply: Reply<bool>,
    },
    SetSearchText {
        text: String,
        reply: Reply<Result<()>>,
    },
    SwitchView {
        change: ViewChange,
        reply: Reply<()>,
    },
    RequestIcons(Vec<String>),
    Select {
        path: String,
        selected: bool,
        reply: Reply<bool>,
    },
    ClearSelection,
    Snapshot(Reply<ViewSnapshot>),
    Settle(Reply<()>),
    Shutdown(Reply<()>),
    Watch {
        generation: u64,
        event: ChangeEvent,
    },
    SearchReply {
        id: u64,
        paths: Vec<String>,
    },
    Job(JobResult),
    JobFinished,
}

impl std::fmt::Debug for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Message::LoadDirectory { .. } => "LoadDirectory",
            Message::GoBack(_) => "GoBack",
            Message::GoForward(_) => "GoForward",
            Message::GoToUpperLevel(_) => "GoToUpperLevel",
            Message::Refresh(_) => "Refresh",
            Message::OpenItem { .. } => "OpenItem",
            Message::SetSearchText { .. } => "SetSearchText",
            Message::SwitchView { .. } => "SwitchView",
            Message::RequestIcons(_) => "RequestIcons",
            Message::Select { .. } => "Select",
            Message::ClearSelection => "ClearSelection",
            Message::Snapshot(_) => "Snapshot",
            Message::Settle(_) => "Settle",
            Message::Shutdown(_) => "Shutdown",
            Message::Watch { .. } => "Watch",
            Message::SearchReply { .. } => "SearchReply",
            Message::Job(_) => "Job",
            Message::JobFinished => "JobFinished",
        };
        f.write_str(name)
    }
}

/// Results posted back by background work.
pub(crate) enum JobResult {
    Resolved {
        generation: u64,
        outcome: Result<FolderDescriptor>,
    },
    Enumerated {
        generation: u64,
        settings: ViewSettings,
        outcome: Result<Enumeration>,
    },
    FolderIcon {
        generation: u64,
        icon: IconRef,
    },
    Details {
        generation: u64,
        path: String,
        attributes: Option<ItemAttributes>,
        icon: Option<IconRef>,
    },
    Probed {
        generation: u64,
        event: ChangeEvent,
        entry: Option<ListItem>,
    },
    Recovery {
        generation: u64,
        target: RecoveryTarget,
    },
    SearchResolved {
        id: u64,
        token: CancellationToken,
        outcome: Result<Vec<ListItem>>,
    },
    IconBatch {
        generation: u64,
        token: CancellationToken,
        icons: Vec<(String, IconRef)>,
    },
}

/// Where to go after the watched root reported a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RecoveryTarget {
    /// The root still exists; nothing to do.
    Unchanged,
    /// Nearest surviving ancestor, `None` for Home.
    Ancestor(Option<String>),
}

/// Cloneable front end of a running engine.
#[derive(Debug, Clone)]
pub struct NavigationHandle {
    tx: mpsc::UnboundedSender<Message>,
    events: broadcast::Sender<ViewEvent>,
}

impl NavigationHandle {
    fn request<T>(&self, build: impl FnOnce(Reply<T>) -> Message) -> Pending<T> {
        let (reply, rx) = oneshot::channel();
        match self.tx.send(build(reply)) {
            Ok(()) => Pending { rx: Some(rx) },
            Err(_) => Pending::stopped(),
        }
    }

    fn post(&self, message: Message) {
        if self.tx.send(message).is_err() {
            log::debug!("Navigation engine has stopped; request dropped");
        }
    }

    /// Navigate to `path`. Resolves to `true` once the listing for this
    /// navigation is published, `false` if it was superseded or failed.
    pub fn load_directory(
        &self,
        path: impl Into<String>,
        record_history: bool,
        selection_hint: Option<String>,
    ) -> Pending<bool> {
        let path = path.into();
        self.request(|reply| Message::LoadDirectory {
            path: Some(path),
            record_history,
            selection_hint,
            reply: Some(reply),
        })
    }

    /// `load_directory` recording history without a selection hint.
    pub fn navigate(&self, path: impl Into<String>) -> Pending<bool> {
        self.load_directory(path, true, None)
    }

    pub fn go_home(&self) -> Pending<bool> {
        self.request(|reply| Message::LoadDirectory {
            path: None,
            record_history: true,
            selection_hint: None,
            reply: Some(reply),
        })
    }

    pub fn go_back(&self) -> Pending<bool> {
        self.request(Message::GoBack)
    }

    pub fn go_forward(&self) -> Pending<bool> {
        self.request(Message::GoForward)
    }

    pub fn go_to_upper_level(&self) -> Pending<bool> {
        self.request(Message::GoToUpperLevel)
    }

    /// Reload the current location without touching history.
    pub fn refresh(&self) -> Pending<bool> {
        self.request(Message::Refresh)
    }

    /// Folders and drives are navigated into; files raise `OpenRequested`.
    pub fn open_item(&self, path: impl Into<String>) -> Pending<bool> {
        let path = path.into();
        self.request(|reply| Message::OpenItem { path, reply })
    }

    /// Enter, update or (with blank text) leave search-result mode.
    pub fn set_search_text(&self, text: impl Into<String>) -> impl Future<Output = Result<()>> {
        let text = text.into();
        let pending = self.request(|reply| Message::SetSearchText { text, reply });
        async move { pending.await? }
    }

    pub fn switch_view(&self, change: ViewChange) -> Pending<()> {
        self.request(|reply| Message::SwitchView { change, reply })
    }

    /// Load icons for listed items that have none yet.
    pub fn request_icons(&self, paths: Vec<String>) {
        self.post(Message::RequestIcons(paths));
    }

    pub fn select(&self, path: impl Into<String>) -> Pending<bool> {
        let path = path.into();
        self.request(|reply| Message::Select {
            path,
            selected: true,
            reply,
        })
    }

    pub fn deselect(&self, path: impl Into<String>) -> Pending<bool> {
        let path = path.into();
        self.request(|reply| Message::Select {
            path,
            selected: false,
            reply,
        })
    }

    pub fn clear_selection(&self) {
        self.post(Message::ClearSelection);
    }

    pub fn snapshot(&self) -> Pending<ViewSnapshot> {
        self.request(Message::Snapshot)
    }

    /// Resolves once no background work is outstanding and every queued
    /// change notification has been applied.
    pub fn settle(&self) -> Pending<()> {
        self.request(Message::Settle)
    }

    /// Sink for delivering search replies from outside a `SearchService`.
    pub fn search_replies(&self) -> SearchReplySink {
        SearchReplySink::new(&self.tx)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ViewEvent> {
        self.events.subscribe()
    }

    /// Cancel all work, drop the watch and stop the engine.
    pub fn shutdown(&self) -> Pending<()> {
        self.request(Message::Shutdown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use tokio_test::{assert_pending, assert_ready, task};

    #[test]
    fn test_pending_resolves_with_reply() {
        let (reply, rx) = oneshot::channel::<bool>();
        let mut pending = task::spawn(Pending { rx: Some(rx) });
        assert_pending!(pending.poll());

        reply.send(true).unwrap();
        assert!(pending.is_woken());
        assert_matches!(assert_ready!(pending.poll()), Ok(true));
    }

    #[test]
    fn test_pending_without_engine() {
        let mut stopped = task::spawn(Pending::<()>::stopped());
        assert_matches!(assert_ready!(stopped.poll()), Err(ViewError::EngineStopped));

        let (reply, rx) = oneshot::channel::<()>();
        drop(reply);
        let mut dropped = task::spawn(Pending { rx: Some(rx) });
        assert_matches!(assert_ready!(dropped.poll()), Err(ViewError::EngineStopped));
    }
}
