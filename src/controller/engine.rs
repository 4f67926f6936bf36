use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

use super::{JobResult, Message, Reply, ViewEvent, ViewMode, ViewSnapshot};
use crate::config::EngineConfig;
use crate::generation::{Generation, GenerationCounter};
use crate::history::HistoryStack;
use crate::icons::IconCacheService;
use crate::listing::Listing;
use crate::model::{FolderDescriptor, IconRef, ViewSettings};
use crate::reconcile::{ChangeEvent, ChangeWatcherReconciler};
use crate::search::SearchQueryCoordinator;
use crate::services::{Services, WatchSubscription};

/// A navigation waiting for its listing.
pub(super) struct PendingNavigation {
    pub generation: u64,
    pub requested: Option<String>,
    pub record_history: bool,
    pub selection_hint: Option<String>,
    pub reply: Option<Reply<bool>>,
    /// Set once the location has been resolved.
    pub folder: Option<FolderDescriptor>,
}

impl PendingNavigation {
    pub fn respond(&mut self, published: bool) {
        if let Some(reply) = self.reply.take() {
            let _ = reply.send(published);
        }
    }
}

/// The active watch on the listed folder.
pub(super) struct ActiveWatch {
    pub reconciler: ChangeWatcherReconciler,
    _subscription: Box<dyn WatchSubscription>,
}

impl ActiveWatch {
    pub fn new(reconciler: ChangeWatcherReconciler, subscription: Box<dyn WatchSubscription>) -> Self {
        Self {
            reconciler,
            _subscription: subscription,
        }
    }
}

/// Sends `JobFinished` when a background job ends, even by panic.
struct JobGuard(mpsc::UnboundedSender<Message>);

impl Drop for JobGuard {
    fn drop(&mut self) {
        let _ = self.0.send(Message::JobFinished);
    }
}

/// Lets a background job post results.
pub(super) struct JobSender(mpsc::UnboundedSender<Message>);

impl JobSender {
    pub fn send(&self, result: JobResult) -> bool {
        self.0.send(Message::Job(result)).is_ok()
    }
}

pub(super) struct Engine {
    pub services: Services,
    pub config: EngineConfig,
    pub icons: Arc<IconCacheService>,
    tx: mpsc::WeakUnboundedSender<Message>,
    events: broadcast::Sender<ViewEvent>,

    pub generations: GenerationCounter,
    pub folder: FolderDescriptor,
    pub folder_icon: Option<IconRef>,
    pub settings: ViewSettings,
    pub listing: Listing,
    pub history: HistoryStack,
    pub search: SearchQueryCoordinator,
    pub pending: Option<PendingNavigation>,
    pub last_error: Option<String>,

    pub watch: Option<ActiveWatch>,
    pub reconcile_queue: VecDeque<ChangeEvent>,
    pub reconcile_busy: bool,

    pub detail_jobs: usize,
    in_flight: usize,
    settle_waiters: Vec<Reply<()>>,
}

impl Engine {
    pub fn new(
        services: Services,
        config: EngineConfig,
        tx: mpsc::WeakUnboundedSender<Message>,
        events: broadcast::Sender<ViewEvent>,
    ) -> Self {
        let icons = Arc::new(IconCacheService::new(services.icons.clone(), &config.icons));
        Self {
            services,
            config,
            icons,
            tx,
            events,
            generations: GenerationCounter::new(),
            folder: FolderDescriptor::Home,
            folder_icon: None,
            settings: ViewSettings::default(),
            listing: Listing::new(),
            history: HistoryStack::new(),
            search: SearchQueryCoordinator::new(),
            pending: None,
            last_error: None,
            watch: None,
            reconcile_queue: VecDeque::new(),
            reconcile_busy: false,
            detail_jobs: 0,
            in_flight: 0,
            settle_waiters: Vec::new(),
        }
    }

    pub async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Message>) {
        log::info!("🧭 Navigation engine started");
        while let Some(message) = rx.recv().await {
            log::trace!("📥 {:?}", message);
            if !self.handle(message) {
                break;
            }
            self.release_settled();
        }
        self.teardown();
        log::info!("🧭 Navigation engine stopped");
    }

    /// Returns false when the engine should stop.
    fn handle(&mut self, message: Message) -> bool {
        match message {
            Message::LoadDirectory {
                path,
                record_history,
                selection_hint,
                reply,
            } => self.load_directory(path, record_history, selection_hint, reply),
            Message::GoBack(reply) => self.go_back(reply),
            Message::GoForward(reply) => self.go_forward(reply),
            Message::GoToUpperLevel(reply) => self.go_to_upper_level(reply),
            Message::Refresh(reply) => self.refresh(reply),
            Message::OpenItem { path, reply } => self.open_item(&path, reply),
            Message::SetSearchText { text, reply } => self.set_search_text(&text, reply),
            Message::SwitchView { change, reply } => {
                self.switch_view(change);
                let _ = reply.send(());
            }
            Message::RequestIcons(paths) => self.request_icons(&paths),
            Message::Select { path, selected, reply } => {
                let changed = if selected {
                    self.listing.select(&path)
                } else {
                    self.listing.deselect(&path)
                };
                if changed {
                    self.emit(ViewEvent::SelectionChanged(self.listing.selected().to_vec()));
                }
                let _ = reply.send(changed);
            }
            Message::ClearSelection => {
                if !self.listing.selected().is_empty() {
                    self.listing.clear_selection();
                    self.emit(ViewEvent::SelectionChanged(Vec::new()));
                }
            }
            Message::Snapshot(reply) => {
                let _ = reply.send(self.snapshot());
            }
            Message::Settle(reply) => self.settle_waiters.push(reply),
            Message::Shutdown(reply) => {
                self.teardown();
                let _ = reply.send(());
                return false;
            }
            Message::Watch { generation, event } => self.on_watch_event(generation, event),
            Message::SearchReply { id, paths } => self.on_search_reply(id, paths),
            Message::Job(result) => self.on_job_result(result),
            Message::JobFinished => self.in_flight = self.in_flight.saturating_sub(1),
        }
        true
    }

    fn on_job_result(&mut self, result: JobResult) {
        match result {
            JobResult::Resolved { generation, outcome } => self.on_resolved(generation, outcome),
            JobResult::Enumerated {
                generation,
                settings,
                outcome,
            } => self.on_enumerated(generation, settings, outcome),
            JobResult::FolderIcon { generation, icon } => {
                if self.is_current(generation) {
                    self.folder_icon = Some(icon.clone());
                    self.emit(ViewEvent::FolderIcon(icon));
                }
            }
            JobResult::Details {
                generation,
                path,
                attributes,
                icon,
            } => self.on_details(generation, &path, attributes, icon),
            JobResult::Probed {
                generation,
                event,
                entry,
            } => self.on_probed(generation, event, entry),
            JobResult::Recovery { generation, target } => self.on_recovery(generation, target),
            JobResult::SearchResolved { id, token, outcome } => self.on_search_resolved(id, &token, outcome),
            JobResult::IconBatch {
                generation,
                token,
                icons,
            } => self.on_icon_batch(generation, &token, icons),
        }
    }

    pub fn current(&self) -> &Generation {
        self.generations.current()
    }

    pub fn is_current(&self, generation: u64) -> bool {
        let current = self.generations.current();
        current.id() == generation && current.is_current()
    }

    pub fn emit(&self, event: ViewEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Record a user-visible error and notify subscribers.
    pub fn report_error(&mut self, message: String) {
        log::warn!("⚠️  {}", message);
        self.last_error = Some(message.clone());
        self.emit(ViewEvent::Error(message));
    }

    /// Run `work` on the blocking pool, counting it as in flight until it
    /// returns.
    pub fn spawn_job<F>(&mut self, work: F)
    where
        F: FnOnce(&JobSender) + Send + 'static,
    {
        let Some(tx) = self.tx.upgrade() else {
            log::debug!("No live handles; background job skipped");
            return;
        };
        self.in_flight += 1;
        tokio::task::spawn_blocking(move || {
            let _guard = JobGuard(tx.clone());
            work(&JobSender(tx));
        });
    }

    pub fn sender(&self) -> Option<mpsc::UnboundedSender<Message>> {
        self.tx.upgrade()
    }

    /// Invalidate everything belonging to the current generation and start
    /// the next one.
    pub fn begin_generation(&mut self) -> Generation {
        if let Some(mut pending) = self.pending.take() {
            log::debug!("Navigation for generation {} superseded", pending.generation);
            pending.respond(false);
        }
        let generation = self.generations.advance();
        self.icons.cancel_batch();
        self.listing.clear_selection();
        self.detach_watcher();
        self.detail_jobs = 0;
        generation
    }

    pub fn detach_watcher(&mut self) {
        if let Some(watch) = self.watch.take() {
            log::debug!("🔕 Stopped watching {}", watch.reconciler.root());
        }
        self.reconcile_queue.clear();
        self.reconcile_busy = false;
    }

    fn is_settled(&self) -> bool {
        self.in_flight == 0 && self.reconcile_queue.is_empty() && !self.reconcile_busy
    }

    fn release_settled(&mut self) {
        if self.settle_waiters.is_empty() || !self.is_settled() {
            return;
        }
        for waiter in self.settle_waiters.drain(..) {
            let _ = waiter.send(());
        }
    }

    /// Location on display: the search pseudo-location while searching.
    pub fn location(&self) -> FolderDescriptor {
        match self.search.active_query() {
            Some(query) => query.location(),
            None => self.folder.clone(),
        }
    }

    pub fn snapshot(&self) -> ViewSnapshot {
        ViewSnapshot {
            location: self.location(),
            mode: if self.search.is_active() {
                ViewMode::Search
            } else {
                ViewMode::Browse
            },
            items: self.listing.items().to_vec(),
            selected: self.listing.selected().to_vec(),
            listing_generation: self.listing.generation(),
            generation: self.current().id(),
            loading: self.pending.is_some(),
            can_go_back: self.history.can_go_back(),
            can_go_forward: self.history.can_go_forward(),
            can_go_to_upper_level: self.can_go_to_upper_level(),
            back_text: self.history.back_text().map(str::to_string),
            forward_text: self.history.forward_text().map(str::to_string),
            history: self.history.entries().iter().map(|e| e.display_text.clone()).collect(),
            next_index: self.history.next_index(),
            history_count: self.history.history_count(),
            settings: self.settings.clone(),
            last_error: self.last_error.clone(),
            detail_jobs: self.detail_jobs,
            search_id: self.search.last_id(),
            folder_icon: self.folder_icon.clone(),
        }
    }

    pub fn can_go_to_upper_level(&self) -> bool {
        !matches!(self.location(), FolderDescriptor::Home | FolderDescriptor::SearchResult { .. })
    }

    fn teardown(&mut self) {
        if let Some(mut pending) = self.pending.take() {
            pending.respond(false);
        }
        self.generations.cancel_all();
        self.search.exit();
        self.detach_watcher();
        self.icons.teardown();
        for waiter in self.settle_waiters.drain(..) {
            let _ = waiter.send(());
        }
    }
}
