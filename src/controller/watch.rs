use super::engine::{ActiveWatch, Engine};
use super::{JobResult, RecoveryTarget, ViewEvent};
use crate::generation::Generation;
use crate::model::{FolderDescriptor, ListItem};
use crate::paths;
use crate::reconcile::{ChangeEvent, ChangeWatcherReconciler, WatchFailure};
use crate::services::{ChangeSink, FolderResolver};

impl Engine {
    /// Watch the folder about to be listed. Failing to watch only costs live
    /// updates.
    pub(super) fn attach_watcher(&mut self, folder: &FolderDescriptor, generation: &Generation) {
        let Some(tx) = self.sender() else {
            return;
        };
        let root = folder.full_path();
        let sink = ChangeSink::new(generation, root, &tx);
        match self.services.watcher.watch(root, sink) {
            Ok(subscription) => {
                log::debug!("🔔 Watching {}", root);
                let reconciler = ChangeWatcherReconciler::new(generation.clone(), root);
                self.watch = Some(ActiveWatch::new(reconciler, subscription));
            }
            Err(e) => log::warn!("Cannot watch {}, live updates disabled: {}", root, e),
        }
    }

    pub(super) fn on_watch_event(&mut self, generation: u64, event: ChangeEvent) {
        if !self.accepts_changes(generation) {
            log::trace!("Dropping change for stale generation {}: {:?}", generation, event);
            return;
        }
        self.reconcile_queue.push_back(event);
        self.pump_reconcile_queue();
    }

    fn accepts_changes(&self, generation: u64) -> bool {
        self.watch
            .as_ref()
            .is_some_and(|watch| watch.reconciler.accepts(generation))
    }

    /// Apply queued changes one at a time. Nothing is applied while the
    /// listing for the watched folder is still being loaded.
    pub(super) fn pump_reconcile_queue(&mut self) {
        while !self.reconcile_busy && self.pending.is_none() {
            let Some(reconciler) = self.watch.as_ref().map(|w| w.reconciler.clone()) else {
                self.reconcile_queue.clear();
                return;
            };
            let Some(event) = self.reconcile_queue.pop_front() else {
                return;
            };

            match reconciler.probe_target(&event).map(str::to_string) {
                Some(target) => {
                    self.reconcile_busy = true;
                    let enumerator = self.services.enumerator.clone();
                    let generation = reconciler.generation().clone();
                    self.spawn_job(move |jobs| {
                        if !generation.is_current() {
                            return;
                        }
                        let entry = enumerator.probe(&target).unwrap_or_else(|e| {
                            log::warn!("Failed to probe {}: {}", target, e);
                            None
                        });
                        jobs.send(JobResult::Probed {
                            generation: generation.id(),
                            event,
                            entry,
                        });
                    });
                }
                None => self.apply_change(&reconciler, event, None),
            }
        }
    }

    pub(super) fn on_probed(&mut self, generation: u64, event: ChangeEvent, entry: Option<ListItem>) {
        if !self.accepts_changes(generation) {
            return;
        }
        self.reconcile_busy = false;
        if let Some(reconciler) = self.watch.as_ref().map(|w| w.reconciler.clone()) {
            self.apply_change(&reconciler, event, entry);
        }
        self.pump_reconcile_queue();
    }

    fn apply_change(&mut self, reconciler: &ChangeWatcherReconciler, event: ChangeEvent, entry: Option<ListItem>) {
        log::debug!("🔄 {:?}", event);
        let had_selection = self.listing.selected().to_vec();
        let outcome = reconciler.apply(&mut self.listing, &event, entry);

        for path in &outcome.removed {
            self.emit(ViewEvent::ItemRemoved(path.clone()));
        }
        for (from, to) in &outcome.renamed {
            self.emit(ViewEvent::ItemRenamed {
                from: from.clone(),
                to: to.clone(),
            });
        }
        for path in &outcome.added {
            self.emit(ViewEvent::ItemAdded(path.clone()));
        }
        if had_selection != self.listing.selected() {
            self.emit(ViewEvent::SelectionChanged(self.listing.selected().to_vec()));
        }

        if let Some(failure) = outcome.failure {
            self.on_watch_failure(reconciler.root(), failure);
            return;
        }

        let refresh: Vec<ListItem> = outcome
            .refresh
            .iter()
            .filter_map(|path| self.listing.get(path).cloned())
            .collect();
        self.schedule_details(refresh, true);
    }

    /// Decide in the background whether the watched root survived. The
    /// queue stays blocked until the answer is in.
    fn on_watch_failure(&mut self, root: &str, failure: WatchFailure) {
        let lost = failure == WatchFailure::RootLost;
        log::warn!("📁 {}", failure.to_error(root));

        self.reconcile_busy = true;
        let generation = self.current().id();
        let resolver = self.services.resolver.clone();
        let root = root.to_string();
        self.spawn_job(move |jobs| {
            let target = if resolver.exists(&root) {
                if lost {
                    // Recreated under the same name; reload it to re-watch.
                    RecoveryTarget::Ancestor(Some(root))
                } else {
                    RecoveryTarget::Unchanged
                }
            } else {
                RecoveryTarget::Ancestor(nearest_existing_ancestor(resolver.as_ref(), &root))
            };
            jobs.send(JobResult::Recovery { generation, target });
        });
    }

    pub(super) fn on_recovery(&mut self, generation: u64, target: RecoveryTarget) {
        if !self.is_current(generation) {
            return;
        }
        self.reconcile_busy = false;
        match target {
            RecoveryTarget::Unchanged => self.pump_reconcile_queue(),
            RecoveryTarget::Ancestor(path) => {
                log::info!("↩️  Moving to {}", path.as_deref().unwrap_or("Home"));
                self.load_directory(path, false, None, None);
            }
        }
    }
}

/// Walk up from `root`'s parent to the first folder that still exists.
/// `None` means nothing survived and Home should be shown.
pub(super) fn nearest_existing_ancestor(resolver: &dyn FolderResolver, root: &str) -> Option<String> {
    let mut candidate = paths::parent(root);
    while let Some(path) = candidate {
        if resolver.exists(&path) {
            return Some(path);
        }
        candidate = paths::parent(&path);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::MockFolderResolver;
    use mockall::predicate::*;

    #[test]
    fn test_nearest_existing_ancestor() {
        let mut resolver = MockFolderResolver::new();
        resolver.expect_exists().with(eq("C:\\A\\B")).return_const(false);
        resolver.expect_exists().with(eq("C:\\A")).return_const(true);
        assert_eq!(
            nearest_existing_ancestor(&resolver, "C:\\A\\B\\C").as_deref(),
            Some("C:\\A")
        );
    }

    #[test]
    fn test_nearest_existing_ancestor_falls_back_to_home() {
        let mut resolver = MockFolderResolver::new();
        resolver.expect_exists().return_const(false);
        assert_eq!(nearest_existing_ancestor(&resolver, "/gone/deeper"), None);
    }
}
