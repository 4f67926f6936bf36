use super::engine::{Engine, PendingNavigation};
use super::{JobResult, Reply, ViewEvent};
use crate::error::{Result, ViewError};
use crate::history::{HistoryEntry, HistoryStack};
use crate::model::{FolderDescriptor, IconSize, ItemKind, ViewSettings};
use crate::paths;
use crate::services::Enumeration;

impl Engine {
    /// Start a navigation. `path: None` (or the Home sentinel) opens Home.
    ///
    /// Everything tied to the previous generation is invalidated first. The
    /// location is then resolved and listed in the background; the listing is
    /// published by `on_enumerated` if this is still the current generation.
    pub(super) fn load_directory(
        &mut self,
        path: Option<String>,
        record_history: bool,
        selection_hint: Option<String>,
        reply: Option<Reply<bool>>,
    ) {
        self.search.exit();
        let generation = self.begin_generation();
        if reply.is_some() {
            self.last_error = None;
        }

        let requested = path
            .map(|p| paths::normalize(&p))
            .filter(|p| !p.is_empty() && !p.eq_ignore_ascii_case(&self.config.home_sentinel));
        let selection_hint = selection_hint.map(|p| paths::normalize(&p)).filter(|p| !p.is_empty());

        log::info!(
            "📂 Navigating to {} (generation {})",
            requested.as_deref().unwrap_or("Home"),
            generation.id()
        );
        self.emit(ViewEvent::NavigationStarted {
            generation: generation.id(),
            path: requested.clone(),
        });
        self.pending = Some(PendingNavigation {
            generation: generation.id(),
            requested: requested.clone(),
            record_history,
            selection_hint,
            reply,
            folder: None,
        });

        match requested {
            None => self.on_resolved(generation.id(), Ok(FolderDescriptor::Home)),
            Some(path) => {
                let resolver = self.services.resolver.clone();
                self.spawn_job(move |jobs| {
                    if !generation.is_current() {
                        return;
                    }
                    let outcome = resolver.resolve(&path);
                    jobs.send(JobResult::Resolved {
                        generation: generation.id(),
                        outcome,
                    });
                });
            }
        }
    }

    pub(super) fn on_resolved(&mut self, generation: u64, outcome: Result<FolderDescriptor>) {
        if !self.is_current(generation) {
            log::debug!("Discarding resolution for stale generation {}", generation);
            return;
        }
        let requested = self
            .pending
            .as_ref()
            .and_then(|p| p.requested.clone())
            .unwrap_or_default();

        match outcome {
            Err(e) => self.fail_navigation(e, &requested),
            Ok(FolderDescriptor::LocalFile { full_path }) => {
                log::info!("📄 {} is a file; handing it to the host", full_path);
                self.emit(ViewEvent::OpenRequested(full_path.clone()));
                if let Some(mut pending) = self.pending.take() {
                    pending.respond(false);
                }
                self.recover_from_failure(&full_path);
            }
            Ok(folder) => self.begin_listing(folder),
        }
    }

    /// Steps 3 to 6 of a navigation: folder icon, watch, settings and
    /// enumeration. Enumeration and the settings lookup run together in one
    /// background job.
    fn begin_listing(&mut self, folder: FolderDescriptor) {
        let generation = self.current().clone();
        let selection_hint = match self.pending.as_mut() {
            Some(pending) => {
                pending.folder = Some(folder.clone());
                pending.selection_hint.clone()
            }
            None => return,
        };

        let icons = self.icons.clone();
        let icon_folder = folder.clone();
        let icon_generation = generation.clone();
        self.spawn_job(move |jobs| {
            if !icon_generation.is_current() {
                return;
            }
            let icon = icons.folder_icon(&icon_folder, IconSize::Small);
            jobs.send(JobResult::FolderIcon {
                generation: icon_generation.id(),
                icon,
            });
        });

        if !folder.is_virtual() {
            self.attach_watcher(&folder, &generation);
        }

        let settings_key = self.settings_key(&folder);
        let store = self.services.settings.clone();
        let enumerator = self.services.enumerator.clone();
        self.spawn_job(move |jobs| {
            if !generation.is_current() {
                return;
            }
            let settings = match store.get(&settings_key) {
                Ok(Some(settings)) => settings,
                Ok(None) => ViewSettings::default(),
                Err(e) => {
                    log::warn!("Failed to read view settings for {}: {}", settings_key, e);
                    ViewSettings::default()
                }
            };
            let outcome = enumerator.enumerate(&folder, selection_hint.as_deref(), &generation);
            jobs.send(JobResult::Enumerated {
                generation: generation.id(),
                settings,
                outcome,
            });
        });
    }

    pub(super) fn on_enumerated(&mut self, generation: u64, settings: ViewSettings, outcome: Result<Enumeration>) {
        if !self.is_current(generation) {
            log::debug!("Discarding listing for stale generation {}", generation);
            return;
        }
        let failed_path = self
            .pending
            .as_ref()
            .and_then(|p| p.folder.as_ref())
            .map(|f| f.full_path().to_string())
            .unwrap_or_default();

        let enumeration = match outcome {
            Ok(enumeration) => enumeration,
            Err(e) if e.is_silent() => {
                if let Some(mut pending) = self.pending.take() {
                    pending.respond(false);
                }
                return;
            }
            Err(e) => return self.fail_navigation(e, &failed_path),
        };
        let Some(mut pending) = self.pending.take() else {
            return;
        };
        let Some(folder) = pending.folder.take() else {
            pending.respond(false);
            return;
        };

        let count = enumeration.items.len();
        self.folder = folder;
        self.settings = settings;
        self.listing.replace_all(enumeration.items, generation);
        if let Some(selected) = enumeration.selected {
            self.listing.select(&selected);
        }
        log::info!(
            "📋 Listed {} items in {} (generation {})",
            count,
            self.folder.display_text(),
            generation
        );
        self.emit(ViewEvent::ListingReplaced {
            generation,
            location: self.folder.clone(),
            count,
        });
        self.emit(ViewEvent::SettingsChanged(self.settings.clone()));
        if !self.listing.selected().is_empty() {
            self.emit(ViewEvent::SelectionChanged(self.listing.selected().to_vec()));
        }

        if pending.record_history {
            self.history.add(HistoryEntry::new(self.folder.clone()));
        }
        self.emit_history();
        pending.respond(true);

        let load_icons = self.config.should_preload_icons(count);
        let items = self.listing.items().to_vec();
        self.schedule_details(items, load_icons);
        // Changes that arrived while the folder was being listed.
        self.pump_reconcile_queue();
    }

    /// A navigation failed: surface the error and recover through history.
    pub(super) fn fail_navigation(&mut self, error: ViewError, failed_path: &str) {
        if let Some(mut pending) = self.pending.take() {
            pending.respond(false);
        }
        if error.is_silent() {
            return;
        }
        self.report_error(error.to_string());
        if failed_path.is_empty() {
            // Home itself failed; there is nowhere left to go.
            return;
        }
        self.recover_from_failure(failed_path);
    }

    fn recover_from_failure(&mut self, failed_path: &str) {
        let current = self.folder.full_path().to_string();
        let recovery = self.history.error_go_back(failed_path, &current);
        log::info!(
            "↩️  Recovering from {} to {}",
            failed_path,
            recovery.target.as_deref().unwrap_or("Home")
        );
        self.emit_history();
        self.load_directory(recovery.target, false, recovery.selection_hint, None);
    }

    pub(super) fn go_back(&mut self, reply: Reply<bool>) {
        match self.history.go_back() {
            Some(step) => {
                self.emit_history();
                self.load_directory(step.target, false, step.selection_hint, Some(reply));
            }
            None => {
                let _ = reply.send(false);
            }
        }
    }

    pub(super) fn go_forward(&mut self, reply: Reply<bool>) {
        match self.history.go_forward() {
            Some(step) => {
                self.emit_history();
                self.load_directory(step.target, false, step.selection_hint, Some(reply));
            }
            None => {
                let _ = reply.send(false);
            }
        }
    }

    pub(super) fn go_to_upper_level(&mut self, reply: Reply<bool>) {
        if !self.can_go_to_upper_level() {
            let _ = reply.send(false);
            return;
        }
        let step = HistoryStack::upper_level(self.folder.full_path());
        self.load_directory(step.target, true, step.selection_hint, Some(reply));
    }

    pub(super) fn refresh(&mut self, reply: Reply<bool>) {
        let target = self.browse_target();
        let hint = self.listing.selected().first().cloned();
        self.load_directory(target, false, hint, Some(reply));
    }

    pub(super) fn open_item(&mut self, path: &str, reply: Reply<bool>) {
        match self.listing.get(path).map(|item| item.kind) {
            Some(ItemKind::Folder) | Some(ItemKind::Drive) => {
                self.load_directory(Some(path.to_string()), true, None, Some(reply));
            }
            Some(ItemKind::File) => {
                log::info!("📄 Opening {}", path);
                self.emit(ViewEvent::OpenRequested(path.to_string()));
                let _ = reply.send(true);
            }
            None => {
                log::debug!("Cannot open {}: not listed", path);
                let _ = reply.send(false);
            }
        }
    }

    /// Path that reloads the folder being browsed, `None` for Home.
    pub(super) fn browse_target(&self) -> Option<String> {
        match &self.folder {
            FolderDescriptor::Home => None,
            folder => Some(folder.full_path().to_string()),
        }
    }

    pub(super) fn settings_key(&self, folder: &FolderDescriptor) -> String {
        match folder {
            FolderDescriptor::Home => self.config.home_sentinel.clone(),
            folder => folder.full_path().to_string(),
        }
    }

    pub(super) fn emit_history(&self) {
        self.emit(ViewEvent::HistoryChanged {
            can_go_back: self.history.can_go_back(),
            can_go_forward: self.history.can_go_forward(),
        });
    }
}
