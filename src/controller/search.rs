use tokio_util::sync::CancellationToken;

use super::engine::Engine;
use super::{JobResult, Reply, ViewEvent};
use crate::error::{Result, ViewError};
use crate::model::{FolderDescriptor, ListItem};
use crate::search::resolve_matches;
use crate::services::SearchReplySink;

impl Engine {
    /// Blank text leaves search mode and reloads the folder being browsed,
    /// and is ignored while browsing. Anything else submits a new query and
    /// clears the listing until its reply arrives.
    pub(super) fn set_search_text(&mut self, text: &str, reply: Reply<Result<()>>) {
        let text = text.trim();
        if text.is_empty() {
            if !self.search.is_active() {
                let _ = reply.send(Ok(()));
                return;
            }
            let target = self.browse_target();
            log::info!("🔍 Search cleared");
            self.load_directory(target, true, None, None);
            let _ = reply.send(Ok(()));
            return;
        }

        if !self.services.search.is_available() {
            self.report_error(ViewError::SearchUnavailable.to_string());
            let _ = reply.send(Err(ViewError::SearchUnavailable));
            return;
        }
        let Some(tx) = self.sender() else {
            let _ = reply.send(Err(ViewError::EngineStopped));
            return;
        };

        let scope = match &self.folder {
            FolderDescriptor::LocalFolder { full_path, .. } | FolderDescriptor::Drive { full_path, .. } => {
                Some(full_path.clone())
            }
            _ => None,
        };
        let query = self.search.prepare(text, scope, self.config.search.max_results);
        if let Err(e) = self.services.search.search(query.clone(), SearchReplySink::new(&tx)) {
            self.report_error(format!("Search failed: {}", e));
            let _ = reply.send(Err(e));
            return;
        }
        log::info!(
            "🔍 Search {} for {:?} in {}",
            query.id,
            query.text,
            query.scope.as_deref().unwrap_or("everything")
        );

        let generation = self.begin_generation();
        self.search.commit(query.clone());
        self.listing.clear(generation.id());
        self.emit(ViewEvent::SearchStarted {
            id: query.id,
            text: query.text,
        });
        self.emit(ViewEvent::ListingReplaced {
            generation: generation.id(),
            location: self.location(),
            count: 0,
        });
        let _ = reply.send(Ok(()));
    }

    pub(super) fn on_search_reply(&mut self, id: u64, paths: Vec<String>) {
        let token = match self.search.accept_reply(id) {
            Ok(token) => token,
            Err(e) => {
                log::debug!("🔍 {}", e);
                return;
            }
        };
        log::debug!("🔍 Reply {} with {} matches", id, paths.len());
        let enumerator = self.services.enumerator.clone();
        let max_results = self.config.search.max_results;
        self.spawn_job(move |jobs| {
            let outcome = resolve_matches(enumerator.as_ref(), &paths, max_results, &token);
            jobs.send(JobResult::SearchResolved { id, token, outcome });
        });
    }

    pub(super) fn on_search_resolved(&mut self, id: u64, token: &CancellationToken, outcome: Result<Vec<ListItem>>) {
        if !self.search.is_reply_current(id, token) {
            log::debug!("🔍 Results for search {} are no longer wanted", id);
            return;
        }
        let items = match outcome {
            Ok(items) => items,
            Err(e) if e.is_silent() => return,
            Err(e) => return self.report_error(format!("Search failed: {}", e)),
        };

        let generation = self.current().id();
        let count = items.len();
        let files: Vec<ListItem> = items.iter().filter(|item| !item.is_folder()).cloned().collect();
        self.listing.replace_all(items, generation);
        log::info!("🔍 Showing {} results for search {}", count, id);
        self.emit(ViewEvent::ListingReplaced {
            generation,
            location: self.location(),
            count,
        });
        self.schedule_details(files, true);
    }
}
