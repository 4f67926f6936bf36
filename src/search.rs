//! Search-result mode bookkeeping.
//!
//! Queries carry a monotonically increasing id. Only the reply to the most
//! recently submitted query is ever shown; everything else is stale.

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::{Result, ViewError};
use crate::model::{FolderDescriptor, ListItem};
use crate::services::Enumerator;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub id: u64,
    pub text: String,
    /// Folder to search beneath; `None` searches everywhere.
    pub scope: Option<String>,
    pub max_results: usize,
}

impl SearchQuery {
    pub fn location(&self) -> FolderDescriptor {
        FolderDescriptor::SearchResult {
            query: self.text.clone(),
            scope: self.scope.clone(),
        }
    }
}

#[derive(Debug)]
pub struct SearchQueryCoordinator {
    last_id: u64,
    active: Option<SearchQuery>,
    reply_token: CancellationToken,
}

impl Default for SearchQueryCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchQueryCoordinator {
    pub fn new() -> Self {
        Self {
            last_id: 0,
            active: None,
            reply_token: CancellationToken::new(),
        }
    }

    pub fn last_id(&self) -> u64 {
        self.last_id
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn active_query(&self) -> Option<&SearchQuery> {
        self.active.as_ref()
    }

    /// Next query to submit. Nothing changes until `commit`.
    pub fn prepare(&self, text: &str, scope: Option<String>, max_results: usize) -> SearchQuery {
        SearchQuery {
            id: self.last_id + 1,
            text: text.to_string(),
            scope,
            max_results,
        }
    }

    /// The query was submitted; from now on only its reply counts.
    pub fn commit(&mut self, query: SearchQuery) {
        self.last_id = query.id;
        self.active = Some(query);
        self.cancel_reply_processing();
    }

    /// Leave search-result mode. Replies still in flight become stale.
    pub fn exit(&mut self) {
        if let Some(query) = self.active.take() {
            log::debug!("Leaving search mode for query {} ({:?})", query.id, query.text);
        }
        self.cancel_reply_processing();
    }

    pub fn cancel_reply_processing(&mut self) {
        self.reply_token.cancel();
        self.reply_token = CancellationToken::new();
    }

    /// Accept a reply for processing. Any earlier reply still being resolved
    /// is cancelled; the returned token guards this one.
    pub fn accept_reply(&mut self, id: u64) -> Result<CancellationToken> {
        if !self.is_active() || id != self.last_id {
            return Err(ViewError::StaleReply(id));
        }
        self.cancel_reply_processing();
        Ok(self.reply_token.clone())
    }

    /// Whether resolved results for `id` may still be published.
    pub fn is_reply_current(&self, id: u64, token: &CancellationToken) -> bool {
        self.is_active() && id == self.last_id && !token.is_cancelled()
    }
}

/// Turn matched paths into list items, in reply order.
///
/// Paths that can no longer be probed are skipped and logged; processing
/// stops with `Cancelled` as soon as `token` fires.
pub fn resolve_matches(
    enumerator: &dyn Enumerator,
    paths: &[String],
    max_results: usize,
    token: &CancellationToken,
) -> Result<Vec<ListItem>> {
    let mut items = Vec::with_capacity(paths.len().min(max_results));
    for path in paths {
        if token.is_cancelled() {
            return Err(ViewError::Cancelled);
        }
        if items.len() >= max_results {
            break;
        }
        match enumerator.probe(path) {
            Ok(Some(item)) => items.push(item),
            Ok(None) => log::debug!("Search match disappeared: {}", path),
            Err(e) => log::warn!("Skipping search match {}: {}", path, e),
        }
    }
    Ok(items)
}
