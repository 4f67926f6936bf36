//! Applying filesystem change notifications to the published listing.
//!
//! Events for one watched root are applied strictly one after another by the
//! coordinating task. Events that need a fresh entry (creations and renames)
//! are probed in the background first; `apply` then runs with the probe result.

use serde::{Deserialize, Serialize};

use crate::error::ViewError;
use crate::generation::Generation;
use crate::listing::Listing;
use crate::model::ListItem;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WatchFailure {
    /// The watched root itself was removed or moved away.
    RootLost,
    Other(String),
}

impl WatchFailure {
    /// The error this failure stands for on the watched `root`.
    pub fn to_error(&self, root: &str) -> ViewError {
        match self {
            WatchFailure::RootLost => ViewError::WatchedRootLost(root.to_string()),
            WatchFailure::Other(message) => ViewError::TransientIo {
                path: root.to_string(),
                message: message.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeType {
    Created,
    Changed,
    Renamed { from: String },
    Deleted,
    Error(WatchFailure),
}

/// One change notification. For renames `path` is the new path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub path: String,
    pub change: ChangeType,
}

impl ChangeEvent {
    pub fn created(path: impl Into<String>) -> Self {
        Self::new(path, ChangeType::Created)
    }

    pub fn changed(path: impl Into<String>) -> Self {
        Self::new(path, ChangeType::Changed)
    }

    pub fn deleted(path: impl Into<String>) -> Self {
        Self::new(path, ChangeType::Deleted)
    }

    pub fn renamed(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self::new(to, ChangeType::Renamed { from: from.into() })
    }

    fn new(path: impl Into<String>, change: ChangeType) -> Self {
        Self {
            path: path.into(),
            change,
        }
    }
}

/// What applying one event did to the listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    /// `(from, to)` pairs replaced in place.
    pub renamed: Vec<(String, String)>,
    /// Items whose attributes and icon must be (re)loaded.
    pub refresh: Vec<String>,
    pub failure: Option<WatchFailure>,
}

impl ReconcileOutcome {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Reconciler for a single watched root within one generation.
#[derive(Debug, Clone)]
pub struct ChangeWatcherReconciler {
    generation: Generation,
    root: String,
}

impl ChangeWatcherReconciler {
    pub fn new(generation: Generation, root: impl Into<String>) -> Self {
        Self {
            generation,
            root: root.into(),
        }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn generation(&self) -> &Generation {
        &self.generation
    }

    /// Events tagged with an older generation are dropped.
    pub fn accepts(&self, generation: u64) -> bool {
        generation == self.generation.id() && self.generation.is_current()
    }

    /// Path to probe before `apply` can run, if any.
    pub fn probe_target<'a>(&self, event: &'a ChangeEvent) -> Option<&'a str> {
        match event.change {
            ChangeType::Created | ChangeType::Renamed { .. } => Some(&event.path),
            _ => None,
        }
    }

    /// Apply one event. `probed` is the fresh entry for `probe_target`.
    pub fn apply(&self, listing: &mut Listing, event: &ChangeEvent, probed: Option<ListItem>) -> ReconcileOutcome {
        let mut outcome = ReconcileOutcome::default();
        match &event.change {
            ChangeType::Created => {
                if listing.contains(&event.path) {
                    // Duplicate creation is a change.
                    outcome.refresh.push(event.path.clone());
                } else if let Some(item) = probed {
                    listing.push(item);
                    outcome.added.push(event.path.clone());
                    outcome.refresh.push(event.path.clone());
                } else {
                    log::debug!("Created entry vanished before it could be listed: {}", event.path);
                }
            }
            ChangeType::Changed => {
                if listing.contains(&event.path) {
                    outcome.refresh.push(event.path.clone());
                }
            }
            ChangeType::Renamed { from } => self.apply_rename(listing, from, &event.path, probed, &mut outcome),
            ChangeType::Deleted => {
                if listing.remove(&event.path).is_some() {
                    outcome.removed.push(event.path.clone());
                }
            }
            ChangeType::Error(failure) => {
                outcome.failure = Some(failure.clone());
            }
        }
        outcome
    }

    fn apply_rename(
        &self,
        listing: &mut Listing,
        from: &str,
        to: &str,
        probed: Option<ListItem>,
        outcome: &mut ReconcileOutcome,
    ) {
        let Some(item) = probed else {
            // Renamed away again before the probe ran.
            if listing.remove(from).is_some() {
                outcome.removed.push(from.to_string());
            }
            return;
        };

        if from != to && listing.contains(to) && listing.contains(from) {
            // The target already shows up separately; keep the old slot.
            listing.remove(to);
            outcome.removed.push(to.to_string());
        }

        match listing.position(from) {
            Some(index) => {
                listing.replace_at(index, item);
                outcome.renamed.push((from.to_string(), to.to_string()));
                outcome.refresh.push(to.to_string());
            }
            None if listing.contains(to) => outcome.refresh.push(to.to_string()),
            None => {
                listing.push(item);
                outcome.added.push(to.to_string());
                outcome.refresh.push(to.to_string());
            }
        }
    }
}
