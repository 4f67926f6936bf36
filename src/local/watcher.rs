use notify::event::{ModifyKind, RenameMode};
use notify::{recommended_watcher, Event, EventKind, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};

use crate::error::{Result, ViewError};
use crate::reconcile::{ChangeEvent, ChangeType, WatchFailure};
use crate::services::{ChangeSink, ChangeWatcher, WatchSubscription};

/// Non-recursive watches through the platform's recommended `notify` backend.
#[derive(Debug, Clone, Default)]
pub struct NotifyChangeWatcher;

impl NotifyChangeWatcher {
    pub fn new() -> Self {
        Self
    }
}

impl ChangeWatcher for NotifyChangeWatcher {
    fn watch(&self, path: &str, sink: ChangeSink) -> Result<Box<dyn WatchSubscription>> {
        let root = PathBuf::from(path);
        let handler_root = root.clone();
        let mut watcher = recommended_watcher(move |result: notify::Result<Event>| match result {
            Ok(event) => {
                for change in translate(&handler_root, &event) {
                    if !sink.send(change) {
                        return;
                    }
                }
            }
            Err(error) => {
                if handler_root.exists() {
                    sink.error(error.to_string());
                } else {
                    sink.root_lost();
                }
            }
        })
        .map_err(|e| ViewError::Generic(format!("failed to create watcher for {}: {}", path, e)))?;

        watcher
            .watch(&root, RecursiveMode::NonRecursive)
            .map_err(|e| ViewError::Generic(format!("failed to watch {}: {}", path, e)))?;
        Ok(Box::new(watcher))
    }
}

fn text(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn root_lost(root: &Path) -> ChangeEvent {
    ChangeEvent {
        path: text(root),
        change: ChangeType::Error(WatchFailure::RootLost),
    }
}

/// Map one `notify` event onto change notifications for the watched root.
pub fn translate(root: &Path, event: &Event) -> Vec<ChangeEvent> {
    let for_each = |f: &dyn Fn(&Path) -> Option<ChangeEvent>| -> Vec<ChangeEvent> {
        event.paths.iter().filter_map(|p| f(p)).collect()
    };
    let gone = |p: &Path| {
        Some(if p == root {
            root_lost(root)
        } else {
            ChangeEvent::deleted(text(p))
        })
    };

    match &event.kind {
        EventKind::Access(_) => Vec::new(),
        EventKind::Create(_) => for_each(&|p| (p != root).then(|| ChangeEvent::created(text(p)))),
        EventKind::Remove(_) => for_each(&gone),
        EventKind::Modify(ModifyKind::Name(mode)) => match mode {
            RenameMode::Both if event.paths.len() >= 2 => {
                let (from, to) = (&event.paths[0], &event.paths[1]);
                if from == root {
                    vec![root_lost(root)]
                } else {
                    vec![ChangeEvent::renamed(text(from), text(to))]
                }
            }
            RenameMode::From => for_each(&gone),
            RenameMode::To => for_each(&|p| (p != root).then(|| ChangeEvent::created(text(p)))),
            // Only one side is known; look at the filesystem to tell which.
            _ => for_each(&|p| {
                if p.exists() {
                    (p != root).then(|| ChangeEvent::created(text(p)))
                } else {
                    gone(p)
                }
            }),
        },
        EventKind::Modify(_) | EventKind::Any | EventKind::Other => {
            for_each(&|p| (p != root).then(|| ChangeEvent::changed(text(p))))
        }
    }
}
