//! Collaborators backed by the local machine.

mod fs;
mod icons;
mod search;
mod settings;
mod watcher;

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::services::Services;

pub use fs::{sort_items, LocalFileSystem};
pub use icons::ThemeIconProvider;
pub use search::{find_matches, LocalSearchService};
pub use settings::JsonViewSettingsStore;
pub use watcher::{translate, NotifyChangeWatcher};

/// The full local stack. Global searches walk `$HOME` when it is set.
pub fn local_services(config: &EngineConfig) -> Services {
    let filesystem = Arc::new(LocalFileSystem::new());
    let settings = match &config.view_settings_file {
        Some(file) => JsonViewSettingsStore::open(file),
        None => JsonViewSettingsStore::in_memory(),
    };
    let search_root = std::env::var_os("HOME").map(PathBuf::from);
    Services {
        resolver: filesystem.clone(),
        enumerator: filesystem,
        watcher: Arc::new(NotifyChangeWatcher::new()),
        settings: Arc::new(settings),
        search: Arc::new(LocalSearchService::new(search_root)),
        icons: Arc::new(ThemeIconProvider::new()),
    }
}
