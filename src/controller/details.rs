use tokio_util::sync::CancellationToken;

use super::engine::Engine;
use super::{JobResult, ViewEvent};
use crate::icons::IconCacheService;
use crate::model::{FolderDescriptor, IconRef, IconSize, ItemAttributes, ListItem, ViewChange};
use crate::services::Enumerator;

impl Engine {
    /// Load attributes (and icons when `load_icons`) for `items`, split
    /// across the configured number of background jobs.
    pub(super) fn schedule_details(&mut self, items: Vec<ListItem>, load_icons: bool) {
        if items.is_empty() {
            return;
        }
        let workers = self.config.worker_count().clamp(1, items.len());
        let chunk_size = items.len().div_ceil(workers);
        let size = self.settings.icon_size();

        for chunk in items.chunks(chunk_size) {
            let chunk = chunk.to_vec();
            let generation = self.current().clone();
            let enumerator = self.services.enumerator.clone();
            let icons = self.icons.clone();
            self.detail_jobs += 1;
            self.spawn_job(move |jobs| {
                for item in chunk {
                    if !generation.is_current() {
                        return;
                    }
                    let path = item.full_path.clone();
                    let (attributes, icon) = load_details(enumerator.as_ref(), &icons, item, size, load_icons);
                    let sent = jobs.send(JobResult::Details {
                        generation: generation.id(),
                        path,
                        attributes,
                        icon,
                    });
                    if !sent {
                        return;
                    }
                }
            });
        }
        log::debug!(
            "🕐 Scheduled details for {} items in {} jobs (icons: {})",
            items.len(),
            workers,
            load_icons
        );
    }

    pub(super) fn on_details(
        &mut self,
        generation: u64,
        path: &str,
        attributes: Option<ItemAttributes>,
        icon: Option<IconRef>,
    ) {
        if !self.is_current(generation) {
            return;
        }
        let Some(item) = self.listing.get_mut(path) else {
            return;
        };
        if let Some(attributes) = attributes {
            item.apply_attributes(attributes);
        }
        if let Some(icon) = icon {
            item.icon = Some(icon);
        }
        self.emit(ViewEvent::ItemUpdated(path.to_string()));
    }

    /// Icons for listed items that don't have one yet, typically the ones
    /// scrolled into view when the listing was too large to preload.
    pub(super) fn request_icons(&mut self, paths: &[String]) {
        let items: Vec<ListItem> = paths
            .iter()
            .filter_map(|path| self.listing.get(path))
            .filter(|item| item.icon.is_none())
            .cloned()
            .collect();
        if items.is_empty() {
            return;
        }
        let generation = self.current().clone();
        let icons = self.icons.clone();
        let size = self.settings.icon_size();
        self.spawn_job(move |jobs| {
            for item in items {
                if !generation.is_current() {
                    return;
                }
                let icon = icons.icon_for(&item, size);
                jobs.send(JobResult::Details {
                    generation: generation.id(),
                    path: item.full_path,
                    attributes: None,
                    icon: Some(icon),
                });
            }
        });
    }

    /// Apply a view change, persist it best-effort and reload icons when the
    /// icon size flipped.
    pub(super) fn switch_view(&mut self, change: ViewChange) {
        let had_large_icons = self.settings.uses_large_icons();
        self.settings.apply(change);
        self.emit(ViewEvent::SettingsChanged(self.settings.clone()));

        let location = self.location();
        if !matches!(location, FolderDescriptor::SearchResult { .. }) {
            let key = self.settings_key(&location);
            let settings = self.settings.clone();
            let store = self.services.settings.clone();
            self.spawn_job(move |_| {
                if let Err(e) = store.save(&key, &settings) {
                    log::warn!("Failed to save view settings for {}: {}", key, e);
                }
            });
        }

        let is_local = matches!(
            location,
            FolderDescriptor::LocalFolder { .. } | FolderDescriptor::Drive { .. }
        );
        if had_large_icons != self.settings.uses_large_icons() && is_local {
            let token = self.icons.begin_batch();
            let items: Vec<ListItem> = self.listing.items().iter().filter(|i| !i.is_folder()).cloned().collect();
            let generation = self.current().id();
            let icons = self.icons.clone();
            let size = self.settings.icon_size();
            log::debug!("🖼️  Reloading {} icons at {:?} size", items.len(), size);
            self.spawn_job(move |jobs| {
                if let Some(loaded) = icons.load_batch(&items, size, &token) {
                    jobs.send(JobResult::IconBatch {
                        generation,
                        token,
                        icons: loaded,
                    });
                }
            });
        }
    }

    pub(super) fn on_icon_batch(&mut self, generation: u64, token: &CancellationToken, icons: Vec<(String, IconRef)>) {
        if !self.is_current(generation) || token.is_cancelled() {
            return;
        }
        for (path, icon) in icons {
            if let Some(item) = self.listing.get_mut(&path) {
                item.icon = Some(icon);
                self.emit(ViewEvent::ItemUpdated(path));
            }
        }
    }
}

fn load_details(
    enumerator: &dyn Enumerator,
    icons: &IconCacheService,
    mut item: ListItem,
    size: IconSize,
    load_icons: bool,
) -> (Option<ItemAttributes>, Option<IconRef>) {
    match enumerator.load_attributes(&item) {
        Ok(attributes) => {
            item.apply_attributes(attributes.clone());
            let icon = load_icons.then(|| icons.icon_for(&item, size));
            (Some(attributes), icon)
        }
        Err(e) => {
            log::warn!("Failed to load details for {}: {}", item.full_path, e);
            (None, Some(IconRef::fallback()))
        }
    }
}
