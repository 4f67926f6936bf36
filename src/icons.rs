//! Icon caching.
//!
//! Icons that only depend on a file's type are cached by lower-cased
//! extension, icons that depend on the file itself by full path. Thumbnails
//! are never cached. The caches live for the whole process and are not
//! evicted.

use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::config::IconConfig;
use crate::model::{FolderDescriptor, GenericIcon, IconRef, IconSize, ItemKind, ListItem};
use crate::paths;
use crate::services::IconProvider;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IconKey {
    /// Per-type icon, keyed by lower-cased extension.
    Class(String),
    /// Per-file icon, keyed by full path.
    Instance(String),
}

pub struct IconCacheService {
    provider: Arc<dyn IconProvider>,
    small: Mutex<HashMap<IconKey, IconRef>>,
    large: Mutex<HashMap<IconKey, IconRef>>,
    thumbnail_extensions: HashSet<String>,
    instance_extensions: HashSet<String>,
    thumbnail_size: u32,
    batch: Mutex<CancellationToken>,
}

impl IconCacheService {
    pub fn new(provider: Arc<dyn IconProvider>, config: &IconConfig) -> Self {
        let lower = |list: &[String]| list.iter().map(|e| e.to_lowercase()).collect::<HashSet<_>>();
        Self {
            provider,
            small: Mutex::new(HashMap::new()),
            large: Mutex::new(HashMap::new()),
            thumbnail_extensions: lower(&config.thumbnail_extensions),
            instance_extensions: lower(&config.instance_extensions),
            thumbnail_size: config.thumbnail_size,
            batch: Mutex::new(CancellationToken::new()),
        }
    }

    /// Cache key for a file, `None` when it has no extension.
    pub fn key_for(&self, full_path: &str) -> Option<IconKey> {
        let extension = paths::extension(full_path)?;
        if self.instance_extensions.contains(&extension) {
            Some(IconKey::Instance(full_path.to_string()))
        } else {
            Some(IconKey::Class(extension))
        }
    }

    pub fn is_thumbnail_type(&self, full_path: &str) -> bool {
        paths::extension(full_path).is_some_and(|e| self.thumbnail_extensions.contains(&e))
    }

    /// Icon for one listed item. Never fails; lookups that go wrong degrade
    /// to the fallback icon and are not cached.
    pub fn icon_for(&self, item: &ListItem, size: IconSize) -> IconRef {
        match item.kind {
            ItemKind::Folder => {
                let empty = item.attributes.as_ref().and_then(|a| a.is_empty_folder) == Some(true);
                IconRef::Generic(if empty { GenericIcon::EmptyFolder } else { GenericIcon::Folder })
            }
            ItemKind::Drive => self.cached(IconKey::Instance(item.full_path.clone()), size, GenericIcon::Drive),
            ItemKind::File => self.file_icon(&item.full_path, size),
        }
    }

    /// Icon shown for the location itself.
    pub fn folder_icon(&self, folder: &FolderDescriptor, size: IconSize) -> IconRef {
        match folder {
            FolderDescriptor::Home => IconRef::Generic(GenericIcon::Computer),
            FolderDescriptor::Drive { full_path, .. } => {
                self.cached(IconKey::Instance(full_path.clone()), size, GenericIcon::Drive)
            }
            FolderDescriptor::LocalFolder { .. } | FolderDescriptor::SearchResult { .. } => {
                IconRef::Generic(GenericIcon::Folder)
            }
            FolderDescriptor::LocalFile { full_path } => self.file_icon(full_path, size),
        }
    }

    fn file_icon(&self, full_path: &str, size: IconSize) -> IconRef {
        if size == IconSize::Large && self.is_thumbnail_type(full_path) {
            return self.thumbnail(full_path);
        }
        match self.key_for(full_path) {
            Some(key) => self.cached(key, size, GenericIcon::UnknownFile),
            None => IconRef::Generic(GenericIcon::UnknownFile),
        }
    }

    fn thumbnail(&self, full_path: &str) -> IconRef {
        match self.provider.thumbnail(full_path, self.thumbnail_size) {
            Ok(image) => IconRef::Image(Arc::new(image)),
            Err(e) => {
                log::debug!("No thumbnail for {}: {}", full_path, e);
                match self.provider.large_icon(&IconKey::Instance(full_path.to_string())) {
                    Ok(image) => IconRef::Image(Arc::new(image)),
                    Err(e) => {
                        log::warn!("Failed to load icon for {}: {}", full_path, e);
                        IconRef::fallback()
                    }
                }
            }
        }
    }

    fn cached(&self, key: IconKey, size: IconSize, fallback: GenericIcon) -> IconRef {
        let cache = match size {
            IconSize::Small => &self.small,
            IconSize::Large => &self.large,
        };
        if let Some(icon) = cache.lock().get(&key) {
            return icon.clone();
        }

        // The provider may be slow; don't hold the lock across it.
        let loaded = match size {
            IconSize::Small => self.provider.small_icon(&key),
            IconSize::Large => self.provider.large_icon(&key),
        };
        match loaded {
            Ok(image) => {
                let icon = IconRef::Image(Arc::new(image));
                cache.lock().entry(key).or_insert(icon).clone()
            }
            Err(e) => {
                log::warn!("Failed to load {:?} icon for {:?}: {}", size, key, e);
                if fallback == GenericIcon::UnknownFile {
                    IconRef::fallback()
                } else {
                    IconRef::Generic(fallback)
                }
            }
        }
    }

    /// Start a new bulk icon batch, cancelling the previous one.
    pub fn begin_batch(&self) -> CancellationToken {
        let token = CancellationToken::new();
        let previous = std::mem::replace(&mut *self.batch.lock(), token.clone());
        previous.cancel();
        token
    }

    pub fn cancel_batch(&self) {
        self.batch.lock().cancel();
    }

    /// Icons for `items`, or `None` if the batch was cancelled part-way.
    pub fn load_batch(
        &self,
        items: &[ListItem],
        size: IconSize,
        token: &CancellationToken,
    ) -> Option<Vec<(String, IconRef)>> {
        let mut icons = Vec::with_capacity(items.len());
        for item in items {
            if token.is_cancelled() {
                log::debug!("Icon batch cancelled after {} of {} items", icons.len(), items.len());
                return None;
            }
            icons.push((item.full_path.clone(), self.icon_for(item, size)));
        }
        Some(icons)
    }

    pub fn cached_count(&self, size: IconSize) -> usize {
        match size {
            IconSize::Small => self.small.lock().len(),
            IconSize::Large => self.large.lock().len(),
        }
    }

    /// Cancel outstanding batches at shutdown.
    pub fn teardown(&self) {
        self.cancel_batch();
        log::debug!(
            "Icon caches at shutdown: {} small, {} large",
            self.cached_count(IconSize::Small),
            self.cached_count(IconSize::Large)
        );
    }
}
