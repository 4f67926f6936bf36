use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::fs;
use std::io;
use std::path::Path;

use crate::error::{Result, ViewError};
use crate::generation::Generation;
use crate::model::{FolderDescriptor, ItemAttributes, ItemKind, ListItem};
use crate::paths;
use crate::services::{Enumeration, Enumerator, FolderResolver};

/// Resolver and enumerator backed by `std::fs`.
#[derive(Debug, Clone, Default)]
pub struct LocalFileSystem;

impl LocalFileSystem {
    pub fn new() -> Self {
        Self
    }

    /// What Home lists: drive letters on Windows, otherwise the filesystem
    /// root and the user's home folder.
    fn home_items() -> Vec<ListItem> {
        if cfg!(windows) {
            ('A'..='Z')
                .map(|letter| format!("{}:\\", letter))
                .filter(|root| Path::new(root).exists())
                .map(ListItem::drive)
                .collect()
        } else {
            let mut items = vec![ListItem::drive("/")];
            if let Some(home) = std::env::var_os("HOME") {
                let home = home.to_string_lossy().into_owned();
                if !home.is_empty() && !paths::is_root(&home) {
                    items.push(ListItem::folder(home));
                }
            }
            items
        }
    }

    fn item_for(full_path: String, metadata: &fs::Metadata) -> ListItem {
        if metadata.is_dir() {
            ListItem::folder(full_path)
        } else {
            ListItem::file(full_path, metadata.len())
        }
    }

    fn read_folder(&self, folder: &str, generation: &Generation) -> Result<Vec<ListItem>> {
        let entries = fs::read_dir(folder).map_err(|e| ViewError::from_io(e, folder))?;
        let mut items = Vec::new();
        for entry in entries {
            generation.check()?;
            let entry = entry.map_err(|e| ViewError::TransientIo {
                path: folder.to_string(),
                message: e.to_string(),
            })?;
            let full_path = paths::join(folder, &entry.file_name().to_string_lossy());
            // Follow symlinks; a dangling one is listed as a file.
            let metadata = match fs::metadata(entry.path()) {
                Ok(metadata) => metadata,
                Err(_) => match entry.metadata() {
                    Ok(metadata) => metadata,
                    Err(e) => {
                        log::debug!("Skipping {}: {}", full_path, e);
                        continue;
                    }
                },
            };
            items.push(Self::item_for(full_path, &metadata));
        }
        Ok(items)
    }
}

/// Folders first, then case-insensitive by name.
pub fn sort_items(items: &mut [ListItem]) {
    items.sort_by(|a, b| match (a.is_folder(), b.is_folder()) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
    });
}

impl FolderResolver for LocalFileSystem {
    fn resolve(&self, path: &str) -> Result<FolderDescriptor> {
        let path = paths::normalize(path);
        if path.is_empty() {
            return Ok(FolderDescriptor::Home);
        }
        if paths::is_root(&path) {
            return if Path::new(&path).exists() {
                Ok(FolderDescriptor::drive(path, None))
            } else {
                Err(ViewError::NotFound(path))
            };
        }
        if !Path::new(&path).is_absolute() {
            return Err(ViewError::InvalidPath(path));
        }

        let metadata = fs::metadata(&path).map_err(|e| ViewError::from_io(e, &path))?;
        if metadata.is_dir() {
            Ok(FolderDescriptor::LocalFolder {
                is_readonly: metadata.permissions().readonly(),
                full_path: path,
            })
        } else if metadata.is_file() {
            Ok(FolderDescriptor::LocalFile { full_path: path })
        } else {
            Err(ViewError::InvalidPath(path))
        }
    }

    fn exists(&self, path: &str) -> bool {
        !path.is_empty() && Path::new(path).exists()
    }
}

impl Enumerator for LocalFileSystem {
    fn enumerate(
        &self,
        folder: &FolderDescriptor,
        selection_hint: Option<&str>,
        generation: &Generation,
    ) -> Result<Enumeration> {
        let mut items = match folder {
            FolderDescriptor::Home => Self::home_items(),
            FolderDescriptor::Drive { full_path, .. } | FolderDescriptor::LocalFolder { full_path, .. } => {
                self.read_folder(full_path, generation)?
            }
            FolderDescriptor::LocalFile { full_path } => return Err(ViewError::InvalidPath(full_path.clone())),
            FolderDescriptor::SearchResult { .. } => Vec::new(),
        };
        generation.check()?;
        sort_items(&mut items);

        let selected = selection_hint
            .and_then(|hint| items.iter().find(|item| item.full_path == hint))
            .map(|item| item.full_path.clone());
        Ok(Enumeration { items, selected })
    }

    fn probe(&self, full_path: &str) -> Result<Option<ListItem>> {
        match fs::metadata(full_path) {
            Ok(metadata) => Ok(Some(Self::item_for(full_path.to_string(), &metadata))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ViewError::from_io(e, full_path)),
        }
    }

    fn load_attributes(&self, item: &ListItem) -> Result<ItemAttributes> {
        let metadata = fs::metadata(&item.full_path).map_err(|e| ViewError::from_io(e, &item.full_path))?;
        let is_empty_folder = if metadata.is_dir() {
            match fs::read_dir(&item.full_path) {
                Ok(mut entries) => Some(entries.next().is_none()),
                Err(_) => None,
            }
        } else {
            None
        };
        Ok(ItemAttributes {
            file_size: (item.kind == ItemKind::File).then(|| metadata.len()),
            modified: metadata.modified().ok().map(DateTime::<Utc>::from),
            created: metadata.created().ok().map(DateTime::<Utc>::from),
            is_hidden: item.name.starts_with('.'),
            is_readonly: metadata.permissions().readonly(),
            is_empty_folder,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::GenerationCounter;
    use assert_matches::assert_matches;
    use tempfile::TempDir;

    fn fixture() -> (TempDir, String) {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("beta")).unwrap();
        fs::create_dir(dir.path().join("Alpha")).unwrap();
        fs::write(dir.path().join("notes.txt"), b"hello").unwrap();
        fs::write(dir.path().join("a.rs"), b"fn main() {}").unwrap();
        let root = dir.path().to_string_lossy().into_owned();
        (dir, root)
    }

    #[test]
    fn test_resolve_kinds() {
        let (_dir, root) = fixture();
        let fs = LocalFileSystem::new();

        assert_matches!(fs.resolve(&root), Ok(FolderDescriptor::LocalFolder { .. }));
        assert_matches!(
            fs.resolve(&format!("{}/notes.txt", root)),
            Ok(FolderDescriptor::LocalFile { .. })
        );
        assert_matches!(fs.resolve(&format!("{}/missing", root)), Err(ViewError::NotFound(_)));
        assert_matches!(fs.resolve("relative/path"), Err(ViewError::InvalidPath(_)));
        assert_matches!(fs.resolve("   "), Ok(FolderDescriptor::Home));
    }

    #[test]
    fn test_enumerate_sorts_and_selects() {
        let (_dir, root) = fixture();
        let fs = LocalFileSystem::new();
        let mut counter = GenerationCounter::new();
        let generation = counter.advance();
        let folder = fs.resolve(&root).unwrap();
        let hint = paths::join(&root, "notes.txt");

        let listing = fs.enumerate(&folder, Some(&hint), &generation).unwrap();
        let names: Vec<_> = listing.items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["Alpha", "beta", "a.rs", "notes.txt"]);
        assert_eq!(listing.selected, Some(hint));
    }

    #[test]
    fn test_enumerate_stale_generation_is_cancelled() {
        let (_dir, root) = fixture();
        let fs = LocalFileSystem::new();
        let mut counter = GenerationCounter::new();
        let generation = counter.advance();
        counter.advance();
        let folder = fs.resolve(&root).unwrap();
        assert_matches!(fs.enumerate(&folder, None, &generation), Err(ViewError::Cancelled));
    }

    #[test]
    fn test_probe_and_attributes() {
        let (_dir, root) = fixture();
        let fs = LocalFileSystem::new();

        let file = fs.probe(&paths::join(&root, "notes.txt")).unwrap().unwrap();
        assert_eq!(file.file_size, Some(5));
        assert!(fs.probe(&paths::join(&root, "nope")).unwrap().is_none());

        let folder = fs.probe(&paths::join(&root, "beta")).unwrap().unwrap();
        let attributes = fs.load_attributes(&folder).unwrap();
        assert_eq!(attributes.is_empty_folder, Some(true));
        assert_eq!(attributes.file_size, None);
        assert!(attributes.modified.is_some());
    }
}
