use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::paths;

/// What kind of location the view is showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LocationKind {
    Home,
    Drive,
    LocalFolder,
    LocalFile,
    SearchResult,
}

/// A navigable location. Built once per successful navigation and replaced,
/// never mutated, by the next one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum FolderDescriptor {
    Home,
    Drive {
        full_path: String,
        label: Option<String>,
        is_readonly: bool,
    },
    LocalFolder {
        full_path: String,
        is_readonly: bool,
    },
    LocalFile {
        full_path: String,
    },
    SearchResult {
        query: String,
        scope: Option<String>,
    },
}

impl FolderDescriptor {
    pub fn drive(full_path: impl Into<String>, label: Option<String>) -> Self {
        FolderDescriptor::Drive {
            full_path: full_path.into(),
            label,
            is_readonly: false,
        }
    }

    pub fn local_folder(full_path: impl Into<String>) -> Self {
        FolderDescriptor::LocalFolder {
            full_path: full_path.into(),
            is_readonly: false,
        }
    }

    pub fn kind(&self) -> LocationKind {
        match self {
            FolderDescriptor::Home => LocationKind::Home,
            FolderDescriptor::Drive { .. } => LocationKind::Drive,
            FolderDescriptor::LocalFolder { .. } => LocationKind::LocalFolder,
            FolderDescriptor::LocalFile { .. } => LocationKind::LocalFile,
            FolderDescriptor::SearchResult { .. } => LocationKind::SearchResult,
        }
    }

    /// Home has an empty path; a search result reports its scope.
    pub fn full_path(&self) -> &str {
        match self {
            FolderDescriptor::Home => "",
            FolderDescriptor::Drive { full_path, .. }
            | FolderDescriptor::LocalFolder { full_path, .. }
            | FolderDescriptor::LocalFile { full_path } => full_path,
            FolderDescriptor::SearchResult { scope, .. } => scope.as_deref().unwrap_or(""),
        }
    }

    pub fn is_virtual(&self) -> bool {
        matches!(self, FolderDescriptor::Home | FolderDescriptor::SearchResult { .. })
    }

    pub fn is_readonly(&self) -> bool {
        match self {
            FolderDescriptor::Drive { is_readonly, .. } | FolderDescriptor::LocalFolder { is_readonly, .. } => {
                *is_readonly
            }
            FolderDescriptor::LocalFile { .. } => false,
            FolderDescriptor::Home | FolderDescriptor::SearchResult { .. } => true,
        }
    }

    pub fn display_text(&self) -> String {
        match self {
            FolderDescriptor::Home => "Home".to_string(),
            FolderDescriptor::Drive { full_path, label, .. } => match label {
                Some(label) if !label.is_empty() => format!("{} ({})", label, full_path),
                _ => full_path.clone(),
            },
            FolderDescriptor::LocalFolder { full_path, .. } | FolderDescriptor::LocalFile { full_path } => {
                let name = paths::file_name(full_path);
                if name.is_empty() {
                    full_path.clone()
                } else {
                    name.to_string()
                }
            }
            FolderDescriptor::SearchResult { query, .. } => format!("Search: {}", query),
        }
    }

    /// Folder-like locations can be enumerated.
    pub fn is_folder(&self) -> bool {
        !matches!(self, FolderDescriptor::LocalFile { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemKind {
    File,
    Folder,
    Drive,
}

/// Attributes loaded in the background after an item is listed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemAttributes {
    pub file_size: Option<u64>,
    pub modified: Option<DateTime<Utc>>,
    pub created: Option<DateTime<Utc>>,
    pub is_hidden: bool,
    pub is_readonly: bool,
    /// Only known for folders.
    pub is_empty_folder: Option<bool>,
}

/// One entry of the listing. Identity is the full path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListItem {
    pub name: String,
    pub full_path: String,
    pub kind: ItemKind,
    pub file_size: Option<u64>,
    pub attributes: Option<ItemAttributes>,
    #[serde(skip)]
    pub icon: Option<IconRef>,
}

impl ListItem {
    pub fn new(full_path: impl Into<String>, kind: ItemKind) -> Self {
        let full_path = full_path.into();
        let name = match paths::file_name(&full_path) {
            "" => full_path.clone(),
            name => name.to_string(),
        };
        Self {
            name,
            full_path,
            kind,
            file_size: None,
            attributes: None,
            icon: None,
        }
    }

    pub fn file(full_path: impl Into<String>, file_size: u64) -> Self {
        let mut item = Self::new(full_path, ItemKind::File);
        item.file_size = Some(file_size);
        item
    }

    pub fn folder(full_path: impl Into<String>) -> Self {
        Self::new(full_path, ItemKind::Folder)
    }

    pub fn drive(full_path: impl Into<String>) -> Self {
        Self::new(full_path, ItemKind::Drive)
    }

    pub fn is_folder(&self) -> bool {
        matches!(self.kind, ItemKind::Folder | ItemKind::Drive)
    }

    pub fn attributes_loaded(&self) -> bool {
        self.attributes.is_some()
    }

    pub fn apply_attributes(&mut self, attributes: ItemAttributes) {
        if !self.is_folder() {
            if let Some(size) = attributes.file_size {
                self.file_size = Some(size);
            }
        }
        self.attributes = Some(attributes);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IconSize {
    Small,
    /// Large icons and thumbnails.
    Large,
}

/// Built-in icons used when nothing better is available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GenericIcon {
    Computer,
    Drive,
    Folder,
    EmptyFolder,
    UnknownFile,
}

/// Icon payload produced by an icon provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IconImage {
    /// A themed icon name, resolved by the presentation layer.
    Named { name: String, size: u32 },
    Bitmap { width: u32, height: u32, rgba: Vec<u8> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IconRef {
    Generic(GenericIcon),
    Image(Arc<IconImage>),
}

impl IconRef {
    /// What every failed icon lookup degrades to.
    pub fn fallback() -> Self {
        IconRef::Generic(GenericIcon::UnknownFile)
    }

    pub fn is_fallback(&self) -> bool {
        *self == Self::fallback()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ViewType {
    LargeIcons,
    MediumIcons,
    SmallIcons,
    List,
    Details,
    Tiles,
    Content,
}

impl ViewType {
    /// Item cell size; a width of 0 fills the row.
    pub fn item_size(self) -> (f64, f64) {
        match self {
            ViewType::LargeIcons => (180.0, 240.0),
            ViewType::MediumIcons => (120.0, 170.0),
            ViewType::SmallIcons => (80.0, 130.0),
            ViewType::List => (260.0, 30.0),
            ViewType::Details => (0.0, 30.0),
            ViewType::Tiles => (280.0, 70.0),
            ViewType::Content => (0.0, 70.0),
        }
    }

    pub fn uses_large_icons(self) -> bool {
        matches!(
            self,
            ViewType::LargeIcons | ViewType::MediumIcons | ViewType::SmallIcons | ViewType::Tiles | ViewType::Content
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortKey {
    Name,
    DateModified,
    Type,
    FileSize,
}

/// Per-folder presentation settings, persisted by the view-settings store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewSettings {
    pub view_type: ViewType,
    pub sort_by: SortKey,
    pub ascending: bool,
    pub group_by: Option<SortKey>,
    pub item_size: (f64, f64),
}

impl Default for ViewSettings {
    fn default() -> Self {
        Self {
            view_type: ViewType::Details,
            sort_by: SortKey::Name,
            ascending: true,
            group_by: None,
            item_size: ViewType::Details.item_size(),
        }
    }
}

/// A single change requested through "switch view".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViewChange {
    ViewType(ViewType),
    SortBy(SortKey),
    Ascending(bool),
    GroupBy(Option<SortKey>),
}

impl ViewSettings {
    pub fn uses_large_icons(&self) -> bool {
        self.view_type.uses_large_icons()
    }

    pub fn icon_size(&self) -> IconSize {
        if self.uses_large_icons() {
            IconSize::Large
        } else {
            IconSize::Small
        }
    }

    pub fn apply(&mut self, change: ViewChange) {
        match change {
            ViewChange::ViewType(view_type) => {
                self.view_type = view_type;
                self.item_size = view_type.item_size();
            }
            ViewChange::SortBy(key) => self.sort_by = key,
            ViewChange::Ascending(ascending) => self.ascending = ascending,
            ViewChange::GroupBy(key) => self.group_by = key,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_attributes() {
        let home = FolderDescriptor::Home;
        assert!(home.is_virtual());
        assert_eq!(home.full_path(), "");
        assert_eq!(home.kind(), LocationKind::Home);

        let folder = FolderDescriptor::local_folder("C:\\Users\\me");
        assert!(!folder.is_virtual());
        assert_eq!(folder.display_text(), "me");
        assert_eq!(folder.full_path(), "C:\\Users\\me");

        let drive = FolderDescriptor::drive("D:\\", Some("Data".to_string()));
        assert_eq!(drive.display_text(), "Data (D:\\)");

        let search = FolderDescriptor::SearchResult {
            query: "report".to_string(),
            scope: Some("C:\\Docs".to_string()),
        };
        assert!(search.is_virtual());
        assert_eq!(search.full_path(), "C:\\Docs");
        assert!(!FolderDescriptor::LocalFile { full_path: "/a.txt".into() }.is_folder());
    }

    #[test]
    fn test_list_item_names() {
        let item = ListItem::file("/tmp/notes.txt", 12);
        assert_eq!(item.name, "notes.txt");
        assert!(!item.is_folder());
        assert!(!item.attributes_loaded());

        let drive = ListItem::drive("C:\\");
        assert_eq!(drive.name, "C:");
        assert!(drive.is_folder());
    }

    #[test]
    fn test_apply_attributes_updates_file_size() {
        let mut item = ListItem::file("/tmp/a.bin", 1);
        item.apply_attributes(ItemAttributes {
            file_size: Some(42),
            ..ItemAttributes::default()
        });
        assert_eq!(item.file_size, Some(42));
        assert!(item.attributes_loaded());
    }

    #[test]
    fn test_view_settings_changes() {
        let mut settings = ViewSettings::default();
        assert_eq!(settings.icon_size(), IconSize::Small);

        settings.apply(ViewChange::ViewType(ViewType::Tiles));
        assert!(settings.uses_large_icons());
        assert_eq!(settings.item_size, (280.0, 70.0));

        settings.apply(ViewChange::Ascending(false));
        settings.apply(ViewChange::GroupBy(Some(SortKey::Type)));
        assert!(!settings.ascending);
        assert_eq!(settings.group_by, Some(SortKey::Type));
    }
}
