use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::model::ViewSettings;
use crate::services::ViewSettingsStore;

/// View settings kept in memory and, when backed by a file, written out as
/// pretty JSON after every save.
#[derive(Debug, Default)]
pub struct JsonViewSettingsStore {
    file: Option<PathBuf>,
    entries: Mutex<HashMap<String, ViewSettings>>,
}

impl JsonViewSettingsStore {
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Open `file`, starting empty when it is missing or unreadable.
    pub fn open<P: AsRef<Path>>(file: P) -> Self {
        let file = file.as_ref().to_path_buf();
        let entries = match fs::read_to_string(&file) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                log::warn!("Ignoring corrupt view settings in {}: {}", file.display(), e);
                HashMap::new()
            }),
            Err(_) => HashMap::new(),
        };
        Self {
            file: Some(file),
            entries: Mutex::new(entries),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn persist(&self, entries: &HashMap<String, ViewSettings>) -> Result<()> {
        let Some(file) = &self.file else {
            return Ok(());
        };
        if let Some(parent) = file.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(file, serde_json::to_string_pretty(entries)?)?;
        Ok(())
    }
}

impl ViewSettingsStore for JsonViewSettingsStore {
    fn get(&self, path: &str) -> Result<Option<ViewSettings>> {
        Ok(self.entries.lock().get(path).cloned())
    }

    fn save(&self, path: &str, settings: &ViewSettings) -> Result<()> {
        let mut entries = self.entries.lock();
        entries.insert(path.to_string(), settings.clone());
        self.persist(&entries)
    }
}
