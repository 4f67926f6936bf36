//! In-memory collaborators for driving a real engine in tests.
#![allow(dead_code)]

use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar};
use std::time::Duration;

use dirview::controller::{self, NavigationHandle, ViewSnapshot};
use dirview::error::{Result, ViewError};
use dirview::generation::Generation;
use dirview::icons::IconKey;
use dirview::local::sort_items;
use dirview::model::{FolderDescriptor, IconImage, ItemAttributes, ListItem, ViewSettings};
use dirview::paths;
use dirview::search::SearchQuery;
use dirview::services::{
    ChangeSink, ChangeWatcher, Enumeration, Enumerator, FolderResolver, IconProvider, SearchReplySink, SearchService,
    Services, ViewSettingsStore, WatchSubscription,
};
use dirview::EngineConfig;

const WAIT_LIMIT: Duration = Duration::from_secs(5);

/// Blocks one enumeration until released.
#[derive(Default)]
pub struct Hold {
    state: std::sync::Mutex<(bool, bool)>,
    changed: Condvar,
}

impl Hold {
    fn enter_and_wait(&self) {
        let mut state = self.state.lock().unwrap();
        state.0 = true;
        self.changed.notify_all();
        while !state.1 {
            state = self.changed.wait(state).unwrap();
        }
    }

    pub fn release(&self) {
        let mut state = self.state.lock().unwrap();
        state.1 = true;
        self.changed.notify_all();
    }

    pub fn entered(&self) -> bool {
        self.state.lock().unwrap().0
    }

    pub async fn wait_entered(&self) {
        tokio::time::timeout(WAIT_LIMIT, async {
            while !self.entered() {
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
        .await
        .expect("enumeration never started");
    }
}

#[derive(Default)]
struct FsState {
    folders: BTreeSet<String>,
    files: BTreeMap<String, u64>,
    denied: HashSet<String>,
    broken: HashSet<String>,
    broken_attributes: HashSet<String>,
    holds: HashMap<String, Arc<Hold>>,
    enumerations: Vec<String>,
}

/// A filesystem made of path strings. Roots (`C:\`, `/`) are drives.
#[derive(Default)]
pub struct FakeFs {
    state: Mutex<FsState>,
}

impl FakeFs {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Drives `C:\` and `D:\` with a small tree on `C:\`.
    pub fn sample() -> Arc<Self> {
        let fs = Self::new();
        fs.add_folder("C:\\");
        fs.add_folder("D:\\");
        fs.add_folder("C:\\A");
        fs.add_folder("C:\\A\\B");
        fs.add_file("C:\\A\\B\\deep.txt", 3);
        fs.add_file("C:\\A\\notes.txt", 10);
        fs.add_file("C:\\A\\photo.jpg", 2048);
        fs.add_folder("C:\\Empty");
        fs
    }

    pub fn add_folder(&self, path: &str) {
        self.state.lock().folders.insert(path.to_string());
    }

    pub fn add_file(&self, path: &str, size: u64) {
        self.state.lock().files.insert(path.to_string(), size);
    }

    /// Remove `path` and everything beneath it.
    pub fn remove(&self, path: &str) {
        let mut state = self.state.lock();
        state.folders.retain(|p| p != path && !paths::is_descendant(p, path));
        state.files.retain(|p, _| p != path && !paths::is_descendant(p, path));
    }

    pub fn rename_file(&self, from: &str, to: &str) {
        let mut state = self.state.lock();
        if let Some(size) = state.files.remove(from) {
            state.files.insert(to.to_string(), size);
        }
    }

    pub fn deny(&self, path: &str) {
        self.state.lock().denied.insert(path.to_string());
    }

    /// Enumerating `path` fails midway.
    pub fn break_enumeration(&self, path: &str) {
        self.state.lock().broken.insert(path.to_string());
    }

    pub fn break_attributes(&self, path: &str) {
        self.state.lock().broken_attributes.insert(path.to_string());
    }

    /// The next enumeration of `path` blocks after reading its entries.
    pub fn hold(&self, path: &str) -> Arc<Hold> {
        let hold = Arc::new(Hold::default());
        self.state.lock().holds.insert(path.to_string(), hold.clone());
        hold
    }

    /// Folders enumerated so far, in order.
    pub fn enumerations(&self) -> Vec<String> {
        self.state.lock().enumerations.clone()
    }

    fn item(state: &FsState, path: &str) -> Option<ListItem> {
        if state.folders.contains(path) {
            Some(if paths::is_root(path) {
                ListItem::drive(path)
            } else {
                ListItem::folder(path)
            })
        } else {
            state.files.get(path).map(|size| ListItem::file(path, *size))
        }
    }

    fn children(state: &FsState, folder: &str) -> Vec<ListItem> {
        state
            .folders
            .iter()
            .chain(state.files.keys())
            .filter(|path| !paths::is_root(path) && paths::parent(path).as_deref() == Some(folder))
            .filter_map(|path| Self::item(state, path))
            .collect()
    }
}

impl FolderResolver for FakeFs {
    fn resolve(&self, path: &str) -> Result<FolderDescriptor> {
        let state = self.state.lock();
        if path.is_empty() {
            return Ok(FolderDescriptor::Home);
        }
        if state.denied.contains(path) {
            return Err(ViewError::AccessDenied(path.to_string()));
        }
        if state.folders.contains(path) {
            if paths::is_root(path) {
                return Ok(FolderDescriptor::drive(path, None));
            }
            return Ok(FolderDescriptor::local_folder(path));
        }
        if state.files.contains_key(path) {
            return Ok(FolderDescriptor::LocalFile {
                full_path: path.to_string(),
            });
        }
        Err(ViewError::NotFound(path.to_string()))
    }

    fn exists(&self, path: &str) -> bool {
        let state = self.state.lock();
        state.folders.contains(path) || state.files.contains_key(path)
    }
}

impl Enumerator for FakeFs {
    fn enumerate(
        &self,
        folder: &FolderDescriptor,
        selection_hint: Option<&str>,
        generation: &Generation,
    ) -> Result<Enumeration> {
        let (mut items, hold) = {
            let mut state = self.state.lock();
            let path = folder.full_path().to_string();
            state.enumerations.push(path.clone());
            let items: Vec<ListItem> = match folder {
                FolderDescriptor::Home => state
                    .folders
                    .iter()
                    .filter(|p| paths::is_root(p))
                    .map(ListItem::drive)
                    .collect(),
                _ if state.broken.contains(&path) => {
                    return Err(ViewError::TransientIo {
                        path,
                        message: "device not ready".to_string(),
                    })
                }
                _ if !state.folders.contains(&path) => return Err(ViewError::NotFound(path)),
                _ => Self::children(&state, &path),
            };
            (items, state.holds.remove(&path))
        };
        if let Some(hold) = hold {
            hold.enter_and_wait();
        }
        generation.check()?;
        sort_items(&mut items);

        let selected = selection_hint
            .filter(|hint| items.iter().any(|item| item.full_path == *hint))
            .map(str::to_string);
        Ok(Enumeration { items, selected })
    }

    fn probe(&self, full_path: &str) -> Result<Option<ListItem>> {
        Ok(Self::item(&self.state.lock(), full_path))
    }

    fn load_attributes(&self, item: &ListItem) -> Result<ItemAttributes> {
        let state = self.state.lock();
        if state.broken_attributes.contains(&item.full_path) {
            return Err(ViewError::AccessDenied(item.full_path.clone()));
        }
        Ok(ItemAttributes {
            file_size: state.files.get(&item.full_path).copied(),
            is_empty_folder: item
                .is_folder()
                .then(|| Self::children(&state, &item.full_path).is_empty()),
            ..ItemAttributes::default()
        })
    }
}

/// Keeps a count of live subscriptions.
struct Subscription(Arc<AtomicUsize>);

impl Drop for Subscription {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Watcher whose events are injected by the test.
#[derive(Default)]
pub struct ManualWatcher {
    sinks: Mutex<Vec<ChangeSink>>,
    live: Arc<AtomicUsize>,
    refused: Mutex<HashSet<String>>,
}

impl ManualWatcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Sink of the most recent watch on `root`.
    pub fn sink_for(&self, root: &str) -> Option<ChangeSink> {
        self.sinks.lock().iter().rev().find(|sink| sink.root() == root).cloned()
    }

    pub async fn wait_for_sink(&self, root: &str) -> ChangeSink {
        tokio::time::timeout(WAIT_LIMIT, async {
            loop {
                if let Some(sink) = self.sink_for(root) {
                    return sink;
                }
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
        .await
        .expect("folder was never watched")
    }

    pub fn watched_roots(&self) -> Vec<String> {
        self.sinks.lock().iter().map(|sink| sink.root().to_string()).collect()
    }

    pub fn live_watches(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Watching `root` fails from now on.
    pub fn refuse(&self, root: &str) {
        self.refused.lock().insert(root.to_string());
    }
}

impl ChangeWatcher for ManualWatcher {
    fn watch(&self, path: &str, sink: ChangeSink) -> Result<Box<dyn WatchSubscription>> {
        if self.refused.lock().contains(path) {
            return Err(ViewError::AccessDenied(path.to_string()));
        }
        self.sinks.lock().push(sink);
        self.live.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(Subscription(self.live.clone())))
    }
}

/// Records queries; replies are delivered by the test.
pub struct FakeSearch {
    available: AtomicBool,
    queries: Mutex<Vec<SearchQuery>>,
}

impl FakeSearch {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            available: AtomicBool::new(true),
            queries: Mutex::new(Vec::new()),
        })
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn queries(&self) -> Vec<SearchQuery> {
        self.queries.lock().clone()
    }
}

impl SearchService for FakeSearch {
    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    fn search(&self, query: SearchQuery, _replies: SearchReplySink) -> Result<()> {
        self.queries.lock().push(query);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemorySettings {
    entries: Mutex<HashMap<String, ViewSettings>>,
    broken_reads: AtomicBool,
    broken_writes: AtomicBool,
}

impl MemorySettings {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn saved(&self, key: &str) -> Option<ViewSettings> {
        self.entries.lock().get(key).cloned()
    }

    pub fn preset(&self, key: &str, settings: ViewSettings) {
        self.entries.lock().insert(key.to_string(), settings);
    }

    pub fn break_reads(&self) {
        self.broken_reads.store(true, Ordering::SeqCst);
    }

    pub fn break_writes(&self) {
        self.broken_writes.store(true, Ordering::SeqCst);
    }
}

impl ViewSettingsStore for MemorySettings {
    fn get(&self, path: &str) -> Result<Option<ViewSettings>> {
        if self.broken_reads.load(Ordering::SeqCst) {
            return Err(ViewError::TransientIo {
                path: path.to_string(),
                message: "settings store offline".to_string(),
            });
        }
        Ok(self.entries.lock().get(path).cloned())
    }

    fn save(&self, path: &str, settings: &ViewSettings) -> Result<()> {
        if self.broken_writes.load(Ordering::SeqCst) {
            return Err(ViewError::TransientIo {
                path: path.to_string(),
                message: "settings store offline".to_string(),
            });
        }
        self.entries.lock().insert(path.to_string(), settings.clone());
        Ok(())
    }
}

/// Named icons derived from the key; thumbnails are unavailable.
#[derive(Default)]
pub struct StaticIcons {
    pub requests: AtomicUsize,
}

impl StaticIcons {
    fn named(&self, key: &IconKey, size: u32) -> Result<IconImage> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let name = match key {
            IconKey::Class(extension) => format!("type-{}", extension),
            IconKey::Instance(path) => format!("instance-{}", path),
        };
        Ok(IconImage::Named { name, size })
    }
}

impl IconProvider for StaticIcons {
    fn small_icon(&self, key: &IconKey) -> Result<IconImage> {
        self.named(key, 16)
    }

    fn large_icon(&self, key: &IconKey) -> Result<IconImage> {
        self.named(key, 48)
    }

    fn thumbnail(&self, path: &str, _size: u32) -> Result<IconImage> {
        Err(ViewError::Generic(format!("no thumbnail for {}", path)))
    }
}

/// A running engine over in-memory collaborators.
pub struct Harness {
    pub fs: Arc<FakeFs>,
    pub watcher: Arc<ManualWatcher>,
    pub search: Arc<FakeSearch>,
    pub settings: Arc<MemorySettings>,
    pub icons: Arc<StaticIcons>,
    pub handle: NavigationHandle,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_fs(FakeFs::sample())
    }

    pub fn with_fs(fs: Arc<FakeFs>) -> Self {
        Self::with_config(fs, EngineConfig::default())
    }

    pub fn with_config(fs: Arc<FakeFs>, config: EngineConfig) -> Self {
        let watcher = ManualWatcher::new();
        let search = FakeSearch::new();
        let settings = MemorySettings::new();
        let icons = Arc::new(StaticIcons::default());
        let services = Services {
            resolver: fs.clone(),
            enumerator: fs.clone(),
            watcher: watcher.clone(),
            settings: settings.clone(),
            search: search.clone(),
            icons: icons.clone(),
        };
        let handle = controller::spawn(services, config);
        Self {
            fs,
            watcher,
            search,
            settings,
            icons,
            handle,
        }
    }

    pub async fn settle(&self) {
        tokio::time::timeout(WAIT_LIMIT, self.handle.settle())
            .await
            .expect("engine did not settle")
            .expect("engine stopped");
    }

    pub async fn snapshot(&self) -> ViewSnapshot {
        self.handle.snapshot().await.expect("engine stopped")
    }

    /// Navigate, wait for all follow-up work and return the published state.
    pub async fn open(&self, path: &str) -> ViewSnapshot {
        let _ = self.handle.navigate(path).await.expect("engine stopped");
        self.settle().await;
        self.snapshot().await
    }
}
