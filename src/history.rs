//! Linear back/forward log of visited locations.
//!
//! `next_index` points one past the entry currently on display, so the
//! current entry is `entries[next_index - 1]`. Entries beyond `next_index`
//! are the forward history.

use serde::{Deserialize, Serialize};

use crate::model::FolderDescriptor;
use crate::paths;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub folder: FolderDescriptor,
    pub display_text: String,
}

impl HistoryEntry {
    pub fn new(folder: FolderDescriptor) -> Self {
        let display_text = folder.display_text();
        Self { folder, display_text }
    }

    pub fn full_path(&self) -> &str {
        self.folder.full_path()
    }
}

/// Where a history move wants to go. `target` is `None` for Home.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryMove {
    pub target: Option<String>,
    /// Item to re-highlight once the target is listed.
    pub selection_hint: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct HistoryStack {
    entries: Vec<HistoryEntry>,
    next_index: usize,
}

impl HistoryStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_index(&self) -> usize {
        self.next_index
    }

    pub fn history_count(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn current(&self) -> Option<&HistoryEntry> {
        self.next_index.checked_sub(1).and_then(|i| self.entries.get(i))
    }

    pub fn can_go_back(&self) -> bool {
        self.next_index > 1
    }

    pub fn can_go_forward(&self) -> bool {
        self.next_index < self.history_count()
    }

    /// Display text of the entry `go_back` would open.
    pub fn back_text(&self) -> Option<&str> {
        if self.can_go_back() {
            Some(&self.entries[self.next_index - 2].display_text)
        } else {
            None
        }
    }

    pub fn forward_text(&self) -> Option<&str> {
        if self.can_go_forward() {
            Some(&self.entries[self.next_index].display_text)
        } else {
            None
        }
    }

    /// Record a visit at `next_index`, dropping the forward history.
    /// Recording the entry that is already current does nothing.
    pub fn add(&mut self, entry: HistoryEntry) -> bool {
        if let Some(current) = self.current() {
            if current.full_path() == entry.full_path() && current.folder.kind() == entry.folder.kind() {
                return false;
            }
        }
        self.entries.truncate(self.next_index);
        self.entries.push(entry);
        self.next_index = self.entries.len();
        true
    }

    pub fn go_back(&mut self) -> Option<HistoryMove> {
        if !self.can_go_back() {
            return None;
        }
        self.next_index -= 1;
        Some(HistoryMove {
            target: Self::target_of(&self.entries[self.next_index - 1]),
            selection_hint: Some(self.entries[self.next_index].full_path().to_string()).filter(|p| !p.is_empty()),
        })
    }

    pub fn go_forward(&mut self) -> Option<HistoryMove> {
        if !self.can_go_forward() {
            return None;
        }
        self.next_index += 1;
        Some(HistoryMove {
            target: Self::target_of(&self.entries[self.next_index - 1]),
            selection_hint: self
                .entries
                .get(self.next_index)
                .map(|e| e.full_path().to_string())
                .filter(|p| !p.is_empty()),
        })
    }

    /// Textual parent of `current_path`; `None` target means Home.
    pub fn upper_level(current_path: &str) -> HistoryMove {
        HistoryMove {
            target: paths::parent(current_path),
            selection_hint: Some(current_path.to_string()).filter(|p| !p.is_empty()),
        }
    }

    /// Recovery after `failed_path` could not be opened.
    ///
    /// Steps back over the current entry, then keeps stepping back while the
    /// candidate is the failed location again or lies beneath the entry just
    /// stepped over. Home is the target when history runs out. The caller
    /// re-navigates without recording history.
    pub fn error_go_back(&mut self, failed_path: &str, current_path: &str) -> HistoryMove {
        let selection_hint = Some(current_path.to_string()).filter(|p| !p.is_empty());
        if !self.can_go_back() {
            return HistoryMove {
                target: None,
                selection_hint,
            };
        }

        self.next_index -= 1;
        let original = self.entries[self.next_index].full_path().to_string();
        while self.next_index > 1 {
            let candidate = self.entries[self.next_index - 1].full_path();
            let skipped = self.entries[self.next_index].full_path();
            if paths::is_descendant(candidate, skipped) || candidate == original || candidate == failed_path {
                self.next_index -= 1;
            } else {
                break;
            }
        }

        HistoryMove {
            target: Self::target_of(&self.entries[self.next_index - 1]),
            selection_hint,
        }
    }

    fn target_of(entry: &HistoryEntry) -> Option<String> {
        match &entry.folder {
            FolderDescriptor::Home => None,
            folder => Some(folder.full_path().to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn entry(path: &str) -> HistoryEntry {
        if path.is_empty() {
            HistoryEntry::new(FolderDescriptor::Home)
        } else {
            HistoryEntry::new(FolderDescriptor::local_folder(path))
        }
    }

    fn stack(paths: &[&str]) -> HistoryStack {
        let mut history = HistoryStack::new();
        for path in paths {
            history.add(entry(path));
        }
        history
    }

    #[test]
    fn test_add_and_navigate() {
        let mut history = stack(&["C:\\A", "C:\\A\\B"]);
        assert!(history.can_go_back());
        assert!(!history.can_go_forward());

        let back = history.go_back().unwrap();
        assert_eq!(back.target.as_deref(), Some("C:\\A"));
        assert_eq!(back.selection_hint.as_deref(), Some("C:\\A\\B"));
        assert!(!history.can_go_back());
        assert!(history.can_go_forward());
        assert!(history.go_back().is_none());

        let forward = history.go_forward().unwrap();
        assert_eq!(forward.target.as_deref(), Some("C:\\A\\B"));
        assert_eq!(forward.selection_hint, None);
    }

    #[test]
    fn test_duplicate_add_is_noop() {
        let mut history = stack(&["C:\\A"]);
        assert!(!history.add(entry("C:\\A")));
        assert_eq!(history.history_count(), 1);
    }

    #[test]
    fn test_add_truncates_forward_history() {
        let mut history = stack(&["C:\\A", "C:\\B", "C:\\C"]);
        history.go_back();
        history.go_back();
        history.add(entry("C:\\D"));
        assert_eq!(history.history_count(), 2);
        assert_eq!(history.current().unwrap().full_path(), "C:\\D");
        assert!(!history.can_go_forward());
    }

    #[test]
    fn test_tooltips() {
        let mut history = stack(&["C:\\A", "C:\\A\\B"]);
        assert_eq!(history.back_text(), Some("A"));
        assert_eq!(history.forward_text(), None);
        history.go_back();
        assert_eq!(history.forward_text(), Some("B"));
    }

    #[test]
    fn test_home_entries_target_home() {
        let mut history = stack(&["", "C:\\A"]);
        let back = history.go_back().unwrap();
        assert_eq!(back.target, None);
    }

    #[test]
    fn test_upper_level() {
        assert_eq!(HistoryStack::upper_level("C:\\A\\B").target.as_deref(), Some("C:\\A"));
        assert_eq!(HistoryStack::upper_level("C:\\A").target.as_deref(), Some("C:\\"));
        assert_eq!(HistoryStack::upper_level("C:\\").target, None);
        assert_eq!(HistoryStack::upper_level("Documents").target, None);
    }

    #[test]
    fn test_error_go_back_for_unrecorded_path_steps_back() {
        let mut history = stack(&["C:\\Empty", "C:\\A"]);
        let recovery = history.error_go_back("C:\\A\\missing", "C:\\A");
        assert_eq!(recovery.target.as_deref(), Some("C:\\Empty"));
        assert_eq!(recovery.selection_hint.as_deref(), Some("C:\\A"));
        assert_eq!(history.next_index(), 1);
        assert_eq!(history.history_count(), 2);

        let mut empty = HistoryStack::new();
        assert_eq!(empty.error_go_back("C:\\missing", "").target, None);
    }

    #[test]
    fn test_error_go_back_without_history_goes_home() {
        let mut history = stack(&["C:\\A"]);
        let recovery = history.error_go_back("C:\\A", "C:\\A");
        assert_eq!(recovery.target, None);
        assert_eq!(history.next_index(), 1);
    }

    #[test]
    fn test_error_go_back_skips_failed_and_nested_entries() {
        // The user went back to C:\X\Y which no longer exists.
        let mut history = stack(&["C:\\A", "C:\\X", "C:\\X\\Y", "C:\\Z"]);
        history.go_back();
        assert_eq!(history.current().unwrap().full_path(), "C:\\X\\Y");

        let recovery = history.error_go_back("C:\\X\\Y", "C:\\Z");
        assert_eq!(recovery.target.as_deref(), Some("C:\\X"));
        assert_eq!(recovery.selection_hint.as_deref(), Some("C:\\Z"));
        assert_eq!(history.history_count(), 4);
    }

    #[test]
    fn test_error_go_back_skips_repeats_of_failed_path() {
        let mut history = stack(&["C:\\A", "C:\\Gone", "C:\\B", "C:\\Gone"]);
        history.go_back();
        history.go_back();
        // Current entry is C:\Gone at index 1; stepping back lands on C:\A.
        let recovery = history.error_go_back("C:\\Gone", "C:\\B");
        assert_eq!(recovery.target.as_deref(), Some("C:\\A"));
        assert_eq!(history.next_index(), 1);
    }

    #[test]
    fn test_error_go_back_skips_descendants_of_skipped_entry() {
        let mut history = stack(&["C:\\A", "C:\\Old", "C:\\Old\\Sub", "C:\\Old"]);
        let recovery = history.error_go_back("C:\\Old", "C:\\Old");
        assert_eq!(recovery.target.as_deref(), Some("C:\\A"));
    }

    #[derive(Debug, Clone)]
    enum Op {
        Add(u8),
        Back,
        Forward,
        ErrorBack(u8),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u8..6).prop_map(Op::Add),
            Just(Op::Back),
            Just(Op::Forward),
            (0u8..6).prop_map(Op::ErrorBack),
        ]
    }

    proptest! {
        #[test]
        fn prop_indices_stay_consistent(ops in proptest::collection::vec(op_strategy(), 0..60)) {
            let mut history = HistoryStack::new();
            for op in ops {
                match op {
                    Op::Add(n) => { history.add(entry(&format!("C:\\P{}", n))); }
                    Op::Back => { history.go_back(); }
                    Op::Forward => { history.go_forward(); }
                    Op::ErrorBack(n) => { history.error_go_back(&format!("C:\\P{}", n), "C:\\Q"); }
                }
                prop_assert!(history.next_index() <= history.history_count());
                prop_assert_eq!(history.can_go_back(), history.next_index() > 1);
                prop_assert_eq!(history.can_go_forward(), history.next_index() < history.history_count());
                if history.history_count() > 0 {
                    prop_assert!(history.next_index() >= 1);
                }
            }
        }

        #[test]
        fn prop_back_then_forward_restores_path(paths in proptest::collection::vec(0u8..8, 2..10)) {
            let mut history = HistoryStack::new();
            for n in &paths {
                history.add(entry(&format!("C:\\P{}", n)));
            }
            let before = history.current().map(|e| e.full_path().to_string());
            if history.go_back().is_some() {
                let forward = history.go_forward().unwrap();
                prop_assert_eq!(forward.target, before);
            }
        }
    }
}
