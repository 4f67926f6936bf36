use crate::model::ListItem;

/// The published item listing plus the active selection.
///
/// Only the coordinating task mutates it. Lookups are linear scans by full
/// path.
#[derive(Debug, Clone, Default)]
pub struct Listing {
    items: Vec<ListItem>,
    selected: Vec<String>,
    /// Generation whose results are on display.
    generation: u64,
}

impl Listing {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[ListItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Single clear + bulk insert.
    pub fn replace_all(&mut self, items: Vec<ListItem>, generation: u64) {
        self.items = items;
        self.selected.clear();
        self.generation = generation;
    }

    pub fn clear(&mut self, generation: u64) {
        self.replace_all(Vec::new(), generation);
    }

    pub fn position(&self, full_path: &str) -> Option<usize> {
        self.items.iter().position(|item| item.full_path == full_path)
    }

    pub fn get(&self, full_path: &str) -> Option<&ListItem> {
        self.items.iter().find(|item| item.full_path == full_path)
    }

    pub fn get_mut(&mut self, full_path: &str) -> Option<&mut ListItem> {
        self.items.iter_mut().find(|item| item.full_path == full_path)
    }

    pub fn contains(&self, full_path: &str) -> bool {
        self.position(full_path).is_some()
    }

    pub fn push(&mut self, item: ListItem) {
        self.items.push(item);
    }

    /// Replace the item at `index`, keeping its position. A selected old item
    /// stays selected under its new path.
    pub fn replace_at(&mut self, index: usize, item: ListItem) -> Option<ListItem> {
        let slot = self.items.get_mut(index)?;
        let old = std::mem::replace(slot, item);
        if let Some(selected) = self.selected.iter_mut().find(|p| **p == old.full_path) {
            *selected = self.items[index].full_path.clone();
        }
        Some(old)
    }

    /// Remove an item and drop it from the selection.
    pub fn remove(&mut self, full_path: &str) -> Option<ListItem> {
        let index = self.position(full_path)?;
        self.selected.retain(|p| p != full_path);
        Some(self.items.remove(index))
    }

    pub fn select(&mut self, full_path: &str) -> bool {
        if !self.contains(full_path) {
            return false;
        }
        if !self.is_selected(full_path) {
            self.selected.push(full_path.to_string());
        }
        true
    }

    pub fn deselect(&mut self, full_path: &str) -> bool {
        let before = self.selected.len();
        self.selected.retain(|p| p != full_path);
        before != self.selected.len()
    }

    pub fn clear_selection(&mut self) {
        self.selected.clear();
    }

    pub fn is_selected(&self, full_path: &str) -> bool {
        self.selected.iter().any(|p| p == full_path)
    }

    pub fn selected(&self) -> &[String] {
        &self.selected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Listing {
        let mut listing = Listing::new();
        listing.replace_all(
            vec![
                ListItem::folder("/d/src"),
                ListItem::file("/d/a.txt", 1),
                ListItem::file("/d/b.txt", 2),
            ],
            1,
        );
        listing
    }

    #[test]
    fn test_replace_all_resets_selection() {
        let mut listing = sample();
        assert!(listing.select("/d/a.txt"));
        listing.replace_all(vec![ListItem::file("/e/c.txt", 3)], 2);
        assert!(listing.selected().is_empty());
        assert_eq!(listing.generation(), 2);
        assert_eq!(listing.len(), 1);
    }

    #[test]
    fn test_select_only_existing_items() {
        let mut listing = sample();
        assert!(!listing.select("/d/missing"));
        assert!(listing.select("/d/b.txt"));
        assert!(listing.select("/d/b.txt"));
        assert_eq!(listing.selected(), &["/d/b.txt".to_string()]);
        assert!(listing.deselect("/d/b.txt"));
        assert!(!listing.deselect("/d/b.txt"));
    }

    #[test]
    fn test_replace_at_keeps_position_and_selection() {
        let mut listing = sample();
        listing.select("/d/a.txt");
        let index = listing.position("/d/a.txt").unwrap();
        let old = listing.replace_at(index, ListItem::file("/d/renamed.txt", 1)).unwrap();

        assert_eq!(old.full_path, "/d/a.txt");
        assert_eq!(listing.position("/d/renamed.txt"), Some(index));
        assert!(listing.is_selected("/d/renamed.txt"));
        assert!(!listing.is_selected("/d/a.txt"));
    }

    #[test]
    fn test_remove_drops_selection() {
        let mut listing = sample();
        listing.select("/d/src");
        assert!(listing.remove("/d/src").is_some());
        assert!(listing.selected().is_empty());
        assert!(listing.remove("/d/src").is_none());
    }
}
