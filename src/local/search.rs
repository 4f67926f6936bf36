use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};

use crate::error::{Result, ViewError};
use crate::search::SearchQuery;
use crate::services::{SearchReplySink, SearchService};

/// Fuzzy file-name search over a directory walk.
///
/// Each query walks its scope on a dedicated thread and replies once with
/// the best matches. Global queries walk `default_root`.
#[derive(Debug, Clone, Default)]
pub struct LocalSearchService {
    default_root: Option<PathBuf>,
}

impl LocalSearchService {
    pub fn new(default_root: Option<PathBuf>) -> Self {
        Self { default_root }
    }
}

impl SearchService for LocalSearchService {
    fn is_available(&self) -> bool {
        true
    }

    fn search(&self, query: SearchQuery, replies: SearchReplySink) -> Result<()> {
        let root = query
            .scope
            .as_ref()
            .map(PathBuf::from)
            .or_else(|| self.default_root.clone())
            .ok_or(ViewError::SearchUnavailable)?;

        std::thread::Builder::new()
            .name(format!("search-{}", query.id))
            .spawn(move || {
                let matches = find_matches(&root, &query.text, query.max_results);
                log::debug!("🔍 Query {} matched {} paths under {}", query.id, matches.len(), root.display());
                replies.reply(query.id, matches);
            })?;
        Ok(())
    }
}

/// Paths under `root` whose file name fuzzy-matches `text`, best first.
pub fn find_matches(root: &Path, text: &str, max_results: usize) -> Vec<String> {
    let matcher = SkimMatcherV2::default();
    let mut scored: Vec<(i64, String)> = WalkBuilder::new(root)
        .hidden(false)
        .git_ignore(true)
        .build()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                log::debug!("Search walk error: {}", e);
                None
            }
        })
        .filter(|entry| entry.depth() > 0)
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy();
            matcher
                .fuzzy_match(&name, text)
                .map(|score| (score, entry.path().to_string_lossy().into_owned()))
        })
        .collect();

    scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
    scored.truncate(max_results);
    scored.into_iter().map(|(_, path)| path).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_find_matches_ranks_by_name() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("reports")).unwrap();
        fs::write(dir.path().join("reports").join("report-2024.txt"), b"").unwrap();
        fs::write(dir.path().join("readme.md"), b"").unwrap();
        fs::write(dir.path().join("other.bin"), b"").unwrap();

        let matches = find_matches(dir.path(), "report", 10);
        assert_eq!(matches.len(), 2);
        assert!(matches.iter().all(|m| m.contains("report")));
        assert!(!matches.iter().any(|m| m.ends_with("other.bin")));

        assert_eq!(find_matches(dir.path(), "report", 1).len(), 1);
    }
}
