use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::{SortKey, ViewType};

/// Everything a script or the command line can ask the engine to do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    // Navigation
    Navigate(String),
    Home,
    Back,
    Forward,
    Up,
    Refresh,
    Open(String),

    // Search
    Search(String),
    ClearSearch,

    // View
    View(ViewType),
    Sort(SortKey),

    // Selection
    Select(String),
    Deselect(String),
    ClearSelection,
}

impl Command {
    /// Parse a command from its textual form, e.g. `cd:/tmp` or `back`.
    pub fn from_string(s: &str) -> Result<Self, String> {
        let s = s.trim();
        match s.to_lowercase().as_str() {
            "home" => return Ok(Command::Home),
            "back" => return Ok(Command::Back),
            "forward" => return Ok(Command::Forward),
            "up" => return Ok(Command::Up),
            "refresh" | "f5" => return Ok(Command::Refresh),
            "clear_search" => return Ok(Command::ClearSearch),
            "clear_selection" => return Ok(Command::ClearSelection),
            _ => {}
        }

        let (name, argument) = s
            .split_once(':')
            .ok_or_else(|| format!("Unknown command: {}", s))?;
        match name.to_lowercase().as_str() {
            "cd" => Ok(Command::Navigate(argument.to_string())),
            "open" => Ok(Command::Open(argument.to_string())),
            "search" => Ok(Command::Search(argument.to_string())),
            "view" => parse_view_type(argument).map(Command::View),
            "sort" => parse_sort_key(argument).map(Command::Sort),
            "select" => Ok(Command::Select(argument.to_string())),
            "deselect" => Ok(Command::Deselect(argument.to_string())),
            _ => Err(format!("Unknown command: {}", s)),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Navigate(path) => write!(f, "cd:{}", path),
            Command::Home => f.write_str("home"),
            Command::Back => f.write_str("back"),
            Command::Forward => f.write_str("forward"),
            Command::Up => f.write_str("up"),
            Command::Refresh => f.write_str("refresh"),
            Command::Open(path) => write!(f, "open:{}", path),
            Command::Search(text) => write!(f, "search:{}", text),
            Command::ClearSearch => f.write_str("clear_search"),
            Command::View(view_type) => write!(f, "view:{}", view_type_name(*view_type)),
            Command::Sort(key) => write!(f, "sort:{}", sort_key_name(*key)),
            Command::Select(path) => write!(f, "select:{}", path),
            Command::Deselect(path) => write!(f, "deselect:{}", path),
            Command::ClearSelection => f.write_str("clear_selection"),
        }
    }
}

pub fn parse_view_type(s: &str) -> Result<ViewType, String> {
    match s.trim().to_lowercase().as_str() {
        "large_icons" | "large" => Ok(ViewType::LargeIcons),
        "medium_icons" | "medium" => Ok(ViewType::MediumIcons),
        "small_icons" | "small" => Ok(ViewType::SmallIcons),
        "list" => Ok(ViewType::List),
        "details" => Ok(ViewType::Details),
        "tiles" => Ok(ViewType::Tiles),
        "content" => Ok(ViewType::Content),
        _ => Err(format!("Unknown view type: {}", s)),
    }
}

pub fn parse_sort_key(s: &str) -> Result<SortKey, String> {
    match s.trim().to_lowercase().as_str() {
        "name" => Ok(SortKey::Name),
        "modified" | "date_modified" => Ok(SortKey::DateModified),
        "type" => Ok(SortKey::Type),
        "size" | "file_size" => Ok(SortKey::FileSize),
        _ => Err(format!("Unknown sort key: {}", s)),
    }
}

fn view_type_name(view_type: ViewType) -> &'static str {
    match view_type {
        ViewType::LargeIcons => "large_icons",
        ViewType::MediumIcons => "medium_icons",
        ViewType::SmallIcons => "small_icons",
        ViewType::List => "list",
        ViewType::Details => "details",
        ViewType::Tiles => "tiles",
        ViewType::Content => "content",
    }
}

fn sort_key_name(key: SortKey) -> &'static str {
    match key {
        SortKey::Name => "name",
        SortKey::DateModified => "modified",
        SortKey::Type => "type",
        SortKey::FileSize => "size",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_parsing() {
        assert_eq!(Command::from_string("back").unwrap(), Command::Back);
        assert_eq!(Command::from_string("F5").unwrap(), Command::Refresh);
        assert_eq!(
            Command::from_string("cd:C:\\Users").unwrap(),
            Command::Navigate("C:\\Users".to_string())
        );
        assert_eq!(
            Command::from_string("search:report 2024").unwrap(),
            Command::Search("report 2024".to_string())
        );
        assert_eq!(
            Command::from_string("view:tiles").unwrap(),
            Command::View(ViewType::Tiles)
        );
        assert_eq!(Command::from_string("sort:size").unwrap(), Command::Sort(SortKey::FileSize));

        assert!(Command::from_string("invalid").is_err());
        assert!(Command::from_string("").is_err());
        assert!(Command::from_string("view:huge").is_err());
    }

    #[test]
    fn test_command_to_string() {
        assert_eq!(Command::Navigate("/tmp".into()).to_string(), "cd:/tmp");
        assert_eq!(Command::View(ViewType::LargeIcons).to_string(), "view:large_icons");
        assert_eq!(Command::ClearSelection.to_string(), "clear_selection");

        for command in [Command::Up, Command::Sort(SortKey::DateModified), Command::Open("/a".into())] {
            assert_eq!(Command::from_string(&command.to_string()).unwrap(), command);
        }
    }
}
