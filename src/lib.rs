//! A directory view engine: navigation with back/forward history, live
//! reconciliation of filesystem changes, search-result mode and background
//! icon loading, all serialized through one coordinating task.

pub mod command;
pub mod config;
pub mod controller;
pub mod error;
pub mod generation;
pub mod history;
pub mod icons;
pub mod listing;
pub mod local;
pub mod model;
pub mod paths;
pub mod reconcile;
pub mod script;
pub mod search;
pub mod services;

pub use config::EngineConfig;
pub use controller::{spawn, NavigationHandle, Pending, ViewEvent, ViewMode, ViewSnapshot};
pub use error::{Result, ViewError};
pub use model::{FolderDescriptor, ListItem, ViewSettings};
pub use services::Services;
