use std::future::Future;
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::time::timeout;

use crate::command::{parse_view_type, Command};
use crate::controller::{NavigationHandle, ViewMode, ViewSnapshot};
use crate::error::{Result, ViewError};
use crate::model::{LocationKind, ViewChange};

/// Script format for driving an engine headlessly.
///
/// Each line is one of:
/// - a command understood by [`Command::from_string`] (`cd:<path>`, `back`,
///   `search:<text>`, `view:tiles`, `select:<path>` ...)
/// - `wait` / `settle` - wait until the engine is idle
/// - `wait:<ms>` - sleep for a fixed duration
/// - `assert:<property>:<value>` - check the published state
/// - `print` - print the current listing
/// - `immediate` / `settle_mode` - stop / resume waiting after each command
/// - `# comment`
///
/// `{root}` anywhere in a line is replaced by the runner's root.
///
/// ```text
/// cd:{root}/photos
/// cd:{root}/photos/2024
/// back
/// assert:path:{root}/photos
/// assert:can_go_forward:true
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptStep {
    Run { command: Command, immediate: bool },
    Settle,
    Sleep(Duration),
    Assert(String),
    Print,
}

#[derive(Debug, Clone)]
pub struct ScriptRunner {
    pub steps: Vec<ScriptStep>,
    pub max_settle_time: Duration,
}

impl ScriptRunner {
    pub fn from_file<P: AsRef<Path>>(path: P, root: Option<&str>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_string(&content, root)
    }

    pub fn from_string(content: &str, root: Option<&str>) -> Result<Self> {
        let mut steps = Vec::new();
        let mut immediate = false;

        for (line_num, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let line = match root {
                Some(root) => line.replace("{root}", root),
                None => line.to_string(),
            };

            let step = match line.as_str() {
                "immediate" => {
                    immediate = true;
                    continue;
                }
                "settle_mode" => {
                    immediate = false;
                    continue;
                }
                "wait" | "settle" => ScriptStep::Settle,
                "print" => ScriptStep::Print,
                _ => {
                    if let Some(ms) = line.strip_prefix("wait:") {
                        let ms: u64 = ms
                            .parse()
                            .map_err(|_| ViewError::Generic(format!("Invalid wait duration: {}", ms)))?;
                        ScriptStep::Sleep(Duration::from_millis(ms))
                    } else if let Some(assertion) = line.strip_prefix("assert:") {
                        ScriptStep::Assert(assertion.to_string())
                    } else {
                        let command = Command::from_string(&line)
                            .map_err(|e| ViewError::Generic(format!("Line {}: {}", line_num + 1, e)))?;
                        ScriptStep::Run { command, immediate }
                    }
                }
            };
            steps.push(step);
        }

        Ok(Self {
            steps,
            max_settle_time: Duration::from_secs(5),
        })
    }

    pub async fn run(&self, handle: &NavigationHandle) -> Result<ScriptResult> {
        let start_time = Instant::now();
        let mut result = ScriptResult::default();
        log::info!("🧪 Running script with {} steps", self.steps.len());

        for (index, step) in self.steps.iter().enumerate() {
            log::debug!("🧪 Step {}: {:?}", index, step);
            match step {
                ScriptStep::Run { command, immediate } => {
                    match execute(handle, command, !immediate).await {
                        Ok(()) => result.commands_run += 1,
                        Err(e) => result.errors.push(format!("{} failed: {}", command, e)),
                    }
                    if !immediate {
                        self.settle(handle, &mut result).await;
                    }
                }
                ScriptStep::Settle => self.settle(handle, &mut result).await,
                ScriptStep::Sleep(duration) => tokio::time::sleep(*duration).await,
                ScriptStep::Assert(assertion) => {
                    let snapshot = handle.snapshot().await?;
                    match evaluate_assertion(&snapshot, assertion) {
                        Ok(true) => {
                            result.assertions_passed += 1;
                            log::debug!("🧪 Assertion passed: {}", assertion);
                        }
                        Ok(false) => {
                            result.assertions_failed += 1;
                            result.errors.push(format!(
                                "Assertion failed: {} (location {}, {} items)",
                                assertion,
                                snapshot.location.display_text(),
                                snapshot.items.len()
                            ));
                        }
                        Err(e) => {
                            result.assertions_failed += 1;
                            result.errors.push(format!("Assertion error: {}", e));
                        }
                    }
                }
                ScriptStep::Print => {
                    let snapshot = handle.snapshot().await?;
                    println!("📂 {}", snapshot.location.display_text());
                    for item in &snapshot.items {
                        println!("   {}", item.name);
                    }
                }
            }
        }

        result.duration = start_time.elapsed();
        result.success = result.assertions_failed == 0 && result.errors.is_empty();
        log::info!("🧪 Script completed in {:?}", result.duration);
        Ok(result)
    }

    async fn settle(&self, handle: &NavigationHandle, result: &mut ScriptResult) {
        match timeout(self.max_settle_time, handle.settle()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => result.errors.push(format!("Settlement failed: {}", e)),
            Err(_) => result.errors.push("Settlement timeout: engine is still busy".to_string()),
        }
    }
}

/// Queue `command`; with `wait` also wait for its reply.
async fn execute(handle: &NavigationHandle, command: &Command, wait: bool) -> Result<()> {
    async fn finish<T>(reply: impl Future<Output = Result<T>>, wait: bool) -> Result<()> {
        if wait {
            reply.await?;
        }
        Ok(())
    }

    match command {
        Command::Navigate(path) => finish(handle.navigate(path.as_str()), wait).await,
        Command::Home => finish(handle.go_home(), wait).await,
        Command::Back => finish(handle.go_back(), wait).await,
        Command::Forward => finish(handle.go_forward(), wait).await,
        Command::Up => finish(handle.go_to_upper_level(), wait).await,
        Command::Refresh => finish(handle.refresh(), wait).await,
        Command::Open(path) => finish(handle.open_item(path.as_str()), wait).await,
        Command::Search(text) => finish(handle.set_search_text(text.as_str()), wait).await,
        Command::ClearSearch => finish(handle.set_search_text(""), wait).await,
        Command::View(view_type) => finish(handle.switch_view(ViewChange::ViewType(*view_type)), wait).await,
        Command::Sort(key) => finish(handle.switch_view(ViewChange::SortBy(*key)), wait).await,
        Command::Select(path) => finish(handle.select(path.as_str()), wait).await,
        Command::Deselect(path) => finish(handle.deselect(path.as_str()), wait).await,
        Command::ClearSelection => {
            handle.clear_selection();
            Ok(())
        }
    }
}

fn parse_bool(property: &str, value: &str) -> Result<bool> {
    value
        .parse::<bool>()
        .map_err(|_| ViewError::Generic(format!("{} expects a boolean value", property)))
}

fn parse_count(property: &str, value: &str) -> Result<usize> {
    value
        .parse::<usize>()
        .map_err(|_| ViewError::Generic(format!("{} expects a numeric value", property)))
}

/// Check one `property:value` assertion against a snapshot.
pub fn evaluate_assertion(snapshot: &ViewSnapshot, assertion: &str) -> Result<bool> {
    let (property, expected) = assertion
        .split_once(':')
        .ok_or_else(|| ViewError::Generic("Assertion must be in format 'property:value'".to_string()))?;

    match property {
        "path" => Ok(snapshot.full_path() == expected),
        "location" => {
            let kind = match expected.to_lowercase().as_str() {
                "home" => LocationKind::Home,
                "drive" => LocationKind::Drive,
                "folder" | "localfolder" => LocationKind::LocalFolder,
                "search" | "searchresult" => LocationKind::SearchResult,
                other => return Err(ViewError::Generic(format!("Unknown location kind: {}", other))),
            };
            Ok(snapshot.location.kind() == kind)
        }
        "mode" => {
            let mode = match expected.to_lowercase().as_str() {
                "browse" => ViewMode::Browse,
                "search" => ViewMode::Search,
                other => return Err(ViewError::Generic(format!("Unknown mode: {}", other))),
            };
            Ok(snapshot.mode == mode)
        }
        "count" => Ok(snapshot.items.len() == parse_count(property, expected)?),
        "contains" => Ok(snapshot.items.iter().any(|item| item.name == expected)),
        "missing" => Ok(!snapshot.items.iter().any(|item| item.name == expected)),
        "can_go_back" => Ok(snapshot.can_go_back == parse_bool(property, expected)?),
        "can_go_forward" => Ok(snapshot.can_go_forward == parse_bool(property, expected)?),
        "can_go_up" => Ok(snapshot.can_go_to_upper_level == parse_bool(property, expected)?),
        "history_count" => Ok(snapshot.history_count == parse_count(property, expected)?),
        "next_index" => Ok(snapshot.next_index == parse_count(property, expected)?),
        "selected" => match expected {
            "none" | "" => Ok(snapshot.selected.is_empty()),
            path => Ok(snapshot.selected.iter().any(|selected| selected == path)),
        },
        "view" => Ok(snapshot.settings.view_type == parse_view_type(expected).map_err(ViewError::Generic)?),
        "loading" => Ok(snapshot.loading == parse_bool(property, expected)?),
        "error" => match expected {
            "none" => Ok(snapshot.last_error.is_none()),
            text => Ok(snapshot.last_error.as_deref().is_some_and(|e| e.contains(text))),
        },
        _ => Err(ViewError::Generic(format!("Unknown assertion property: {}", property))),
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScriptResult {
    pub duration: Duration,
    pub commands_run: usize,
    pub assertions_passed: usize,
    pub assertions_failed: usize,
    pub errors: Vec<String>,
    pub success: bool,
}

impl ScriptResult {
    pub fn print_summary(&self) {
        println!("🧪 Script Results:");
        println!("   Duration: {:?}", self.duration);
        println!("   Commands run: {}", self.commands_run);
        println!("   Assertions passed: {}", self.assertions_passed);
        println!("   Assertions failed: {}", self.assertions_failed);

        if !self.errors.is_empty() {
            println!("   Errors:");
            for error in &self.errors {
                println!("     - {}", error);
            }
        }

        if self.success {
            println!("   Status: ✅ PASSED");
        } else {
            println!("   Status: ❌ FAILED");
        }
    }
}
