//! File system watcher for hot page-list reconfiguration and client
//! reload.
//!
//! Monitors the project root and, for each debounced event batch:
//!
//! - pushes a full client reload when a template in use changed
//!   (template edits affect global structure and cannot be hot-patched)
//! - invokes the reload handler for events passing the configured
//!   include/exclude and event-type filters, which recompiles the page
//!   registry snapshot and swaps it atomically
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      Event Loop                              │
//! │                                                              │
//! │  ┌──────────┐    ┌──────────┐    ┌────────────────────────┐  │
//! │  │ notify   │───▶│ Debouncer│───▶│    handle_batch()      │  │
//! │  │ events   │    │ (300ms)  │    │                        │  │
//! │  └──────────┘    └──────────┘    │  ┌──────────────────┐  │  │
//! │                                  │  │ Template change  │  │  │
//! │                                  │  │ → full reload    │  │  │
//! │                                  │  └──────────────────┘  │  │
//! │                                  │  ┌──────────────────┐  │  │
//! │                                  │  │ Filter match     │  │  │
//! │                                  │  │ → swap registry  │  │  │
//! │                                  │  └──────────────────┘  │  │
//! │                                  └────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```

use crate::config::{AppConfig, WatchConfig, WatchEventKind};
use crate::log;
use crate::registry::{self, Page, RegistryHandle};
use crate::server::ReloadHub;
use crate::utils::path_to_slash;
use anyhow::{Context, Result};
use glob::Pattern;
use notify::{Event, EventKind, RecursiveMode, Watcher, event::RemoveKind};
use rustc_hash::FxHashMap;
use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, Instant},
};

const DEBOUNCE_MS: u64 = 300;

// =============================================================================
// Path Utilities
// =============================================================================

/// Check if path is a temp/backup file (editor artifacts).
fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(ext, "bck" | "bak" | "backup" | "swp" | "swo" | "tmp")
        || name.ends_with('~')
        || name.starts_with('.')
}

/// Map a notify event kind to the handler-facing kind.
fn map_event(kind: &EventKind, path: &Path) -> Option<WatchEventKind> {
    match kind {
        EventKind::Create(_) => Some(if path.is_dir() {
            WatchEventKind::AddDir
        } else {
            WatchEventKind::Add
        }),
        EventKind::Modify(_) => Some(WatchEventKind::Change),
        EventKind::Remove(RemoveKind::Folder) => Some(WatchEventKind::UnlinkDir),
        EventKind::Remove(_) => Some(WatchEventKind::Unlink),
        _ => None,
    }
}

// =============================================================================
// Debounce State
// =============================================================================

/// Batches rapid file events with debouncing.
struct Debouncer {
    pending: FxHashMap<PathBuf, WatchEventKind>,
    last_event: Option<Instant>,
}

impl Debouncer {
    fn new() -> Self {
        Self {
            pending: FxHashMap::default(),
            last_event: None,
        }
    }

    fn add(&mut self, path: PathBuf, event: WatchEventKind) {
        if !is_temp_file(&path) {
            self.pending.insert(path, event);
            self.last_event = Some(Instant::now());
        }
    }

    fn ready(&self) -> bool {
        !self.pending.is_empty()
            && self
                .last_event
                .is_some_and(|t| t.elapsed() >= Duration::from_millis(DEBOUNCE_MS))
    }

    fn take(&mut self) -> Vec<(PathBuf, WatchEventKind)> {
        self.last_event = None;
        self.pending.drain().collect()
    }

    fn timeout(&self) -> Duration {
        if self.pending.is_empty() {
            Duration::from_secs(60)
        } else {
            Duration::from_millis(DEBOUNCE_MS)
        }
    }
}

// =============================================================================
// Event Filter
// =============================================================================

/// Include/exclude globs plus the event-type subset from `[watch]`.
struct EventFilter {
    include: Vec<Pattern>,
    exclude: Vec<Pattern>,
    events: Option<Vec<WatchEventKind>>,
}

impl EventFilter {
    fn from_config(config: &WatchConfig) -> Result<Self> {
        let compile = |patterns: &[String]| -> Result<Vec<Pattern>> {
            patterns
                .iter()
                .map(|p| Pattern::new(p).with_context(|| format!("Invalid watch pattern '{p}'")))
                .collect()
        };
        Ok(Self {
            include: compile(&config.include)?,
            exclude: compile(&config.exclude)?,
            events: config.events.clone(),
        })
    }

    /// Empty include means everything matches.
    fn matches(&self, file: &str, event: WatchEventKind) -> bool {
        if let Some(events) = &self.events
            && !events.contains(&event)
        {
            return false;
        }
        if !self.include.is_empty() && !self.include.iter().any(|p| p.matches(file)) {
            return false;
        }
        !self.exclude.iter().any(|p| p.matches(file))
    }
}

// =============================================================================
// Reload Handler
// =============================================================================

/// Context passed to the reload handler for one matching event.
pub struct WatchContext<'a> {
    pub event: WatchEventKind,
    /// Changed path, relative to the project root, '/'-separated.
    pub file: String,
    reload: &'a dyn Fn(Vec<Page>),
}

impl WatchContext<'_> {
    /// Replace the page list: recompiles the registry snapshot from the
    /// given pages (plus the directory scan) and swaps it atomically.
    pub fn reload_pages(&self, pages: Vec<Page>) {
        (self.reload)(pages);
    }
}

/// Reload closure shared by all events: recompile and swap, keeping the
/// old snapshot on failure.
fn make_reload(
    config: &'static AppConfig,
    registry: &Arc<RegistryHandle>,
) -> impl Fn(Vec<Page>) + use<> {
    let registry = Arc::clone(registry);
    move |pages: Vec<Page>| {
        let scanned = match registry::scan_pages(&config.scan, config.get_root()) {
            Ok(scanned) => scanned,
            Err(err) => {
                log!("error"; "page scan failed: {err:#}");
                return;
            }
        };
        let template = config.build.template.to_string_lossy();
        match registry::compile(&pages, &scanned, &template) {
            Ok(snapshot) => registry.replace(snapshot),
            Err(err) => log!("error"; "page reload failed: {err}"),
        }
    }
}

fn handle_batch(
    changes: &[(PathBuf, WatchEventKind)],
    config: &'static AppConfig,
    registry: &Arc<RegistryHandle>,
    hub: Option<&ReloadHub>,
    filter: &EventFilter,
    reload: &dyn Fn(Vec<Page>),
) {
    let root = config.get_root();

    for (path, event) in changes {
        let rel = path_to_slash(path.strip_prefix(root).unwrap_or(path.as_path()));

        // Template edits always force a full client reload, regardless
        // of the configured filters.
        if *event == WatchEventKind::Change
            && registry.load().is_template(&rel)
            && let Some(hub) = hub
        {
            log!("watch"; "template changed - {rel}, reloading clients");
            hub.broadcast_reload();
        }

        if !filter.matches(&rel, *event) {
            continue;
        }

        let ctx = WatchContext {
            event: *event,
            file: rel,
            reload,
        };
        reload_handler(config, &ctx);
    }
}

/// Built-in handler for matching events: re-reads the declared page
/// list and reloads, which also picks up scan-directory changes.
fn reload_handler(config: &AppConfig, ctx: &WatchContext<'_>) {
    if config.serve.verbose {
        log!("watch"; "file {} - {}", ctx.event, ctx.file);
    }
    ctx.reload_pages(config.pages.iter().map(Page::from_config).collect());
}

// =============================================================================
// Public API
// =============================================================================

/// Start blocking file watcher with debouncing.
pub fn watch_for_changes_blocking(
    config: &'static AppConfig,
    registry: Arc<RegistryHandle>,
    hub: Option<Arc<ReloadHub>>,
) -> Result<()> {
    let root = config.get_root();

    let (tx, rx) = std::sync::mpsc::channel();
    let mut watcher = notify::recommended_watcher(tx).context("Failed to create file watcher")?;
    watcher
        .watch(root, RecursiveMode::Recursive)
        .with_context(|| format!("Failed to watch {}", root.display()))?;

    if config.serve.verbose {
        log!("watch"; "watching {}", root.display());
    }

    let filter = EventFilter::from_config(&config.watch)?;
    let reload = make_reload(config, &registry);
    let mut debouncer = Debouncer::new();

    loop {
        match rx.recv_timeout(debouncer.timeout()) {
            Ok(Ok(Event { kind, paths, .. })) => {
                for path in paths {
                    if let Some(event) = map_event(&kind, &path) {
                        debouncer.add(path, event);
                    }
                }
            }
            Ok(Err(e)) => log!("watch"; "error: {e}"),
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) if debouncer.ready() => {
                handle_batch(
                    &debouncer.take(),
                    config,
                    &registry,
                    hub.as_deref(),
                    &filter,
                    &reload,
                );
            }
            Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => break,
            // Timeout without pending events
            _ => {}
        }
    }

    Ok(())
}
