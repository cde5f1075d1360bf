//! File system watcher for live rebuilds.
//!
//! Every non-excluded directory of the source tree is watched on its own,
//! non-recursively, so excluded directories such as the output directory
//! never produce events.
//!
//! ```text
//! notify event ──▶ source-relative path ──▶ excluded? ──▶ drop
//!                                              │
//!                                              ├── new directory ──▶ watch it, queue its files
//!                                              ├── file          ──▶ queue BuildJob::File
//!                                              └── gone          ──▶ unwatch it and below
//! ```
//!
//! Events are not debounced. Duplicate events for one save are cheap since
//! the second build attempt finds the output up to date. A directory that
//! cannot be subscribed is logged and skipped; only a stopped build worker
//! ends the loop.

use crate::{
    build::{Builder, EntryKind},
    log,
    queue::BuildJob,
};
use anyhow::{Context, Result};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use rustc_hash::FxHashSet;
use std::{
    path::{Path, PathBuf},
    sync::{Arc, mpsc},
};

/// Directories currently subscribed to.
struct WatchSet<W> {
    watcher: W,
    dirs: FxHashSet<PathBuf>,
}

impl<W: Watcher> WatchSet<W> {
    fn new(watcher: W) -> Self {
        Self {
            watcher,
            dirs: FxHashSet::default(),
        }
    }

    /// Subscribe to `dir` unless already watched.
    ///
    /// Only successful subscriptions are recorded, so a failed one is
    /// retried on the next event for that directory.
    fn add(&mut self, dir: &Path) -> Result<()> {
        if self.dirs.contains(dir) {
            return Ok(());
        }
        self.watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch {}", dir.display()))?;
        self.dirs.insert(dir.to_path_buf());
        Ok(())
    }

    /// Drop `dir` and every watched directory below it.
    fn forget(&mut self, dir: &Path) {
        let gone: Vec<PathBuf> = self
            .dirs
            .iter()
            .filter(|watched| watched.starts_with(dir))
            .cloned()
            .collect();
        for watched in gone {
            self.dirs.remove(&watched);
            // The backend may already have dropped a deleted directory.
            self.watcher.unwatch(&watched).ok();
        }
    }

    fn contains(&self, dir: &Path) -> bool {
        self.dirs.contains(dir)
    }

    fn len(&self) -> usize {
        self.dirs.len()
    }
}

const fn is_relevant(event: &Event) -> bool {
    matches!(
        event.kind,
        EventKind::Modify(_) | EventKind::Create(_) | EventKind::Remove(_)
    )
}

/// Turns watcher events into build jobs.
struct ChangeHandler<W> {
    builder: Arc<Builder>,
    jobs: mpsc::Sender<BuildJob>,
    watched: WatchSet<W>,
}

impl<W: Watcher> ChangeHandler<W> {
    /// Subscribe to the source root and every directory the build would visit.
    fn subscribe_tree(&mut self) -> Result<()> {
        let source = self.builder.source().to_path_buf();
        self.watched.add(&source)?;
        self.subscribe_entries(Path::new(""), false)
    }

    /// Subscribe to the directories below `rel`, optionally queueing the files.
    fn subscribe_entries(&mut self, rel: &Path, queue_files: bool) -> Result<()> {
        for entry in self.builder.collect_entries_in(rel) {
            match entry.kind {
                EntryKind::Directory => {
                    let dir = self.builder.source().join(&entry.path);
                    self.subscribe_dir(&dir);
                }
                EntryKind::File if queue_files => self.submit(entry.path)?,
                EntryKind::File => {}
            }
        }
        Ok(())
    }

    fn subscribe_dir(&mut self, dir: &Path) {
        if let Err(err) = self.watched.add(dir) {
            log!("watch"; "{err:#}");
        }
    }

    /// Process every path of one relevant event.
    ///
    /// Fails only when the build worker is gone.
    fn handle_event(&mut self, event: &Event) -> Result<()> {
        let created = matches!(event.kind, EventKind::Create(_));
        for path in &event.paths {
            self.handle(path, created)?;
        }
        Ok(())
    }

    fn handle(&mut self, path: &Path, created: bool) -> Result<()> {
        let Ok(rel) = path.strip_prefix(self.builder.source()) else {
            return Ok(());
        };
        if rel.as_os_str().is_empty() || self.builder.policy().is_excluded_path(rel) {
            return Ok(());
        }
        let rel = rel.to_path_buf();

        if path.is_dir() {
            if created || !self.watched.contains(path) {
                // A recreated directory needs a fresh subscription.
                self.watched.forget(path);
                log!("watch"; "watching new directory {}", rel.display());
                self.subscribe_dir(path);
                self.subscribe_entries(&rel, true)?;
            }
        } else if path.is_file() {
            self.submit(rel)?;
        } else {
            self.watched.forget(path);
        }
        Ok(())
    }

    fn submit(&self, rel: PathBuf) -> Result<()> {
        self.jobs
            .send(BuildJob::File(rel))
            .context("Build worker has stopped")
    }
}

/// Watch the source tree and queue a rebuild for every changed file.
///
/// Blocks until the watcher shuts down or the build worker stops.
pub fn watch_for_changes_blocking(
    builder: Arc<Builder>,
    jobs: mpsc::Sender<BuildJob>,
) -> Result<()> {
    let (tx, rx) = mpsc::channel();
    let watcher = notify::recommended_watcher(tx).context("Failed to create file watcher")?;

    let mut handler = ChangeHandler {
        builder,
        jobs,
        watched: WatchSet::new(watcher),
    };
    handler.subscribe_tree()?;
    log!("watch"; "watching {} directories", handler.watched.len());

    for res in rx {
        match res {
            Ok(event) if is_relevant(&event) => handler.handle_event(&event)?,
            Ok(_) => {}
            Err(e) => log!("watch"; "error: {e}"),
        }
    }

    Ok(())
}
