//! Directory watchers that keep in-memory indexes of the workspace fresh.
//!
//! Each agent indexes its root once at construction and again after every
//! burst of filesystem changes reported by `notify`. Readers get the latest
//! snapshot and a generation counter that increases with every successful
//! reindex.

mod config;
mod registry;

pub use config::{ConfigAgent, ConfigIndex};
pub use registry::{RegistryAgent, RegistryIndex};

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// Quiet period after the last change before an agent reindexes.
const DEBOUNCE_DELAY_MS: u64 = 300;

/// Counter of failed index loads and watch errors, shared between agents.
#[derive(Debug, Clone, Default)]
pub struct ErrorRate {
    errors: Arc<AtomicU64>,
}

impl ErrorRate {
    pub fn record(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }
}

/// Construction options for both agents.
#[derive(Debug, Clone, Default)]
pub struct AgentOptions {
    error_rate: ErrorRate,
    /// Registry only: elements sit directly under the root instead of in
    /// one directory per name component.
    flat: bool,
}

impl AgentOptions {
    pub fn with_error_rate(mut self, error_rate: ErrorRate) -> Self {
        self.error_rate = error_rate;
        self
    }

    pub fn with_flat(mut self, flat: bool) -> Self {
        self.flat = flat;
        self
    }
}

type Loader<S> = fn(&Path, bool) -> std::result::Result<S, walkdir::Error>;

struct Shared<S> {
    agent: &'static str,
    root: PathBuf,
    recursive: bool,
    load: Loader<S>,
    snapshot: RwLock<Arc<S>>,
    generation: AtomicU64,
    error_rate: ErrorRate,
}

impl<S> Shared<S> {
    fn reload(&self) {
        match (self.load)(&self.root, self.recursive) {
            Ok(snapshot) => {
                *self.snapshot.write() = Arc::new(snapshot);
                let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
                debug!(agent = self.agent, generation, "reindexed");
            }
            Err(err) => {
                self.error_rate.record();
                warn!(
                    agent = self.agent,
                    %err,
                    root = %self.root.display(),
                    "reindex failed, keeping previous snapshot"
                );
            }
        }
    }
}

/// A snapshot of `S` kept current by a filesystem watcher.
pub(crate) struct Watched<S> {
    shared: Arc<Shared<S>>,
    // Dropping the watcher stops the OS watch.
    _watcher: Option<RecommendedWatcher>,
}

impl<S: Default + Send + Sync + 'static> Watched<S> {
    /// Index `root` and start watching it.
    ///
    /// A missing root is tolerated: the agent starts empty and unwatched.
    pub(crate) fn start(
        agent: &'static str,
        root: &Path,
        recursive: bool,
        error_rate: ErrorRate,
        load: Loader<S>,
    ) -> Result<Self> {
        let exists = root.is_dir();
        let initial = if exists {
            load(root, recursive).map_err(|err| Error::Agent {
                agent,
                path: root.to_path_buf(),
                message: err.to_string(),
            })?
        } else {
            warn!(agent, root = %root.display(), "root directory does not exist, starting empty");
            S::default()
        };

        let shared = Arc::new(Shared {
            agent,
            root: root.to_path_buf(),
            recursive,
            load,
            snapshot: RwLock::new(Arc::new(initial)),
            generation: AtomicU64::new(0),
            error_rate,
        });
        let watcher = if exists { Some(watch(&shared)?) } else { None };

        info!(
            agent,
            root = %root.display(),
            watching = watcher.is_some(),
            "agent started"
        );
        Ok(Self {
            shared,
            _watcher: watcher,
        })
    }

    pub(crate) fn snapshot(&self) -> Arc<S> {
        self.shared.snapshot.read().clone()
    }

    pub(crate) fn generation(&self) -> u64 {
        self.shared.generation.load(Ordering::SeqCst)
    }

    pub(crate) fn root(&self) -> &Path {
        &self.shared.root
    }

    #[cfg(test)]
    pub(crate) fn reload(&self) {
        self.shared.reload();
    }
}

fn is_tree_change(event: &Event) -> bool {
    matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}

fn watch<S: Send + Sync + 'static>(shared: &Arc<Shared<S>>) -> Result<RecommendedWatcher> {
    let agent_error = |message: String| Error::Agent {
        agent: shared.agent,
        path: shared.root.clone(),
        message,
    };

    let (tx, rx) = mpsc::channel();
    let callback_shared = Arc::clone(shared);
    let mut watcher = notify::recommended_watcher(
        move |result: std::result::Result<Event, notify::Error>| match result {
            Ok(event) if is_tree_change(&event) => {
                // Fails only once the reindex thread has exited.
                let _ = tx.send(());
            }
            Ok(_) => {}
            Err(err) => {
                callback_shared.error_rate.record();
                warn!(agent = callback_shared.agent, %err, "watch error");
            }
        },
    )
    .map_err(|e| agent_error(e.to_string()))?;

    let mode = if shared.recursive {
        RecursiveMode::Recursive
    } else {
        RecursiveMode::NonRecursive
    };
    watcher
        .watch(&shared.root, mode)
        .map_err(|e| agent_error(e.to_string()))?;

    let reindex_shared = Arc::clone(shared);
    std::thread::Builder::new()
        .name(format!("{}-reindex", shared.agent))
        .spawn(move || {
            coalesce(&rx, Duration::from_millis(DEBOUNCE_DELAY_MS), || {
                reindex_shared.reload()
            });
            debug!(agent = reindex_shared.agent, "watcher stopped");
        })
        .map_err(|e| agent_error(e.to_string()))?;

    Ok(watcher)
}

/// Call `reindex` once per burst of change signals.
///
/// A burst ends after `quiet` passes with no new signal. Returns when the
/// sending side is dropped, flushing any pending burst first.
fn coalesce(rx: &Receiver<()>, quiet: Duration, mut reindex: impl FnMut()) {
    while rx.recv().is_ok() {
        loop {
            match rx.recv_timeout(quiet) {
                Ok(()) => {}
                Err(RecvTimeoutError::Timeout) => break,
                Err(RecvTimeoutError::Disconnected) => {
                    reindex();
                    return;
                }
            }
        }
        reindex();
    }
}

/// Regular files under `root`, in file-name order.
pub(crate) fn files_under(
    root: &Path,
    recursive: bool,
) -> std::result::Result<Vec<PathBuf>, walkdir::Error> {
    let mut walker = walkdir::WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name();
    if !recursive {
        walker = walker.max_depth(1);
    }

    let mut files = Vec::new();
    for entry in walker {
        let entry = entry?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}
