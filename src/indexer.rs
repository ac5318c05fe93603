/// Catalogue rebuilds.
///
/// [`rebuild`] is the synchronous core: clear the catalogue, walk every
/// root, scan each file and append what it declares.  [`IndexBuilder`]
/// runs that core on a dedicated thread so request handling never waits on
/// directory traversal, and makes sure at most one rebuild per builder is
/// live at a time.
///
/// # Cancellation
///
/// Cancellation is cooperative.  Roots are walked lazily and the flag is
/// checked before each file and again under the catalogue's write lock before every append, so once a
/// newer rebuild has cleared the catalogue a cancelled one can no longer
/// add to it.  The file a cancelled worker is reading when the flag flips
/// is still read to the end.
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

use parking_lot::{Mutex, RwLock};

use crate::catalogue::{NamespaceCatalogue, SharedCatalogue};
use crate::scanner::FileScanner;

/// Shared stop request for one rebuild.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RebuildSummary {
    pub files_scanned: usize,
    pub entries_added: usize,
    pub cancelled: bool,
}

/// Rebuild `catalogue` from `roots`, stopping early if `cancel` is set.
pub fn rebuild(
    catalogue: &RwLock<NamespaceCatalogue>,
    roots: &[PathBuf],
    scanner: &FileScanner,
    cancel: &CancellationFlag,
) -> RebuildSummary {
    let mut summary = RebuildSummary::default();

    {
        let mut cat = catalogue.write();
        if cancel.is_cancelled() {
            summary.cancelled = true;
            return summary;
        }
        cat.clear();
    }

    for root in roots {
        for file in scanner.source_files(root) {
            if cancel.is_cancelled() {
                summary.cancelled = true;
                return summary;
            }
            summary.files_scanned += 1;

            let Some(entry) = scanner.scan_file(&file) else {
                continue;
            };
            let mut cat = catalogue.write();
            if cancel.is_cancelled() {
                summary.cancelled = true;
                return summary;
            }
            cat.push(entry);
            summary.entries_added += 1;
        }
    }

    summary
}

enum HandleState {
    Running(JoinHandle<RebuildSummary>),
    Done(RebuildSummary),
}

/// Handle to a started rebuild.  Dropping it detaches the worker.
pub struct RebuildHandle {
    flag: CancellationFlag,
    state: HandleState,
}

impl RebuildHandle {
    pub fn cancel(&self) {
        self.flag.cancel();
    }

    pub fn is_finished(&self) -> bool {
        match &self.state {
            HandleState::Running(handle) => handle.is_finished(),
            HandleState::Done(_) => true,
        }
    }

    /// Wait for the worker to settle.  A worker that panicked reports as
    /// cancelled.
    pub fn join(self) -> RebuildSummary {
        match self.state {
            HandleState::Running(handle) => handle.join().unwrap_or(RebuildSummary {
                cancelled: true,
                ..RebuildSummary::default()
            }),
            HandleState::Done(summary) => summary,
        }
    }
}

/// Runs rebuilds for one project on a background thread.
pub struct IndexBuilder {
    scanner: Mutex<Arc<FileScanner>>,
    current: Mutex<Option<CancellationFlag>>,
}

impl Default for IndexBuilder {
    fn default() -> Self {
        Self::new(FileScanner::default())
    }
}

impl IndexBuilder {
    pub fn new(scanner: FileScanner) -> Self {
        Self {
            scanner: Mutex::new(Arc::new(scanner)),
            current: Mutex::new(None),
        }
    }

    /// Use `scanner` for rebuilds started from now on.
    pub fn set_scanner(&self, scanner: FileScanner) {
        *self.scanner.lock() = Arc::new(scanner);
    }

    /// Ask the in-flight rebuild, if any, to stop.
    pub fn cancel(&self) {
        if let Some(flag) = self.current.lock().take() {
            flag.cancel();
        }
    }

    pub fn start(&self, catalogue: SharedCatalogue, roots: Vec<PathBuf>) -> RebuildHandle {
        self.start_with(catalogue, roots, |_| {})
    }

    /// Start a rebuild, cancelling the previous one first.  `on_finish`
    /// runs on the worker thread once the rebuild settles.
    pub fn start_with<F>(
        &self,
        catalogue: SharedCatalogue,
        roots: Vec<PathBuf>,
        on_finish: F,
    ) -> RebuildHandle
    where
        F: FnOnce(RebuildSummary) + Send + 'static,
    {
        let mut current = self.current.lock();
        if let Some(previous) = current.take() {
            tracing::debug!("cancelling in-flight rebuild");
            previous.cancel();
        }

        let flag = CancellationFlag::new();
        *current = Some(flag.clone());
        let scanner = Arc::clone(&self.scanner.lock());

        let worker_flag = flag.clone();
        let job = move || {
            tracing::info!(roots = roots.len(), "Beginning indexing");
            let summary = rebuild(&catalogue, &roots, &scanner, &worker_flag);
            if summary.cancelled {
                tracing::debug!(
                    files = summary.files_scanned,
                    "rebuild cancelled before completion"
                );
            } else {
                tracing::info!(
                    files = summary.files_scanned,
                    entries = summary.entries_added,
                    "Finished indexing"
                );
            }
            on_finish(summary);
            summary
        };

        let state = match std::thread::Builder::new()
            .name("phpnaha-indexer".to_string())
            .spawn(job)
        {
            Ok(handle) => HandleState::Running(handle),
            Err(err) => {
                tracing::warn!(error = %err, "could not spawn indexer thread");
                HandleState::Done(RebuildSummary {
                    cancelled: true,
                    ..RebuildSummary::default()
                })
            }
        };

        RebuildHandle { flag, state }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
