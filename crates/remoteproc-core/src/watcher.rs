//! Directory change observer.
//!
//! Turns raw filesystem notifications for one directory into
//! [`FileChange`] events carrying the file's new, trimmed content.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, bounded, select, unbounded};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use thiserror::Error;
use tracing::{debug, trace, warn};

#[derive(Error, Debug)]
pub enum WatchError {
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("Failed to create file watcher: {0}")]
    Init(#[source] notify::Error),

    #[error("Failed to watch {path}: {source}")]
    Watch {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    #[error("Failed to spawn watcher thread: {0}")]
    Spawn(#[from] io::Error),
}

/// A file in the watched directory now holds `value`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    /// Base name of the file.
    pub filename: String,
    /// Content with surrounding whitespace trimmed.
    pub value: String,
}

/// Watches a single directory (non-recursive) for content writes.
pub struct DirWatcher {
    dir: PathBuf,
    watcher: Option<RecommendedWatcher>,
    changes: Receiver<FileChange>,
    stop: Option<Sender<()>>,
    reader: Option<JoinHandle<()>>,
}

impl DirWatcher {
    /// Start watching `dir`.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, WatchError> {
        let dir = dir.as_ref().to_path_buf();
        if !dir.is_dir() {
            return Err(WatchError::NotADirectory(dir));
        }

        let (raw_tx, raw_rx) = unbounded::<notify::Result<Event>>();
        let mut watcher = notify::recommended_watcher(move |res| {
            // Receiver gone means the reader already stopped.
            let _ = raw_tx.send(res);
        })
        .map_err(WatchError::Init)?;
        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .map_err(|source| WatchError::Watch {
                path: dir.clone(),
                source,
            })?;

        let (change_tx, change_rx) = unbounded();
        let (stop_tx, stop_rx) = bounded::<()>(0);
        let reader = thread::Builder::new()
            .name("dirwatcher".into())
            .spawn(move || read_loop(raw_rx, stop_rx, change_tx))?;

        debug!(dir = %dir.display(), "Watching directory");
        Ok(Self {
            dir,
            watcher: Some(watcher),
            changes: change_rx,
            stop: Some(stop_tx),
            reader: Some(reader),
        })
    }

    /// Changes in arrival order. Disconnects once the watcher is closed.
    pub fn changes(&self) -> &Receiver<FileChange> {
        &self.changes
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Release the OS watch and stop the reader thread. Idempotent.
    pub fn close(&mut self) {
        if let Some(mut watcher) = self.watcher.take() {
            if let Err(e) = watcher.unwatch(&self.dir) {
                debug!(error = %e, "Unwatch failed");
            }
        }
        self.stop.take();
        if let Some(reader) = self.reader.take() {
            if reader.join().is_err() {
                warn!("Directory watcher thread panicked");
            }
        }
    }
}

impl Drop for DirWatcher {
    fn drop(&mut self) {
        self.close();
    }
}

fn read_loop(
    raw: Receiver<notify::Result<Event>>,
    stop: Receiver<()>,
    changes: Sender<FileChange>,
) {
    loop {
        select! {
            recv(stop) -> _ => break,
            recv(raw) -> msg => match msg {
                Ok(Ok(event)) => {
                    for change in changes_from_event(&event) {
                        if changes.send(change).is_err() {
                            return;
                        }
                    }
                }
                Ok(Err(e)) => warn!(error = %e, "Watcher error"),
                // Notification source ended.
                Err(_) => break,
            },
        }
    }
    debug!("Directory watcher stopped");
}

fn changes_from_event(event: &Event) -> Vec<FileChange> {
    if !is_content_write(&event.kind) {
        trace!(kind = ?event.kind, "Ignoring event");
        return Vec::new();
    }

    event
        .paths
        .iter()
        .filter_map(|path| {
            let filename = path.file_name()?.to_string_lossy().into_owned();
            match fs::read_to_string(path) {
                Ok(content) => Some(FileChange {
                    filename,
                    value: content.trim().to_string(),
                }),
                Err(e) => {
                    warn!(file = %filename, error = %e, "Error reading changed file");
                    None
                }
            }
        })
        .collect()
}

/// inotify reports one close-after-write per completed write, with the
/// content in place.
#[cfg(target_os = "linux")]
fn is_content_write(kind: &EventKind) -> bool {
    use notify::event::{AccessKind, AccessMode};
    matches!(kind, EventKind::Access(AccessKind::Close(AccessMode::Write)))
}

#[cfg(not(target_os = "linux"))]
fn is_content_write(kind: &EventKind) -> bool {
    use notify::event::ModifyKind;
    matches!(kind, EventKind::Modify(ModifyKind::Data(_) | ModifyKind::Any))
}
