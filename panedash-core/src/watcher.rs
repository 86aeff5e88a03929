// panedash-core/src/watcher.rs

//! Turns edits of the config file into reload triggers.
//!
//! The parent directory is watched rather than the file itself so editors
//! that save by writing a temp file and renaming it over the original are
//! still seen.

use crossbeam::channel::{Receiver, RecvTimeoutError, Sender, TrySendError, bounded, unbounded};
use crossbeam::select;
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const SETTLE_POLL: Duration = Duration::from_millis(100);
const SETTLE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("file watch error: {0}")]
    Notify(#[from] notify::Error),
    #[error("cannot watch {0}: parent directory does not exist")]
    MissingParent(PathBuf),
    #[error("failed to start watcher thread: {0}")]
    Thread(#[from] std::io::Error),
}

enum Settle {
    Ready,
    Missing,
    Stopped,
}

pub struct ConfigWatcher {
    _watcher: RecommendedWatcher,
    stop_tx: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl ConfigWatcher {
    /// Start watching `path`. Each settled change sends one `()` on `trigger`
    /// with `try_send`, so a `bounded(1)` trigger channel coalesces bursts.
    pub fn spawn(path: &Path, trigger: Sender<()>) -> Result<Self, WatchError> {
        let file_name = path
            .file_name()
            .map(OsString::from)
            .ok_or_else(|| WatchError::MissingParent(path.to_path_buf()))?;
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        if !dir.is_dir() {
            return Err(WatchError::MissingParent(path.to_path_buf()));
        }

        let (events_tx, events_rx) = unbounded();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            let _ = events_tx.send(res);
        })?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        let (stop_tx, stop_rx) = bounded::<()>(0);
        let target = path.to_path_buf();
        let thread = thread::Builder::new()
            .name("config-watcher".to_string())
            .spawn(move || watch_loop(&target, &file_name, &events_rx, &stop_rx, &trigger))?;

        tracing::info!(path = %path.display(), dir = %dir.display(), "watching config");

        Ok(Self {
            _watcher: watcher,
            stop_tx: Some(stop_tx),
            thread: Some(thread),
        })
    }
}

impl Drop for ConfigWatcher {
    fn drop(&mut self) {
        self.stop_tx.take();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("config watcher thread panicked");
            }
        }
    }
}

fn watch_loop(
    path: &Path,
    file_name: &OsString,
    events: &Receiver<notify::Result<notify::Event>>,
    stop: &Receiver<()>,
    trigger: &Sender<()>,
) {
    loop {
        let event = select! {
            recv(stop) -> _ => break,
            recv(events) -> msg => match msg {
                Ok(event) => event,
                Err(_) => break,
            },
        };

        let event = match event {
            Ok(event) => event,
            Err(err) => {
                tracing::warn!(error = %err, "config watch failed, hot reload disabled");
                break;
            }
        };
        if !is_relevant(&event, file_name) {
            continue;
        }

        match settle(path, stop) {
            Settle::Stopped => break,
            Settle::Missing => {
                tracing::debug!(path = %path.display(), "config vanished, skipping change");
                continue;
            }
            Settle::Ready => {}
        }

        // Everything queued so far is covered by this reload
        let drained = drain(events);

        match trigger.try_send(()) {
            Ok(()) => tracing::debug!(path = %path.display(), "config change detected"),
            Err(TrySendError::Full(())) => {}
            Err(TrySendError::Disconnected(())) => break,
        }

        if let Err(err) = drained {
            tracing::warn!(error = %err, "config watch failed, hot reload disabled");
            break;
        }
    }
    tracing::debug!("config watcher exited");
}

/// Discard queued events, stopping at the first backend error
fn drain(events: &Receiver<notify::Result<notify::Event>>) -> notify::Result<()> {
    while let Ok(event) = events.try_recv() {
        event?;
    }
    Ok(())
}

fn is_relevant(event: &notify::Event, file_name: &OsString) -> bool {
    matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_))
        && event
            .paths
            .iter()
            .any(|p| p.file_name() == Some(file_name.as_os_str()))
}

/// Wait until the file exists and its size and mtime stop changing
fn settle(path: &Path, stop: &Receiver<()>) -> Settle {
    let deadline = Instant::now() + SETTLE_TIMEOUT;
    let mut last = None;

    loop {
        if !matches!(stop.recv_timeout(SETTLE_POLL), Err(RecvTimeoutError::Timeout)) {
            return Settle::Stopped;
        }

        let current = fs::metadata(path)
            .ok()
            .map(|meta| (meta.len(), meta.modified().ok()));

        if current.is_some() && current == last {
            return Settle::Ready;
        }
        if Instant::now() >= deadline {
            return if current.is_some() {
                Settle::Ready
            } else {
                Settle::Missing
            };
        }
        last = current;
    }
}
