//! Background sync for segments written with a non-zero sync interval.

use parking_lot::{Condvar, Mutex, MutexGuard};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

struct Shared {
    stopped: Mutex<bool>,
    wake: Condvar,
    dirty: AtomicBool,
}

/// Periodically syncs a segment file from a background thread.
///
/// The thread owns a cloned handle of the segment file and only syncs when
/// something was written since the last sync. Dropping the value stops and
/// joins the thread.
pub(crate) struct PeriodicSync {
    shared: Arc<Shared>,
    handle: Option<JoinHandle<()>>,
}

impl PeriodicSync {
    /// Starts syncing `file` every `interval`.
    pub(crate) fn start(file: File, path: PathBuf, interval: Duration) -> io::Result<Self> {
        let shared = Arc::new(Shared {
            stopped: Mutex::new(false),
            wake: Condvar::new(),
            dirty: AtomicBool::new(false),
        });

        let worker = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name("tagwal-sync".into())
            .spawn(move || run(&worker, &file, &path, interval))?;

        Ok(Self {
            shared,
            handle: Some(handle),
        })
    }

    /// Records that unsynced bytes were written.
    pub(crate) fn mark_dirty(&self) {
        self.shared.dirty.store(true, Ordering::Release);
    }

    /// Stops the background thread and waits for it to exit.
    pub(crate) fn stop(&mut self) {
        {
            let mut stopped = self.shared.stopped.lock();
            *stopped = true;
            self.shared.wake.notify_all();
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!("segment sync thread panicked");
            }
        }
    }
}

impl Drop for PeriodicSync {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(shared: &Shared, file: &File, path: &Path, interval: Duration) {
    let mut stopped = shared.stopped.lock();
    while !*stopped {
        shared.wake.wait_for(&mut stopped, interval);
        if *stopped {
            break;
        }
        if !shared.dirty.swap(false, Ordering::AcqRel) {
            continue;
        }

        let result = MutexGuard::unlocked(&mut stopped, || file.sync_data());
        if let Err(e) = result {
            tracing::warn!(path = %path.display(), error = %e, "periodic segment sync failed");
            shared.dirty.store(true, Ordering::Release);
        }
    }
}
