use std::sync::Arc;
use std::thread::JoinHandle;

use crate::error::Result;

/// Callback run on the watcher thread whenever the watched values change.
pub type ChangeCallback = Box<dyn FnMut() + Send + 'static>;

/// Wakes a watcher loop and makes it exit. Raising twice is harmless.
pub trait StopSignal: Send + Sync {
    fn raise(&self);
}

/// Background thread waiting for change notifications.
///
/// Dropping the watcher raises its stop signal and joins the thread, so the callback is
/// never invoked once `drop` has returned.
pub struct ChangeWatcher {
    stop: Arc<dyn StopSignal>,
    thread: Option<JoinHandle<()>>,
}

impl ChangeWatcher {
    /// Runs `body` on a named thread. `body` must return once `stop` is raised.
    pub fn spawn<F>(name: &str, stop: Arc<dyn StopSignal>, body: F) -> Result<Self>
    where
        F: FnOnce() + Send + 'static,
    {
        let thread = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(body)?;
        Ok(Self {
            stop,
            thread: Some(thread),
        })
    }

    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.raise();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::warn!("change watcher thread panicked");
            }
        }
    }
}

impl Drop for ChangeWatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for ChangeWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeWatcher")
            .field("running", &self.thread.is_some())
            .finish()
    }
}
