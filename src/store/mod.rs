//! Persisted key-value areas scoped to the current user.

#[cfg(windows)]
pub mod registry;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::error::{HdrError, Result};
use crate::watcher::{ChangeCallback, ChangeWatcher, StopSignal};

/// Win32 `ERROR_UNSUPPORTED_TYPE`, for a value read with the wrong type.
const ERROR_UNSUPPORTED_TYPE: u32 = 1630;

/// One key of a persisted settings area.
///
/// Values are read and written one at a time. Nothing is locked across operations.
pub trait SettingsStore: Send + Sync {
    /// Reads a numeric value. A missing value is [`HdrError::ValueNotFound`].
    fn read_dword(&self, name: &str) -> Result<u32>;

    fn write_dword(&self, name: &str, value: u32) -> Result<()>;

    /// Reads a string value. Missing values and values of another type are `None`.
    fn read_string(&self, name: &str) -> Result<Option<String>>;

    fn write_string(&self, name: &str, value: &str) -> Result<()>;

    /// Removes a value. Removing a missing value succeeds.
    fn delete_value(&self, name: &str) -> Result<()>;

    /// Invokes `callback` on a background thread whenever a value of this key changes.
    fn watch(&self, callback: ChangeCallback) -> Result<ChangeWatcher>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum MemoryValue {
    Dword(u32),
    String(String),
}

#[derive(Debug, Default)]
struct MemoryValues {
    entries: HashMap<String, MemoryValue>,
    generation: u64,
}

#[derive(Debug, Default)]
struct MemoryShared {
    values: Mutex<MemoryValues>,
    changed: Condvar,
}

/// Settings store kept in process memory, shared between clones.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    shared: Arc<MemoryShared>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn modify<F>(&self, change: F)
    where
        F: FnOnce(&mut HashMap<String, MemoryValue>) -> bool,
    {
        let mut values = self.shared.values.lock();
        if change(&mut values.entries) {
            values.generation += 1;
            self.shared.changed.notify_all();
        }
    }
}

struct MemoryStop {
    shared: Arc<MemoryShared>,
    stopped: AtomicBool,
}

impl StopSignal for MemoryStop {
    fn raise(&self) {
        self.stopped.store(true, Ordering::Release);
        // Taking the lock orders the flag with a waiter that is about to block.
        let _values = self.shared.values.lock();
        self.shared.changed.notify_all();
    }
}

impl SettingsStore for MemoryStore {
    fn read_dword(&self, name: &str) -> Result<u32> {
        match self.shared.values.lock().entries.get(name) {
            Some(MemoryValue::Dword(value)) => Ok(*value),
            Some(MemoryValue::String(_)) => Err(HdrError::Registry(ERROR_UNSUPPORTED_TYPE)),
            None => Err(HdrError::ValueNotFound(name.to_string())),
        }
    }

    fn write_dword(&self, name: &str, value: u32) -> Result<()> {
        self.modify(|entries| {
            entries.insert(name.to_string(), MemoryValue::Dword(value)) != Some(MemoryValue::Dword(value))
        });
        Ok(())
    }

    fn read_string(&self, name: &str) -> Result<Option<String>> {
        match self.shared.values.lock().entries.get(name) {
            Some(MemoryValue::String(value)) => Ok(Some(value.clone())),
            _ => Ok(None),
        }
    }

    fn write_string(&self, name: &str, value: &str) -> Result<()> {
        let value = MemoryValue::String(value.to_string());
        self.modify(|entries| entries.insert(name.to_string(), value.clone()) != Some(value));
        Ok(())
    }

    fn delete_value(&self, name: &str) -> Result<()> {
        self.modify(|entries| entries.remove(name).is_some());
        Ok(())
    }

    fn watch(&self, mut callback: ChangeCallback) -> Result<ChangeWatcher> {
        let stop = Arc::new(MemoryStop {
            shared: Arc::clone(&self.shared),
            stopped: AtomicBool::new(false),
        });
        let for_thread = Arc::clone(&stop);
        let shared = Arc::clone(&self.shared);
        let mut seen = shared.values.lock().generation;

        ChangeWatcher::spawn("memory-store-watcher", stop, move || {
            let mut values = shared.values.lock();
            loop {
                if for_thread.stopped.load(Ordering::Acquire) {
                    break;
                }
                if values.generation != seen {
                    seen = values.generation;
                    MutexGuard::unlocked(&mut values, || callback());
                    continue;
                }
                shared.changed.wait(&mut values);
            }
        })
    }
}
