use std::sync::Arc;

use crate::error::Result;
use crate::store::SettingsStore;
use crate::watcher::{ChangeCallback, ChangeWatcher};

/// Registry key below `HKEY_CURRENT_USER` holding the per-display flags.
pub const SELECTION_KEY: &str = "SOFTWARE\\HDRTray";
pub const DISPLAY_VALUE_PREFIX: &str = "Display.";

/// Persisted "include in toggling" flag per display, keyed by stable monitor id.
///
/// Displays without an entry are included. Entries of disconnected displays are kept.
#[derive(Clone)]
pub struct SelectionStore {
    store: Arc<dyn SettingsStore>,
}

impl SelectionStore {
    pub fn new(store: Arc<dyn SettingsStore>) -> Self {
        Self { store }
    }

    /// The selection of the current user.
    #[cfg(windows)]
    pub fn open_default() -> Self {
        Self::new(Arc::new(crate::store::registry::RegistryStore::current_user(SELECTION_KEY)))
    }

    pub fn value_name(stable_id: &str) -> String {
        format!("{DISPLAY_VALUE_PREFIX}{stable_id}")
    }

    pub fn get_enabled_flag(&self, stable_id: &str) -> Result<bool> {
        Ok(self.store.read_dword(&Self::value_name(stable_id))? != 0)
    }

    pub fn set_enabled_flag(&self, stable_id: &str, enabled: bool) -> Result<()> {
        self.store
            .write_dword(&Self::value_name(stable_id), u32::from(enabled))
    }

    pub fn is_enabled(&self, stable_id: &str) -> bool {
        self.get_enabled_flag(stable_id).unwrap_or(true)
    }

    pub fn watch(&self, callback: ChangeCallback) -> Result<ChangeWatcher> {
        self.store.watch(callback)
    }
}

impl std::fmt::Debug for SelectionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelectionStore").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HdrError;
    use crate::store::MemoryStore;

    #[test]
    fn flags_round_trip() {
        let backing = MemoryStore::new();
        let selection = SelectionStore::new(Arc::new(backing.clone()));

        selection.set_enabled_flag("MON1", false).unwrap();
        assert_eq!(selection.get_enabled_flag("MON1"), Ok(false));
        assert_eq!(backing.read_dword("Display.MON1"), Ok(0));

        selection.set_enabled_flag("MON1", true).unwrap();
        assert_eq!(selection.get_enabled_flag("MON1"), Ok(true));
    }

    #[test]
    fn unknown_display_is_enabled() {
        let selection = SelectionStore::new(Arc::new(MemoryStore::new()));

        assert!(matches!(
            selection.get_enabled_flag("NEW"),
            Err(HdrError::ValueNotFound(_))
        ));
        assert!(selection.is_enabled("NEW"));
    }

    #[test]
    fn any_nonzero_value_is_enabled() {
        let backing = MemoryStore::new();
        backing.write_dword("Display.X", 7).unwrap();
        let selection = SelectionStore::new(Arc::new(backing));

        assert_eq!(selection.get_enabled_flag("X"), Ok(true));
    }
}
