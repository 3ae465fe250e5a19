use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{HdrError, Result};
use crate::store::SettingsStore;
use crate::watcher::{ChangeCallback, ChangeWatcher};

pub const RUN_KEY: &str = "Software\\Microsoft\\Windows\\CurrentVersion\\Run";
pub const RUN_VALUE_NAME: &str = "HDRTray";
pub const TRAY_EXE_NAME: &str = "hdrtray.exe";

/// The tray executable installed next to the running program.
pub fn tray_exe_path() -> Result<PathBuf> {
    let exe = std::env::current_exe()?;
    let dir = exe
        .parent()
        .ok_or_else(|| HdrError::Io(format!("{} has no parent directory", exe.display())))?;
    Ok(dir.join(TRAY_EXE_NAME))
}

fn strip_quotes(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .unwrap_or(value)
}

/// Whether the tray is started when the user logs in.
#[derive(Clone)]
pub struct LoginStartupConfig {
    store: Arc<dyn SettingsStore>,
    exe: PathBuf,
}

impl LoginStartupConfig {
    pub fn new(store: Arc<dyn SettingsStore>, exe: PathBuf) -> Self {
        Self { store, exe }
    }

    /// Run key of the current user, registering the tray next to this executable.
    #[cfg(windows)]
    pub fn open_default() -> Result<Self> {
        Ok(Self::new(
            Arc::new(crate::store::registry::RegistryStore::current_user(RUN_KEY)),
            tray_exe_path()?,
        ))
    }

    pub fn exe(&self) -> &Path {
        &self.exe
    }

    /// Enabled when the registered command refers to the same file as the tray executable.
    pub fn is_enabled(&self) -> Result<bool> {
        let Some(value) = self.store.read_string(RUN_VALUE_NAME)? else {
            return Ok(false);
        };
        let registered = strip_quotes(value.trim());
        if registered.is_empty() {
            return Ok(false);
        }

        let Ok(registered) = std::fs::canonicalize(registered) else {
            tracing::debug!(path = registered, "registered startup command does not exist");
            return Ok(false);
        };
        let expected = std::fs::canonicalize(&self.exe)?;
        Ok(registered == expected)
    }

    pub fn set_enabled(&self, enabled: bool) -> Result<()> {
        if enabled {
            let command = format!("\"{}\"", self.exe.display());
            tracing::info!(%command, "registering login startup");
            self.store.write_string(RUN_VALUE_NAME, &command)
        } else {
            tracing::info!("removing login startup");
            self.store.delete_value(RUN_VALUE_NAME)
        }
    }

    pub fn watch(&self, callback: ChangeCallback) -> Result<ChangeWatcher> {
        self.store.watch(callback)
    }
}

impl std::fmt::Debug for LoginStartupConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginStartupConfig")
            .field("exe", &self.exe)
            .finish_non_exhaustive()
    }
}
