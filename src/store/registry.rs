use std::sync::Arc;

use crossbeam_channel::bounded;

use windows::{
    core::{HSTRING, PCWSTR},
    Win32::Foundation::{
        CloseHandle, ERROR_FILE_NOT_FOUND, ERROR_SUCCESS, HANDLE, WAIT_OBJECT_0, WIN32_ERROR,
    },
    Win32::System::Registry::{
        RegCloseKey, RegCreateKeyExW, RegDeleteValueW, RegNotifyChangeKeyValue, RegOpenKeyExW,
        RegQueryValueExW, RegSetValueExW, HKEY, HKEY_CURRENT_USER, KEY_NOTIFY, KEY_READ,
        KEY_WRITE, REG_DWORD, REG_NOTIFY_CHANGE_LAST_SET, REG_OPTION_NON_VOLATILE, REG_SAM_FLAGS,
        REG_SZ, REG_VALUE_TYPE,
    },
    Win32::System::Threading::{CreateEventW, ResetEvent, SetEvent, WaitForMultipleObjects, INFINITE},
};

use super::SettingsStore;
use crate::error::{HdrError, Result};
use crate::platform::wide_to_string;
use crate::watcher::{ChangeCallback, ChangeWatcher, StopSignal};

const ERROR_UNSUPPORTED_TYPE: u32 = 1630;

fn check(rc: WIN32_ERROR) -> Result<()> {
    if rc == ERROR_SUCCESS {
        Ok(())
    } else {
        Err(HdrError::Registry(rc.0))
    }
}

/// Open registry key handle, closed on drop.
#[derive(Debug)]
pub struct RegistryKey(HKEY);

// A key handle may be used and closed from any thread.
unsafe impl Send for RegistryKey {}

impl RegistryKey {
    pub fn open(root: HKEY, path: &str, access: REG_SAM_FLAGS) -> Result<Self> {
        let subkey = HSTRING::from(path);
        let mut hkey = HKEY::default();
        check(unsafe { RegOpenKeyExW(root, &subkey, None, access, &mut hkey) })?;
        Ok(Self(hkey))
    }

    pub fn create(root: HKEY, path: &str, access: REG_SAM_FLAGS) -> Result<Self> {
        let subkey = HSTRING::from(path);
        let mut hkey = HKEY::default();
        check(unsafe {
            RegCreateKeyExW(
                root,
                &subkey,
                None,
                PCWSTR::null(),
                REG_OPTION_NON_VOLATILE,
                access,
                None,
                &mut hkey,
                None,
            )
        })?;
        Ok(Self(hkey))
    }

    fn query(&self, name: &str, buffer: Option<&mut [u8]>) -> Result<(REG_VALUE_TYPE, u32)> {
        let value_name = HSTRING::from(name);
        let mut value_type = REG_VALUE_TYPE::default();
        let (data, mut size) = match buffer {
            Some(buffer) => (Some(buffer.as_mut_ptr()), buffer.len() as u32),
            None => (None, 0),
        };

        let rc = unsafe {
            RegQueryValueExW(self.0, &value_name, None, Some(&mut value_type), data, Some(&mut size))
        };
        if rc == ERROR_FILE_NOT_FOUND {
            return Err(HdrError::ValueNotFound(name.to_string()));
        }
        check(rc)?;
        Ok((value_type, size))
    }

    pub fn read_dword(&self, name: &str) -> Result<u32> {
        let mut bytes = [0u8; 4];
        let (value_type, size) = self.query(name, Some(&mut bytes))?;
        if value_type != REG_DWORD || size != 4 {
            return Err(HdrError::Registry(ERROR_UNSUPPORTED_TYPE));
        }
        Ok(u32::from_le_bytes(bytes))
    }

    pub fn write_dword(&self, name: &str, value: u32) -> Result<()> {
        let value_name = HSTRING::from(name);
        let bytes = value.to_le_bytes();
        check(unsafe { RegSetValueExW(self.0, &value_name, None, REG_DWORD, Some(&bytes)) })
    }

    /// Reads a `REG_SZ` value; missing or differently typed values are `None`.
    pub fn read_string(&self, name: &str) -> Result<Option<String>> {
        let (value_type, size) = match self.query(name, None) {
            Ok(found) => found,
            Err(HdrError::ValueNotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        if value_type != REG_SZ {
            return Ok(None);
        }

        // One extra unit in case the stored string lacks its terminator.
        let mut wide = vec![0u16; size as usize / 2 + 1];
        let bytes = unsafe {
            std::slice::from_raw_parts_mut(wide.as_mut_ptr() as *mut u8, (wide.len() - 1) * 2)
        };
        match self.query(name, Some(bytes)) {
            Ok((value_type, _)) if value_type == REG_SZ => Ok(Some(wide_to_string(&wide))),
            Ok(_) | Err(HdrError::ValueNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn write_string(&self, name: &str, value: &str) -> Result<()> {
        let value_name = HSTRING::from(name);
        let wide: Vec<u16> = value.encode_utf16().chain(std::iter::once(0)).collect();
        let bytes: Vec<u8> = wide.iter().flat_map(|unit| unit.to_le_bytes()).collect();
        check(unsafe { RegSetValueExW(self.0, &value_name, None, REG_SZ, Some(&bytes)) })
    }

    pub fn delete_value(&self, name: &str) -> Result<()> {
        let value_name = HSTRING::from(name);
        let rc = unsafe { RegDeleteValueW(self.0, &value_name) };
        if rc == ERROR_FILE_NOT_FOUND {
            return Ok(());
        }
        check(rc)
    }

    /// Arms `event` to be signalled on the next change of a value of this key.
    pub fn notify_change(&self, event: &Event) -> Result<()> {
        check(unsafe {
            RegNotifyChangeKeyValue(self.0, false, REG_NOTIFY_CHANGE_LAST_SET, Some(event.0), true)
        })
    }
}

impl Drop for RegistryKey {
    fn drop(&mut self) {
        let _ = unsafe { RegCloseKey(self.0) };
    }
}

/// Manual-reset Win32 event.
#[derive(Debug)]
pub struct Event(HANDLE);

unsafe impl Send for Event {}
unsafe impl Sync for Event {}

impl Event {
    pub fn manual_reset() -> Result<Self> {
        let handle = unsafe { CreateEventW(None, true, false, PCWSTR::null())? };
        Ok(Self(handle))
    }

    pub fn set(&self) -> Result<()> {
        unsafe { SetEvent(self.0)? };
        Ok(())
    }

    pub fn reset(&self) -> Result<()> {
        unsafe { ResetEvent(self.0)? };
        Ok(())
    }
}

impl Drop for Event {
    fn drop(&mut self) {
        let _ = unsafe { CloseHandle(self.0) };
    }
}

impl StopSignal for Event {
    fn raise(&self) {
        if let Err(e) = self.set() {
            tracing::warn!("failed to signal watcher stop: {}", e);
        }
    }
}

/// Outcome of waiting on the stop and change events.
enum Wake {
    Stop,
    Change,
}

/// Blocks until one of the events fires. Stop wins when both are signalled.
fn wait_for(stop: &Event, change: &Event) -> Result<Wake> {
    let handles = [stop.0, change.0];
    let rc = unsafe { WaitForMultipleObjects(&handles, false, INFINITE) };
    match rc.0.wrapping_sub(WAIT_OBJECT_0.0) {
        0 => Ok(Wake::Stop),
        1 => Ok(Wake::Change),
        _ => Err(HdrError::Registry(rc.0)),
    }
}

/// Settings store on one key below `HKEY_CURRENT_USER`.
#[derive(Debug, Clone)]
pub struct RegistryStore {
    path: String,
}

impl RegistryStore {
    pub fn current_user(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Opens the key if it exists.
    fn open_existing(&self, access: REG_SAM_FLAGS) -> Result<Option<RegistryKey>> {
        match RegistryKey::open(HKEY_CURRENT_USER, &self.path, access) {
            Ok(key) => Ok(Some(key)),
            Err(HdrError::Registry(code)) if code == ERROR_FILE_NOT_FOUND.0 => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn open_write(&self) -> Result<RegistryKey> {
        RegistryKey::create(HKEY_CURRENT_USER, &self.path, KEY_WRITE)
    }
}

impl SettingsStore for RegistryStore {
    fn read_dword(&self, name: &str) -> Result<u32> {
        match self.open_existing(KEY_READ)? {
            Some(key) => key.read_dword(name),
            None => Err(HdrError::ValueNotFound(name.to_string())),
        }
    }

    fn write_dword(&self, name: &str, value: u32) -> Result<()> {
        self.open_write()?.write_dword(name, value)
    }

    fn read_string(&self, name: &str) -> Result<Option<String>> {
        match self.open_existing(KEY_READ)? {
            Some(key) => key.read_string(name),
            None => Ok(None),
        }
    }

    fn write_string(&self, name: &str, value: &str) -> Result<()> {
        self.open_write()?.write_string(name, value)
    }

    fn delete_value(&self, name: &str) -> Result<()> {
        match self.open_existing(KEY_WRITE)? {
            Some(key) => key.delete_value(name),
            None => Ok(()),
        }
    }

    /// Returns once the first change notification is armed, so a write made right after
    /// `watch` returns is reported.
    fn watch(&self, mut callback: ChangeCallback) -> Result<ChangeWatcher> {
        let key = RegistryKey::create(HKEY_CURRENT_USER, &self.path, KEY_NOTIFY)?;
        let stop = Arc::new(Event::manual_reset()?);
        let change = Event::manual_reset()?;
        let for_thread = Arc::clone(&stop);
        let path = self.path.clone();
        let (ready_tx, ready_rx) = bounded::<Result<()>>(1);

        let watcher = ChangeWatcher::spawn("registry-watcher", stop, move || {
            let mut ready = Some(ready_tx);
            loop {
                let armed = change.reset().and_then(|_| key.notify_change(&change));
                if let Some(ready) = ready.take() {
                    let _ = ready.send(armed.clone());
                }
                if let Err(e) = armed {
                    tracing::warn!(key = %path, "registry change notification failed: {}", e);
                    break;
                }
                match wait_for(&for_thread, &change) {
                    Ok(Wake::Stop) => break,
                    Ok(Wake::Change) => callback(),
                    Err(e) => {
                        tracing::warn!(key = %path, "waiting for registry change failed: {}", e);
                        break;
                    }
                }
            }
        })?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(watcher),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(HdrError::Unavailable),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;
    use std::time::Duration;

    const TEST_KEY: &str = "SOFTWARE\\HDRTray\\Tests";

    fn scratch(name: &str) -> RegistryStore {
        RegistryStore::current_user(format!("{TEST_KEY}\\{name}"))
    }

    #[test]
    fn dword_and_string_values() {
        let store = scratch("values");

        store.write_dword("Display.A", 0).unwrap();
        store.write_string("Path", "\"C:\\Program Files\\HDRTray\\hdrtray.exe\"").unwrap();

        assert_eq!(store.read_dword("Display.A"), Ok(0));
        assert_eq!(
            store.read_string("Path").unwrap().as_deref(),
            Some("\"C:\\Program Files\\HDRTray\\hdrtray.exe\"")
        );
        assert_eq!(store.read_string("Display.A"), Ok(None));

        store.delete_value("Display.A").unwrap();
        store.delete_value("Display.A").unwrap();
        assert!(matches!(store.read_dword("Display.A"), Err(HdrError::ValueNotFound(_))));
    }

    #[test]
    fn missing_key_reads_as_missing_values() {
        let store = scratch("does-not-exist");
        assert!(matches!(store.read_dword("x"), Err(HdrError::ValueNotFound(_))));
        assert_eq!(store.read_string("x"), Ok(None));
        store.delete_value("x").unwrap();
    }

    #[test]
    fn watcher_fires_on_write_and_stops_on_drop() {
        let store = scratch("watch");
        let (tx, rx) = unbounded();
        let watcher = store
            .watch(Box::new(move || {
                let _ = tx.send(());
            }))
            .unwrap();

        store.write_dword("Display.W", 1).unwrap();
        assert!(rx.recv_timeout(Duration::from_secs(5)).is_ok());

        drop(watcher);
        while rx.try_recv().is_ok() {}
        store.write_dword("Display.W", 0).unwrap();
        assert!(rx.recv_timeout(Duration::from_millis(300)).is_err());
    }
}
