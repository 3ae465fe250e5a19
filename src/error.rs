use thiserror::Error;

/// Failure of a platform facility (display configuration, registry, WinRT).
///
/// Errors are cloned into the per-display caches, so every variant carries plain data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HdrError {
    #[error("display configuration call failed (error {0})")]
    DisplayConfig(i32),

    #[error("registry access failed (error {0})")]
    Registry(u32),

    #[error("value {0:?} is not set")]
    ValueNotFound(String),

    #[error("runtime call failed (HRESULT 0x{0:08X})")]
    Runtime(i32),

    #[error("no display target matches device path {0:?}")]
    TargetNotFound(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("facility is not available on this system")]
    Unavailable,
}

/// Win32 `ERROR_FILE_NOT_FOUND`, reported for values that are not present.
const ERROR_FILE_NOT_FOUND: i32 = 2;
/// Win32 `ERROR_NOT_SUPPORTED`.
const ERROR_NOT_SUPPORTED: i32 = 50;
/// Win32 `ERROR_NOT_FOUND`.
const ERROR_NOT_FOUND: i32 = 1168;
/// Win32 `ERROR_GEN_FAILURE`.
const ERROR_GEN_FAILURE: i32 = 31;

impl HdrError {
    /// Numeric code suitable for a process exit status.
    pub fn code(&self) -> i32 {
        match self {
            HdrError::DisplayConfig(code) => *code,
            HdrError::Registry(code) => *code as i32,
            HdrError::ValueNotFound(_) => ERROR_FILE_NOT_FOUND,
            HdrError::Runtime(hresult) => *hresult,
            HdrError::TargetNotFound(_) => ERROR_NOT_FOUND,
            HdrError::Io(_) => ERROR_GEN_FAILURE,
            HdrError::Unavailable => ERROR_NOT_SUPPORTED,
        }
    }
}

impl From<std::io::Error> for HdrError {
    fn from(err: std::io::Error) -> Self {
        HdrError::Io(err.to_string())
    }
}

#[cfg(windows)]
impl From<windows::core::Error> for HdrError {
    fn from(err: windows::core::Error) -> Self {
        HdrError::Runtime(err.code().0)
    }
}

pub type Result<T, E = HdrError> = std::result::Result<T, E>;
