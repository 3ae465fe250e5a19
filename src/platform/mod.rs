//! Seam between the display logic and the operating system's display configuration.

pub mod mock;
#[cfg(windows)]
pub mod win32;

use std::sync::Arc;

use crate::display_id::DisplayId;
use crate::error::Result;

pub use mock::{CallCounts, MockDisplayApi, MockFailures, MockOutput};

/// First OS build that ships the `ADVANCED_COLOR_INFO_2` query and the `SET_HDR_STATE` request.
pub const HDR_STATE_MIN_BUILD: u32 = 26100;

/// Legacy advanced color state of one output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AdvancedColorInfo {
    pub supported: bool,
    pub enabled: bool,
}

impl AdvancedColorInfo {
    const SUPPORTED: u32 = 1 << 0;
    const ENABLED: u32 = 1 << 1;

    pub fn from_bits(bits: u32) -> Self {
        Self {
            supported: bits & Self::SUPPORTED != 0,
            enabled: bits & Self::ENABLED != 0,
        }
    }
}

/// Active color mode as reported by the newer advanced color query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorMode {
    Sdr,
    Wcg,
    Hdr,
    Other(i32),
}

impl ColorMode {
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            0 => ColorMode::Sdr,
            1 => ColorMode::Wcg,
            2 => ColorMode::Hdr,
            other => ColorMode::Other(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdvancedColorInfo2 {
    pub hdr_supported: bool,
    pub active_mode: ColorMode,
}

impl AdvancedColorInfo2 {
    const HDR_SUPPORTED: u32 = 1 << 4;

    pub fn from_raw(bits: u32, active_mode: i32) -> Self {
        Self {
            hdr_supported: bits & Self::HDR_SUPPORTED != 0,
            active_mode: ColorMode::from_raw(active_mode),
        }
    }
}

/// Target device name information of one output.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TargetName {
    pub friendly_name: String,
    pub name_from_edid: bool,
    /// Monitor device interface path, used to look up the stable monitor id.
    pub device_path: String,
}

impl TargetName {
    const FRIENDLY_NAME_FROM_EDID: u32 = 1 << 0;

    pub fn from_raw(flags: u32, friendly_name: &[u16], device_path: &[u16]) -> Self {
        Self {
            friendly_name: wide_to_string(friendly_name),
            name_from_edid: flags & Self::FRIENDLY_NAME_FROM_EDID != 0,
            device_path: wide_to_string(device_path),
        }
    }
}

/// Base output technology bitmask of a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputTechnology(pub u32);

impl OutputTechnology {
    pub const OTHER: u32 = 0xFFFF_FFFF;
    pub const INTERNAL: u32 = 0x8000_0000;

    pub fn is_internal(self) -> bool {
        self.0 != Self::OTHER && self.0 & Self::INTERNAL != 0
    }
}

/// Converts a NUL-terminated (or full) UTF-16 buffer.
pub fn wide_to_string(buffer: &[u16]) -> String {
    let len = buffer.iter().position(|&c| c == 0).unwrap_or(buffer.len());
    String::from_utf16_lossy(&buffer[..len])
}

/// Raw display configuration calls. One implementation talks to the OS, the mock backs tests.
pub trait DisplayApi: Send + Sync {
    /// Target of every active display path, in platform enumeration order.
    fn active_outputs(&self) -> Result<Vec<DisplayId>>;

    fn advanced_color_info(&self, id: DisplayId) -> Result<AdvancedColorInfo>;

    fn advanced_color_info_2(&self, id: DisplayId) -> Result<AdvancedColorInfo2>;

    fn target_name(&self, id: DisplayId) -> Result<TargetName>;

    fn target_base_technology(&self, id: DisplayId) -> Result<OutputTechnology>;

    fn set_advanced_color_state(&self, id: DisplayId, enable: bool) -> Result<()>;

    fn set_hdr_state(&self, id: DisplayId, enable: bool) -> Result<()>;

    /// Resolves the reboot-stable monitor identifier for a monitor device path.
    fn stable_monitor_id(&self, device_path: &str) -> Result<String>;
}

/// Which newer display configuration requests the running OS understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    pub advanced_color_info_2: bool,
    pub set_hdr_state: bool,
}

impl Capabilities {
    pub fn legacy() -> Self {
        Self::default()
    }

    pub fn all() -> Self {
        Self {
            advanced_color_info_2: true,
            set_hdr_state: true,
        }
    }

    pub fn for_build(build: u32) -> Self {
        if build >= HDR_STATE_MIN_BUILD {
            Self::all()
        } else {
            Self::legacy()
        }
    }

    /// Capabilities of the running system. Non-Windows hosts get the legacy set.
    pub fn detect() -> Self {
        #[cfg(windows)]
        {
            match self::win32::os_build_number() {
                Ok(build) => {
                    tracing::debug!(build, "detected OS build");
                    Self::for_build(build)
                }
                Err(e) => {
                    tracing::debug!("OS build number unavailable: {}", e);
                    Self::legacy()
                }
            }
        }
        #[cfg(not(windows))]
        {
            Self::legacy()
        }
    }
}

/// Display API together with the capabilities chosen for it. Cheap to clone.
#[derive(Clone)]
pub struct Platform {
    api: Arc<dyn DisplayApi>,
    caps: Capabilities,
}

impl Platform {
    pub fn new(api: Arc<dyn DisplayApi>, caps: Capabilities) -> Self {
        Self { api, caps }
    }

    /// The real display configuration of this system.
    #[cfg(windows)]
    pub fn system() -> Self {
        Self::new(Arc::new(self::win32::WindowsDisplayApi::new()), Capabilities::detect())
    }

    pub fn api(&self) -> &dyn DisplayApi {
        self.api.as_ref()
    }

    pub fn capabilities(&self) -> Capabilities {
        self.caps
    }
}

impl std::fmt::Debug for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Platform").field("caps", &self.caps).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_legacy_color_bits() {
        assert_eq!(AdvancedColorInfo::from_bits(0), AdvancedColorInfo::default());
        assert_eq!(
            AdvancedColorInfo::from_bits(0b11),
            AdvancedColorInfo { supported: true, enabled: true }
        );
        // wide color enforced / force disabled bits do not leak into the flags
        assert_eq!(
            AdvancedColorInfo::from_bits(0b1101),
            AdvancedColorInfo { supported: true, enabled: false }
        );
    }

    #[test]
    fn decodes_color_info_2() {
        let info = AdvancedColorInfo2::from_raw(1 << 4, 2);
        assert!(info.hdr_supported);
        assert_eq!(info.active_mode, ColorMode::Hdr);

        let wcg = AdvancedColorInfo2::from_raw(0b0001_0011, 1);
        assert_eq!(wcg.active_mode, ColorMode::Wcg);

        assert!(!AdvancedColorInfo2::from_raw(0b1111, 0).hdr_supported);
        assert_eq!(ColorMode::from_raw(7), ColorMode::Other(7));
    }

    #[test]
    fn internal_technology() {
        assert!(OutputTechnology(0x8000_0000).is_internal());
        assert!(OutputTechnology(0x8000_000B).is_internal());
        assert!(!OutputTechnology(0xFFFF_FFFF).is_internal());
        assert!(!OutputTechnology(5).is_internal());
    }

    #[test]
    fn target_name_from_wide_buffers() {
        let mut name = [0u16; 64];
        for (slot, c) in name.iter_mut().zip("DELL U2723QE".encode_utf16()) {
            *slot = c;
        }
        let path: Vec<u16> = "\\\\?\\DISPLAY#DEL4321".encode_utf16().collect();

        let target = TargetName::from_raw(1, &name, &path);
        assert_eq!(target.friendly_name, "DELL U2723QE");
        assert!(target.name_from_edid);
        assert_eq!(target.device_path, "\\\\?\\DISPLAY#DEL4321");
        assert!(!TargetName::from_raw(2, &name, &path).name_from_edid);
    }

    #[test]
    fn capabilities_follow_build() {
        assert_eq!(Capabilities::for_build(22631), Capabilities::legacy());
        assert_eq!(Capabilities::for_build(26100), Capabilities::all());
        assert_eq!(Capabilities::for_build(27000), Capabilities::all());
    }
}
