use std::mem::size_of;

use windows::{
    Devices::Display::Core::{DisplayManager, DisplayManagerOptions},
    Win32::Devices::Display::{
        DisplayConfigGetDeviceInfo, DisplayConfigSetDeviceInfo, GetDisplayConfigBufferSizes,
        QueryDisplayConfig, DISPLAYCONFIG_DEVICE_INFO_HEADER, DISPLAYCONFIG_DEVICE_INFO_TYPE,
        DISPLAYCONFIG_MODE_INFO, DISPLAYCONFIG_PATH_INFO, QDC_ONLY_ACTIVE_PATHS,
    },
    Win32::Foundation::{ERROR_SUCCESS, LUID, WIN32_ERROR},
    Win32::System::Registry::{HKEY_LOCAL_MACHINE, KEY_READ},
};

use super::{
    AdvancedColorInfo, AdvancedColorInfo2, DisplayApi, OutputTechnology, TargetName,
};
use crate::display_id::{AdapterId, DisplayId};
use crate::error::{HdrError, Result};
use crate::store::registry::RegistryKey;

const GET_TARGET_NAME: i32 = 2;
const GET_TARGET_BASE_TYPE: i32 = 6;
const GET_ADVANCED_COLOR_INFO: i32 = 9;
const SET_ADVANCED_COLOR_STATE: i32 = 10;
const GET_ADVANCED_COLOR_INFO_2: i32 = 15;
const SET_HDR_STATE: i32 = 16;

const CURRENT_VERSION_KEY: &str = "SOFTWARE\\Microsoft\\Windows NT\\CurrentVersion";

fn header<T>(kind: i32, id: DisplayId) -> DISPLAYCONFIG_DEVICE_INFO_HEADER {
    DISPLAYCONFIG_DEVICE_INFO_HEADER {
        r#type: DISPLAYCONFIG_DEVICE_INFO_TYPE(kind),
        size: size_of::<T>() as u32,
        adapterId: LUID {
            LowPart: id.adapter.low,
            HighPart: id.adapter.high,
        },
        id: id.output,
    }
}

#[repr(C)]
struct AdvancedColorInfoPacket {
    header: DISPLAYCONFIG_DEVICE_INFO_HEADER,
    value: u32,
    color_encoding: i32,
    bits_per_color_channel: u32,
}

#[repr(C)]
struct AdvancedColorInfo2Packet {
    header: DISPLAYCONFIG_DEVICE_INFO_HEADER,
    value: u32,
    color_encoding: i32,
    bits_per_color_channel: u32,
    active_color_mode: i32,
}

/// Shared layout of `SET_ADVANCED_COLOR_STATE` and `SET_HDR_STATE`.
#[repr(C)]
struct SetStatePacket {
    header: DISPLAYCONFIG_DEVICE_INFO_HEADER,
    value: u32,
}

#[repr(C)]
struct TargetBaseTypePacket {
    header: DISPLAYCONFIG_DEVICE_INFO_HEADER,
    base_output_technology: i32,
}

#[repr(C)]
struct TargetDeviceNamePacket {
    header: DISPLAYCONFIG_DEVICE_INFO_HEADER,
    flags: u32,
    output_technology: i32,
    edid_manufacture_id: u16,
    edid_product_code_id: u16,
    connector_instance: u32,
    monitor_friendly_device_name: [u16; 64],
    monitor_device_path: [u16; 128],
}

fn check(rc: WIN32_ERROR) -> Result<()> {
    if rc == ERROR_SUCCESS {
        Ok(())
    } else {
        Err(HdrError::DisplayConfig(rc.0 as i32))
    }
}

/// Sends a request packet that starts with a `DISPLAYCONFIG_DEVICE_INFO_HEADER`.
fn get_device_info<T>(packet: &mut T) -> Result<()> {
    let rc = unsafe {
        DisplayConfigGetDeviceInfo(packet as *mut T as *mut DISPLAYCONFIG_DEVICE_INFO_HEADER)
    };
    if rc == 0 {
        Ok(())
    } else {
        Err(HdrError::DisplayConfig(rc))
    }
}

fn set_device_info<T>(packet: &T) -> Result<()> {
    let rc = unsafe {
        DisplayConfigSetDeviceInfo(packet as *const T as *const DISPLAYCONFIG_DEVICE_INFO_HEADER)
    };
    if rc == 0 {
        Ok(())
    } else {
        Err(HdrError::DisplayConfig(rc))
    }
}

/// Build number of the running OS, read from the registry.
pub fn os_build_number() -> Result<u32> {
    let key = RegistryKey::open(HKEY_LOCAL_MACHINE, CURRENT_VERSION_KEY, KEY_READ)?;
    let build = key
        .read_string("CurrentBuildNumber")?
        .ok_or_else(|| HdrError::ValueNotFound("CurrentBuildNumber".to_string()))?;
    build
        .trim()
        .parse()
        .map_err(|_| HdrError::ValueNotFound("CurrentBuildNumber".to_string()))
}

/// [`DisplayApi`] backed by the Win32 display configuration API.
#[derive(Debug, Default)]
pub struct WindowsDisplayApi;

impl WindowsDisplayApi {
    pub fn new() -> Self {
        Self
    }
}

impl DisplayApi for WindowsDisplayApi {
    fn active_outputs(&self) -> Result<Vec<DisplayId>> {
        let mut path_count = 0u32;
        let mut mode_count = 0u32;
        check(unsafe {
            GetDisplayConfigBufferSizes(QDC_ONLY_ACTIVE_PATHS, &mut path_count, &mut mode_count)
        })?;

        let mut paths = vec![DISPLAYCONFIG_PATH_INFO::default(); path_count as usize];
        let mut modes = vec![DISPLAYCONFIG_MODE_INFO::default(); mode_count as usize];

        // Fails with ERROR_INSUFFICIENT_BUFFER when the topology changed since the buffer sizes were queried.
        check(unsafe {
            QueryDisplayConfig(
                QDC_ONLY_ACTIVE_PATHS,
                &mut path_count,
                paths.as_mut_ptr(),
                &mut mode_count,
                modes.as_mut_ptr(),
                None,
            )
        })?;
        paths.truncate(path_count as usize);

        Ok(paths
            .iter()
            .map(|path| {
                let target = &path.targetInfo;
                DisplayId::new(
                    AdapterId::new(target.adapterId.LowPart, target.adapterId.HighPart),
                    target.id,
                )
            })
            .collect())
    }

    fn advanced_color_info(&self, id: DisplayId) -> Result<AdvancedColorInfo> {
        let mut packet = AdvancedColorInfoPacket {
            header: header::<AdvancedColorInfoPacket>(GET_ADVANCED_COLOR_INFO, id),
            value: 0,
            color_encoding: 0,
            bits_per_color_channel: 0,
        };
        get_device_info(&mut packet)?;
        Ok(AdvancedColorInfo::from_bits(packet.value))
    }

    fn advanced_color_info_2(&self, id: DisplayId) -> Result<AdvancedColorInfo2> {
        let mut packet = AdvancedColorInfo2Packet {
            header: header::<AdvancedColorInfo2Packet>(GET_ADVANCED_COLOR_INFO_2, id),
            value: 0,
            color_encoding: 0,
            bits_per_color_channel: 0,
            active_color_mode: 0,
        };
        get_device_info(&mut packet)?;
        Ok(AdvancedColorInfo2::from_raw(packet.value, packet.active_color_mode))
    }

    fn target_name(&self, id: DisplayId) -> Result<TargetName> {
        let mut packet = TargetDeviceNamePacket {
            header: header::<TargetDeviceNamePacket>(GET_TARGET_NAME, id),
            flags: 0,
            output_technology: 0,
            edid_manufacture_id: 0,
            edid_product_code_id: 0,
            connector_instance: 0,
            monitor_friendly_device_name: [0; 64],
            monitor_device_path: [0; 128],
        };
        get_device_info(&mut packet)?;
        Ok(TargetName::from_raw(
            packet.flags,
            &packet.monitor_friendly_device_name,
            &packet.monitor_device_path,
        ))
    }

    fn target_base_technology(&self, id: DisplayId) -> Result<OutputTechnology> {
        let mut packet = TargetBaseTypePacket {
            header: header::<TargetBaseTypePacket>(GET_TARGET_BASE_TYPE, id),
            base_output_technology: 0,
        };
        get_device_info(&mut packet)?;
        Ok(OutputTechnology(packet.base_output_technology as u32))
    }

    fn set_advanced_color_state(&self, id: DisplayId, enable: bool) -> Result<()> {
        let packet = SetStatePacket {
            header: header::<SetStatePacket>(SET_ADVANCED_COLOR_STATE, id),
            value: enable as u32,
        };
        set_device_info(&packet)
    }

    fn set_hdr_state(&self, id: DisplayId, enable: bool) -> Result<()> {
        let packet = SetStatePacket {
            header: header::<SetStatePacket>(SET_HDR_STATE, id),
            value: enable as u32,
        };
        set_device_info(&packet)
    }

    fn stable_monitor_id(&self, device_path: &str) -> Result<String> {
        let manager = DisplayManager::Create(DisplayManagerOptions::None)?;
        let found = find_stable_id(&manager, device_path);
        if let Err(e) = manager.Close() {
            tracing::debug!("closing display manager failed: {}", e);
        }
        found?.ok_or_else(|| HdrError::TargetNotFound(device_path.to_string()))
    }
}

fn find_stable_id(manager: &DisplayManager, device_path: &str) -> Result<Option<String>> {
    let targets = manager.GetCurrentTargets()?;
    for index in 0..targets.Size()? {
        let target = targets.GetAt(index)?;
        if target
            .DeviceInterfacePath()?
            .to_string()
            .eq_ignore_ascii_case(device_path)
        {
            return Ok(Some(target.StableMonitorId()?.to_string()));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_device_path_is_not_found() {
        let api = WindowsDisplayApi::new();

        let result = api.stable_monitor_id("\\\\?\\DISPLAY#NOPE#0000");

        // Sessions without a display manager (services, CI) report a runtime error instead.
        assert!(matches!(
            result,
            Err(HdrError::TargetNotFound(_)) | Err(HdrError::Runtime(_))
        ));
    }
}
