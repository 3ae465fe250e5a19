use crate::cached::Cached;
use crate::display_id::DisplayId;
use crate::error::Result;
use crate::platform::{ColorMode, Platform, TargetName};
use crate::status::{Freshness, Status};

pub const INTERNAL_DISPLAY_NAME: &str = "Internal Display";
pub const UNNAMED_DISPLAY_NAME: &str = "Unnamed";

/// One active display output, as seen by a single enumeration.
///
/// Name, status and stable id are fetched on first use and cached. Only the status is
/// ever re-queried, through [`Freshness::ForceRefresh`].
#[derive(Debug, Clone)]
pub struct DisplayInfo {
    index: usize,
    id: DisplayId,
    platform: Platform,
    target_name: Cached<TargetName>,
    name: Cached<String>,
    status: Cached<Status>,
    stable_id: Cached<String>,
}

impl DisplayInfo {
    pub fn new(platform: Platform, index: usize, id: DisplayId) -> Self {
        Self {
            index,
            id,
            platform,
            target_name: Cached::new(),
            name: Cached::new(),
            status: Cached::new(),
            stable_id: Cached::new(),
        }
    }

    /// Position in the enumeration that produced this display.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn id(&self) -> DisplayId {
        self.id
    }

    fn target_name(&self) -> Result<TargetName> {
        self.target_name
            .get_or_compute(Freshness::Cached, || self.platform.api().target_name(self.id))
    }

    /// Friendly name from the monitor's EDID, or a synthesized fallback.
    pub fn name(&self) -> Result<String> {
        self.name.get_or_compute(Freshness::Cached, || {
            let target = self.target_name()?;
            if target.name_from_edid {
                return Ok(target.friendly_name);
            }
            Ok(self.fallback_name().to_string())
        })
    }

    fn fallback_name(&self) -> &'static str {
        match self.platform.api().target_base_technology(self.id) {
            Ok(technology) if technology.is_internal() => INTERNAL_DISPLAY_NAME,
            Ok(_) => UNNAMED_DISPLAY_NAME,
            Err(e) => {
                tracing::debug!(display = %self.id, "base output technology unavailable: {}", e);
                UNNAMED_DISPLAY_NAME
            }
        }
    }

    pub fn status(&self, freshness: Freshness) -> Result<Status> {
        self.status.get_or_compute(freshness, || self.query_status())
    }

    fn query_status(&self) -> Result<Status> {
        let api = self.platform.api();

        if self.platform.capabilities().advanced_color_info_2 {
            match api.advanced_color_info_2(self.id) {
                Ok(info) if !info.hdr_supported => return Ok(Status::Unsupported),
                Ok(info) if info.active_mode == ColorMode::Hdr => return Ok(Status::On),
                Ok(_) => return Ok(Status::Off),
                Err(e) => {
                    tracing::debug!(display = %self.id, "advanced color info 2 failed, using legacy query: {}", e);
                }
            }
        }

        let info = api.advanced_color_info(self.id)?;
        Ok(match (info.supported, info.enabled) {
            (false, _) => Status::Unsupported,
            (true, true) => Status::On,
            (true, false) => Status::Off,
        })
    }

    /// Identifier of the physical monitor that survives reboots and driver changes.
    pub fn stable_id(&self) -> Result<String> {
        self.stable_id.get_or_compute(Freshness::Cached, || {
            let target = self.target_name()?;
            self.platform.api().stable_monitor_id(&target.device_path)
        })
    }

    /// Switches HDR on one display and reports the state read back afterwards.
    ///
    /// Returns `None` when the display has no HDR support, its state cannot be read, or the
    /// platform rejected the request.
    pub fn set_status(&self, enable: bool) -> Option<Status> {
        match self.status(Freshness::Cached) {
            Ok(Status::Unsupported) => return None,
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(display = %self.id, "not changing display with unknown status: {}", e);
                return None;
            }
        }

        let api = self.platform.api();
        let result = if self.platform.capabilities().set_hdr_state {
            api.set_hdr_state(self.id, enable)
        } else {
            api.set_advanced_color_state(self.id, enable)
        };

        if let Err(e) = result {
            tracing::warn!(display = %self.id, enable, "setting HDR state failed: {}", e);
            return None;
        }

        // The set call succeeding does not mean the state was reached.
        match self.status(Freshness::ForceRefresh) {
            Ok(status) => {
                tracing::info!(display = %self.id, enable, %status, "HDR state changed");
                Some(status)
            }
            Err(e) => {
                tracing::warn!(display = %self.id, "re-reading HDR state failed: {}", e);
                None
            }
        }
    }
}
