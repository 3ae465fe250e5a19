//! In-memory [`DisplayApi`] that records every call.
//!
//! Always compiled so tests on any host can drive the display logic without a monitor.

use parking_lot::Mutex;

use super::{
    AdvancedColorInfo, AdvancedColorInfo2, ColorMode, DisplayApi, OutputTechnology, TargetName,
};
use crate::display_id::{AdapterId, DisplayId};
use crate::error::{HdrError, Result};

/// `ERROR_GEN_FAILURE`, returned by injected failures.
const INJECTED_FAILURE: i32 = 31;

/// One simulated display output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockOutput {
    pub id: DisplayId,
    pub friendly_name: String,
    pub name_from_edid: bool,
    pub technology: OutputTechnology,
    pub device_path: String,
    pub stable_id: Option<String>,
    pub hdr_capable: bool,
    pub hdr_on: bool,
    /// Advanced color active without HDR (wide color gamut mode).
    pub wcg_active: bool,
}

impl MockOutput {
    /// An external HDR-capable monitor with an EDID name, HDR off.
    pub fn hdr_monitor(output: u32, name: &str) -> Self {
        Self {
            id: DisplayId::new(AdapterId::new(0x1000, 0), output),
            friendly_name: name.to_string(),
            name_from_edid: true,
            technology: OutputTechnology(10),
            device_path: format!("\\\\?\\DISPLAY#MOCK{output:04}#{{e6f07b5f-ee97-4a90-b076-33f57bf4eaa7}}"),
            stable_id: Some(format!("MOCK{output:04}_{name}")),
            hdr_capable: true,
            hdr_on: false,
            wcg_active: false,
        }
    }

    /// An SDR-only monitor.
    pub fn sdr_monitor(output: u32, name: &str) -> Self {
        Self {
            hdr_capable: false,
            ..Self::hdr_monitor(output, name)
        }
    }

    pub fn with_hdr_on(mut self, on: bool) -> Self {
        self.hdr_on = on;
        self
    }

    pub fn with_stable_id(mut self, stable_id: Option<&str>) -> Self {
        self.stable_id = stable_id.map(str::to_string);
        self
    }

    fn color_info(&self) -> AdvancedColorInfo {
        AdvancedColorInfo {
            supported: self.hdr_capable,
            enabled: self.hdr_on || self.wcg_active,
        }
    }

    fn color_info_2(&self) -> AdvancedColorInfo2 {
        let active_mode = if self.hdr_on {
            ColorMode::Hdr
        } else if self.wcg_active {
            ColorMode::Wcg
        } else {
            ColorMode::Sdr
        };
        AdvancedColorInfo2 {
            hdr_supported: self.hdr_capable,
            active_mode,
        }
    }
}

/// Number of calls made to each [`DisplayApi`] method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CallCounts {
    pub active_outputs: usize,
    pub advanced_color_info: usize,
    pub advanced_color_info_2: usize,
    pub target_name: usize,
    pub target_base_technology: usize,
    pub set_advanced_color_state: usize,
    pub set_hdr_state: usize,
    pub stable_monitor_id: usize,
}

impl CallCounts {
    pub fn status_queries(&self) -> usize {
        self.advanced_color_info + self.advanced_color_info_2
    }

    pub fn mutations(&self) -> usize {
        self.set_advanced_color_state + self.set_hdr_state
    }
}

/// Calls that should fail with an injected error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MockFailures {
    pub enumeration: bool,
    pub advanced_color_info: bool,
    pub advanced_color_info_2: bool,
    pub target_name: bool,
    pub target_base_technology: bool,
    pub set: bool,
    pub stable_monitor_id: bool,
    /// Set requests report success without changing anything.
    pub ignore_set: bool,
}

#[derive(Debug, Default)]
struct MockState {
    outputs: Vec<MockOutput>,
    calls: CallCounts,
    failures: MockFailures,
}

#[derive(Debug, Default)]
pub struct MockDisplayApi {
    state: Mutex<MockState>,
}

impl MockDisplayApi {
    pub fn new(outputs: Vec<MockOutput>) -> Self {
        Self {
            state: Mutex::new(MockState {
                outputs,
                ..MockState::default()
            }),
        }
    }

    pub fn calls(&self) -> CallCounts {
        self.state.lock().calls
    }

    pub fn reset_calls(&self) {
        self.state.lock().calls = CallCounts::default();
    }

    pub fn set_failures(&self, failures: MockFailures) {
        self.state.lock().failures = failures;
    }

    pub fn outputs(&self) -> Vec<MockOutput> {
        self.state.lock().outputs.clone()
    }

    /// Changes a simulated output behind the back of any cached reader.
    pub fn update_output<F>(&self, id: DisplayId, update: F)
    where
        F: FnOnce(&mut MockOutput),
    {
        if let Some(output) = self.state.lock().outputs.iter_mut().find(|o| o.id == id) {
            update(output);
        }
    }

    fn with_output<T, F>(&self, id: DisplayId, failing: bool, read: F) -> Result<T>
    where
        F: FnOnce(&MockOutput) -> T,
    {
        if failing {
            return Err(HdrError::DisplayConfig(INJECTED_FAILURE));
        }
        self.state
            .lock()
            .outputs
            .iter()
            .find(|o| o.id == id)
            .map(read)
            .ok_or(HdrError::DisplayConfig(INJECTED_FAILURE))
    }

    fn apply_set(&self, id: DisplayId, enable: bool) -> Result<()> {
        let mut state = self.state.lock();
        if state.failures.set {
            return Err(HdrError::DisplayConfig(INJECTED_FAILURE));
        }
        if state.failures.ignore_set {
            return Ok(());
        }
        let output = state
            .outputs
            .iter_mut()
            .find(|o| o.id == id)
            .ok_or(HdrError::DisplayConfig(INJECTED_FAILURE))?;
        output.hdr_on = enable && output.hdr_capable;
        output.wcg_active = false;
        Ok(())
    }
}

impl DisplayApi for MockDisplayApi {
    fn active_outputs(&self) -> Result<Vec<DisplayId>> {
        let mut state = self.state.lock();
        state.calls.active_outputs += 1;
        if state.failures.enumeration {
            return Err(HdrError::DisplayConfig(INJECTED_FAILURE));
        }
        Ok(state.outputs.iter().map(|o| o.id).collect())
    }

    fn advanced_color_info(&self, id: DisplayId) -> Result<AdvancedColorInfo> {
        let failing = {
            let mut state = self.state.lock();
            state.calls.advanced_color_info += 1;
            state.failures.advanced_color_info
        };
        self.with_output(id, failing, MockOutput::color_info)
    }

    fn advanced_color_info_2(&self, id: DisplayId) -> Result<AdvancedColorInfo2> {
        let failing = {
            let mut state = self.state.lock();
            state.calls.advanced_color_info_2 += 1;
            state.failures.advanced_color_info_2
        };
        self.with_output(id, failing, MockOutput::color_info_2)
    }

    fn target_name(&self, id: DisplayId) -> Result<TargetName> {
        let failing = {
            let mut state = self.state.lock();
            state.calls.target_name += 1;
            state.failures.target_name
        };
        self.with_output(id, failing, |o| TargetName {
            friendly_name: o.friendly_name.clone(),
            name_from_edid: o.name_from_edid,
            device_path: o.device_path.clone(),
        })
    }

    fn target_base_technology(&self, id: DisplayId) -> Result<OutputTechnology> {
        let failing = {
            let mut state = self.state.lock();
            state.calls.target_base_technology += 1;
            state.failures.target_base_technology
        };
        self.with_output(id, failing, |o| o.technology)
    }

    fn set_advanced_color_state(&self, id: DisplayId, enable: bool) -> Result<()> {
        self.state.lock().calls.set_advanced_color_state += 1;
        self.apply_set(id, enable)
    }

    fn set_hdr_state(&self, id: DisplayId, enable: bool) -> Result<()> {
        self.state.lock().calls.set_hdr_state += 1;
        self.apply_set(id, enable)
    }

    fn stable_monitor_id(&self, device_path: &str) -> Result<String> {
        let mut state = self.state.lock();
        state.calls.stable_monitor_id += 1;
        if state.failures.stable_monitor_id {
            return Err(HdrError::Runtime(INJECTED_FAILURE));
        }
        state
            .outputs
            .iter()
            .find(|o| o.device_path.eq_ignore_ascii_case(device_path))
            .and_then(|o| o.stable_id.clone())
            .ok_or_else(|| HdrError::TargetNotFound(device_path.to_string()))
    }
}
