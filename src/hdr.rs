//! Display enumeration and HDR operations over sets of displays.

use crate::display::DisplayInfo;
use crate::platform::Platform;
use crate::selection::SelectionStore;
use crate::status::{self, Freshness, Status};

/// All active displays, in platform enumeration order.
///
/// An empty list means "no information"; enumeration failures are not reported separately.
pub fn get_displays(platform: &Platform) -> Vec<DisplayInfo> {
    match platform.api().active_outputs() {
        Ok(ids) => ids
            .into_iter()
            .enumerate()
            .map(|(index, id)| DisplayInfo::new(platform.clone(), index, id))
            .collect(),
        Err(e) => {
            tracing::debug!("display enumeration failed: {}", e);
            Vec::new()
        }
    }
}

/// Displays taking part in toggling. Displays without a stable id are included.
pub fn get_enabled_displays(platform: &Platform, selection: &SelectionStore) -> Vec<DisplayInfo> {
    get_displays(platform)
        .into_iter()
        .filter(|info| match info.stable_id() {
            Ok(stable_id) => selection.is_enabled(&stable_id),
            Err(e) => {
                tracing::debug!(display = %info.id(), "no stable id, treating as enabled: {}", e);
                true
            }
        })
        .collect()
}

/// Combined status of a set of displays. Displays whose status cannot be read count as
/// unsupported.
pub fn get_aggregate_status(displays: &[DisplayInfo]) -> Status {
    status::combine(
        displays
            .iter()
            .map(|display| display.status(Freshness::Cached).unwrap_or(Status::Unsupported)),
    )
}

/// Applies `enable` to every display independently. `None` when no display could be changed.
pub fn set_aggregate_status(displays: &[DisplayInfo], enable: bool) -> Option<Status> {
    displays
        .iter()
        .fold(None, |acc, display| status::accumulate(acc, display.set_status(enable)))
}

/// Flips the set's combined state. An unsupported set is left alone and reported as such.
pub fn toggle_aggregate_status(displays: &[DisplayInfo]) -> Option<Status> {
    match get_aggregate_status(displays) {
        Status::Unsupported => Some(Status::Unsupported),
        Status::Off => set_aggregate_status(displays, true),
        Status::On => set_aggregate_status(displays, false),
    }
}

impl Platform {
    pub fn displays(&self) -> Vec<DisplayInfo> {
        get_displays(self)
    }

    pub fn enabled_displays(&self, selection: &SelectionStore) -> Vec<DisplayInfo> {
        get_enabled_displays(self, selection)
    }

    /// Combined status over all displays.
    pub fn aggregate_status(&self) -> Status {
        get_aggregate_status(&self.displays())
    }

    pub fn set_aggregate_status(&self, enable: bool) -> Option<Status> {
        set_aggregate_status(&self.displays(), enable)
    }

    pub fn toggle_aggregate_status(&self) -> Option<Status> {
        toggle_aggregate_status(&self.displays())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{Capabilities, MockDisplayApi, MockFailures, MockOutput};
    use std::sync::Arc;

    fn platform(outputs: Vec<MockOutput>) -> (Arc<MockDisplayApi>, Platform) {
        let mock = Arc::new(MockDisplayApi::new(outputs));
        (mock.clone(), Platform::new(mock, Capabilities::legacy()))
    }

    #[test]
    fn enumeration_keeps_platform_order() {
        let (_, platform) = platform(vec![
            MockOutput::hdr_monitor(5, "Five"),
            MockOutput::hdr_monitor(2, "Two"),
        ]);

        let displays = get_displays(&platform);

        assert_eq!(displays.len(), 2);
        assert_eq!(displays[0].id().output, 5);
        assert_eq!(displays[1].index(), 1);
    }

    #[test]
    fn enumeration_failure_is_empty() {
        let (mock, platform) = platform(vec![MockOutput::hdr_monitor(1, "One")]);
        mock.set_failures(MockFailures {
            enumeration: true,
            ..MockFailures::default()
        });

        assert!(get_displays(&platform).is_empty());
        assert_eq!(platform.aggregate_status(), Status::Unsupported);
        assert_eq!(platform.toggle_aggregate_status(), Some(Status::Unsupported));
    }

    #[test]
    fn unreadable_status_counts_as_unsupported() {
        let (mock, platform) = platform(vec![MockOutput::hdr_monitor(1, "One").with_hdr_on(true)]);
        mock.set_failures(MockFailures {
            advanced_color_info: true,
            ..MockFailures::default()
        });

        assert_eq!(platform.aggregate_status(), Status::Unsupported);
    }

    #[test]
    fn partial_success_keeps_earlier_result() {
        let (mock, platform) = platform(vec![
            MockOutput::hdr_monitor(1, "One"),
            MockOutput::sdr_monitor(2, "Two"),
        ]);

        assert_eq!(platform.set_aggregate_status(true), Some(Status::On));
        assert_eq!(mock.calls().set_advanced_color_state, 1);
    }

    #[test]
    fn set_on_all_unsupported_is_none() {
        let (mock, platform) = platform(vec![MockOutput::sdr_monitor(1, "One")]);

        assert_eq!(platform.set_aggregate_status(true), None);
        assert_eq!(mock.calls().mutations(), 0);
    }

    #[test]
    fn toggle_turns_off_every_display() {
        let (mock, platform) = platform(vec![
            MockOutput::hdr_monitor(1, "One").with_hdr_on(true),
            MockOutput::hdr_monitor(2, "Two"),
        ]);

        assert_eq!(platform.toggle_aggregate_status(), Some(Status::Off));
        assert!(mock.outputs().iter().all(|o| !o.hdr_on));
    }
}
