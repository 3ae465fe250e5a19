//! Turning user-supplied display references into enumerated displays.

use thiserror::Error;

use crate::display::DisplayInfo;
use crate::hdr;
use crate::platform::Platform;
use crate::selection::SelectionStore;

#[derive(Debug)]
pub enum Resolution<'a> {
    Found(&'a DisplayInfo),
    Ambiguous(Vec<&'a DisplayInfo>),
    NotFound,
}

/// A display reference that did not resolve to exactly one display.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("Display '{text}' is ambiguous, could be any of: {candidates}")]
    Ambiguous { text: String, candidates: String },

    #[error("Couldn't find a display fitting '{0}'")]
    NotFound(String),
}

/// Name for messages; falls back to the enumeration index when the name is unknown.
pub fn display_label(display: &DisplayInfo) -> String {
    display
        .name()
        .unwrap_or_else(|_| format!("display {}", display.index()))
}

/// Finds the display meant by `text`: an index into `displays`, else a case-insensitive
/// exact name, else a case-insensitive name substring.
pub fn resolve_display<'a>(displays: &'a [DisplayInfo], text: &str) -> Resolution<'a> {
    if let Ok(index) = text.parse::<usize>() {
        if let Some(display) = displays.get(index) {
            return Resolution::Found(display);
        }
    }

    let folded: Vec<(&'a DisplayInfo, String)> = displays
        .iter()
        .filter_map(|display| display.name().ok().map(|name| (display, name.to_lowercase())))
        .collect();
    let needle = text.to_lowercase();

    let candidates = |matches: &dyn Fn(&str) -> bool| -> Vec<&'a DisplayInfo> {
        folded
            .iter()
            .filter(|(_, name)| matches(name))
            .map(|(display, _)| *display)
            .collect()
    };

    for found in [
        candidates(&|name: &str| name == needle),
        candidates(&|name: &str| name.contains(needle.as_str())),
    ] {
        match found.len() {
            0 => continue,
            1 => return Resolution::Found(found[0]),
            _ => return Resolution::Ambiguous(found),
        }
    }
    Resolution::NotFound
}

/// Resolves every reference, skipping repeats of an already selected display.
pub fn resolve_all<'a, S: AsRef<str>>(
    displays: &'a [DisplayInfo],
    texts: &[S],
) -> (Vec<&'a DisplayInfo>, Vec<ResolveError>) {
    let mut selected: Vec<&DisplayInfo> = Vec::new();
    let mut errors = Vec::new();

    for text in texts {
        let text = text.as_ref();
        match resolve_display(displays, text) {
            Resolution::Found(display) => {
                if !selected.iter().any(|already| already.id() == display.id()) {
                    selected.push(display);
                }
            }
            Resolution::Ambiguous(candidates) => errors.push(ResolveError::Ambiguous {
                text: text.to_string(),
                candidates: candidates
                    .iter()
                    .map(|display| display_label(display))
                    .collect::<Vec<_>>()
                    .join(", "),
            }),
            Resolution::NotFound => errors.push(ResolveError::NotFound(text.to_string())),
        }
    }
    (selected, errors)
}

/// Displays an operation should act on: the enabled displays when nothing was named.
pub fn select_displays<S: AsRef<str>>(
    platform: &Platform,
    selection: &SelectionStore,
    texts: &[S],
) -> (Vec<DisplayInfo>, Vec<ResolveError>) {
    if texts.is_empty() {
        return (hdr::get_enabled_displays(platform, selection), Vec::new());
    }

    let all = hdr::get_displays(platform);
    let (selected, errors) = resolve_all(&all, texts);
    (selected.into_iter().cloned().collect(), errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{Capabilities, MockDisplayApi, MockOutput};
    use std::sync::Arc;

    fn displays(names: &[&str]) -> Vec<DisplayInfo> {
        let outputs = names
            .iter()
            .enumerate()
            .map(|(i, name)| MockOutput::hdr_monitor(i as u32, name))
            .collect();
        let platform = Platform::new(Arc::new(MockDisplayApi::new(outputs)), Capabilities::legacy());
        hdr::get_displays(&platform)
    }

    fn found_index(resolution: Resolution<'_>) -> Option<usize> {
        match resolution {
            Resolution::Found(display) => Some(display.index()),
            _ => None,
        }
    }

    #[test]
    fn index_wins_over_names() {
        let all = displays(&["1", "0"]);
        assert_eq!(found_index(resolve_display(&all, "1")), Some(1));
        assert_eq!(found_index(resolve_display(&all, "0")), Some(0));
    }

    #[test]
    fn out_of_range_index_falls_back_to_names() {
        let all = displays(&["Monitor 7", "Other"]);
        assert_eq!(found_index(resolve_display(&all, "7")), Some(0));
    }

    #[test]
    fn exact_match_beats_substring() {
        let all = displays(&["DELL U2723QE", "DELL"]);
        assert_eq!(found_index(resolve_display(&all, "dell")), Some(1));
        assert_eq!(found_index(resolve_display(&all, "u27")), Some(0));
    }

    #[test]
    fn ambiguous_and_missing() {
        let all = displays(&["LG Left", "LG Right"]);

        match resolve_display(&all, "lg") {
            Resolution::Ambiguous(candidates) => assert_eq!(candidates.len(), 2),
            other => panic!("expected ambiguity, got {other:?}"),
        }
        assert!(matches!(resolve_display(&all, "samsung"), Resolution::NotFound));
    }

    #[test]
    fn resolve_all_dedupes_and_reports() {
        let all = displays(&["LG Left", "LG Right", "Projector"]);

        let (selected, errors) = resolve_all(&all, &["proj", "2", "lg", "tv"]);

        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].index(), 2);
        assert_eq!(
            errors,
            vec![
                ResolveError::Ambiguous {
                    text: "lg".to_string(),
                    candidates: "LG Left, LG Right".to_string()
                },
                ResolveError::NotFound("tv".to_string()),
            ]
        );
    }
}
