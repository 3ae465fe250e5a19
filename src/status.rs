use std::fmt;

/// HDR state of one display or of a set of displays.
///
/// Variants are ordered by "capability/activation", so the aggregate over a set is the
/// maximum of its members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Status {
    Unsupported = 0,
    Off = 1,
    On = 2,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Unsupported => "unsupported",
            Status::Off => "off",
            Status::On => "on",
        }
    }

    /// Whether HDR could be switched on this display/set at all.
    pub fn is_supported(self) -> bool {
        self != Status::Unsupported
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How "fresh" a queried value should be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Freshness {
    #[default]
    Cached,
    ForceRefresh,
}

/// Combines statuses by max-reduction; the empty set is `Unsupported`.
pub fn combine<I>(statuses: I) -> Status
where
    I: IntoIterator<Item = Status>,
{
    statuses.into_iter().max().unwrap_or(Status::Unsupported)
}

/// Accumulates mutation outcomes: `None` until the first success, max-reduction after.
pub fn accumulate(current: Option<Status>, next: Option<Status>) -> Option<Status> {
    match (current, next) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordinal_order() {
        assert!(Status::Unsupported < Status::Off);
        assert!(Status::Off < Status::On);
        assert_eq!(Status::On as i32, 2);
    }

    #[test]
    fn combine_empty_is_unsupported() {
        assert_eq!(combine([]), Status::Unsupported);
    }

    #[test]
    fn combine_is_unsupported_only_when_all_are() {
        use Status::*;
        let cases: &[(&[Status], Status)] = &[
            (&[Unsupported], Unsupported),
            (&[Unsupported, Unsupported], Unsupported),
            (&[Unsupported, Off], Off),
            (&[Off, Unsupported, Off], Off),
            (&[On, Unsupported], On),
            (&[Off, On, Off], On),
        ];
        for (input, expected) in cases {
            assert_eq!(combine(input.iter().copied()), *expected, "input {input:?}");
        }
    }

    #[test]
    fn accumulate_keeps_earlier_success() {
        assert_eq!(accumulate(None, None), None);
        assert_eq!(accumulate(None, Some(Status::Off)), Some(Status::Off));
        assert_eq!(accumulate(Some(Status::On), None), Some(Status::On));
        assert_eq!(accumulate(Some(Status::Off), Some(Status::On)), Some(Status::On));
    }
}
