use std::cmp::Ordering;
use std::fmt;

/// Locally unique identifier of a graphics adapter (a Win32 `LUID`).
///
/// Only valid until the next reboot or driver reload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AdapterId {
    pub low: u32,
    pub high: i32,
}

impl AdapterId {
    pub fn new(low: u32, high: i32) -> Self {
        Self { low, high }
    }

    /// In-memory byte representation, matching the layout of a `LUID`.
    pub fn to_bytes(self) -> [u8; 8] {
        let mut bytes = [0u8; 8];
        bytes[..4].copy_from_slice(&self.low.to_le_bytes());
        bytes[4..].copy_from_slice(&self.high.to_le_bytes());
        bytes
    }
}

/// Identity of one display output: adapter plus target index on that adapter.
///
/// Recreated on every enumeration and never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DisplayId {
    pub adapter: AdapterId,
    pub output: u32,
}

impl DisplayId {
    pub fn new(adapter: AdapterId, output: u32) -> Self {
        Self { adapter, output }
    }
}

impl Ord for DisplayId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.adapter
            .to_bytes()
            .cmp(&other.adapter.to_bytes())
            .then(self.output.cmp(&other.output))
    }
}

impl PartialOrd for DisplayId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for DisplayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}:{:08x}/{}", self.adapter.high, self.adapter.low, self.output)
    }
}
