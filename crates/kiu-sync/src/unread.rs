use kiu_shared::constants::{COMPACT_BADGE_CAP, LIST_BADGE_CAP};

/// Messages that arrived live while the channel was not focused.
///
/// The raw count is exposed as data; badge rendering ("9+", "99+") belongs
/// to the presentation layer, which can ask whether a cap is exceeded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnreadTracker {
    count: u32,
}

impl UnreadTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&mut self) {
        self.count = self.count.saturating_add(1);
    }

    pub fn reset(&mut self) {
        self.count = 0;
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn exceeds(&self, cap: u32) -> bool {
        self.count > cap
    }

    pub fn exceeds_compact_cap(&self) -> bool {
        self.exceeds(COMPACT_BADGE_CAP)
    }

    pub fn exceeds_list_cap(&self) -> bool {
        self.exceeds(LIST_BADGE_CAP)
    }
}
