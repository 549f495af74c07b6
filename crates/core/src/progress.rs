//! Synthetic progress arithmetic.
//!
//! The conversion service gives no mid-flight progress. The first
//! [`UPLOAD_SHARE`] percent track real upload bytes; after that a timer
//! crawls toward a per-category ceiling that stays below 100, so the user
//! never sees "100%" while the service is still working. Only a real
//! response moves the value to 100.

use std::time::Duration;

use crate::catalog::Category;

/// Share of the progress bar driven by genuine upload bytes.
pub const UPLOAD_SHARE: f32 = 20.0;

/// Value reported once the service has responded successfully.
pub const COMPLETE: f32 = 100.0;

/// Tick parameters for the synthetic crawl.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressProfile {
    /// Percentage points added per tick.
    pub step: f32,
    /// Time between ticks.
    pub interval: Duration,
    /// The crawl holds here until the service responds.
    pub ceiling: f32,
}

impl ProgressProfile {
    /// Media conversions: +0.5 every 500 ms up to 85.
    pub const SLOW: Self = Self {
        step: 0.5,
        interval: Duration::from_millis(500),
        ceiling: 85.0,
    };

    /// Image and document conversions: +5 every 200 ms up to 90.
    pub const FAST: Self = Self {
        step: 5.0,
        interval: Duration::from_millis(200),
        ceiling: 90.0,
    };

    /// Audio and video crawl slowly; everything else uses the fast profile.
    pub fn for_category(category: Category) -> Self {
        if category.is_media() {
            Self::SLOW
        } else {
            Self::FAST
        }
    }
}

/// Percentage of the upload segment covered after `loaded` of `total`
/// bytes, rounded to a whole number.
///
/// Returns `None` when the total size is unknown (zero).
pub fn upload_percent(loaded: u64, total: u64) -> Option<f32> {
    if total == 0 {
        return None;
    }
    let fraction = loaded.min(total) as f64 / total as f64;
    Some((fraction * UPLOAD_SHARE as f64).round() as f32)
}

/// Monotonic progress value for one submission.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    profile: ProgressProfile,
    percent: f32,
}

impl ProgressTracker {
    /// Start at 0 with the given crawl profile.
    pub fn new(profile: ProgressProfile) -> Self {
        Self {
            profile,
            percent: 0.0,
        }
    }

    /// Current value, 0 to 100.
    pub fn percent(&self) -> f32 {
        self.percent
    }

    pub fn profile(&self) -> ProgressProfile {
        self.profile
    }

    /// Record upload progress. Returns `true` if the value changed.
    pub fn record_upload(&mut self, loaded: u64, total: u64) -> bool {
        match upload_percent(loaded, total) {
            Some(pct) => self.raise_to(pct),
            None => false,
        }
    }

    /// Advance one synthetic tick, holding at the profile ceiling.
    /// Returns `true` if the value changed.
    pub fn tick(&mut self) -> bool {
        if self.percent >= self.profile.ceiling {
            return false;
        }
        let next = (self.percent + self.profile.step).min(self.profile.ceiling);
        self.raise_to(next)
    }

    /// Jump to 100 after a real successful response.
    pub fn complete(&mut self) -> bool {
        self.raise_to(COMPLETE)
    }

    /// Back to zero after a failure.
    pub fn reset(&mut self) {
        self.percent = 0.0;
    }

    fn raise_to(&mut self, target: f32) -> bool {
        if target > self.percent {
            self.percent = target;
            true
        } else {
            false
        }
    }
}
