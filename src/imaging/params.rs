//! Parameter types for the size normalizer.
//!
//! These structs describe *what* to encode, not *how*. They are the interface
//! between the search in [`normalize`](super::normalize) (which decides the
//! next attempt) and the [`codec`](super::codec) (which does the pixel work).
//!
//! ## Types
//!
//! - [`Quality`]: Lossy encoding quality in `[0, 1]`. Clamped on construction.
//! - [`TargetBand`]: Acceptable output byte-size range.
//! - [`EncodeParams`]: One encode attempt: output dimensions + quality.

/// Lossy encoding quality in `[0.0, 1.0]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Quality(f32);

impl Quality {
    pub const MAX: Quality = Quality(1.0);

    pub fn new(value: f32) -> Self {
        if value.is_nan() {
            return Self(0.0);
        }
        Self(value.clamp(0.0, 1.0))
    }

    pub fn value(self) -> f32 {
        self.0
    }

    /// Map to the 1–100 scale used by JPEG encoders.
    pub fn to_percent(self) -> u8 {
        (self.0 * 100.0).round().clamp(1.0, 100.0) as u8
    }

    pub fn is_max(self) -> bool {
        self.0 >= 1.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(0.7)
    }
}

/// Where a byte size sits relative to a [`TargetBand`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BandPosition {
    Below,
    Within,
    Above,
}

/// Acceptable output size range, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetBand {
    pub min_bytes: u64,
    pub max_bytes: u64,
}

impl TargetBand {
    pub fn new(min_bytes: u64, max_bytes: u64) -> Self {
        Self {
            min_bytes,
            max_bytes,
        }
    }

    /// Build a band from kilobyte bounds (1 KB = 1024 bytes).
    pub fn from_kb(min_kb: u64, max_kb: u64) -> Self {
        Self::new(min_kb * 1024, max_kb * 1024)
    }

    pub fn position(&self, size: u64) -> BandPosition {
        if size < self.min_bytes {
            BandPosition::Below
        } else if size > self.max_bytes {
            BandPosition::Above
        } else {
            BandPosition::Within
        }
    }

    pub fn contains(&self, size: u64) -> bool {
        self.position(size) == BandPosition::Within
    }

    pub fn midpoint(&self) -> u64 {
        self.min_bytes + (self.max_bytes - self.min_bytes) / 2
    }

    /// Absolute distance from the band midpoint. Used to rank candidates.
    pub fn distance(&self, size: u64) -> u64 {
        size.abs_diff(self.midpoint())
    }
}

impl Default for TargetBand {
    fn default() -> Self {
        Self::from_kb(50, 100)
    }
}

/// One encode attempt: resolved output dimensions and quality.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EncodeParams {
    pub width: u32,
    pub height: u32,
    pub quality: Quality,
}
