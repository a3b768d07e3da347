//! Image size normalization in pure Rust, no system libraries.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode** | `image::ImageReader` (content-sniffed) |
//! | **Resize** | `resize_exact` + Lanczos3, long edge capped |
//! | **Encode** | `JpegEncoder::new_with_quality` |
//! | **Search** | [`normalize`]: damped quality search, then resolution |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension and search-step math (unit testable)
//! - **Parameters**: Quality, target band, per-attempt encode parameters
//! - **Codec**: [`ImageCodec`] trait + [`RustCodec`]
//! - **Normalize**: The search itself, combining calculations + codec

mod calculations;
pub mod codec;
pub mod normalize;
mod params;
pub mod rust_codec;

pub use calculations::{SearchState, StepRules, fit_within};
pub use codec::{CodecError, Dimensions, ImageCodec};
pub use normalize::{
    CompressedCandidate, ImageFile, NormalizeConfig, NormalizeError, NormalizeOutcome, Normalized,
    media_type_for_path, normalize, normalize_all,
};
pub use params::{BandPosition, EncodeParams, Quality, TargetBand};
pub use rust_codec::RustCodec;
