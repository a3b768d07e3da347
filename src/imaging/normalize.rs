//! Image size normalization.
//!
//! Takes an arbitrary photo and produces a file whose byte size falls inside
//! a [`TargetBand`], searching over encode quality and, once quality hits its
//! floor, over resolution.
//!
//! ```text
//! input ──► within band? ──yes──► returned unchanged
//!              │ no
//!              ▼
//!           decode ──fail──► original (Fallback)
//!              │
//!              ▼
//!   ┌──► encode(quality, cap) ──► within band? ──yes──► Compressed
//!   │          │ no
//!   │          ▼
//!   └── next_state (×0.8 / ×1.2, then shrink cap)   [≤ max_attempts]
//!              │ exhausted
//!              ▼
//!   best candidate closer than input? ──yes──► BestEffort
//!                                     └─no──► original (Unchanged)
//! ```
//!
//! Compression is best-effort: the only error surfaced to callers is
//! [`NormalizeError::InvalidInputKind`]. Codec failures fall back to the
//! original file so an upload can always proceed.

use super::calculations::{SearchState, StepRules, fit_within, initial_quality, next_state};
use super::codec::{CodecError, Dimensions, ImageCodec};
use super::params::{BandPosition, EncodeParams, Quality, TargetBand};
use image::ImageFormat;
use rayon::prelude::*;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("{name} is not an image (media type {media_type:?})")]
    InvalidInputKind { name: String, media_type: String },
}

/// A file-like input or output: name, declared media type, content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFile {
    pub name: String,
    pub media_type: String,
    pub bytes: Vec<u8>,
}

impl ImageFile {
    pub fn new(name: impl Into<String>, media_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            bytes,
        }
    }

    /// Read a file from disk, deriving the media type from its extension.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::new(name, media_type_for_path(path), bytes))
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// True when the declared media type is `image/*`.
    pub fn is_image(&self) -> bool {
        self.media_type
            .trim()
            .to_ascii_lowercase()
            .starts_with("image/")
    }
}

/// Media type for a path, from its extension.
///
/// Phone formats the `image` crate cannot read still map to `image/*`: they
/// pass the input check and fall back to upload-as-is.
pub fn media_type_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "heic" | "heif" => "image/heic",
        "svg" => "image/svg+xml",
        _ => ImageFormat::from_extension(&ext)
            .map(|f| f.to_mime_type())
            .unwrap_or("application/octet-stream"),
    }
}

/// Replace the extension of a file name, keeping its stem.
fn rename_extension(name: &str, extension: &str) -> String {
    let stem = Path::new(name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "image".to_string());
    format!("{}.{}", stem, extension)
}

/// One successful encode attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct CompressedCandidate {
    pub bytes: Vec<u8>,
    pub quality: Quality,
    pub dimensions: Dimensions,
}

impl CompressedCandidate {
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Settings for [`normalize`].
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizeConfig {
    pub band: TargetBand,
    /// Hard cap on encode attempts, failed ones included.
    pub max_attempts: u32,
    /// Initial cap on the long edge, in pixels.
    pub max_dimension: u32,
    pub initial_quality_shrink: Quality,
    pub initial_quality_grow: Quality,
    pub rules: StepRules,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            band: TargetBand::default(),
            max_attempts: 8,
            max_dimension: 1920,
            initial_quality_shrink: Quality::new(0.7),
            initial_quality_grow: Quality::new(0.9),
            rules: StepRules {
                shrink_factor: 0.8,
                grow_factor: 1.2,
                min_quality: Quality::new(0.1),
                dimension_step: 0.75,
                min_dimension: 480,
            },
        }
    }
}

/// How a [`Normalized`] result was reached.
#[derive(Debug, Clone, PartialEq)]
pub enum NormalizeOutcome {
    /// Input was already inside the band and is returned byte-identical.
    AlreadyWithinBand,
    /// An attempt landed inside the band.
    Compressed {
        attempts: u32,
        quality: Quality,
        dimensions: Dimensions,
    },
    /// Attempts ran out; the closest candidate is returned.
    BestEffort {
        attempts: u32,
        quality: Quality,
        dimensions: Dimensions,
    },
    /// No candidate was closer to the band than the input.
    Unchanged { attempts: u32 },
    /// The codec failed; the input is returned.
    Fallback { attempts: u32, reason: String },
}

impl NormalizeOutcome {
    /// Short label for CLI output.
    pub fn label(&self) -> &'static str {
        match self {
            NormalizeOutcome::AlreadyWithinBand => "within band",
            NormalizeOutcome::Compressed { .. } => "compressed",
            NormalizeOutcome::BestEffort { .. } => "best effort",
            NormalizeOutcome::Unchanged { .. } => "unchanged",
            NormalizeOutcome::Fallback { .. } => "original (codec failed)",
        }
    }

    pub fn attempts(&self) -> u32 {
        match self {
            NormalizeOutcome::AlreadyWithinBand => 0,
            NormalizeOutcome::Compressed { attempts, .. }
            | NormalizeOutcome::BestEffort { attempts, .. }
            | NormalizeOutcome::Unchanged { attempts }
            | NormalizeOutcome::Fallback { attempts, .. } => *attempts,
        }
    }
}

/// Output of [`normalize`]: the file to upload and how it was produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub file: ImageFile,
    pub outcome: NormalizeOutcome,
}

impl Normalized {
    fn original(input: &ImageFile, outcome: NormalizeOutcome) -> Self {
        Self {
            file: input.clone(),
            outcome,
        }
    }

    fn reencoded<C: ImageCodec>(
        input: &ImageFile,
        bytes: Vec<u8>,
        outcome: NormalizeOutcome,
    ) -> Self {
        Self {
            file: ImageFile::new(
                rename_extension(&input.name, C::EXTENSION),
                C::MEDIA_TYPE,
                bytes,
            ),
            outcome,
        }
    }

    /// True when the returned file differs from the input.
    pub fn is_reencoded(&self) -> bool {
        matches!(
            self.outcome,
            NormalizeOutcome::Compressed { .. } | NormalizeOutcome::BestEffort { .. }
        )
    }
}

/// Normalize one file into the configured size band.
///
/// Never mutates `input`. Fails only for non-image input; every other
/// problem resolves to a [`NormalizeOutcome`].
pub fn normalize<C: ImageCodec>(
    codec: &C,
    input: &ImageFile,
    config: &NormalizeConfig,
) -> Result<Normalized, NormalizeError> {
    if !input.is_image() {
        return Err(NormalizeError::InvalidInputKind {
            name: input.name.clone(),
            media_type: input.media_type.clone(),
        });
    }

    let band = config.band;
    let original_size = input.size();
    let position = band.position(original_size);
    if position == BandPosition::Within {
        debug!(file = %input.name, size = original_size, "already within band");
        return Ok(Normalized::original(
            input,
            NormalizeOutcome::AlreadyWithinBand,
        ));
    }

    let image = match codec.decode(input) {
        Ok(image) => image,
        Err(e) => {
            warn!(file = %input.name, error = %e, "decode failed, keeping original");
            return Ok(Normalized::original(
                input,
                NormalizeOutcome::Fallback {
                    attempts: 0,
                    reason: e.to_string(),
                },
            ));
        }
    };
    let source = codec.dimensions(&image);

    let mut state = SearchState {
        quality: initial_quality(
            position,
            config.initial_quality_shrink,
            config.initial_quality_grow,
        ),
        max_dimension: config.max_dimension,
    };
    let mut best: Option<CompressedCandidate> = None;
    let mut last_error: Option<CodecError> = None;
    let mut attempts = 0;

    while attempts < config.max_attempts {
        attempts += 1;
        let (width, height) = fit_within((source.width, source.height), state.max_dimension);
        let params = EncodeParams {
            width,
            height,
            quality: state.quality,
        };

        let bytes = match codec.encode(&image, &params) {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!(file = %input.name, attempt = attempts, error = %e, "encode attempt failed");
                last_error = Some(e);
                continue;
            }
        };

        let candidate = CompressedCandidate {
            bytes,
            quality: state.quality,
            dimensions: Dimensions { width, height },
        };
        let size = candidate.size();
        let landed = band.position(size);
        debug!(
            file = %input.name,
            attempt = attempts,
            quality = state.quality.to_percent(),
            width,
            height,
            size,
            "encoded candidate"
        );

        if landed == BandPosition::Within {
            let outcome = NormalizeOutcome::Compressed {
                attempts,
                quality: candidate.quality,
                dimensions: candidate.dimensions,
            };
            return Ok(Normalized::reencoded::<C>(input, candidate.bytes, outcome));
        }

        if best
            .as_ref()
            .is_none_or(|b| band.distance(size) < band.distance(b.size()))
        {
            best = Some(candidate);
        }

        match next_state(state, landed, &config.rules, source.long_edge()) {
            Some(next) => state = next,
            None => break,
        }
    }

    match best {
        Some(candidate) if band.distance(candidate.size()) < band.distance(original_size) => {
            warn!(
                file = %input.name,
                attempts,
                size = candidate.size(),
                min = band.min_bytes,
                max = band.max_bytes,
                "band unreachable, using closest candidate"
            );
            let outcome = NormalizeOutcome::BestEffort {
                attempts,
                quality: candidate.quality,
                dimensions: candidate.dimensions,
            };
            Ok(Normalized::reencoded::<C>(input, candidate.bytes, outcome))
        }
        Some(_) => {
            debug!(file = %input.name, attempts, "no candidate beat the original");
            Ok(Normalized::original(
                input,
                NormalizeOutcome::Unchanged { attempts },
            ))
        }
        None => {
            let reason = last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no encode attempts made".to_string());
            warn!(file = %input.name, attempts, %reason, "every encode failed, keeping original");
            Ok(Normalized::original(
                input,
                NormalizeOutcome::Fallback { attempts, reason },
            ))
        }
    }
}

/// Normalize many files in parallel. Results keep input order.
///
/// Each file is independent: no state is shared between normalizations
/// beyond the (immutable) codec and config.
pub fn normalize_all<C: ImageCodec>(
    codec: &C,
    inputs: &[ImageFile],
    config: &NormalizeConfig,
) -> Vec<Result<Normalized, NormalizeError>> {
    inputs
        .par_iter()
        .map(|input| normalize(codec, input, config))
        .collect()
}
