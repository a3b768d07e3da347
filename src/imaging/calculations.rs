//! Pure calculation functions for the size search.
//!
//! All functions here are pure and testable without any I/O or images.

use super::params::{BandPosition, Quality};

/// Fit dimensions inside a square cap on the long edge, preserving aspect.
///
/// Never upscales: sources already within the cap are returned unchanged.
/// Neither edge collapses below 1 pixel.
///
/// # Examples
/// ```
/// # use carlot::imaging::fit_within;
/// assert_eq!(fit_within((4000, 3000), 1920), (1920, 1440));
/// assert_eq!(fit_within((800, 600), 1920), (800, 600));
/// ```
pub fn fit_within(source: (u32, u32), max_edge: u32) -> (u32, u32) {
    let (w, h) = source;
    let long_edge = w.max(h);
    if long_edge <= max_edge || long_edge == 0 {
        return (w, h);
    }

    let scale = max_edge as f64 / long_edge as f64;
    let scaled_w = ((w as f64 * scale).round() as u32).max(1);
    let scaled_h = ((h as f64 * scale).round() as u32).max(1);
    (scaled_w, scaled_h)
}

/// Mutable part of the search: what the next attempt will use.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchState {
    pub quality: Quality,
    /// Cap on the long edge, in pixels.
    pub max_dimension: u32,
}

/// How the search moves between attempts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepRules {
    /// Quality multiplier when the last candidate was too large (< 1).
    pub shrink_factor: f32,
    /// Quality multiplier when the last candidate was too small (> 1).
    pub grow_factor: f32,
    /// Quality floor. Below it the search trades resolution instead.
    pub min_quality: Quality,
    /// Long-edge multiplier once quality is at the floor (< 1).
    pub dimension_step: f32,
    /// Long edge is never reduced below this.
    pub min_dimension: u32,
}

/// Compute the next attempt from the last candidate's position.
///
/// The step factor is fixed rather than halved each round, so this is a
/// damped search, not a bisection; it can fail to converge within the
/// attempt budget.
///
/// Returns `None` when no parameter can move in the required direction
/// (quality already 1.0 when growing, floor quality and minimum dimension
/// when shrinking) or the candidate already sits in the band.
///
/// `source_long_edge` bounds the effective dimension cap: reducing a cap that
/// is already larger than the source would not change the output.
pub fn next_state(
    state: SearchState,
    position: BandPosition,
    rules: &StepRules,
    source_long_edge: u32,
) -> Option<SearchState> {
    match position {
        BandPosition::Within => None,
        BandPosition::Below => {
            if state.quality.is_max() {
                return None;
            }
            Some(SearchState {
                quality: Quality::new(state.quality.value() * rules.grow_factor),
                ..state
            })
        }
        BandPosition::Above => {
            let lowered = state.quality.value() * rules.shrink_factor;
            if lowered >= rules.min_quality.value() {
                return Some(SearchState {
                    quality: Quality::new(lowered),
                    ..state
                });
            }
            if state.quality > rules.min_quality {
                return Some(SearchState {
                    quality: rules.min_quality,
                    ..state
                });
            }

            // Quality is at the floor: trade resolution instead.
            let effective = state.max_dimension.min(source_long_edge);
            let reduced = ((effective as f64 * rules.dimension_step as f64).round() as u32)
                .max(rules.min_dimension);
            if reduced >= effective {
                return None;
            }
            Some(SearchState {
                quality: rules.min_quality,
                max_dimension: reduced,
            })
        }
    }
}

/// Starting quality: lower when the file must shrink, higher when it must grow.
pub fn initial_quality(position: BandPosition, shrink: Quality, grow: Quality) -> Quality {
    match position {
        BandPosition::Below => grow,
        BandPosition::Above | BandPosition::Within => shrink,
    }
}
