//! # Carlot
//!
//! Photo handling for a used-car marketplace. Sellers attach phone photos of
//! any size to a listing; before upload each photo is re-encoded until its
//! byte size lands in a fixed band (50–100 KB by default), so listing pages
//! load quickly without the photos turning to mush.
//!
//! # Architecture
//!
//! ```text
//! local files ──► imaging::normalize ──► naming::object_key ──► store::ObjectStore
//!                      (per file, parallel)                        │
//! listing documents ──► listing::Listing ──► upload::{delete, orphans} ┘
//! ```
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`imaging`] | Size-band search over quality and resolution; the `image`-crate codec |
//! | [`upload`] | Batch upload, listing image deletion, orphan cleanup |
//! | [`store`] | `ObjectStore` trait and the directory-backed `FsStore` |
//! | [`naming`] | Object key layout and segment sanitizing |
//! | [`listing`] | Typed listing records parsed from store documents |
//! | [`config`] | `carlot.toml` loading, validation, and merging over stock defaults |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Strict Size Band
//!
//! The band is the contract: a file inside it is uploaded byte-for-byte, a
//! file outside it is re-encoded. Quality is only a search variable, never a
//! goal of its own. Small originals are grown (re-encoded at higher quality)
//! as well as large ones shrunk, so every listing photo costs roughly the same
//! bandwidth.
//!
//! ## Quality First, Then Resolution
//!
//! Quality moves in damped steps (×0.8 down, ×1.2 up). Only once it reaches
//! its floor does the long edge shrink, in 25% steps, never below 480 px.
//! Full-resolution output is preferred whenever quality alone can hit the band.
//!
//! ## Best-Effort, Never Blocking
//!
//! Compression problems never stop an upload. If the codec cannot read a file
//! or every encode fails, the original goes up unchanged. If the attempt budget
//! runs out, the closest candidate is used, but only when it is closer to the
//! band than the original.
//!
//! ## JPEG Output
//!
//! Every re-encoded file is JPEG with a `.jpg` extension, whatever the input
//! format. Files already inside the band keep their original format and name.

pub mod config;
pub mod imaging;
pub mod listing;
pub mod naming;
pub mod output;
pub mod store;
pub mod upload;

#[cfg(test)]
pub(crate) mod test_helpers;
