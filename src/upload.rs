//! Listing photo workflow: normalize + upload, delete, orphan cleanup.
//!
//! ```text
//! files ──► normalize (parallel) ──► object_key ──► store.put ──► report
//!                 │ not an image          │ store error
//!                 └──────────► failure ◄──┘
//! ```
//!
//! Every file is independent. One failing file is recorded in the report
//! and never stops the rest of the batch; only a request-level problem
//! (no owner) fails the whole call.

use crate::config::AppConfig;
use crate::imaging::{
    ImageCodec, ImageFile, NormalizeConfig, NormalizeError, NormalizeOutcome, normalize,
};
use crate::listing::Listing;
use crate::naming::{object_key, owner_prefix};
use crate::store::{ObjectStore, StoreError};
use rayon::prelude::*;
use std::collections::HashSet;
use std::path::Path;
use std::sync::mpsc::Sender;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Upload requires a signed-in owner uid")]
    MissingOwner,
    #[error(transparent)]
    Normalize(#[from] NormalizeError),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Who is uploading and which batch the files belong to.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub owner_uid: String,
    /// Batch identifier embedded in every key (seconds since the epoch in the CLI).
    pub batch_stamp: u64,
}

/// Progress events emitted while a batch uploads.
#[derive(Debug, Clone)]
pub enum UploadEvent {
    Started {
        total: usize,
    },
    FileUploaded {
        index: usize,
        name: String,
        key: String,
        original_size: u64,
        stored_size: u64,
        outcome: NormalizeOutcome,
    },
    FileFailed {
        index: usize,
        name: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct UploadedImage {
    pub index: usize,
    pub name: String,
    pub key: String,
    pub original_size: u64,
    pub stored_size: u64,
    pub outcome: NormalizeOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFailure {
    pub index: usize,
    pub name: String,
    pub reason: String,
}

/// Outcome of a batch. Both lists keep input order.
#[derive(Debug, Default)]
pub struct UploadReport {
    pub uploaded: Vec<UploadedImage>,
    pub failures: Vec<UploadFailure>,
}

impl UploadReport {
    /// Keys to record on the listing, in input order.
    pub fn keys(&self) -> Vec<String> {
        self.uploaded.iter().map(|u| u.key.clone()).collect()
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Normalize and store a batch of listing photos.
pub fn upload_images<C: ImageCodec>(
    codec: &C,
    store: &impl ObjectStore,
    files: &[ImageFile],
    request: &UploadRequest,
    config: &AppConfig,
    events: Option<Sender<UploadEvent>>,
) -> Result<UploadReport, UploadError> {
    if request.owner_uid.trim().is_empty() {
        return Err(UploadError::MissingOwner);
    }

    let emit = |event: UploadEvent| {
        if let Some(tx) = &events {
            // A dropped receiver only means nobody is watching.
            let _ = tx.send(event);
        }
    };
    emit(UploadEvent::Started { total: files.len() });

    let normalize_config = config.normalize_config();
    let results: Vec<Result<UploadedImage, UploadFailure>> = files
        .par_iter()
        .enumerate()
        .map(|(index, file)| {
            let result = upload_one(codec, store, file, index, request, config, &normalize_config);
            match result {
                Ok(uploaded) => {
                    emit(UploadEvent::FileUploaded {
                        index,
                        name: uploaded.name.clone(),
                        key: uploaded.key.clone(),
                        original_size: uploaded.original_size,
                        stored_size: uploaded.stored_size,
                        outcome: uploaded.outcome.clone(),
                    });
                    Ok(uploaded)
                }
                Err(e) => {
                    warn!(file = %file.name, error = %e, "upload failed");
                    let failure = UploadFailure {
                        index,
                        name: file.name.clone(),
                        reason: e.to_string(),
                    };
                    emit(UploadEvent::FileFailed {
                        index,
                        name: failure.name.clone(),
                        reason: failure.reason.clone(),
                    });
                    Err(failure)
                }
            }
        })
        .collect();

    let mut report = UploadReport::default();
    for result in results {
        match result {
            Ok(uploaded) => report.uploaded.push(uploaded),
            Err(failure) => report.failures.push(failure),
        }
    }
    info!(
        owner = %request.owner_uid,
        uploaded = report.uploaded.len(),
        failed = report.failures.len(),
        "batch finished"
    );
    Ok(report)
}

fn upload_one<C: ImageCodec>(
    codec: &C,
    store: &impl ObjectStore,
    file: &ImageFile,
    index: usize,
    request: &UploadRequest,
    config: &AppConfig,
    normalize_config: &NormalizeConfig,
) -> Result<UploadedImage, UploadError> {
    let normalized = normalize(codec, file, normalize_config)?;
    let extension = if normalized.is_reencoded() {
        C::EXTENSION.to_string()
    } else {
        original_extension(&normalized.file.name)
    };
    let key = object_key(
        &config.upload.key_prefix,
        &request.owner_uid,
        request.batch_stamp,
        index,
        &file.name,
        &extension,
        &normalized.file.bytes,
    );
    store.put(&key, &normalized.file.bytes, &normalized.file.media_type)?;
    debug!(file = %file.name, %key, outcome = normalized.outcome.label(), "stored");

    Ok(UploadedImage {
        index,
        name: file.name.clone(),
        key,
        original_size: file.size(),
        stored_size: normalized.file.size(),
        outcome: normalized.outcome,
    })
}

/// Extension of a file kept as-is, lowercased. `bin` when there is none.
fn original_extension(name: &str) -> String {
    Path::new(name)
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_else(|| "bin".to_string())
}

// ============================================================================
// Deletion
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteFailure {
    pub key: String,
    pub reason: String,
}

/// Outcome of deleting a set of keys.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct DeleteReport {
    pub deleted: Vec<String>,
    /// Keys that were already gone.
    pub missing: Vec<String>,
    pub failures: Vec<DeleteFailure>,
}

impl DeleteReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

fn delete_keys<'a>(
    store: &impl ObjectStore,
    keys: impl IntoIterator<Item = &'a str>,
) -> DeleteReport {
    let mut report = DeleteReport::default();
    for key in keys {
        match store.delete(key) {
            Ok(()) => report.deleted.push(key.to_string()),
            Err(StoreError::NotFound(_)) => {
                debug!(%key, "already deleted");
                report.missing.push(key.to_string());
            }
            Err(e) => {
                warn!(%key, error = %e, "delete failed");
                report.failures.push(DeleteFailure {
                    key: key.to_string(),
                    reason: e.to_string(),
                });
            }
        }
    }
    report
}

/// Remove every image a listing references, including the legacy `photo`
/// under `images/`.
pub fn delete_listing_images(store: &impl ObjectStore, listing: &Listing) -> DeleteReport {
    let keys = listing.image_keys();
    let report = delete_keys(store, keys.iter().map(String::as_str));
    info!(
        listing = %listing.id,
        deleted = report.deleted.len(),
        missing = report.missing.len(),
        failed = report.failures.len(),
        "listing images removed"
    );
    report
}

// ============================================================================
// Orphans
// ============================================================================

/// Objects under the owner's prefix that no listing references. Sorted.
pub fn find_orphans(
    store: &impl ObjectStore,
    key_prefix: &str,
    owner_uid: &str,
    listings: &[Listing],
) -> Result<Vec<String>, UploadError> {
    if owner_uid.trim().is_empty() {
        return Err(UploadError::MissingOwner);
    }
    let referenced: HashSet<String> = listings.iter().flat_map(Listing::image_keys).collect();
    let mut orphans: Vec<String> = store
        .list(&owner_prefix(key_prefix, owner_uid))?
        .into_iter()
        .filter(|key| !referenced.contains(key))
        .collect();
    orphans.sort();
    Ok(orphans)
}

/// Delete everything [`find_orphans`] reports.
pub fn cleanup_orphans(
    store: &impl ObjectStore,
    key_prefix: &str,
    owner_uid: &str,
    listings: &[Listing],
) -> Result<DeleteReport, UploadError> {
    let orphans = find_orphans(store, key_prefix, owner_uid, listings)?;
    Ok(delete_keys(store, orphans.iter().map(String::as_str)))
}
