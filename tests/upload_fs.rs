//! Upload, delete and orphan cleanup against a directory-backed store.

use carlot::config::AppConfig;
use carlot::imaging::{ImageFile, NormalizeOutcome, RustCodec};
use carlot::listing::Listing;
use carlot::store::{FsStore, ObjectStore};
use carlot::upload::{
    UploadError, UploadRequest, cleanup_orphans, delete_listing_images, find_orphans,
    upload_images,
};
use image::{ImageFormat, Rgb, RgbImage};
use serde_json::json;
use std::io::Cursor;
use tempfile::TempDir;

fn noise_png(name: &str, width: u32, height: u32, seed: u32) -> ImageFile {
    let mut state = seed.max(1);
    let img = RgbImage::from_fn(width, height, |_, _| {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        Rgb([state as u8, (state >> 8) as u8, (state >> 16) as u8])
    });
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).unwrap();
    ImageFile::new(name, "image/png", out.into_inner())
}

/// Tiny band and one attempt: every photo is re-encoded once as JPEG.
fn quick_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.band.min_kb = 1;
    config.band.max_kb = 2;
    config.search.max_attempts = 1;
    config.search.max_dimension = 128;
    config.search.min_dimension = 32;
    config
}

fn request() -> UploadRequest {
    UploadRequest {
        owner_uid: "user-42".into(),
        batch_stamp: 1_700_000_000,
    }
}

fn listing_with(keys: &[String]) -> Listing {
    Listing::from_document(
        "listing-1",
        json!({
            "uid": "user-42",
            "name": "Hyundai i20 Asta",
            "price": 720000,
            "year": 2021,
            "imagePaths": keys,
        }),
    )
    .unwrap()
}

#[test]
fn upload_writes_jpegs_under_owner_prefix() {
    let tmp = TempDir::new().unwrap();
    let store = FsStore::new(tmp.path());
    let files = vec![
        noise_png("Front.png", 96, 64, 1),
        noise_png("rear.png", 96, 64, 2),
    ];

    let report = upload_images(
        &RustCodec::new(),
        &store,
        &files,
        &request(),
        &quick_config(),
        None,
    )
    .unwrap();

    assert!(report.is_complete());
    let keys = report.keys();
    assert_eq!(keys.len(), 2);
    for (key, stem) in keys.iter().zip(["front", "rear"]) {
        assert!(key.starts_with("cars/user-42/1700000000-"));
        assert!(key.ends_with(&format!("-{stem}.jpg")));

        let path = key.split('/').fold(tmp.path().to_path_buf(), |p, s| p.join(s));
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(image::guess_format(&bytes).unwrap(), ImageFormat::Jpeg);
    }
    assert!(matches!(
        report.uploaded[0].outcome,
        NormalizeOutcome::BestEffort { .. }
    ));
    assert_eq!(store.list("cars/user-42").unwrap(), {
        let mut sorted = keys.clone();
        sorted.sort();
        sorted
    });
}

#[test]
fn upload_keeps_going_past_bad_files() {
    let tmp = TempDir::new().unwrap();
    let store = FsStore::new(tmp.path());
    let files = vec![
        ImageFile::new("notes.txt", "text/plain", b"call after 6".to_vec()),
        ImageFile::new("corrupt.jpg", "image/jpeg", vec![0xFF; 4096]),
        noise_png("side.png", 64, 64, 3),
    ];

    let report = upload_images(
        &RustCodec::new(),
        &store,
        &files,
        &request(),
        &quick_config(),
        None,
    )
    .unwrap();

    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].name, "notes.txt");
    assert_eq!(report.uploaded.len(), 2);

    // The corrupt file goes up unchanged under its own extension.
    let corrupt = &report.uploaded[0];
    assert!(matches!(corrupt.outcome, NormalizeOutcome::Fallback { .. }));
    assert!(corrupt.key.ends_with("-corrupt.jpg"));
    assert_eq!(corrupt.stored_size, 4096);
}

#[test]
fn upload_requires_owner() {
    let tmp = TempDir::new().unwrap();
    let store = FsStore::new(tmp.path());
    let req = UploadRequest {
        owner_uid: String::new(),
        batch_stamp: 1,
    };

    let err = upload_images(
        &RustCodec::new(),
        &store,
        &[noise_png("a.png", 8, 8, 1)],
        &req,
        &quick_config(),
        None,
    )
    .unwrap_err();

    assert!(matches!(err, UploadError::MissingOwner));
    assert!(store.list("").unwrap().is_empty());
}

#[test]
fn listing_lifecycle_upload_orphan_delete() {
    let tmp = TempDir::new().unwrap();
    let store = FsStore::new(tmp.path());
    let config = quick_config();
    let prefix = &config.upload.key_prefix;

    let report = upload_images(
        &RustCodec::new(),
        &store,
        &[
            noise_png("a.png", 48, 48, 1),
            noise_png("b.png", 48, 48, 2),
            noise_png("c.png", 48, 48, 3),
        ],
        &request(),
        &config,
        None,
    )
    .unwrap();
    let keys = report.keys();

    // The listing only kept the first two photos; the third is orphaned.
    let listing = listing_with(&keys[..2]);
    let orphans = find_orphans(&store, prefix, "user-42", std::slice::from_ref(&listing)).unwrap();
    assert_eq!(orphans, vec![keys[2].clone()]);

    let cleaned =
        cleanup_orphans(&store, prefix, "user-42", std::slice::from_ref(&listing)).unwrap();
    assert_eq!(cleaned.deleted, vec![keys[2].clone()]);

    let deleted = delete_listing_images(&store, &listing);
    assert!(deleted.is_complete());
    assert_eq!(deleted.deleted.len(), 2);
    assert!(store.list("cars/user-42").unwrap().is_empty());

    // Deleting again finds nothing but does not fail.
    let again = delete_listing_images(&store, &listing);
    assert!(again.is_complete());
    assert_eq!(again.missing.len(), 2);
}

#[test]
fn legacy_photo_is_deleted_from_images_directory() {
    let tmp = TempDir::new().unwrap();
    let store = FsStore::new(tmp.path());
    store.put("images/abc.jpg", b"legacy", "image/jpeg").unwrap();
    store.put("cars/user-42/kept.jpg", b"new", "image/jpeg").unwrap();
    let listing = Listing::from_document(
        "old-listing",
        json!({
            "uid": "user-42",
            "name": "Maruti 800",
            "price": 90000,
            "year": 2004,
            "photo": "abc.jpg",
        }),
    )
    .unwrap();

    let report = delete_listing_images(&store, &listing);

    assert_eq!(report.deleted, vec!["images/abc.jpg"]);
    assert!(report.missing.is_empty());
    assert!(!tmp.path().join("images").join("abc.jpg").exists());
    assert_eq!(store.list("").unwrap(), vec!["cars/user-42/kept.jpg"]);
}
