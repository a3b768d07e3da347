//! Object key construction for uploaded images.
//!
//! Every uploaded file gets a key of the form
//!
//! ```text
//! {prefix}/{owner}/{stamp}-{index:02}-{hash8}-{stem}.{ext}
//! cars/user-42/1700000000-03-9f86d081-front-left.jpg
//! ```
//!
//! - `stamp` identifies the batch (the CLI uses seconds since the epoch)
//! - `index` is the file's position within the batch
//! - `hash8` is the first 8 hex digits of the SHA-256 of the stored bytes
//! - `stem` is a sanitized form of the original file stem
//!
//! The index alone makes keys unique within a batch; the hash makes
//! collisions across batches with the same stamp practically impossible.

use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::Path;

/// Longest sanitized segment kept in a key.
pub const MAX_SEGMENT_LEN: usize = 48;

/// Lowercase, collapse runs of non-alphanumerics to `-`, trim dashes,
/// truncate to [`MAX_SEGMENT_LEN`]. Empty results become `fallback`.
///
/// - `"Front Left.JPG"` → `"front-left-jpg"`
/// - `"__"` → fallback
pub fn sanitize_segment(raw: &str, fallback: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_dash = false;
    for c in raw.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    out.truncate(MAX_SEGMENT_LEN);
    let trimmed = out.trim_end_matches('-');
    if trimmed.is_empty() {
        fallback.to_string()
    } else {
        trimmed.to_string()
    }
}

/// First 8 hex digits of the SHA-256 of `bytes`.
pub fn short_hash(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest[..4].iter().map(|b| format!("{b:02x}")).collect()
}

/// Build the object key for one uploaded file.
///
/// `file_name` supplies the stem; the extension is the codec's output
/// extension, not the original one.
pub fn object_key(
    prefix: &str,
    owner: &str,
    stamp: u64,
    index: usize,
    file_name: &str,
    extension: &str,
    bytes: &[u8],
) -> String {
    let stem = Path::new(file_name)
        .file_stem()
        .map(|s| s.to_string_lossy())
        .unwrap_or_default();
    format!(
        "{}/{}/{}-{:02}-{}-{}.{}",
        prefix.trim_matches('/'),
        sanitize_segment(owner, "anonymous"),
        stamp,
        index,
        short_hash(bytes),
        sanitize_segment(&stem, "image"),
        extension.trim_start_matches('.').to_ascii_lowercase(),
    )
}

/// Directory prefix holding every object an owner uploaded.
pub fn owner_prefix(prefix: &str, owner: &str) -> String {
    format!(
        "{}/{}",
        prefix.trim_matches('/'),
        sanitize_segment(owner, "anonymous")
    )
}

/// Relative output paths for a batch written to a local directory.
///
/// Each entry pairs the input's `/`-separated path relative to where it was
/// found with the name the normalizer gave it. The input's directory is kept
/// and the name replaced. Paths that clash with an earlier one get `-2`,
/// `-3`, ... before the extension, in input order:
///
/// - `("front.png", "front.jpg")`, `("front.bmp", "front.jpg")` →
///   `front.jpg`, `front-2.jpg`
/// - `("left/front.png", "front.jpg")` → `left/front.jpg`
pub fn output_paths(entries: &[(&str, &str)]) -> Vec<String> {
    let wanted: Vec<String> = entries
        .iter()
        .map(|(input, name)| match input.rsplit_once('/') {
            Some((dir, _)) => format!("{dir}/{name}"),
            None => name.to_string(),
        })
        .collect();
    let reserved: HashSet<&str> = wanted.iter().map(String::as_str).collect();
    let mut taken: HashSet<String> = HashSet::new();

    wanted
        .iter()
        .map(|path| {
            if taken.insert(path.clone()) {
                return path.clone();
            }
            let (stem, ext) = split_extension(path);
            let mut n = 2;
            loop {
                let candidate = format!("{stem}-{n}{ext}");
                if !reserved.contains(candidate.as_str()) && taken.insert(candidate.clone()) {
                    return candidate;
                }
                n += 1;
            }
        })
        .collect()
}

/// Split `dir/name.ext` into `dir/name` and `.ext`. Dotfiles have no extension.
fn split_extension(path: &str) -> (&str, &str) {
    let name_start = path.rfind('/').map_or(0, |i| i + 1);
    match path[name_start..].rfind('.') {
        Some(dot) if dot > 0 => path.split_at(name_start + dot),
        _ => (path, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_lowercases_and_dashes() {
        assert_eq!(sanitize_segment("Front Left", "image"), "front-left");
        assert_eq!(sanitize_segment("IMG_0042 (copy)", "image"), "img-0042-copy");
    }

    #[test]
    fn sanitize_trims_and_collapses() {
        assert_eq!(sanitize_segment("--a__b--", "image"), "a-b");
        assert_eq!(sanitize_segment("  spaced  ", "image"), "spaced");
    }

    #[test]
    fn sanitize_drops_non_ascii() {
        assert_eq!(sanitize_segment("gaadi ñ 1", "image"), "gaadi-1");
    }

    #[test]
    fn sanitize_empty_uses_fallback() {
        assert_eq!(sanitize_segment("", "image"), "image");
        assert_eq!(sanitize_segment("___", "image"), "image");
        assert_eq!(sanitize_segment("ऑटो", "image"), "image");
    }

    #[test]
    fn sanitize_truncates() {
        let long = "a".repeat(100);
        assert_eq!(sanitize_segment(&long, "image").len(), MAX_SEGMENT_LEN);

        // A dash at the cut point is trimmed.
        let dashed = format!("{}-b", "a".repeat(MAX_SEGMENT_LEN - 1));
        assert_eq!(
            sanitize_segment(&dashed, "image"),
            "a".repeat(MAX_SEGMENT_LEN - 1)
        );
    }

    #[test]
    fn short_hash_is_sha256_prefix() {
        // SHA-256("test") = 9f86d081884c7d65...
        assert_eq!(short_hash(b"test"), "9f86d081");
    }

    #[test]
    fn object_key_layout() {
        let key = object_key(
            "cars",
            "User 42",
            1_700_000_000,
            3,
            "Front Left.HEIC",
            "jpg",
            b"test",
        );
        assert_eq!(key, "cars/user-42/1700000000-03-9f86d081-front-left.jpg");
    }

    #[test]
    fn object_key_without_stem() {
        let key = object_key("cars/", "u1", 1, 0, ".jpg", ".JPG", b"test");
        // ".jpg" has stem ".jpg" per std; sanitized to "jpg".
        assert!(key.starts_with("cars/u1/1-00-9f86d081-"));
        assert!(key.ends_with(".jpg"));

        let key = object_key("cars", "u1", 1, 0, "", "jpg", b"test");
        assert_eq!(key, "cars/u1/1-00-9f86d081-image.jpg");
    }

    #[test]
    fn index_distinguishes_identical_files() {
        let a = object_key("cars", "u1", 5, 0, "a.jpg", "jpg", b"same");
        let b = object_key("cars", "u1", 5, 1, "a.jpg", "jpg", b"same");
        assert_ne!(a, b);
    }

    #[test]
    fn owner_prefix_matches_key_owner_segment() {
        let key = object_key("cars", "User 42", 1, 0, "a.jpg", "jpg", b"x");
        assert!(key.starts_with(&format!("{}/", owner_prefix("cars", "User 42"))));
    }

    // =========================================================================
    // output_paths
    // =========================================================================

    #[test]
    fn output_paths_keep_input_directories() {
        let paths = output_paths(&[
            ("left/front.png", "front.jpg"),
            ("right/front.png", "front.jpg"),
            ("rear.jpg", "rear.jpg"),
        ]);
        assert_eq!(paths, vec!["left/front.jpg", "right/front.jpg", "rear.jpg"]);
    }

    #[test]
    fn output_paths_suffix_clashing_names() {
        let paths = output_paths(&[
            ("front.png", "front.jpg"),
            ("front.bmp", "front.jpg"),
            ("front.webp", "front.jpg"),
        ]);
        assert_eq!(paths, vec!["front.jpg", "front-2.jpg", "front-3.jpg"]);
    }

    #[test]
    fn output_paths_skip_suffixes_already_in_use() {
        let paths = output_paths(&[
            ("front.png", "front.jpg"),
            ("front.bmp", "front.jpg"),
            ("front-2.jpg", "front-2.jpg"),
        ]);
        assert_eq!(paths, vec!["front.jpg", "front-3.jpg", "front-2.jpg"]);
    }

    #[test]
    fn output_paths_without_extension() {
        let paths = output_paths(&[
            ("a/.hidden", ".hidden"),
            ("a/.hidden", ".hidden"),
            ("b.d/scan", "scan"),
            ("b.d/scan", "scan"),
        ]);
        assert_eq!(paths, vec!["a/.hidden", "a/.hidden-2", "b.d/scan", "b.d/scan-2"]);
    }
}
