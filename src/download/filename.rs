// src/download/filename.rs
// =============================================================================
// Turning an image URL into a safe local file name.
//
// - The last path segment is the starting point (query strings never count)
// - Characters that are illegal on common filesystems are dropped
// - A missing extension is filled in from the response content type
// - Collisions are resolved elsewhere (registry.rs) with `with_counter`
// =============================================================================

use std::path::Path;

use url::Url;

/// Longest file name we produce, in bytes.
pub const MAX_FILE_NAME_LEN: usize = 200;

/// Used when the URL path has no usable last segment.
const FALLBACK_STEM: &str = "image";

// Picks the file name for an image
//
// Parameters:
//   url: The image URL; only its last path segment is used
//   content_type: The response's content type, for a missing extension
//
// Returns: A sanitized name, "image" + extension if nothing usable is left
//
// Example:
//   /img/My Photo.png          -> My_Photo.png
//   /avatar?size=64 + image/jpeg -> avatar.jpg
pub fn file_name_for(url: &Url, content_type: &str) -> String {
    let segment = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or("");

    let mut name = sanitize(segment);
    if name.is_empty() {
        name = FALLBACK_STEM.to_string();
    }

    if has_extension(&name) {
        name
    } else {
        let ext = extension_for(content_type);
        fit(&name, &ext)
    }
}

/// Strips characters that are invalid in file names on Windows or Unix,
/// turns spaces into underscores, drops leading dots (no hidden files) and
/// caps the length.
pub fn sanitize(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*'))
        .filter(|c| !c.is_control())
        .map(|c| if c == ' ' { '_' } else { c })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');

    match split_extension(cleaned) {
        (stem, Some(ext)) => fit(stem, ext),
        (stem, None) => truncate(stem, MAX_FILE_NAME_LEN).to_string(),
    }
}

/// File extension (without dot) for an `image/*` content type.
pub fn extension_for(content_type: &str) -> String {
    let media = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    let subtype = media.strip_prefix("image/").unwrap_or("");

    let ext = match subtype {
        "jpeg" | "jpg" | "pjpeg" => "jpg",
        "svg+xml" => "svg",
        "x-icon" | "vnd.microsoft.icon" => "ico",
        "x-ms-bmp" => "bmp",
        other => other,
    };

    let ext: String = ext.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
    if ext.is_empty() {
        "img".to_string()
    } else {
        ext
    }
}

/// `photo.png` + 2 -> `photo-2.png`; `photo` + 2 -> `photo-2`.
pub fn with_counter(name: &str, counter: usize) -> String {
    let suffix = format!("-{}", counter);
    match split_extension(name) {
        (stem, Some(ext)) => {
            let room = MAX_FILE_NAME_LEN.saturating_sub(suffix.len() + ext.len() + 1);
            fit(&format!("{}{}", truncate(stem, room), suffix), ext)
        }
        (stem, None) => {
            let room = MAX_FILE_NAME_LEN.saturating_sub(suffix.len());
            format!("{}{}", truncate(stem, room), suffix)
        }
    }
}

/// Hidden temporary name an image is written under before the final rename.
/// Never equal to a `sanitize`d name, which can't start with a dot.
pub fn part_name(name: &str) -> String {
    format!(".{}.part", name)
}

fn has_extension(name: &str) -> bool {
    split_extension(name).1.is_some()
}

fn split_extension(name: &str) -> (&str, Option<&str>) {
    let path = Path::new(name);
    let stem = path.file_stem().and_then(|s| s.to_str());
    let ext = path.extension().and_then(|e| e.to_str());
    match (stem, ext) {
        (Some(stem), Some(ext)) if !stem.is_empty() && !ext.is_empty() => (stem, Some(ext)),
        _ => (name, None),
    }
}

/// Joins stem and extension, shortening the stem so the whole name fits.
fn fit(stem: &str, ext: &str) -> String {
    let ext = truncate(ext, 16);
    let room = MAX_FILE_NAME_LEN.saturating_sub(ext.len() + 1);
    format!("{}.{}", truncate(stem, room), ext)
}

fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
