//! Filename derivation, sanitization, and path resolution for downloads.
//!
//! Session names come from a stable hash of the source URL, optionally
//! replaced by a `fileName` carried as percent-encoded JSON in the URL's last
//! path segment. The local save collaborators then resolve that name to a
//! unique path on disk.

use std::path::{Component, Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use super::media::MediaKind;

/// Metadata some media URLs embed in their final path segment.
#[derive(Debug, Deserialize)]
struct SegmentMetadata {
    #[serde(rename = "fileName")]
    file_name: Option<String>,
}

/// Polynomial rolling hash (`h * 31 + unit`) over the UTF-16 code units of `s`.
///
/// Arithmetic wraps at 32 bits; the result is the unsigned reinterpretation.
#[must_use]
pub fn hash_code(s: &str) -> u32 {
    let mut h: i32 = 0;
    for unit in s.encode_utf16() {
        h = (h << 5).wrapping_sub(h).wrapping_add(i32::from(unit));
    }
    u32::from_ne_bytes(h.to_ne_bytes())
}

/// Renders `value` in lowercase base 36.
#[must_use]
pub fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

/// Deterministic name for `url`: base-36 hash plus the kind's default extension.
///
/// A hash of zero would give every such URL the same name, so the current
/// timestamp stands in for it.
#[must_use]
pub fn fallback_file_name(url: &str, kind: MediaKind, now_ms: u64) -> String {
    let hash = match hash_code(url) {
        0 => now_ms,
        h => u64::from(h),
    };
    format!("{}.{}", to_base36(hash), kind.default_extension())
}

/// Best-effort recovery of a `fileName` from the URL's last path segment.
///
/// Returns `None` on any decode or parse failure.
#[must_use]
pub fn recover_metadata_file_name(url: &str) -> Option<String> {
    let segment = url.rsplit('/').next()?;
    let decoded = match urlencoding::decode(segment) {
        Ok(decoded) => decoded,
        Err(e) => {
            debug!(error = %e, "metadata segment is not valid percent-encoded UTF-8");
            return None;
        }
    };
    let metadata: SegmentMetadata = match serde_json::from_str(&decoded) {
        Ok(metadata) => metadata,
        Err(e) => {
            debug!(error = %e, "metadata segment is not JSON");
            return None;
        }
    };
    metadata
        .file_name
        .filter(|name| !name.is_empty())
        .map(|name| sanitize_filename(&name))
}

/// Rewrites the trailing `.ext` of `name` to `extension`.
///
/// Names without an extension are returned unchanged.
#[must_use]
pub fn replace_extension(name: &str, extension: &str) -> String {
    match name.rfind('.') {
        Some(pos) if pos + 1 < name.len() => format!("{}.{extension}", &name[..pos]),
        _ => name.to_string(),
    }
}

pub(crate) fn sanitize_filename_component(value: &str) -> String {
    let mut out = String::new();
    let mut prev_sep = false;
    for ch in value.chars() {
        let mapped = match ch {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\'' => '_',
            c if c.is_whitespace() || c.is_control() => '_',
            c if c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | '+') => c,
            _ => '_',
        };
        if mapped == '_' {
            if !prev_sep {
                out.push('_');
                prev_sep = true;
            }
        } else {
            out.push(mapped);
            prev_sep = false;
        }
    }
    out.trim_matches('_').to_string()
}

/// Sanitizes a filename for safe filesystem use.
///
/// Replaces characters that are invalid on common filesystems:
/// / \ : * ? " < > |
pub(crate) fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if sanitized.is_empty() {
        return "_".to_string();
    }

    if is_safe_filename_segment(&sanitized) {
        sanitized
    } else {
        sanitized
            .chars()
            .map(|c| if c == '.' { '_' } else { c })
            .collect()
    }
}

/// Path for `filename` under `dir`; a sanitized name, never escaping `dir`.
pub(crate) fn target_path(dir: &Path, filename: &str) -> PathBuf {
    let sanitized = sanitize_filename(filename);
    if sanitized.trim_matches('_').is_empty() {
        dir.join("download.bin")
    } else {
        dir.join(sanitized)
    }
}

/// Resolves a unique file path, adding a numeric suffix (`_2`, `_3`, ...) if the file exists.
pub(crate) fn resolve_unique_path(dir: &Path, filename: &str) -> PathBuf {
    let base_path = target_path(dir, filename);
    if !base_path.exists() {
        return base_path;
    }

    let filename = base_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "download.bin".to_string());
    let (stem, ext) = match filename.rfind('.') {
        Some(pos) if pos > 0 => (&filename[..pos], &filename[pos..]),
        _ => (filename.as_str(), ""),
    };

    for i in 2..1000 {
        let new_path = dir.join(format!("{stem}_{i}{ext}"));
        if !new_path.exists() {
            return new_path;
        }
    }

    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    dir.join(format!("{stem}_{timestamp}{ext}"))
}

fn is_safe_filename_segment(name: &str) -> bool {
    !Path::new(name).components().any(|component| {
        matches!(
            component,
            Component::CurDir | Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    })
}
