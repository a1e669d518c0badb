//! Naming convention that pairs an image blob with its caption sidecar.
//!
//! `cat.jpg` is captioned by `cat.json`. Upload and listing both go through
//! [`caption_key`] so the two paths can never disagree.

const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// Returns the extension of the last path segment, if it has a non-empty stem.
fn split_extension(key: &str) -> Option<(&str, &str)> {
    let segment_start = key.rfind('/').map(|i| i + 1).unwrap_or(0);
    let (stem, ext) = key.rsplit_once('.')?;
    if stem.len() <= segment_start {
        // dot belongs to a directory name, or the file is a dotfile like ".png"
        return None;
    }
    Some((stem, ext))
}

pub fn is_image_key(key: &str) -> bool {
    split_extension(key)
        .map(|(_, ext)| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|candidate| ext.eq_ignore_ascii_case(candidate))
        })
        .unwrap_or(false)
}

/// Key of the sidecar JSON object holding the caption for `image_key`.
pub fn caption_key(image_key: &str) -> String {
    match split_extension(image_key) {
        Some((stem, _)) => format!("{stem}.json"),
        None => format!("{image_key}.json"),
    }
}

/// Reduces a client-supplied upload name to its final path component.
///
/// Returns `None` when nothing usable is left (empty, `.` or `..`).
pub fn upload_key(client_name: &str) -> Option<String> {
    let name = client_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    match name {
        "" | "." | ".." => None,
        other => Some(other.to_string()),
    }
}
