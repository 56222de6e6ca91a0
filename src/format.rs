//! # Image Format Check
//!
//! APOD serves videos and the odd interactive page alongside still images.
//! Only URLs whose path ends in one of the extensions below are treated as
//! pictures the display can show; everything else takes the degraded path
//! in the session controller.

/// File extensions (lower case, no dot) the display surface can render.
const DISPLAYABLE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "tif", "bmp", "ico", "svg"];

/// Returns true if the URL's trailing file extension is a displayable image type.
///
/// The query string and fragment are ignored, and only the last path segment is
/// inspected, so a dot in the host name never counts as an extension.
///
/// # Examples
/// ```ignore
/// is_displayable("https://apod.nasa.gov/apod/image/2406/M8.JPG")  // → true
/// is_displayable("https://www.youtube.com/embed/abc?rel=0")      // → false
/// ```
pub fn is_displayable(url: &str) -> bool {
    extension(url)
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            DISPLAYABLE_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Extracts the substring after the final `.` of the URL's last path segment.
fn extension(url: &str) -> Option<&str> {
    // Cut off the fragment first, then the query
    let path = url.split('#').next().unwrap_or(url);
    let path = path.split('?').next().unwrap_or(path);

    // Drop "scheme://host" so "example.com" alone has no extension
    let path = match path.find("://") {
        Some(idx) => {
            let rest = &path[idx + 3..];
            rest.find('/').map(|slash| &rest[slash..]).unwrap_or("")
        }
        None => path,
    };

    let segment = path.rsplit('/').next().unwrap_or(path);
    segment
        .rsplit_once('.')
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_every_supported_extension() {
        for ext in DISPLAYABLE_EXTENSIONS {
            let url = format!("https://apod.nasa.gov/apod/image/2401/pic.{ext}");
            assert!(is_displayable(&url), "{url} should be displayable");
        }
    }

    #[test]
    fn test_extension_is_case_insensitive() {
        assert!(is_displayable("https://x/y.JPG"));
        assert!(is_displayable("https://x/y.Png"));
        assert!(is_displayable("https://x/y.SVG"));
    }

    #[test]
    fn test_rejects_unsupported_and_missing_extensions() {
        assert!(!is_displayable("https://x/y.psd"));
        assert!(!is_displayable("https://x/y.webp"));
        assert!(!is_displayable("https://www.youtube.com/embed/abc"));
        assert!(!is_displayable("https://apod.nasa.gov"));
        assert!(!is_displayable("https://x/y."));
        assert!(!is_displayable(""));
        assert!(!is_displayable("not a url at all"));
    }

    #[test]
    fn test_ignores_query_and_fragment() {
        assert!(is_displayable("https://x/y.jpg?size=large"));
        assert!(is_displayable("https://x/y.gif#frame"));
        assert!(!is_displayable("https://x/video?file=y.jpg"));
    }

    #[test]
    fn test_only_last_segment_counts() {
        assert!(!is_displayable("https://x/images.jpg/viewer"));
        assert!(is_displayable("relative/path/to/pic.bmp"));
    }
}
