use std::path::Path;

/// Fallback for unknown or missing extensions.
pub const DEFAULT_MIME: &str = "application/octet-stream";

/// Guesses a `Content-Type` from the file extension.
///
/// # Example
///
/// ```
/// # use tierserve::http::mime::from_path;
/// # use std::path::Path;
/// assert_eq!(from_path(Path::new("/judge.html")), "text/html");
/// assert_eq!(from_path(Path::new("/blob")), "application/octet-stream");
/// ```
pub fn from_path(path: &Path) -> &'static str {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return DEFAULT_MIME;
    };

    match ext.to_ascii_lowercase().as_str() {
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "js" => "application/javascript",
        "json" => "application/json",
        "txt" => "text/plain",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "ico" => "image/x-icon",
        "svg" => "image/svg+xml",
        "mp4" => "video/mp4",
        "pdf" => "application/pdf",
        _ => DEFAULT_MIME,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_is_case_insensitive() {
        assert_eq!(from_path(Path::new("a.PNG")), "image/png");
        assert_eq!(from_path(Path::new("clip.mp4")), "video/mp4");
    }
}
