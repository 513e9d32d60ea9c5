use std::path::Path;

use anyhow::{Context, Result};

pub const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "gif", "bmp", "tiff"];

/// Sniffs the MIME type from magic bytes, not the extension.
pub fn detect_mimetype(path: &Path) -> Result<String> {
    let kind = infer::get_from_path(path)
        .with_context(|| format!("Failed to read {:?} for mimetype detection", path))?;

    Ok(kind
        .map(|k| k.mime_type().to_string())
        .unwrap_or_else(|| "application/octet-stream".to_string()))
}

pub fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.iter().any(|known| known.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_mimetype_detection() {
        let dir = TempDir::new().unwrap();
        let png = dir.path().join("renamed.dat");
        image::RgbImage::new(4, 4)
            .save_with_format(&png, image::ImageFormat::Png)
            .unwrap();
        assert_eq!(detect_mimetype(&png).unwrap(), "image/png");

        let text = dir.path().join("notes.txt");
        fs::write(&text, "").unwrap();
        assert_eq!(detect_mimetype(&text).unwrap(), "application/octet-stream");

        assert!(detect_mimetype(&dir.path().join("missing.png")).is_err());
    }

    #[test]
    fn test_image_extensions() {
        assert!(has_image_extension(Path::new("a/b/board.JPG")));
        assert!(has_image_extension(Path::new("scan.tiff")));
        assert!(!has_image_extension(Path::new("notes.txt")));
        assert!(!has_image_extension(Path::new("README")));
    }
}
