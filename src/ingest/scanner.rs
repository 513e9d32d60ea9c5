use std::path::{Path, PathBuf};

use anyhow::Result;
use walkdir::{DirEntry, WalkDir};

use crate::media::mimetype::has_image_extension;

/// Collects image files under `root` in path order, skipping hidden entries
/// and anything under `exclude`.
pub fn scan_images(root: &Path, exclude: Option<&Path>) -> Result<Vec<PathBuf>> {
    let walker = WalkDir::new(root).sort_by_file_name().into_iter();

    let mut images = Vec::new();
    for entry in walker.filter_entry(|e| !is_hidden(e) && !is_excluded(e, exclude)) {
        let entry = entry?;
        if entry.file_type().is_file() && has_image_extension(entry.path()) {
            images.push(entry.into_path());
        }
    }
    Ok(images)
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .map(|s| s.starts_with('.'))
            .unwrap_or(false)
}

fn is_excluded(entry: &DirEntry, exclude: Option<&Path>) -> bool {
    exclude.map_or(false, |dir| entry.path().starts_with(dir))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_scan_filters_and_sorts() -> Result<()> {
        let dir = TempDir::new()?;
        let root = dir.path();
        fs::create_dir_all(root.join("nested"))?;
        fs::create_dir_all(root.join(".cache"))?;
        fs::create_dir_all(root.join("out"))?;
        fs::write(root.join("b.png"), b"")?;
        fs::write(root.join("a.JPG"), b"")?;
        fs::write(root.join("notes.txt"), b"")?;
        fs::write(root.join("nested/c.gif"), b"")?;
        fs::write(root.join(".cache/d.png"), b"")?;
        fs::write(root.join("out/e.png"), b"")?;

        let found = scan_images(root, Some(&root.join("out")))?;
        let names: Vec<_> = found
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/"))
            .collect();
        assert_eq!(names, vec!["a.JPG", "b.png", "nested/c.gif"]);
        Ok(())
    }
}
