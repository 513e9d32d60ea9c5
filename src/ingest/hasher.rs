use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use anyhow::{Context, Result};
use memmap2::MmapOptions;
use sha2::{Digest, Sha256};

const MMAP_THRESHOLD: u64 = 64 * 1024 * 1024; // 64 MB

/// Copies `src` to a new file at `dest` and returns the hex SHA-256 of the
/// copied bytes. `dest` must not exist; a partial copy is removed on failure.
pub fn copy_hashed(src: &Path, dest: &Path) -> Result<String> {
    let input = File::open(src).with_context(|| format!("Failed to open file: {:?}", src))?;
    let output = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(dest)
        .with_context(|| format!("Refusing to overwrite {:?}", dest))?;

    let copied = stream_into(input, output);
    if copied.is_err() {
        let _ = fs::remove_file(dest);
    }
    copied.with_context(|| format!("Failed to copy {:?} to {:?}", src, dest))
}

fn stream_into(input: File, output: File) -> Result<String> {
    let len = input.metadata()?.len();
    let mut writer = BufWriter::new(output);
    let mut hasher = Sha256::new();

    if len > MMAP_THRESHOLD {
        // The source directory is read-only input for the duration of a batch.
        let mmap = unsafe { MmapOptions::new().map(&input)? };
        hasher.update(&mmap[..]);
        writer.write_all(&mmap[..])?;
    } else {
        let mut reader = BufReader::new(input);
        let mut buffer = [0; 8192];
        loop {
            let count = reader.read(&mut buffer)?;
            if count == 0 {
                break;
            }
            hasher.update(&buffer[..count]);
            writer.write_all(&buffer[..count])?;
        }
    }

    writer.flush()?;
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_copy_matches_source_and_hash() -> Result<()> {
        let dir = TempDir::new()?;
        let src = dir.path().join("board.png");
        fs::write(&src, b"same bytes")?;

        let first = copy_hashed(&src, &dir.path().join("a.png"))?;
        let second = copy_hashed(&src, &dir.path().join("b.png"))?;
        assert_eq!(first, second);
        assert_eq!(fs::read(dir.path().join("a.png"))?, b"same bytes");

        let empty = dir.path().join("empty.png");
        fs::write(&empty, b"")?;
        assert_eq!(
            copy_hashed(&empty, &dir.path().join("empty_copy.png"))?,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        Ok(())
    }

    #[test]
    fn test_existing_destination_is_untouched() -> Result<()> {
        let dir = TempDir::new()?;
        let src = dir.path().join("new.png");
        let dest = dir.path().join("taken.png");
        fs::write(&src, b"new")?;
        fs::write(&dest, b"old")?;

        assert!(copy_hashed(&src, &dest).is_err());
        assert_eq!(fs::read(&dest)?, b"old");
        Ok(())
    }

    #[test]
    fn test_missing_source_leaves_no_file() -> Result<()> {
        let dir = TempDir::new()?;
        let dest = dir.path().join("out.png");
        assert!(copy_hashed(&dir.path().join("gone.png"), &dest).is_err());
        assert!(!dest.exists());
        Ok(())
    }
}
