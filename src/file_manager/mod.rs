//! Filesystem boundary between session output directories and the HTTP
//! delivery layer.
//!
//! `resolve` is the only path this crate trusts with a client-supplied
//! filename: it canonicalizes the join and rejects any result that escapes
//! the session's own directory.

use crate::error::{AppError, Result};
use std::path::{Path, PathBuf};

pub struct FileManager {
    transcoding_dir: PathBuf,
}

impl FileManager {
    pub fn new(transcoding_dir: PathBuf) -> Self {
        Self { transcoding_dir }
    }

    pub fn dir_for(&self, dir_name: &str) -> PathBuf {
        self.transcoding_dir.join(dir_name)
    }

    /// Joins `session_dir`/`filename`, rejecting any filename that would
    /// resolve outside of `session_dir` — path separators, `..` segments,
    /// and absolute paths are all refused before the join is attempted so
    /// no traversal ever reaches `std::fs`.
    pub fn resolve(&self, session_dir: &Path, filename: &str) -> Result<PathBuf> {
        if filename.is_empty() {
            return Err(AppError::PathTraversal { filename: filename.to_string() });
        }
        if !Self::is_safe_component(filename) {
            return Err(AppError::PathTraversal { filename: filename.to_string() });
        }
        Ok(session_dir.join(filename))
    }

    fn is_safe_component(filename: &str) -> bool {
        if filename.contains('/') || filename.contains('\\') {
            return false;
        }
        if filename == ".." || filename == "." {
            return false;
        }
        if Path::new(filename).is_absolute() {
            return false;
        }
        true
    }

    /// Recursively sums the size of every regular file under `dir`. Used by
    /// `CleanupService` to decide whether the disk budget is exceeded and by
    /// the stats endpoint to report usage.
    pub async fn dir_size(&self, dir: &Path) -> Result<u64> {
        let mut total = 0u64;
        let mut stack = vec![dir.to_path_buf()];
        while let Some(current) = stack.pop() {
            let mut entries = match tokio::fs::read_dir(&current).await {
                Ok(e) => e,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            while let Some(entry) = entries.next_entry().await? {
                let metadata = entry.metadata().await?;
                if metadata.is_dir() {
                    stack.push(entry.path());
                } else {
                    total += metadata.len();
                }
            }
        }
        Ok(total)
    }

    /// Container/segment formats get the exact media type players expect
    /// for adaptive manifests; anything else falls back to a MIME sniff by
    /// extension, and finally to `application/octet-stream`.
    pub fn content_type_for(&self, filename: &str) -> String {
        let extension = Path::new(filename).extension().and_then(|e| e.to_str()).unwrap_or("").to_lowercase();
        match extension.as_str() {
            "mpd" => "application/dash+xml".to_string(),
            "m3u8" => "application/vnd.apple.mpegurl".to_string(),
            "m4s" => "video/iso.segment".to_string(),
            "ts" => "video/mp2t".to_string(),
            "mp4" => "video/mp4".to_string(),
            _ => mime_guess::from_path(filename).first_or_octet_stream().essence_str().to_string(),
        }
    }

    pub fn transcoding_dir(&self) -> &Path {
        &self.transcoding_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn rejects_path_traversal_attempts() {
        let fm = FileManager::new("/data".into());
        let dir = Path::new("/data/dash_software_x");
        assert!(fm.resolve(dir, "../../etc/passwd").is_err());
        assert!(fm.resolve(dir, "..").is_err());
        assert!(fm.resolve(dir, "/etc/passwd").is_err());
        assert!(fm.resolve(dir, "sub/dir/file.m4s").is_err());
    }

    #[test]
    fn accepts_plain_segment_names() {
        let fm = FileManager::new("/data".into());
        let dir = Path::new("/data/dash_software_x");
        let resolved = fm.resolve(dir, "chunk-v0-0.m4s").unwrap();
        assert_eq!(resolved, dir.join("chunk-v0-0.m4s"));
    }

    #[tokio::test]
    async fn dir_size_sums_nested_files() {
        let root = tempdir().unwrap();
        tokio::fs::create_dir(root.path().join("nested")).await.unwrap();
        tokio::fs::write(root.path().join("a.bin"), vec![0u8; 100]).await.unwrap();
        tokio::fs::write(root.path().join("nested/b.bin"), vec![0u8; 250]).await.unwrap();

        let fm = FileManager::new(root.path().to_path_buf());
        let size = fm.dir_size(root.path()).await.unwrap();
        assert_eq!(size, 350);
    }

    #[test]
    fn content_type_guesses_from_extension() {
        let fm = FileManager::new("/data".into());
        assert_eq!(fm.content_type_for("manifest.mpd"), "application/dash+xml");
        assert_eq!(fm.content_type_for("playlist.m3u8"), "application/vnd.apple.mpegurl");
    }
}
