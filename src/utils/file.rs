use log::debug;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::fs;

/// Reads a whole file, `None` when it does not exist yet.
pub async fn read_if_exists(path: &Path) -> io::Result<Option<String>> {
    let start = Instant::now();
    let result = match fs::read_to_string(path).await {
        Ok(contents) => Ok(Some(contents)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    };
    debug!("read_if_exists({}) took: {} ms", path.display(), start.elapsed().as_millis());
    result
}

/// Replaces `path` with `contents` through a sibling temp file and a rename,
/// so readers never see a half written document.
pub async fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    let start = Instant::now();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }
    let tmp = temp_path(path);
    fs::write(&tmp, contents).await?;
    fs::rename(&tmp, path).await?;
    debug!("write_atomic({}) took: {} ms", path.display(), start.elapsed().as_millis());
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

pub fn read_secret(path: &Path) -> io::Result<String> {
    let contents = std::fs::read_to_string(path)?;
    Ok(contents.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_missing_file_reads_as_none() {
        let dir = tempdir().unwrap();
        let contents = read_if_exists(&dir.path().join("nothing.json")).await.unwrap();
        assert!(contents.is_none());
    }

    #[tokio::test]
    async fn test_write_atomic_creates_and_replaces() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state").join("alarms.json");

        write_atomic(&path, b"first").await.unwrap();
        write_atomic(&path, b"second").await.unwrap();

        let contents = read_if_exists(&path).await.unwrap();
        assert_eq!(contents.as_deref(), Some("second"));
        assert!(!temp_path(&path).exists());
    }

    #[test]
    fn test_read_secret_trims() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("secret");
        std::fs::write(&path, "  key-123\n").unwrap();
        assert_eq!(read_secret(&path).unwrap(), "key-123");
    }
}
