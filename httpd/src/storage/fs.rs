use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use bytes::Bytes;

use super::{is_file_name, FileStore};

/// Stores each file directly under a base directory, named as requested.
#[derive(Clone, Debug)]
pub struct DirectoryStore {
    base: PathBuf,
}

impl DirectoryStore {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    fn path_of(&self, name: &str) -> Option<PathBuf> {
        is_file_name(name).then(|| self.base.join(name))
    }
}

async fn is_dir(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map_or(false, |meta| meta.is_dir())
}

#[async_trait::async_trait]
impl FileStore for DirectoryStore {
    async fn read(&self, name: &str) -> Result<Option<Bytes>> {
        let Some(path) = self.path_of(name) else {
            return Ok(None);
        };

        match tokio::fs::read(&path).await {
            Ok(contents) => Ok(Some(contents.into())),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            // directories exist but are not files
            Err(_) if is_dir(&path).await => Ok(None),
            Err(err) => Err(err).with_context(|| format!("failed to read {}", path.display())),
        }
    }

    async fn write(&self, name: &str, contents: &[u8]) -> Result<()> {
        let Some(path) = self.path_of(name) else {
            anyhow::bail!("refusing to write outside the base directory: {name:?}");
        };

        tokio::fs::write(&path, contents)
            .await
            .with_context(|| format!("failed to write {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("httpd-store-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[tokio::test]
    async fn missing_files_read_as_none() {
        let store = DirectoryStore::new(scratch_dir());
        assert!(store.read("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn reads_back_what_was_written() {
        let dir = scratch_dir();
        let store = DirectoryStore::new(&dir);

        store.write("orange_pear", b"\x00binary\r\n").await.unwrap();
        let contents = store.read("orange_pear").await.unwrap().unwrap();
        assert_eq!(&contents[..], b"\x00binary\r\n");
        assert_eq!(std::fs::read(dir.join("orange_pear")).unwrap(), b"\x00binary\r\n");

        std::fs::remove_dir_all(dir).unwrap();
    }

    #[tokio::test]
    async fn directories_read_as_none() {
        let dir = scratch_dir();
        std::fs::create_dir(dir.join("folder")).unwrap();
        let store = DirectoryStore::new(&dir);

        assert!(store.read("folder").await.unwrap().is_none());
        assert!(store.write("folder", b"x").await.is_err());

        std::fs::remove_dir_all(dir).unwrap();
    }

    #[tokio::test]
    async fn dot_names_never_leave_the_base() {
        let dir = scratch_dir();
        let store = DirectoryStore::new(dir.join("inner"));
        std::fs::create_dir(dir.join("inner")).unwrap();
        std::fs::write(dir.join("secret"), b"outside").unwrap();

        for name in [".", ".."] {
            assert!(store.read(name).await.unwrap().is_none());
            assert!(store.write(name, b"x").await.is_err());
        }
        assert!(store.read("../secret").await.unwrap().is_none());
        assert!(store.write("../secret", b"x").await.is_err());
        assert_eq!(std::fs::read(dir.join("secret")).unwrap(), b"outside");

        std::fs::remove_dir_all(dir).unwrap();
    }
}
