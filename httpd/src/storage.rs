pub mod fs;

use std::path::{Component, Path};

use anyhow::Result;
use bytes::Bytes;

/// Where the file routes read from and write to.
#[async_trait::async_trait]
pub trait FileStore {
    /// Returns `None` when no file with that name exists.
    async fn read(&self, name: &str) -> Result<Option<Bytes>>;
    async fn write(&self, name: &str, contents: &[u8]) -> Result<()>;
}

/// A name that stays directly inside the store: one path component, not `.` or `..`.
pub fn is_file_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}
