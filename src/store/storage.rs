use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

/// Key/value blobs stored as files under one base directory.
#[derive(Clone, Debug)]
pub struct LocalFileStorage {
    base_dir: PathBuf,
}

impl LocalFileStorage {
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub async fn get(&self, key: &str) -> io::Result<Option<Vec<u8>>> {
        let path = self.resolve_path(key);
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }

    pub async fn put(&self, key: &str, data: &[u8]) -> io::Result<()> {
        let path = self.resolve_path(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(path, data).await
    }

    /// Writes `key` only if it does not exist yet. The existence check and the
    /// creation are one filesystem operation, so concurrent writers of the same
    /// key see exactly one `true`.
    pub async fn put_new(&self, key: &str, data: &[u8]) -> io::Result<bool> {
        let path = self.resolve_path(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let mut file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::AlreadyExists => return Ok(false),
            Err(err) => return Err(err),
        };
        file.write_all(data).await?;
        file.flush().await?;
        Ok(true)
    }

    pub async fn exists(&self, key: &str) -> io::Result<bool> {
        let path = self.resolve_path(key);
        match fs::metadata(path).await {
            Ok(_) => Ok(true),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Removes one key; `false` when it was already gone.
    pub async fn remove(&self, key: &str) -> io::Result<bool> {
        match fs::remove_file(self.resolve_path(key)).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err),
        }
    }

    pub async fn remove_prefix(&self, prefix: &str) -> io::Result<()> {
        match fs::remove_dir_all(self.resolve_path(prefix)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err),
        }
    }

    /// Contents of every `.json` entry directly under `prefix`, in key order.
    pub async fn list(&self, prefix: &str) -> io::Result<Vec<Vec<u8>>> {
        let mut entries = self.json_entries(prefix).await?;
        entries.sort();
        let mut blobs = Vec::with_capacity(entries.len());
        for path in entries {
            match fs::read(&path).await {
                Ok(bytes) => blobs.push(bytes),
                Err(err) if err.kind() == ErrorKind::NotFound => continue,
                Err(err) => return Err(err),
            }
        }
        Ok(blobs)
    }

    pub async fn count(&self, prefix: &str) -> io::Result<usize> {
        Ok(self.json_entries(prefix).await?.len())
    }

    async fn json_entries(&self, prefix: &str) -> io::Result<Vec<PathBuf>> {
        let dir_path = self.resolve_path(prefix);
        let mut dir = match fs::read_dir(&dir_path).await {
            Ok(dir) => dir,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err),
        };
        let mut entries = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) == Some("json") {
                entries.push(path);
            }
        }
        Ok(entries)
    }

    pub fn resolve_path(&self, key: &str) -> PathBuf {
        let normalized = key.trim_start_matches('/');
        self.base_dir.join(Path::new(normalized))
    }
}
