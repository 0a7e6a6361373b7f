use anyhow::{Context, Result};
#[cfg(test)]
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::PathBuf;

/// Durable key-value slot holder. Values are whole blobs; there is no partial update.
pub trait KvStore {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
}

fn check_quota(quota: Option<u64>, key: &str, len: usize) -> Result<()> {
    if let Some(quota) = quota {
        if len as u64 > quota {
            anyhow::bail!("storage quota exceeded for {key}: {len} bytes > {quota} bytes");
        }
    }
    Ok(())
}

/// One `<key>.json` file per key under a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
    quota_bytes: Option<u64>,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            quota_bytes: None,
        }
    }

    pub fn with_quota(mut self, quota_bytes: Option<u64>) -> Self {
        self.quota_bytes = quota_bytes;
        self
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl KvStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err).with_context(|| format!("failed to read {}", path.display())),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        check_quota(self.quota_bytes, key, value.len())?;
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create storage directory {}", self.dir.display()))?;

        // Write beside the target and rename, so readers never see half a blob.
        let path = self.path_for(key);
        let tmp = self.dir.join(format!("{key}.json.tmp"));
        fs::write(&tmp, value).with_context(|| format!("failed to write {}", tmp.display()))?;
        if let Err(err) = fs::rename(&tmp, &path) {
            let _ = fs::remove_file(&tmp);
            return Err(err)
                .with_context(|| format!("failed to move {} into place", path.display()));
        }
        Ok(())
    }
}

/// In-process slots, for tests.
#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    slots: HashMap<String, String>,
    quota_bytes: Option<u64>,
}

#[cfg(test)]
impl MemoryStore {
    pub fn with_quota(quota_bytes: u64) -> Self {
        Self {
            slots: HashMap::new(),
            quota_bytes: Some(quota_bytes),
        }
    }

    pub fn set_quota(&mut self, quota_bytes: Option<u64>) {
        self.quota_bytes = quota_bytes;
    }
}

#[cfg(test)]
impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.slots.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        check_quota(self.quota_bytes, key, value.len())?;
        self.slots.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn file_store_missing_key_is_none() {
        let dir = tempdir().expect("tempdir");
        let store = FileStore::new(dir.path());

        assert_eq!(store.get("absent").expect("get"), None);
    }

    #[test]
    fn file_store_set_then_get() {
        let dir = tempdir().expect("tempdir");
        let mut store = FileStore::new(dir.path().join("nested"));

        store.set("archive", "[1,2]").expect("set");
        store.set("archive", "[3]").expect("overwrite");

        assert_eq!(store.get("archive").expect("get"), Some("[3]".to_string()));
        assert!(!dir.path().join("nested/archive.json.tmp").exists());
    }

    #[test]
    fn file_store_quota_leaves_previous_blob() {
        let dir = tempdir().expect("tempdir");
        let mut store = FileStore::new(dir.path()).with_quota(Some(4));

        store.set("k", "[]").expect("small write");
        let err = store.set("k", "[1,2,3]").expect_err("over quota");

        assert!(err.to_string().contains("quota"));
        assert_eq!(store.get("k").expect("get"), Some("[]".to_string()));
    }

    #[test]
    fn memory_store_quota() {
        let mut store = MemoryStore::with_quota(3);
        assert!(store.set("k", "abcd").is_err());
        store.set("k", "abc").expect("fits");
        store.set_quota(None);
        store.set("k", "abcdef").expect("unbounded");
        assert_eq!(store.get("k").expect("get"), Some("abcdef".to_string()));
    }
}
