//! Advisory flock(2) on a sidecar `<credentials file>.lock`, serializing writers across processes.

/// An exclusive lock on a credentials file. Released on drop (closing the file releases flock).
#[derive(Debug)]
pub struct StoreLock {
    _file: std::fs::File,
    path: std::path::PathBuf,
}

pub fn lock_path_for(path: &std::path::Path) -> std::path::PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".lock");
    path.with_file_name(name)
}

fn open(lock_path: &std::path::Path) -> Result<std::fs::File, crate::error::Error> {
    use std::os::unix::fs::OpenOptionsExt as _;
    Ok(std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .mode(0o600)
        .open(lock_path)?)
}

impl StoreLock {
    /// Acquire an exclusive lock for `path`, blocking until available.
    pub async fn exclusive(path: &std::path::Path) -> Result<Self, crate::error::Error> {
        let lock_path = lock_path_for(path);
        tokio::task::spawn_blocking(move || -> Result<Self, crate::error::Error> {
            use fs2::FileExt as _;
            let file = open(&lock_path)?;
            file.lock_exclusive()?;
            tracing::trace!(message = "Acquired lock", path = ?lock_path);
            Ok(Self {
                _file: file,
                path: lock_path,
            })
        })
        .await
        .map_err(|e| crate::error::Error::IoError(std::io::Error::new(std::io::ErrorKind::Other, e)))?
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_lock_path_for() {
        assert_eq!(
            lock_path_for(std::path::Path::new("/home/jdoe/.aws/credentials")),
            std::path::PathBuf::from("/home/jdoe/.aws/credentials.lock")
        );
    }

    #[tokio::test]
    async fn test_exclusive_lock_acquired() {
        let tmpdir = temp_dir::TempDir::with_prefix("mfarole-test").unwrap();
        let path = tmpdir.path().join("credentials");
        let lock = StoreLock::exclusive(&path).await.unwrap();
        assert!(lock.path().exists());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_exclusive_waits_for_holder() {
        let tmpdir = temp_dir::TempDir::with_prefix("mfarole-test").unwrap();
        let path = tmpdir.path().join("credentials");
        let held = StoreLock::exclusive(&path).await.unwrap();

        let waiting = tokio::spawn({
            let path = path.clone();
            async move { StoreLock::exclusive(&path).await.map(|_| ()) }
        });
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        assert!(!waiting.is_finished());

        drop(held);
        tokio::time::timeout(std::time::Duration::from_secs(5), waiting)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_lock_released_on_drop() {
        let tmpdir = temp_dir::TempDir::with_prefix("mfarole-test").unwrap();
        let path = tmpdir.path().join("credentials");
        {
            let _lock = StoreLock::exclusive(&path).await.unwrap();
        }
        tokio::time::timeout(
            std::time::Duration::from_secs(5),
            StoreLock::exclusive(&path),
        )
        .await
        .unwrap()
        .unwrap();
    }
}
