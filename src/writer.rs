//! Upsert session credentials into the credentials file and save it atomically.

/// Set the four session credential keys of `section` in `store`, creating the section if absent.
/// Other keys and sections are untouched.
pub fn upsert(
    mut store: crate::store::CredentialStore,
    section: &str,
    cred: &crate::credentials::TemporaryCredential,
) -> crate::store::CredentialStore {
    let target = store.section_mut(section);
    for (key, value) in cred.entries() {
        target.set(key, &value);
    }
    store
}

fn wip_path_for(path: &std::path::Path) -> Result<std::path::PathBuf, crate::error::Error> {
    let name = path.file_name().ok_or_else(|| {
        crate::error::Error::ConfigError(format!(
            "credentials file path has no file name: {}",
            path.display()
        ))
    })?;
    Ok(path.with_file_name(format!(
        ".{}.wip.{}",
        name.to_string_lossy(),
        std::process::id()
    )))
}

/// Follow symlinks so the link itself survives the rename. A missing file is written as is.
async fn resolve_target(path: &std::path::Path) -> Result<std::path::PathBuf, crate::error::Error> {
    match tokio::fs::canonicalize(path).await {
        Ok(resolved) => Ok(resolved),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(path.to_owned()),
        Err(e) => Err(e.into()),
    }
}

/// Write `store` to a temporary file next to `path` (mode 0600), fsync, then rename over `path`
/// and fsync the directory. When `path` is a symlink, its target is replaced instead.
///
/// Callers that read-modify-write should hold [`crate::lock::StoreLock`] across the whole cycle;
/// see [`update`].
pub async fn persist(
    store: &crate::store::CredentialStore,
    path: &std::path::Path,
) -> Result<(), crate::error::Error> {
    use tokio::io::AsyncWriteExt;

    let content = zeroize::Zeroizing::new(store.to_string());
    let path = resolve_target(path).await?;
    let path = path.as_path();
    let wip_path = wip_path_for(path)?;

    let written: Result<(), crate::error::Error> = async {
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .mode(0o600)
            .open(&wip_path)
            .await?;
        file.write_all(content.as_bytes()).await?;
        file.sync_all().await?;
        Ok(())
    }
    .await;

    if let Err(e) = written {
        tracing::warn!(message = "Failed to write temporary credentials file", path = ?wip_path, error = %e);
        remove_file_ignoring_enoent(&wip_path).await?;
        return Err(e);
    }

    if let Err(e) = tokio::fs::rename(&wip_path, path).await {
        remove_file_ignoring_enoent(&wip_path).await?;
        return Err(e.into());
    }
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        tokio::fs::File::open(dir).await?.sync_all().await?;
    }

    tracing::debug!(message = "Saved credentials file", path = ?path);
    Ok(())
}

/// Re-read `path`, upsert `cred` into `section`, and persist, all under the store lock so that
/// concurrent runs against different sections don't lose each other's writes.
pub async fn update(
    path: &std::path::Path,
    section: &str,
    cred: &crate::credentials::TemporaryCredential,
) -> Result<crate::store::CredentialStore, crate::error::Error> {
    let lock = crate::lock::StoreLock::exclusive(path).await?;
    tracing::trace!(message = "Holding credentials file lock", lock = ?lock.path());
    let store = crate::config::load(path).await?;
    let store = upsert(store, section, cred);
    persist(&store, path).await?;
    Ok(store)
}

async fn remove_file_ignoring_enoent(path: &std::path::Path) -> std::io::Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(_) => Ok(()),
        Err(e) => match e.kind() {
            std::io::ErrorKind::NotFound => Ok(()),
            _ => Err(e),
        },
    }
}
