#[derive(Debug, Clone)]
pub struct Config {
    credentials_file: std::path::PathBuf,
}

const DEFAULT_CREDENTIALS_FILE: [&str; 2] = [".aws", "credentials"];

impl Config {
    pub fn new(
        credentials_file: Option<std::path::PathBuf>,
        identity: &dyn crate::identity::LocalIdentity,
    ) -> Result<Self, crate::error::Error> {
        let credentials_file_ = match credentials_file {
            Some(v) => v,
            None => {
                let home = identity.home_dir().ok_or_else(|| {
                    crate::error::Error::ConfigError(
                        "cannot determine home directory; use --credentials-file or $AWS_SHARED_CREDENTIALS_FILE"
                            .to_string(),
                    )
                })?;
                DEFAULT_CREDENTIALS_FILE
                    .iter()
                    .fold(home, |path, component| path.join(component))
            }
        };

        Ok(Self {
            credentials_file: credentials_file_,
        })
    }

    pub fn credentials_file(&self) -> &std::path::Path {
        &self.credentials_file
    }
}

/// Read and parse the credentials file at `path`.
pub async fn load(
    path: &std::path::Path,
) -> Result<crate::store::CredentialStore, crate::error::Error> {
    let content = match tokio::fs::read(path).await {
        Ok(v) => zeroize::Zeroizing::new(v),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(crate::error::Error::NotFoundError(path.to_owned()))
        }
        Err(e) => return Err(e.into()),
    };
    let text = std::str::from_utf8(&content).map_err(|e| crate::error::Error::ParseError {
        line: line_of_offset(&content, e.valid_up_to()),
        reason: "invalid utf-8".to_string(),
    })?;

    let store = crate::store::CredentialStore::parse(text)?;
    tracing::debug!(message = "Loaded credentials file", path = ?path, sections = store.sections().count());
    Ok(store)
}

fn line_of_offset(content: &[u8], offset: usize) -> usize {
    content[..offset].iter().filter(|b| **b == b'\n').count() + 1
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_default_path() {
        let identity = crate::identity::StaticIdentity {
            username: Some("jdoe".to_string()),
            home_dir: Some("/home/jdoe".into()),
        };
        let config = Config::new(None, &identity).unwrap();
        assert_eq!(
            config.credentials_file(),
            std::path::Path::new("/home/jdoe/.aws/credentials")
        );
    }

    #[test]
    fn test_explicit_path() {
        let identity = crate::identity::StaticIdentity::default();
        let config = Config::new(Some("/tmp/creds".into()), &identity).unwrap();
        assert_eq!(config.credentials_file(), std::path::Path::new("/tmp/creds"));
    }

    #[test]
    fn test_no_home() {
        let identity = crate::identity::StaticIdentity::default();
        let e = Config::new(None, &identity).unwrap_err();
        assert_eq!(e.kind(), crate::error::ErrorKind::Config);
    }

    #[tokio::test]
    async fn test_load_not_found() {
        let tmpdir = temp_dir::TempDir::with_prefix("mfarole-test").unwrap();
        let path = tmpdir.path().join("credentials");
        let e = load(&path).await.unwrap_err();
        assert!(matches!(e, crate::error::Error::NotFoundError(ref p) if p == &path));
    }

    #[tokio::test]
    async fn test_load() {
        let tmpdir = temp_dir::TempDir::with_prefix("mfarole-test").unwrap();
        let path = tmpdir.path().join("credentials");
        tokio::fs::write(&path, "[prod]\naws_access_key_id = X\n")
            .await
            .unwrap();
        let store = load(&path).await.unwrap();
        assert_eq!(
            store.section("prod").unwrap().get("aws_access_key_id"),
            Some("X")
        );
    }

    #[tokio::test]
    async fn test_load_malformed() {
        let tmpdir = temp_dir::TempDir::with_prefix("mfarole-test").unwrap();
        let path = tmpdir.path().join("credentials");
        tokio::fs::write(&path, "[prod\n").await.unwrap();
        let e = load(&path).await.unwrap_err();
        assert_eq!(e.kind(), crate::error::ErrorKind::Parse);
    }

    #[tokio::test]
    async fn test_load_invalid_utf8() {
        let tmpdir = temp_dir::TempDir::with_prefix("mfarole-test").unwrap();
        let path = tmpdir.path().join("credentials");
        tokio::fs::write(&path, b"[a]\nk = v\nx = \xff\n").await.unwrap();
        let e = load(&path).await.unwrap_err();
        assert!(matches!(e, crate::error::Error::ParseError { line: 3, .. }));
    }
}
