//! Long-lived source credentials and short-lived session credentials

pub const KEY_ACCESS_KEY_ID: &str = "aws_access_key_id";
pub const KEY_SECRET_ACCESS_KEY: &str = "aws_secret_access_key";
pub const KEY_SESSION_TOKEN: &str = "aws_session_token";
pub const KEY_SESSION_EXPIRATION: &str = "aws_session_expiration";

/// Credentials of the profile used to sign the AssumeRole call.
#[derive(Debug, Clone)]
pub struct SourceCredentials {
    pub access_key_id: String,
    pub secret_access_key: secrecy::SecretString,
    pub session_token: Option<secrecy::SecretString>,
}

impl SourceCredentials {
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secrecy::SecretString::new(secret_access_key.into()),
            session_token: None,
        }
    }

    /// Read `profile` from a loaded credentials file.
    pub fn from_store(
        store: &crate::store::CredentialStore,
        profile: &str,
    ) -> Result<Self, crate::error::Error> {
        let section = store.section(profile).ok_or_else(|| {
            crate::error::Error::ConfigError(format!(
                "profile '{profile}' not found in credentials file"
            ))
        })?;
        let required = |key: &str| {
            section
                .get(key)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| {
                    crate::error::Error::ConfigError(format!(
                        "profile '{profile}' is missing {key}"
                    ))
                })
        };

        Ok(Self {
            access_key_id: required(KEY_ACCESS_KEY_ID)?.to_owned(),
            secret_access_key: secrecy::SecretString::new(
                required(KEY_SECRET_ACCESS_KEY)?.to_owned(),
            ),
            session_token: section
                .get(KEY_SESSION_TOKEN)
                .filter(|v| !v.is_empty())
                .map(|v| secrecy::SecretString::new(v.to_owned())),
        })
    }
}

/// Resolves the long-lived credentials for a source profile.
pub trait SourceProvider {
    fn source_credentials(
        &self,
        store: &crate::store::CredentialStore,
        profile: &str,
    ) -> Result<SourceCredentials, crate::error::Error>;
}

/// Reads the source profile from the same shared credentials file that is being updated.
#[derive(Debug, Clone, Copy, Default)]
pub struct SharedCredentialsFile;

impl SourceProvider for SharedCredentialsFile {
    fn source_credentials(
        &self,
        store: &crate::store::CredentialStore,
        profile: &str,
    ) -> Result<SourceCredentials, crate::error::Error> {
        SourceCredentials::from_store(store, profile)
    }
}

/// Short-lived credentials returned by a role exchange.
#[derive(Debug, Clone)]
pub struct TemporaryCredential {
    pub(crate) access_key_id: String,
    pub(crate) secret_access_key: secrecy::SecretString,
    pub(crate) session_token: secrecy::SecretString,
    pub(crate) expiration: chrono::DateTime<chrono::Utc>,
}

impl TemporaryCredential {
    /// For [`crate::exchange::Exchanger`] implementations outside this crate.
    pub fn from_parts(
        access_key_id: String,
        secret_access_key: String,
        session_token: String,
        expiration: chrono::DateTime<chrono::Utc>,
    ) -> Self {
        Self {
            access_key_id,
            secret_access_key: secrecy::SecretString::new(secret_access_key),
            session_token: secrecy::SecretString::new(session_token),
            expiration,
        }
    }

    pub fn access_key_id(&self) -> &str {
        &self.access_key_id
    }

    pub fn expiration(&self) -> chrono::DateTime<chrono::Utc> {
        self.expiration
    }

    /// Expiration as written to the credentials file: RFC 3339 with nanoseconds.
    pub fn expiration_string(&self) -> String {
        self.expiration
            .to_rfc3339_opts(chrono::SecondsFormat::Nanos, true)
    }

    /// The four credentials file entries, in write order.
    pub(crate) fn entries(&self) -> [(&'static str, String); 4] {
        use secrecy::ExposeSecret;
        [
            (KEY_ACCESS_KEY_ID, self.access_key_id.clone()),
            (
                KEY_SECRET_ACCESS_KEY,
                self.secret_access_key.expose_secret().clone(),
            ),
            (KEY_SESSION_TOKEN, self.session_token.expose_secret().clone()),
            (KEY_SESSION_EXPIRATION, self.expiration_string()),
        ]
    }
}
