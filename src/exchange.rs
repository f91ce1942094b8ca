//! Role exchange request and the exchanger capability

pub const MIN_DURATION_SECONDS: u32 = 900;
pub const MAX_DURATION_SECONDS: u32 = 43200;
pub const DEFAULT_DURATION_SECONDS: u32 = 3600;

/// A validated AssumeRole-with-MFA request. Construct through [`ExchangeRequest::new`].
#[derive(Debug, Clone)]
pub struct ExchangeRequest {
    role_arn: String,
    mfa_serial: String,
    token_code: secrecy::SecretString,
    duration_seconds: u32,
    session_name: String,
    source_profile: String,
    region: String,
}

/// Unvalidated fields of an [`ExchangeRequest`].
#[derive(Debug, Clone, Default)]
pub struct ExchangeParams {
    pub role_arn: String,
    pub mfa_serial: String,
    pub token_code: String,
    pub duration_seconds: u32,
    pub session_name: String,
    pub source_profile: String,
    pub region: String,
}

fn require(field: &str, value: &str) -> Result<(), crate::error::Error> {
    if value.trim().is_empty() {
        return Err(crate::error::Error::ValidationError(format!(
            "{field} is required"
        )));
    }
    Ok(())
}

impl ExchangeRequest {
    pub fn new(params: ExchangeParams) -> Result<Self, crate::error::Error> {
        require("role", &params.role_arn)?;
        require("mfa", &params.mfa_serial)?;
        require("token", &params.token_code)?;
        require("session name", &params.session_name)?;
        require("profile", &params.source_profile)?;
        require("region", &params.region)?;

        if !(MIN_DURATION_SECONDS..=MAX_DURATION_SECONDS).contains(&params.duration_seconds) {
            return Err(crate::error::Error::ValidationError(format!(
                "duration must be between {MIN_DURATION_SECONDS} and {MAX_DURATION_SECONDS} seconds, got {}",
                params.duration_seconds
            )));
        }

        Ok(Self {
            role_arn: params.role_arn,
            mfa_serial: params.mfa_serial,
            token_code: secrecy::SecretString::new(params.token_code),
            duration_seconds: params.duration_seconds,
            session_name: params.session_name,
            source_profile: params.source_profile,
            region: params.region,
        })
    }

    pub fn role_arn(&self) -> &str {
        &self.role_arn
    }

    pub fn mfa_serial(&self) -> &str {
        &self.mfa_serial
    }

    pub fn token_code(&self) -> &secrecy::SecretString {
        &self.token_code
    }

    pub fn duration_seconds(&self) -> u32 {
        self.duration_seconds
    }

    pub fn session_name(&self) -> &str {
        &self.session_name
    }

    pub fn source_profile(&self) -> &str {
        &self.source_profile
    }

    pub fn region(&self) -> &str {
        &self.region
    }
}

/// Performs the trust-elevation call.
#[async_trait::async_trait]
pub trait Exchanger {
    async fn exchange(
        &self,
        request: &ExchangeRequest,
        source: &crate::credentials::SourceCredentials,
    ) -> Result<crate::credentials::TemporaryCredential, crate::error::Error>;
}

/// Backoff policy for throttled exchanges. Only [`crate::error::Error::is_retryable`] errors are
/// retried.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: std::time::Duration,
    pub max_delay: std::time::Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: std::time::Duration::from_millis(200),
            max_delay: std::time::Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Delay before attempt `attempt + 1`: base * 2^(attempt-1), capped, plus up to 50% jitter.
    fn delay(&self, attempt: u32) -> std::time::Duration {
        use rand::Rng as _;
        let exp = self
            .base_delay
            .saturating_mul(1u32 << (attempt.saturating_sub(1)).min(16))
            .min(self.max_delay);
        let jitter_ms = (exp.as_millis() as u64) / 2;
        let jitter = if jitter_ms > 0 {
            rand::thread_rng().gen_range(0..=jitter_ms)
        } else {
            0
        };
        exp + std::time::Duration::from_millis(jitter)
    }
}

/// Wraps an [`Exchanger`], retrying throttled calls with exponential backoff.
pub struct Retrying<E> {
    inner: E,
    policy: RetryPolicy,
}

impl<E> Retrying<E> {
    pub fn new(inner: E, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait::async_trait]
impl<E> Exchanger for Retrying<E>
where
    E: Exchanger + Send + Sync,
{
    async fn exchange(
        &self,
        request: &ExchangeRequest,
        source: &crate::credentials::SourceCredentials,
    ) -> Result<crate::credentials::TemporaryCredential, crate::error::Error> {
        let mut attempt = 1;
        loop {
            match self.inner.exchange(request, source).await {
                Err(e) if e.is_retryable() && attempt < self.policy.max_attempts => {
                    let delay = self.policy.delay(attempt);
                    tracing::warn!(message = "Exchange throttled, retrying", attempt, delay = ?delay, error = %e);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}
