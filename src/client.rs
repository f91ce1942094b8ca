//! sts:AssumeRole API client

/// https://docs.aws.amazon.com/STS/latest/APIReference/API_AssumeRole.html
#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AssumeRoleResponse {
    assume_role_result: AssumeRoleResult,
}

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AssumeRoleResult {
    credentials: Credentials,
    assumed_role_user: Option<AssumedRoleUser>,
}

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AssumedRoleUser {
    arn: String,
}

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Credentials {
    access_key_id: String,
    secret_access_key: secrecy::SecretString,
    session_token: secrecy::SecretString,
    expiration: chrono::DateTime<chrono::Utc>,
}

/// https://docs.aws.amazon.com/STS/latest/APIReference/CommonErrors.html
#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ErrorDetail {
    code: String,
    #[serde(default)]
    message: String,
}

const SERVICE_NAME: &str = "sts";
const API_VERSION: &str = "2011-06-15";
pub const DEFAULT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

static REGION: once_cell::sync::Lazy<regex::Regex> =
    once_cell::sync::Lazy::new(|| regex::Regex::new(r"^[a-z0-9]+(-[a-z0-9]+)*$").unwrap());

const THROTTLE_CODES: &[&str] = &["Throttling", "ThrottlingException", "RequestLimitExceeded"];
const AUTH_CODES: &[&str] = &[
    "AccessDenied",
    "ExpiredToken",
    "InvalidClientTokenId",
    "SignatureDoesNotMatch",
    "UnrecognizedClientException",
];

/// Map an STS error response to an error kind. Throttling wins over auth so that it stays
/// retryable.
pub(crate) fn classify(
    status: reqwest::StatusCode,
    code: String,
    message: String,
) -> crate::error::Error {
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS || THROTTLE_CODES.contains(&code.as_str())
    {
        return crate::error::Error::ThrottleError(if message.is_empty() { code } else { message });
    }
    if status == reqwest::StatusCode::FORBIDDEN
        || status == reqwest::StatusCode::UNAUTHORIZED
        || AUTH_CODES.contains(&code.as_str())
        || code.starts_with("MultiFactorAuthentication")
    {
        return crate::error::Error::AuthError { code, message };
    }
    crate::error::Error::ApiError {
        status,
        code,
        message,
    }
}

pub struct Client {
    http_client: reqwest::Client,
    endpoint: Option<url::Url>,
}

impl Client {
    pub fn new(timeout: std::time::Duration) -> Result<Self, crate::error::Error> {
        // because sigv4 requires to switch to `:authority` header when using http2
        let http_client = reqwest::ClientBuilder::new()
            .http1_only()
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http_client,
            endpoint: None,
        })
    }

    /// Send requests to `endpoint` instead of the regional STS endpoint.
    pub fn with_endpoint(mut self, endpoint: url::Url) -> Self {
        self.endpoint = Some(endpoint);
        self
    }

    fn endpoint_for(&self, region: &str) -> Result<String, crate::error::Error> {
        if let Some(ref e) = self.endpoint {
            return Ok(e.to_string());
        }
        if !REGION.is_match(region) {
            return Err(crate::error::Error::ValidationError(format!(
                "region '{region}' is malformed"
            )));
        }
        Ok(format!("https://sts.{region}.amazonaws.com/"))
    }

    fn build_body(request: &crate::exchange::ExchangeRequest) -> String {
        use secrecy::ExposeSecret as _;
        url::form_urlencoded::Serializer::new(String::new())
            .append_pair("Action", "AssumeRole")
            .append_pair("DurationSeconds", &request.duration_seconds().to_string())
            .append_pair("RoleArn", request.role_arn())
            .append_pair("RoleSessionName", request.session_name())
            .append_pair("SerialNumber", request.mfa_serial())
            .append_pair("TokenCode", request.token_code().expose_secret())
            .append_pair("Version", API_VERSION)
            .finish()
    }

    async fn assume_role(
        &self,
        request: &crate::exchange::ExchangeRequest,
        source: &crate::credentials::SourceCredentials,
    ) -> Result<crate::credentials::TemporaryCredential, crate::error::Error> {
        let mut req = http::Request::builder()
            .uri(self.endpoint_for(request.region())?)
            .method(http::Method::POST)
            .header(
                http::header::CONTENT_TYPE,
                "application/x-www-form-urlencoded; charset=utf-8",
            )
            .body(bytes::Bytes::from(Self::build_body(request)))
            .map_err(|e| crate::error::Error::ConfigError(format!("invalid endpoint: {e}")))?;

        let auth_headers = crate::sign::calculate_signing_headers(
            &crate::sign::SignableRequest::from(&req),
            &crate::sign::SigningParams {
                region: request.region(),
                service_name: SERVICE_NAME,
                time: chrono::Utc::now(),
                credentials: source,
            },
        )?;

        for (k, v) in auth_headers.iter() {
            req.headers_mut().append(k, v.to_owned());
        }

        let resp = self
            .http_client
            .execute(reqwest::Request::try_from(req)?)
            .await?;

        let status = resp.status();
        let body = zeroize::Zeroizing::new(resp.text().await?);
        if status.is_success() {
            let parsed: AssumeRoleResponse = quick_xml::de::from_str(&body).map_err(|e| {
                crate::error::Error::ApiError {
                    status,
                    code: "MalformedResponse".to_string(),
                    message: e.to_string(),
                }
            })?;
            let result = parsed.assume_role_result;
            tracing::debug!(message = "AssumeRole succeeded", assumed_role_user_arn = ?result.assumed_role_user.as_ref().map(|u| &u.arn));
            Ok(crate::credentials::TemporaryCredential {
                access_key_id: result.credentials.access_key_id,
                secret_access_key: result.credentials.secret_access_key,
                session_token: result.credentials.session_token,
                expiration: result.credentials.expiration,
            })
        } else {
            match quick_xml::de::from_str::<ErrorResponse>(&body) {
                Ok(e) => Err(classify(status, e.error.code, e.error.message)),
                Err(_) => Err(classify(status, String::new(), body.to_string())),
            }
        }
    }
}

#[async_trait::async_trait]
impl crate::exchange::Exchanger for Client {
    async fn exchange(
        &self,
        request: &crate::exchange::ExchangeRequest,
        source: &crate::credentials::SourceCredentials,
    ) -> Result<crate::credentials::TemporaryCredential, crate::error::Error> {
        use tracing::Instrument;
        let span = tracing::debug_span!("assume_role", role_arn = %request.role_arn(), region = %request.region());
        async {
            tracing::debug!(message = "Calling sts:AssumeRole", session_name = %request.session_name(), duration_seconds = request.duration_seconds(), source_access_key_id = %source.access_key_id);
            self.assume_role(request, source).await
        }
        .instrument(span)
        .await
    }
}
