/*
 * This source code is a modified version of aws-sigv4 crate, reduced to the AWS4-HMAC-SHA256
 * header signing needed for STS query API calls. Query string signing and presigning are omitted.
 *
 * https://github.com/awslabs/aws-sdk-rust/blob/main/sdk/aws-sigv4
 *
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! AWS4-HMAC-SHA256 signer

pub const AWS4_HMAC_SHA256: &str = "AWS4-HMAC-SHA256";

pub mod header {
    pub const X_AMZ_DATE: &str = "x-amz-date";
    pub const X_AMZ_SECURITY_TOKEN: &str = "x-amz-security-token";
}

#[derive(Debug)]
pub struct SigningParams<'a> {
    pub region: &'a str,
    pub service_name: &'a str,
    pub time: chrono::DateTime<chrono::Utc>,

    pub credentials: &'a crate::credentials::SourceCredentials,
}

#[derive(Debug)]
pub struct SignableRequest<'a> {
    pub method: &'a reqwest::Method,
    pub uri: &'a http::Uri,
    pub headers: &'a reqwest::header::HeaderMap,
    pub body: &'a [u8],
}

impl<'a, B> From<&'a http::Request<B>> for SignableRequest<'a>
where
    B: 'a,
    B: AsRef<[u8]>,
{
    fn from(request: &'a http::Request<B>) -> SignableRequest<'a> {
        SignableRequest {
            method: request.method(),
            uri: request.uri(),
            headers: request.headers(),
            body: request.body().as_ref(),
        }
    }
}

/// `<date>/<region>/<service>/aws4_request`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SigningScope<'a> {
    pub time: chrono::DateTime<chrono::Utc>,
    pub region: &'a str,
    pub service: &'a str,
}

impl std::fmt::Display for SigningScope<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let date = self.time.format("%Y%m%d");
        write!(f, "{date}/{}/{}/aws4_request", self.region, self.service)
    }
}

#[derive(Debug)]
pub struct StringToSign<'a> {
    pub scope: SigningScope<'a>,
    pub hashed_creq: &'a str,
}

impl std::fmt::Display for StringToSign<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let timestamp = self.scope.time.format("%Y%m%dT%H%M%SZ");
        write!(
            f,
            "{AWS4_HMAC_SHA256}\n{timestamp}\n{}\n{}",
            self.scope, self.hashed_creq
        )
    }
}

/// Canonical form of a request. Header names are lowercase and sorted; values are trimmed with
/// inner runs of spaces collapsed, and repeated headers are joined with `,`.
pub struct CanonicalRequest<'a> {
    pub method: &'a reqwest::Method,
    pub path: &'a str,
    pub headers: std::collections::BTreeMap<String, String>,
    pub payload_hash: String,
    pub date_time: String,
    pub security_token: Option<reqwest::header::HeaderValue>,
}

impl<'a> CanonicalRequest<'a> {
    pub fn from<'b>(
        req: &'b SignableRequest<'b>,
        params: &'b SigningParams<'b>,
    ) -> Result<CanonicalRequest<'b>, crate::error::Error> {
        use secrecy::ExposeSecret as _;

        if req.uri.query().map_or(false, |q| !q.is_empty()) {
            return Err(crate::error::Error::ConfigError(
                "signing requests with a query string is not supported".to_string(),
            ));
        }

        let date_time = params.time.format("%Y%m%dT%H%M%SZ").to_string();
        let security_token = params
            .credentials
            .session_token
            .as_ref()
            .map(|token| {
                reqwest::header::HeaderValue::try_from(token.expose_secret().as_str())
                    .map(|mut v| {
                        v.set_sensitive(true);
                        v
                    })
                    .map_err(|_| {
                        crate::error::Error::ConfigError(
                            "aws_session_token contains invalid characters".to_string(),
                        )
                    })
            })
            .transpose()?;

        let mut headers = std::collections::BTreeMap::<String, String>::new();
        for (name, value) in req.headers.iter() {
            let value = value.to_str().map_err(|_| {
                crate::error::Error::ConfigError(format!(
                    "header {name} is not valid for signing"
                ))
            })?;
            let value = trim_all(value);
            headers
                .entry(name.as_str().to_owned())
                .and_modify(|v| {
                    v.push(',');
                    v.push_str(&value);
                })
                .or_insert_with(|| value.into_owned());
        }
        if !headers.contains_key(reqwest::header::HOST.as_str()) {
            let authority = req.uri.authority().ok_or_else(|| {
                crate::error::Error::ConfigError(
                    "request uri authority must be set for signing".to_string(),
                )
            })?;
            headers.insert(
                reqwest::header::HOST.as_str().to_owned(),
                authority.as_str().to_owned(),
            );
        }
        headers.insert(header::X_AMZ_DATE.to_owned(), date_time.clone());
        if let Some(ref token) = params.credentials.session_token {
            headers.insert(
                header::X_AMZ_SECURITY_TOKEN.to_owned(),
                token.expose_secret().to_owned(),
            );
        }

        Ok(CanonicalRequest {
            method: req.method,
            path: req.uri.path(),
            headers,
            payload_hash: sha256_hex_string(req.body),
            date_time,
            security_token,
        })
    }

    pub fn signed_headers(&self) -> String {
        self.headers
            .keys()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(";")
    }
}

impl<'a> std::fmt::Display for CanonicalRequest<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}", self.method)?;
        writeln!(f, "{}", self.path)?;
        // empty canonical query string
        writeln!(f)?;
        for (name, value) in &self.headers {
            writeln!(f, "{name}:{value}")?;
        }
        writeln!(f)?;
        writeln!(f, "{}", self.signed_headers())?;
        write!(f, "{}", self.payload_hash)
    }
}

static MULTIPLE_SPACES: once_cell::sync::Lazy<regex::Regex> =
    once_cell::sync::Lazy::new(|| regex::Regex::new(r" {2,}").unwrap());

fn trim_all(value: &str) -> std::borrow::Cow<'_, str> {
    MULTIPLE_SPACES.replace_all(value.trim_matches(' '), " ")
}

fn sha256_hex_string(data: &[u8]) -> String {
    use sha2::Digest as _;
    base16ct::lower::encode_string(&sha2::Sha256::digest(data))
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> zeroize::Zeroizing<Vec<u8>> {
    use hmac::Mac as _;
    let mut mac =
        hmac::Hmac::<sha2::Sha256>::new_from_slice(key).expect("HMAC accepts keys of any length");
    mac.update(data);
    zeroize::Zeroizing::new(mac.finalize().into_bytes().to_vec())
}

/// kSigning = HMAC(HMAC(HMAC(HMAC("AWS4" + secret, date), region), service), "aws4_request")
fn signing_key(
    secret_access_key: &secrecy::SecretString,
    scope: &SigningScope<'_>,
) -> zeroize::Zeroizing<Vec<u8>> {
    use secrecy::ExposeSecret as _;
    let secret = zeroize::Zeroizing::new(format!("AWS4{}", secret_access_key.expose_secret()));
    let date = scope.time.format("%Y%m%d").to_string();

    let k_date = hmac_sha256(secret.as_bytes(), date.as_bytes());
    let k_region = hmac_sha256(&k_date, scope.region.as_bytes());
    let k_service = hmac_sha256(&k_region, scope.service.as_bytes());
    hmac_sha256(&k_service, b"aws4_request")
}

/// Headers to add to `request` so that it is accepted as signed by `params.credentials`.
pub fn calculate_signing_headers(
    request: &SignableRequest<'_>,
    params: &SigningParams<'_>,
) -> Result<reqwest::header::HeaderMap, crate::error::Error> {
    let creq = CanonicalRequest::from(request, params)?;
    let signed_headers = creq.signed_headers();
    tracing::trace!(method = %creq.method, path = creq.path, signed_headers = %signed_headers);

    let hashed_creq = sha256_hex_string(creq.to_string().as_bytes());
    let sts = StringToSign {
        scope: SigningScope {
            time: params.time,
            region: params.region,
            service: params.service_name,
        },
        hashed_creq: &hashed_creq,
    };
    let key = signing_key(&params.credentials.secret_access_key, &sts.scope);
    let signature = base16ct::lower::encode_string(&hmac_sha256(&key, sts.to_string().as_bytes()));

    let mut authorization = reqwest::header::HeaderValue::try_from(format!(
        "{AWS4_HMAC_SHA256} Credential={}/{}, SignedHeaders={signed_headers}, Signature={signature}",
        params.credentials.access_key_id, sts.scope,
    ))
    .map_err(|_| {
        crate::error::Error::ConfigError(
            "aws_access_key_id contains invalid characters".to_string(),
        )
    })?;
    authorization.set_sensitive(true);

    let mut headers = reqwest::header::HeaderMap::new();
    headers.insert(
        header::X_AMZ_DATE,
        reqwest::header::HeaderValue::try_from(creq.date_time.as_str())
            .expect("formatted date is a valid header value"),
    );
    if let Some(token) = creq.security_token {
        headers.insert(header::X_AMZ_SECURITY_TOKEN, token);
    }
    headers.insert(reqwest::header::AUTHORIZATION, authorization);
    Ok(headers)
}
