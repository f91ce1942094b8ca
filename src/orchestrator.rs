//! load → name → validate → exchange → upsert → persist

/// Caller-supplied inputs for one run, before validation.
#[derive(Debug, Clone)]
pub struct RunParams {
    pub role_arn: String,
    pub region: String,
    pub source_profile: String,
    pub token_code: String,
    pub mfa_serial: String,
    pub cred_name: String,
    /// Explicit session name; `None`, empty or `notset` derives one from the local username.
    pub session_name: Option<String>,
    pub duration_seconds: u32,
    pub credentials_file: std::path::PathBuf,
}

#[derive(Debug, Clone)]
pub struct Outcome {
    pub cred_name: String,
    pub session_name: String,
    pub access_key_id: String,
    pub expiration: chrono::DateTime<chrono::Utc>,
}

fn validate_cred_name(name: &str) -> Result<(), crate::error::Error> {
    if name.trim().is_empty() {
        return Err(crate::error::Error::ValidationError(
            "cred-name is required".to_string(),
        ));
    }
    if name.trim() != name {
        return Err(crate::error::Error::ValidationError(
            "cred-name cannot have leading or trailing whitespace".to_string(),
        ));
    }
    if name.contains(['[', ']', '\n', '\r']) {
        return Err(crate::error::Error::ValidationError(
            "cred-name cannot include '[', ']' or line breaks".to_string(),
        ));
    }
    Ok(())
}

/// Run one exchange. The credentials file is only written after a successful exchange.
pub async fn run<E, S>(
    params: RunParams,
    identity: &dyn crate::identity::LocalIdentity,
    source_provider: &S,
    exchanger: &E,
) -> Result<Outcome, crate::error::Error>
where
    E: crate::exchange::Exchanger + ?Sized,
    S: crate::credentials::SourceProvider + ?Sized,
{
    let path = params.credentials_file.as_path();
    let store = crate::config::load(path).await?;

    validate_cred_name(&params.cred_name)?;
    let session_name = crate::session::resolve(params.session_name.as_deref(), identity);
    let request = crate::exchange::ExchangeRequest::new(crate::exchange::ExchangeParams {
        role_arn: params.role_arn,
        mfa_serial: params.mfa_serial,
        token_code: params.token_code,
        duration_seconds: params.duration_seconds,
        session_name,
        source_profile: params.source_profile,
        region: params.region,
    })?;
    tracing::debug!(request = ?request);

    let source = source_provider.source_credentials(&store, request.source_profile())?;
    drop(store);
    if params.cred_name == request.source_profile() {
        tracing::warn!(message = "Target section is the source profile; its long-lived credentials will be replaced by session credentials", section = %params.cred_name);
    }

    tracing::info!(message = "Assuming role", role_arn = %request.role_arn(), session_name = %request.session_name(), mfa_serial = %request.mfa_serial());
    let cred = exchanger.exchange(&request, &source).await?;
    tracing::info!(message = "Obtained session credentials", access_key_id = %cred.access_key_id(), expiration = %cred.expiration_string());

    crate::writer::update(path, &params.cred_name, &cred).await?;
    tracing::info!(message = "Saved session credentials", section = %params.cred_name, path = ?path);

    Ok(Outcome {
        cred_name: params.cred_name,
        session_name: request.session_name().to_owned(),
        access_key_id: cred.access_key_id().to_owned(),
        expiration: cred.expiration(),
    })
}

#[cfg(test)]
mod test {
    use super::*;

    struct FakeExchanger {
        result: fn() -> Result<crate::credentials::TemporaryCredential, crate::error::Error>,
        seen: std::sync::Mutex<Vec<(String, String)>>,
    }

    impl FakeExchanger {
        fn new(
            result: fn() -> Result<crate::credentials::TemporaryCredential, crate::error::Error>,
        ) -> Self {
            Self {
                result,
                seen: std::sync::Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.seen.lock().unwrap().len()
        }
    }

    #[async_trait::async_trait]
    impl crate::exchange::Exchanger for FakeExchanger {
        async fn exchange(
            &self,
            request: &crate::exchange::ExchangeRequest,
            source: &crate::credentials::SourceCredentials,
        ) -> Result<crate::credentials::TemporaryCredential, crate::error::Error> {
            self.seen.lock().unwrap().push((
                request.session_name().to_owned(),
                source.access_key_id.clone(),
            ));
            (self.result)()
        }
    }

    struct FixedSource;

    impl crate::credentials::SourceProvider for FixedSource {
        fn source_credentials(
            &self,
            _store: &crate::store::CredentialStore,
            _profile: &str,
        ) -> Result<crate::credentials::SourceCredentials, crate::error::Error> {
            Ok(crate::credentials::SourceCredentials::new(
                "AKIDEXAMPLE",
                "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY",
            ))
        }
    }

    fn succeed() -> Result<crate::credentials::TemporaryCredential, crate::error::Error> {
        use chrono::TimeZone as _;
        Ok(crate::credentials::TemporaryCredential::from_parts(
            "AKIAEXAMPLETEMP".to_string(),
            "secretEXAMPLE".to_string(),
            "tokenEXAMPLE".to_string(),
            chrono::Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        ))
    }

    fn deny() -> Result<crate::credentials::TemporaryCredential, crate::error::Error> {
        Err(crate::error::Error::AuthError {
            code: "AccessDenied".to_string(),
            message: "MultiFactorAuthentication failed with invalid MFA one time pass code."
                .to_string(),
        })
    }

    fn identity() -> crate::identity::StaticIdentity {
        crate::identity::StaticIdentity {
            username: Some("CORP\\jdoe".to_string()),
            home_dir: None,
        }
    }

    fn make_params(credentials_file: std::path::PathBuf) -> RunParams {
        RunParams {
            role_arn: "arn:aws:iam::123456789012:role/admin".to_string(),
            region: "eu-central-1".to_string(),
            source_profile: "default".to_string(),
            token_code: "123456".to_string(),
            mfa_serial: "arn:aws:iam::123456789012:mfa/jdoe".to_string(),
            cred_name: "prod".to_string(),
            session_name: Some("notset".to_string()),
            duration_seconds: 3600,
            credentials_file,
        }
    }

    async fn write_store(tmpdir: &temp_dir::TempDir, content: &str) -> std::path::PathBuf {
        let path = tmpdir.path().join("credentials");
        tokio::fs::write(&path, content).await.unwrap();
        path
    }

    #[tokio::test]
    async fn test_run_success() {
        let tmpdir = temp_dir::TempDir::with_prefix("mfarole-test").unwrap();
        let path = write_store(&tmpdir, "[prod]\naws_access_key_id = X\n").await;
        let exchanger = FakeExchanger::new(succeed);

        let outcome = run(make_params(path.clone()), &identity(), &FixedSource, &exchanger)
            .await
            .unwrap();
        assert_eq!(outcome.cred_name, "prod");
        assert_eq!(outcome.session_name, "jdoeSession");
        assert_eq!(outcome.access_key_id, "AKIAEXAMPLETEMP");

        assert_eq!(
            tokio::fs::read_to_string(&path).await.unwrap(),
            indoc::indoc! {"
                [prod]
                aws_access_key_id = AKIAEXAMPLETEMP
                aws_secret_access_key = secretEXAMPLE
                aws_session_token = tokenEXAMPLE
                aws_session_expiration = 2024-01-01T00:00:00.000000000Z
            "}
        );
        assert_eq!(
            *exchanger.seen.lock().unwrap(),
            vec![("jdoeSession".to_string(), "AKIDEXAMPLE".to_string())]
        );
    }

    #[tokio::test]
    async fn test_run_preserves_unrelated() {
        let tmpdir = temp_dir::TempDir::with_prefix("mfarole-test").unwrap();
        let path = write_store(
            &tmpdir,
            indoc::indoc! {"
                [default]
                aws_access_key_id = AKIDEXAMPLE
                aws_secret_access_key = wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY

                [prod]
                region = eu-central-1
                aws_session_token = old
            "},
        )
        .await;
        let exchanger = FakeExchanger::new(succeed);
        let params = RunParams {
            session_name: Some("ci".to_string()),
            ..make_params(path.clone())
        };

        run(
            params,
            &identity(),
            &crate::credentials::SharedCredentialsFile,
            &exchanger,
        )
        .await
        .unwrap();

        let store = crate::config::load(&path).await.unwrap();
        assert_eq!(
            store.section("default").unwrap().get("aws_access_key_id"),
            Some("AKIDEXAMPLE")
        );
        let prod = store.section("prod").unwrap();
        assert_eq!(prod.get("region"), Some("eu-central-1"));
        assert_eq!(prod.get("aws_session_token"), Some("tokenEXAMPLE"));
        assert_eq!(
            *exchanger.seen.lock().unwrap(),
            vec![("ci".to_string(), "AKIDEXAMPLE".to_string())]
        );
    }

    #[tokio::test]
    async fn test_run_auth_error_leaves_file() {
        let tmpdir = temp_dir::TempDir::with_prefix("mfarole-test").unwrap();
        let original = "[prod]\naws_access_key_id   =X\n# keep me\n";
        let path = write_store(&tmpdir, original).await;
        let exchanger = FakeExchanger::new(deny);

        let e = run(make_params(path.clone()), &identity(), &FixedSource, &exchanger)
            .await
            .unwrap_err();
        assert_eq!(e.kind(), crate::error::ErrorKind::Auth);
        assert_eq!(exchanger.calls(), 1);
        assert_eq!(tokio::fs::read_to_string(&path).await.unwrap(), original);
    }

    #[tokio::test]
    async fn test_run_not_found_before_network() {
        let tmpdir = temp_dir::TempDir::with_prefix("mfarole-test").unwrap();
        let path = tmpdir.path().join("credentials");
        let exchanger = FakeExchanger::new(succeed);

        let e = run(make_params(path.clone()), &identity(), &FixedSource, &exchanger)
            .await
            .unwrap_err();
        assert_eq!(e.kind(), crate::error::ErrorKind::NotFound);
        assert_eq!(exchanger.calls(), 0);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_run_duration_rejected_before_network() {
        let tmpdir = temp_dir::TempDir::with_prefix("mfarole-test").unwrap();
        let path = write_store(&tmpdir, "[prod]\n").await;
        let exchanger = FakeExchanger::new(succeed);
        let params = RunParams {
            duration_seconds: 43201,
            ..make_params(path)
        };

        let e = run(params, &identity(), &FixedSource, &exchanger)
            .await
            .unwrap_err();
        assert_eq!(e.kind(), crate::error::ErrorKind::Validation);
        assert_eq!(exchanger.calls(), 0);
    }

    #[tokio::test]
    async fn test_run_invalid_cred_name() {
        let tmpdir = temp_dir::TempDir::with_prefix("mfarole-test").unwrap();
        let path = write_store(&tmpdir, "[prod]\n").await;
        let exchanger = FakeExchanger::new(succeed);
        for cred_name in ["", " prod", "prod ", "evil]\n[default"] {
            let params = RunParams {
                cred_name: cred_name.to_string(),
                ..make_params(path.clone())
            };
            let e = run(params, &identity(), &FixedSource, &exchanger)
                .await
                .unwrap_err();
            assert_eq!(e.kind(), crate::error::ErrorKind::Validation);
        }
        assert_eq!(exchanger.calls(), 0);
    }

    #[tokio::test]
    async fn test_run_missing_source_profile() {
        let tmpdir = temp_dir::TempDir::with_prefix("mfarole-test").unwrap();
        let path = write_store(&tmpdir, "[prod]\naws_access_key_id = X\n").await;
        let exchanger = FakeExchanger::new(succeed);

        let e = run(
            make_params(path),
            &identity(),
            &crate::credentials::SharedCredentialsFile,
            &exchanger,
        )
        .await
        .unwrap_err();
        assert_eq!(e.kind(), crate::error::ErrorKind::Config);
        assert_eq!(exchanger.calls(), 0);
    }

    #[tokio::test]
    async fn test_run_padded_cred_name_keeps_single_section() {
        let tmpdir = temp_dir::TempDir::with_prefix("mfarole-test").unwrap();
        let original = "[prod]\nregion = x\n";
        let path = write_store(&tmpdir, original).await;
        let exchanger = FakeExchanger::new(succeed);
        let params = RunParams {
            cred_name: " prod".to_string(),
            ..make_params(path.clone())
        };

        let e = run(params, &identity(), &FixedSource, &exchanger)
            .await
            .unwrap_err();
        assert_eq!(e.kind(), crate::error::ErrorKind::Validation);
        assert_eq!(exchanger.calls(), 0);
        assert_eq!(tokio::fs::read_to_string(&path).await.unwrap(), original);
    }

    #[tokio::test]
    async fn test_run_into_source_profile() {
        let tmpdir = temp_dir::TempDir::with_prefix("mfarole-test").unwrap();
        let path = write_store(
            &tmpdir,
            indoc::indoc! {"
                [default]
                aws_access_key_id = AKIDEXAMPLE
                aws_secret_access_key = wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY
            "},
        )
        .await;
        let exchanger = FakeExchanger::new(succeed);
        let params = RunParams {
            cred_name: "default".to_string(),
            ..make_params(path.clone())
        };

        run(
            params,
            &identity(),
            &crate::credentials::SharedCredentialsFile,
            &exchanger,
        )
        .await
        .unwrap();

        let store = crate::config::load(&path).await.unwrap();
        assert_eq!(store.sections().count(), 1);
        assert_eq!(
            store.section("default").unwrap().get("aws_access_key_id"),
            Some("AKIAEXAMPLETEMP")
        );
        assert_eq!(
            *exchanger.seen.lock().unwrap(),
            vec![("jdoeSession".to_string(), "AKIDEXAMPLE".to_string())]
        );
    }
}
