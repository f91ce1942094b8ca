/// Token value meaning "ask on the terminal"
const PROMPT_TOKEN: &str = "000000";

#[derive(clap::Args, Debug)]
pub struct AssumeArgs {
    /// ARN of the IAM role to assume
    #[clap(long = "role")]
    role_arn: String,
    /// AWS Region of the STS endpoint
    #[clap(long, default_value = "eu-central-1")]
    region: String,
    /// Profile in the credentials file holding the long-lived credentials used to sign the request
    #[clap(long = "profile", default_value = "default")]
    source_profile: String,
    /// MFA token code
    ///
    /// When left at 000000, the code is asked for on the terminal.
    #[clap(long = "token", default_value = PROMPT_TOKEN)]
    token_code: String,
    /// Serial number or ARN of the MFA device
    #[clap(long = "mfa")]
    mfa_serial: String,
    /// Credentials file section to write the session credentials to
    #[clap(long)]
    cred_name: String,
    /// Role session name
    ///
    /// Defaults to `<local username>Session`.
    #[clap(long, default_value = crate::session::UNSET)]
    session_name: String,
    /// Session duration in seconds (900-43200)
    #[clap(long = "duration", default_value_t = crate::exchange::DEFAULT_DURATION_SECONDS)]
    duration_seconds: u32,
    /// Path to the shared credentials file
    ///
    /// Defaults to ~/.aws/credentials.
    #[clap(long, env = "AWS_SHARED_CREDENTIALS_FILE")]
    credentials_file: Option<std::path::PathBuf>,
    /// Timeout of the STS call in seconds
    #[clap(long, default_value_t = crate::client::DEFAULT_TIMEOUT.as_secs())]
    timeout: u64,
}

async fn prompt_token() -> Result<zeroize::Zeroizing<String>, anyhow::Error> {
    use tokio::io::AsyncBufReadExt as _;
    use tokio::io::AsyncWriteExt as _;

    let mut stderr = tokio::io::stderr();
    stderr.write_all(b"please provide mfa token: ").await?;
    stderr.flush().await?;

    let mut line = zeroize::Zeroizing::new(String::new());
    let n = tokio::io::BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await?;
    if n == 0 {
        anyhow::bail!("no MFA token given on stdin");
    }
    Ok(zeroize::Zeroizing::new(line.trim().to_owned()))
}

#[tokio::main(flavor = "current_thread")]
pub async fn run(args: &AssumeArgs) -> Result<(), anyhow::Error> {
    use tracing::Instrument as _;

    let span = tracing::info_span!("assume", cred_name = %args.cred_name);
    async {
        let identity = crate::identity::SystemIdentity;
        let config = crate::config::Config::new(args.credentials_file.clone(), &identity)?;
        tracing::debug!(config = ?config);

        let token_code = if args.token_code == PROMPT_TOKEN {
            prompt_token().await?
        } else {
            zeroize::Zeroizing::new(args.token_code.clone())
        };

        let client = crate::client::Client::new(std::time::Duration::from_secs(args.timeout))?;
        let exchanger =
            crate::exchange::Retrying::new(client, crate::exchange::RetryPolicy::default());

        let outcome = crate::orchestrator::run(
            crate::orchestrator::RunParams {
                role_arn: args.role_arn.clone(),
                region: args.region.clone(),
                source_profile: args.source_profile.clone(),
                token_code: token_code.to_string(),
                mfa_serial: args.mfa_serial.clone(),
                cred_name: args.cred_name.clone(),
                session_name: Some(args.session_name.clone()),
                duration_seconds: args.duration_seconds,
                credentials_file: config.credentials_file().to_owned(),
            },
            &identity,
            &crate::credentials::SharedCredentialsFile,
            &exchanger,
        )
        .await?;

        println!(
            "Credentials for [{}] (session {}) valid until {}",
            outcome.cred_name,
            outcome.session_name,
            outcome
                .expiration
                .to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
        );
        Ok(())
    }
    .instrument(span)
    .await
}
