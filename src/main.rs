use clap::Parser;

/// Assume an AWS IAM role with an MFA token and save the session credentials
#[derive(clap::Parser)]
#[clap(author, version, about)]
struct Cli {
    #[clap(flatten)]
    args: mfarole::cmd::assume::AssumeArgs,
}

fn enable_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    enable_tracing();
    let cli = Cli::parse();

    if let Err(e) = mfarole::cmd::assume::run(&cli.args) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
