use std::ffi::OsString;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod args;
mod aws_sso;
mod config;
mod error;
mod executor;
mod filter;
mod help;
mod output;
mod process;

use args::{Arguments, Command};
use aws_sso::{SsoProvider, SsoSession};
use config::Config;
use error::Result;
use executor::Executor;
use filter::{apply_filters, FilterOp};

fn init_tracing() {
    let filter =
        EnvFilter::try_from_env("SSOREPEAT_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    // stdout carries the JSON output
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

async fn run(argv: Vec<OsString>) -> Result<()> {
    let args = Arguments::parse(argv)?;
    if args.show_help {
        println!("{}", help::DOCUMENTATION);
        return Ok(());
    }
    let filters = FilterOp::parse_all(&args.filters)?;

    let config = Config::load_from_env()?;
    let session = SsoSession::open(&config, args.profile.as_deref()).await?;
    let accounts = session.list_accounts().await?;
    let associations = apply_filters(&filters, &accounts, session.default_role_name());

    let mut executor = Executor::new(&session);
    let stdout = std::io::stdout();
    match &args.command {
        Command::List => executor.list_associations(&associations, stdout).await?,
        Command::Creds => executor.fetch_credentials(&associations, stdout).await?,
        Command::Exec(program) => {
            executor
                .run_sequence(program, &associations, stdout)
                .await?
        }
    };
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    match run(std::env::args_os().collect()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{}", err);
            if err.is_usage_error() {
                eprintln!("{}", help::USAGE);
            }
            if let Some(hint) = err.hint() {
                eprintln!("{}", hint);
            }
            ExitCode::from(err.exit_code())
        }
    }
}
