use std::{process::ExitCode, time::Duration};

use ddb_scan_items::{
    args::Args,
    errors::Result,
    scan::scan_and_log,
    session::{Session, SessionConfig},
    utils::{dynamodb_client, setup_sdk_config, setup_tracing},
};
use tracing::{error, info};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::try_parse_args(std::env::args_os()).unwrap_or_else(|err| {
        if let Some(usage) = Args::usage_for(&err) {
            eprintln!("{usage}");
        }
        err.exit()
    });

    let session = match SessionConfig::from_env().and_then(Session::new) {
        Ok(session) => session,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(err) = setup_tracing(&session) {
        eprintln!("{err}");
        return ExitCode::FAILURE;
    }

    // Not necessary for a long running process with a lot of data.
    session.wait_for_connection(CONNECT_TIMEOUT).await;

    let outcome = run(&args, &session).await;
    if let Err(err) = &outcome {
        error!(stage = err.stage(), "{err}");
    }

    session.shutdown(SHUTDOWN_TIMEOUT).await;

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(_) => ExitCode::FAILURE,
    }
}

async fn run(args: &Args, session: &Session) -> Result<()> {
    let config = setup_sdk_config(&args.region, args.endpoint_url.as_deref()).await?;
    let client = dynamodb_client(&config);

    let records = scan_and_log(&client, session, &args.table).await?;
    info!(table = %args.table, count = records.len(), "scan complete");

    Ok(())
}
