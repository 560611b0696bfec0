use std::process::ExitCode;

use clap::Parser;
use tracing::info;

use doctv::domain::DocError;
use doctv::logging::init_stdout_logging;
use doctv::server::{AppState, router};

#[derive(Parser, Debug)]
#[command(version, about = "In-memory document store behind a REST api.")]
struct Args {
    /// Address to listen on
    #[arg(short, long, env = "DOCTV_BIND", default_value = "127.0.0.1:5000")]
    bind: String,

    /// Collection served under `/<collection>`
    #[arg(short, long, env = "DOCTV_COLLECTION", default_value = "items")]
    collection: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    match serve(args).await {
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
    }
}

async fn serve(args: Args) -> Result<(), DocError> {
    init_stdout_logging()?;
    let app = router(AppState::new(&args.collection));
    let listener = tokio::net::TcpListener::bind(&args.bind).await?;
    info!("Serving /{} on http://{}", args.collection, listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
