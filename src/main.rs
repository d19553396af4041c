use clap::Parser;
use trialflow::cli;

#[tokio::main]
async fn main() -> trialflow::Result<()> {
    let args = cli::Args::parse();
    trialflow::logging::init()?;
    cli::run(args).await
}
