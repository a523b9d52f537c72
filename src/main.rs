use clap::Parser;
use timesheet_sync::Cli;

#[tokio::main]
async fn main() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .try_init();

    if let Err(error) = timesheet_sync::run(Cli::parse()).await {
        eprintln!("{error}");
        std::process::exit(1);
    }
}
