use clap::Parser;
use deposit_monitor::app::{build_processor, connect_provider, process_hashes};
use deposit_monitor::blockchain::EthersChainClient;
use deposit_monitor::config::AppConfig;
use deposit_monitor::database::SqliteDepositStore;
use deposit_monitor::error::MonitorError;
use deposit_monitor::logging::init_logging;
use prometheus::Registry;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "deposit-tester")]
#[command(about = "Run the deposit pipeline once for specific transaction hashes")]
#[command(version = "0.1.0")]
struct Args {
    /// Transaction hashes to process
    #[arg(required_unless_present = "sample_config")]
    hashes: Vec<String>,

    /// Store collection for the processed records
    #[arg(long, default_value = "test deposits")]
    collection: String,

    /// Print a sample configuration file and exit
    #[arg(long)]
    sample_config: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    if args.sample_config {
        return match AppConfig::generate_sample_config() {
            Ok(sample) => {
                println!("{}", sample);
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Failed to generate sample configuration: {}", e);
                ExitCode::FAILURE
            }
        };
    }

    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = init_logging(&config.logging) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    println!("Testing with specific transaction hashes...");
    match run(&config, &args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error during transaction processing: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(config: &AppConfig, args: &Args) -> Result<(), MonitorError> {
    let store = Arc::new(SqliteDepositStore::new(&config.store.path)?);
    let provider = connect_provider(&config.chain.ws_url).await?;

    let processor = build_processor(
        config,
        Arc::new(EthersChainClient::new(provider)),
        store.clone(),
        &args.collection,
        &Registry::new(),
    )?;

    for (hash, outcome) in process_hashes(&processor, store.as_ref(), &args.hashes).await? {
        println!("{}: {}", hash, outcome);
    }
    println!("All transactions processed.");

    Ok(())
}
