use std::process;

use clap::Parser;
use covid_etl::{config::DbConfig, db::prod_db::ProdDb, error::EtlError, etl};
use log::{error, info, warn};

/// Load the daily USA COVID-19 counts from disease.sh into the
/// covid_us_daily table.  Connection settings come from the environment
/// (DB_HOST, DB_PORT, DB_NAME, DB_USER, DB_PASSWORD or DUCKDB_PATH), or a
/// .env file in the working directory.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {}

fn try_main() -> Result<(), EtlError> {
    let config = DbConfig::from_env().inspect_err(|e| error!("{}", e))?;
    let archive = ProdDb::covid_us_daily(&config);
    archive
        .setup()
        .inspect_err(|e| error!("Error during database initialization: {}", e))?;
    // logs its own failure
    let summary = etl::run(&archive)?;
    info!(
        "{} days downloaded, {} rows written",
        summary.fetched_days, summary.loaded_rows
    );
    Ok(())
}

/// Run this job every day at 8AM
fn main() {
    let _args = Args::parse();

    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .init();

    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            warn!("Ignoring .env file: {}", e);
        }
    }

    if try_main().is_err() {
        process::exit(1);
    }
}
