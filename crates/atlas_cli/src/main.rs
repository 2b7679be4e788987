//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `atlas_core` linkage against a real SQLite gateway.
//! - Print a deterministic summary of the persisted hierarchy.
//!
//! Usage: `atlas_cli [DB_PATH]`. Without a path an in-memory database is used.
//! Set `ATLAS_LOG_DIR` to an absolute directory to enable file logging.

use atlas_core::db::{open_db, open_db_in_memory};
use atlas_core::{default_log_level, init_logging, LocationService, SqliteLocationGateway};
use log::info;
use std::process::ExitCode;

const LOG_DIR_ENV: &str = "ATLAS_LOG_DIR";

fn main() -> ExitCode {
    println!("atlas_core ping={}", atlas_core::ping());
    println!("atlas_core version={}", atlas_core::core_version());

    if let Ok(log_dir) = std::env::var(LOG_DIR_ENV) {
        if let Err(err) = init_logging(default_log_level(), &log_dir) {
            eprintln!("atlas_cli logging disabled: {err}");
        }
    }

    match run(std::env::args().nth(1)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("atlas_cli error={message}");
            ExitCode::FAILURE
        }
    }
}

fn run(db_path: Option<String>) -> Result<(), String> {
    let conn = match db_path.as_deref() {
        Some(path) => open_db(path),
        None => open_db_in_memory(),
    }
    .map_err(|err| err.to_string())?;

    let gateway = SqliteLocationGateway::try_new(&conn).map_err(|err| err.to_string())?;
    let service = LocationService::load(gateway).map_err(|err| err.to_string())?;

    let countries = service.countries();
    info!(
        "event=cli_summary module=cli status=ok countries={}",
        countries.len()
    );
    let cities: usize = countries.iter().map(|country| country.cities.len()).sum();
    let delegations: usize = countries
        .iter()
        .flat_map(|country| country.cities.iter())
        .map(|city| city.delegations.len())
        .sum();
    println!(
        "atlas_core countries={} cities={} delegations={}",
        countries.len(),
        cities,
        delegations
    );
    for country in &countries {
        println!("{}", country.name);
        for city in &country.cities {
            println!("  {}", city.name);
            for delegation in &city.delegations {
                println!("    {}", delegation.name);
            }
        }
    }
    Ok(())
}
