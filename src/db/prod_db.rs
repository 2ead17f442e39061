use reqwest::blocking::Client;

use crate::config::DbConfig;

use super::{
    disease_sh::{covid_us_daily_archive::CovidUsDailyArchive, lib_disease_sh::API_URL},
    store::{duckdb_store::DuckDbStore, pg_store::PgStore, DailyStore},
};

pub struct ProdDb {}

impl ProdDb {
    /// Writes to PostgreSQL, or to DuckDB when `DUCKDB_PATH` is set.
    pub fn covid_us_daily(config: &DbConfig) -> CovidUsDailyArchive {
        let store: Box<dyn DailyStore> = match &config.duckdb_path {
            Some(path) => Box::new(DuckDbStore::new(path.clone())),
            None => Box::new(PgStore::new(config.clone())),
        };
        CovidUsDailyArchive {
            client: Client::new(),
            url: API_URL.to_string(),
            store,
        }
    }
}
