use jiff::civil::Date;
use log::info;
use postgres::error::SqlState;
use postgres::types::ToSql;
use postgres::{Client, NoTls};

use crate::config::DbConfig;
use crate::db::disease_sh::covid_us_daily_archive::DailyRecord;
use crate::error::EtlError;

use super::{check_integer_columns, upsert_sql, DailyStore, CREATE_TABLE, UPSERT_CHUNK_ROWS};

/// Maintenance database used to create the target database.
const MAINTENANCE_DB: &str = "postgres";

/// `to_char` keeps the text independent of the server's `DateStyle`.
const MOST_RECENT_DATE: &str =
    "SELECT to_char(MAX(report_date), 'YYYY-MM-DD') FROM covid_us_daily";

/// Placeholders of row `i` in a multi-row upsert, five parameters per row.
fn row_placeholders(i: usize) -> String {
    let p = 5 * i;
    format!(
        "(${}::text::date, ${}::int8, ${}::int8, ${}::int8, ${}::int8)",
        p + 1,
        p + 2,
        p + 3,
        p + 4,
        p + 5
    )
}

/// The daily table in a PostgreSQL database.
pub struct PgStore {
    config: DbConfig,
}

impl PgStore {
    pub fn new(config: DbConfig) -> PgStore {
        PgStore { config }
    }

    fn connect(&self, dbname: &str) -> Result<Client, EtlError> {
        postgres::Config::new()
            .host(&self.config.host)
            .port(self.config.port)
            .dbname(dbname)
            .user(&self.config.user)
            .password(&self.config.password)
            .connect(NoTls)
            .map_err(|e| EtlError::connect(&self.config, e))
    }
}

/// Quote an identifier for use in DDL, e.g. `CREATE DATABASE`.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

impl DailyStore for PgStore {
    fn describe(&self) -> String {
        format!("'{}'", self.config.name)
    }

    fn ensure_database(&self) -> Result<(), EtlError> {
        let mut client = self.connect(MAINTENANCE_DB)?;
        let rows = client.query(
            "SELECT 1 FROM pg_database WHERE datname = $1",
            &[&self.config.name],
        )?;
        if rows.is_empty() {
            info!("Database '{}' not found. Creating...", self.config.name);
            client.batch_execute(&format!("CREATE DATABASE {}", quote_ident(&self.config.name)))?;
            info!("Database '{}' created.", self.config.name);
        } else {
            info!("Database '{}' already exists.", self.config.name);
        }
        Ok(())
    }

    fn most_recent_date(&self) -> Result<Option<Date>, EtlError> {
        let mut client = self.connect(&self.config.name)?;
        match client.query_one(MOST_RECENT_DATE, &[]) {
            Ok(row) => {
                let last: Option<String> = row.get(0);
                Ok(last.map(|s| s.parse::<Date>()).transpose()?)
            }
            Err(e) if e.code() == Some(&SqlState::UNDEFINED_TABLE) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn upsert(&self, records: &[DailyRecord]) -> Result<usize, EtlError> {
        check_integer_columns(records)?;
        let mut client = self.connect(&self.config.name)?;
        let mut tx = client.transaction()?;
        tx.batch_execute(CREATE_TABLE)?;
        let mut n: u64 = 0;
        for chunk in records.chunks(UPSERT_CHUNK_ROWS) {
            let sql = upsert_sql(chunk.len(), row_placeholders);
            let dates: Vec<String> = chunk.iter().map(|r| r.report_date.to_string()).collect();
            let mut params: Vec<&(dyn ToSql + Sync)> = Vec::with_capacity(5 * chunk.len());
            for (r, d) in chunk.iter().zip(&dates) {
                params.push(d);
                params.push(&r.total_cases);
                params.push(&r.new_cases);
                params.push(&r.total_deaths);
                params.push(&r.new_deaths);
            }
            n += tx.execute(sql.as_str(), &params)?;
        }
        tx.commit()?;
        Ok(n as usize)
    }
}
