use std::fs;
use std::path::Path;

use duckdb::{params, params_from_iter, types::Value, Connection};
use jiff::civil::Date;

use crate::db::disease_sh::covid_us_daily_archive::DailyRecord;
use crate::error::EtlError;

use super::{
    check_integer_columns, upsert_sql, DailyStore, CREATE_TABLE, TABLE_NAME, UPSERT_CHUNK_ROWS,
};

/// The daily table in a DuckDB file.
#[derive(Debug, Clone)]
pub struct DuckDbStore {
    pub duckdb_path: String,
}

impl DuckDbStore {
    pub fn new(duckdb_path: impl Into<String>) -> DuckDbStore {
        DuckDbStore {
            duckdb_path: duckdb_path.into(),
        }
    }

    fn open(&self) -> Result<Connection, EtlError> {
        Ok(Connection::open(&self.duckdb_path)?)
    }
}

impl DailyStore for DuckDbStore {
    fn describe(&self) -> String {
        format!("'{}'", self.duckdb_path)
    }

    fn ensure_database(&self) -> Result<(), EtlError> {
        if let Some(dir) = Path::new(&self.duckdb_path).parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)?;
            }
        }
        Ok(())
    }

    fn most_recent_date(&self) -> Result<Option<Date>, EtlError> {
        let conn = self.open()?;
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM information_schema.tables WHERE table_name = ?;",
            params![TABLE_NAME],
            |row| row.get(0),
        )?;
        if n == 0 {
            return Ok(None);
        }
        let last: Option<String> = conn.query_row(
            "SELECT CAST(MAX(report_date) AS VARCHAR) FROM covid_us_daily;",
            [],
            |row| row.get(0),
        )?;
        Ok(last.map(|s| s.parse::<Date>()).transpose()?)
    }

    fn upsert(&self, records: &[DailyRecord]) -> Result<usize, EtlError> {
        check_integer_columns(records)?;
        let mut conn = self.open()?;
        let tx = conn.transaction()?;
        tx.execute_batch(CREATE_TABLE)?;
        let mut n = 0;
        for chunk in records.chunks(UPSERT_CHUNK_ROWS) {
            let sql = upsert_sql(chunk.len(), |_| "(CAST(? AS DATE), ?, ?, ?, ?)".to_string());
            let values: Vec<Value> = chunk
                .iter()
                .flat_map(|r| {
                    [
                        Value::Text(r.report_date.to_string()),
                        Value::BigInt(r.total_cases),
                        Value::BigInt(r.new_cases),
                        Value::BigInt(r.total_deaths),
                        Value::BigInt(r.new_deaths),
                    ]
                })
                .collect();
            n += tx.execute(&sql, params_from_iter(values.iter()))?;
        }
        tx.commit()?;
        Ok(n)
    }
}
