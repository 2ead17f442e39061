pub mod duckdb_store;
pub mod pg_store;

use itertools::Itertools;
use jiff::civil::Date;

use crate::db::disease_sh::covid_us_daily_archive::DailyRecord;
use crate::error::EtlError;

pub const TABLE_NAME: &str = "covid_us_daily";

/// Same DDL for PostgreSQL and DuckDB.
pub const CREATE_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS covid_us_daily (
    report_date DATE PRIMARY KEY,
    total_cases BIGINT,
    new_cases INTEGER,
    total_deaths BIGINT,
    new_deaths INTEGER
);
";

/// Max rows per INSERT statement.
pub const UPSERT_CHUNK_ROWS: usize = 1000;

/// Where the daily records live.
///
/// Each call opens its own connection and closes it before returning.
pub trait DailyStore {
    /// Human readable name of the target, for the logs.
    fn describe(&self) -> String;

    /// Create the database itself if needed.  Does not create the table.
    fn ensure_database(&self) -> Result<(), EtlError>;

    /// `MAX(report_date)` of the table.  A missing table is the same as an
    /// empty one and returns `Ok(None)`.
    fn most_recent_date(&self) -> Result<Option<Date>, EtlError>;

    /// Create the table if needed, then insert the records or overwrite the
    /// existing rows with the same `report_date`.  All or nothing.
    fn upsert(&self, records: &[DailyRecord]) -> Result<usize, EtlError>;
}

/// Multi-row upsert for `rows` rows.  `row_values(i)` gives the
/// parenthesized placeholders of row `i`, which differ between drivers.
pub(crate) fn upsert_sql<F>(rows: usize, row_values: F) -> String
where
    F: Fn(usize) -> String,
{
    format!(
        r"
INSERT INTO covid_us_daily (report_date, total_cases, new_cases, total_deaths, new_deaths)
VALUES
    {}
ON CONFLICT (report_date) DO UPDATE SET
    total_cases = EXCLUDED.total_cases,
    new_cases = EXCLUDED.new_cases,
    total_deaths = EXCLUDED.total_deaths,
    new_deaths = EXCLUDED.new_deaths;
",
        (0..rows).map(row_values).join(",\n    ")
    )
}

/// `new_cases` and `new_deaths` are INTEGER columns.
pub(crate) fn check_integer_columns(records: &[DailyRecord]) -> Result<(), EtlError> {
    for r in records {
        for (column, value) in [("new_cases", r.new_cases), ("new_deaths", r.new_deaths)] {
            if i32::try_from(value).is_err() {
                return Err(EtlError::DeltaOverflow {
                    date: r.report_date,
                    column,
                    value,
                });
            }
        }
    }
    Ok(())
}
