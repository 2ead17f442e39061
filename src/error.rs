use std::error::Error as _;

use jiff::civil::Date;
use thiserror::Error;

use crate::config::DbConfig;

/// Fatal errors of the ETL job.  Anything that is not fatal (a failed
/// download, an empty payload) never becomes an `EtlError`.
#[derive(Error, Debug)]
pub enum EtlError {
    /// Could not open a PostgreSQL connection.  `hint` tells the operator
    /// what to fix.
    #[error("{hint} ({source})")]
    Connect {
        hint: String,
        #[source]
        source: postgres::Error,
    },

    #[error("postgres error: {0}")]
    Postgres(#[from] postgres::Error),

    #[error("duckdb error: {0}")]
    DuckDb(#[from] duckdb::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid date in database: {0}")]
    Date(#[from] jiff::Error),

    #[error("{column} = {value} on {date} does not fit in an INTEGER column")]
    DeltaOverflow {
        date: Date,
        column: &'static str,
        value: i64,
    },
}

impl EtlError {
    /// Wrap a failed connection attempt, attaching a remediation hint.
    pub fn connect(config: &DbConfig, source: postgres::Error) -> EtlError {
        let mut message = source.to_string();
        let mut cause = source.source();
        while let Some(e) = cause {
            message.push_str(": ");
            message.push_str(&e.to_string());
            cause = e.source();
        }
        EtlError::Connect {
            hint: remediation_hint(config, &message),
            source,
        }
    }
}

pub(crate) fn remediation_hint(config: &DbConfig, message: &str) -> String {
    let message = message.to_lowercase();
    if message.contains(&format!("role \"{}\" does not exist", config.user.to_lowercase())) {
        format!(
            "Database user '{}' does not exist. Please create it first.",
            config.user
        )
    } else if message.contains("connection refused") {
        format!(
            "Could not connect to PostgreSQL at {}:{}. Is the server running?",
            config.host, config.port
        )
    } else if message.contains("password authentication failed") {
        format!(
            "PostgreSQL rejected the password for user '{}'. Check DB_PASSWORD.",
            config.user
        )
    } else {
        format!(
            "Could not connect to PostgreSQL at {}:{}. Check DB_HOST, DB_PORT and the credentials.",
            config.host, config.port
        )
    }
}
