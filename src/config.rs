use std::env;

use crate::error::EtlError;

/// Connection settings for the target database.
///
/// Built once at startup and handed by reference to whoever needs it.
/// When `duckdb_path` is set the job writes to that DuckDB file and the
/// PostgreSQL settings are ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub name: String,
    pub user: String,
    pub password: String,
    pub duckdb_path: Option<String>,
}

impl Default for DbConfig {
    fn default() -> Self {
        DbConfig {
            host: "localhost".to_string(),
            port: 5432,
            name: "covid_data".to_string(),
            user: "user".to_string(),
            password: "password".to_string(),
            duckdb_path: None,
        }
    }
}

impl DbConfig {
    /// Read `DB_HOST`, `DB_PORT`, `DB_NAME`, `DB_USER`, `DB_PASSWORD` and
    /// `DUCKDB_PATH` from the process environment.
    pub fn from_env() -> Result<DbConfig, EtlError> {
        DbConfig::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`DbConfig::from_env`] with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<DbConfig, EtlError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = DbConfig::default();
        let port = match lookup("DB_PORT") {
            Some(value) => value.trim().parse::<u16>().map_err(|_| {
                EtlError::InvalidConfig(format!("DB_PORT must be a port number, got '{}'", value))
            })?,
            None => defaults.port,
        };
        Ok(DbConfig {
            host: lookup("DB_HOST").unwrap_or(defaults.host),
            port,
            name: lookup("DB_NAME").unwrap_or(defaults.name),
            user: lookup("DB_USER").unwrap_or(defaults.user),
            password: lookup("DB_PASSWORD").unwrap_or(defaults.password),
            duckdb_path: lookup("DUCKDB_PATH").filter(|path| !path.trim().is_empty()),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::error::Error;

    use super::*;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_set() -> Result<(), Box<dyn Error>> {
        let config = DbConfig::from_lookup(lookup_from(&[]))?;
        assert_eq!(config, DbConfig::default());
        assert_eq!(config.port, 5432);
        assert_eq!(config.name, "covid_data");
        Ok(())
    }

    #[test]
    fn environment_overrides_defaults() -> Result<(), Box<dyn Error>> {
        let config = DbConfig::from_lookup(lookup_from(&[
            ("DB_HOST", "db.internal"),
            ("DB_PORT", "6543"),
            ("DB_NAME", "pandemic"),
            ("DB_USER", "etl"),
            ("DB_PASSWORD", "s3cret"),
        ]))?;
        assert_eq!(config.host, "db.internal");
        assert_eq!(config.port, 6543);
        assert_eq!(config.name, "pandemic");
        assert_eq!(config.user, "etl");
        assert_eq!(config.password, "s3cret");
        assert_eq!(config.duckdb_path, None);
        Ok(())
    }

    #[test]
    fn bad_port_is_a_config_error() {
        let res = DbConfig::from_lookup(lookup_from(&[("DB_PORT", "fifty")]));
        match res {
            Err(EtlError::InvalidConfig(msg)) => assert!(msg.contains("fifty")),
            other => panic!("expected InvalidConfig, got {:?}", other),
        }
    }

    #[test]
    fn blank_duckdb_path_is_ignored() -> Result<(), Box<dyn Error>> {
        let config = DbConfig::from_lookup(lookup_from(&[("DUCKDB_PATH", "  ")]))?;
        assert_eq!(config.duckdb_path, None);
        let config = DbConfig::from_lookup(lookup_from(&[("DUCKDB_PATH", "/tmp/covid.duckdb")]))?;
        assert_eq!(config.duckdb_path.as_deref(), Some("/tmp/covid.duckdb"));
        Ok(())
    }
}
