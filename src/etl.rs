use std::fmt;

use jiff::civil::Date;
use log::{error, info};

use crate::db::disease_sh::covid_us_daily_archive::{transform, CovidUsDailyArchive};
use crate::error::EtlError;

/// Steps of one run, in order.  A run either reaches `Done` or fails in
/// the step it was in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Start,
    ReadWatermark,
    Extract,
    Transform,
    Load,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Stage::Start => write!(f, "start"),
            Stage::ReadWatermark => write!(f, "read watermark"),
            Stage::Extract => write!(f, "extract"),
            Stage::Transform => write!(f, "transform"),
            Stage::Load => write!(f, "load"),
            Stage::Done => write!(f, "done"),
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub watermark: Option<Date>,
    /// Days in the downloaded cases series, 0 if the download failed.
    pub fetched_days: usize,
    pub loaded_rows: usize,
}

/// Read watermark, extract, transform, load.  Once.
pub fn run(archive: &CovidUsDailyArchive) -> Result<RunSummary, EtlError> {
    info!("Starting ETL job...");
    let mut stage = Stage::Start;
    match run_stages(archive, &mut stage) {
        Ok(summary) => {
            info!("ETL job finished.");
            Ok(summary)
        }
        Err(e) => {
            error!("ETL job failed during {}: {}", stage, e);
            Err(e)
        }
    }
}

fn enter(stage: &mut Stage, next: Stage) {
    info!("ETL stage: {} -> {}", stage, next);
    *stage = next;
}

fn run_stages(archive: &CovidUsDailyArchive, stage: &mut Stage) -> Result<RunSummary, EtlError> {
    enter(stage, Stage::ReadWatermark);
    let watermark = archive.get_most_recent_date()?;

    enter(stage, Stage::Extract);
    let raw = archive.extract_data();
    let fetched_days = raw.as_ref().map_or(0, |t| t.cases.len());

    enter(stage, Stage::Transform);
    let data = transform(raw, watermark);

    enter(stage, Stage::Load);
    let loaded_rows = archive.load_data(data)?;

    enter(stage, Stage::Done);
    Ok(RunSummary {
        watermark,
        fetched_days,
        loaded_rows,
    })
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use jiff::civil::date;
    use tempfile::TempDir;

    use crate::db::disease_sh::lib_disease_sh::testing::{local_client, sample_body, serve_once};
    use crate::db::store::duckdb_store::DuckDbStore;
    use crate::db::store::DailyStore;

    use super::*;

    fn archive(dir: &TempDir, url: String) -> CovidUsDailyArchive {
        let path = dir.path().join("covid.duckdb");
        CovidUsDailyArchive {
            client: local_client(),
            url,
            store: Box::new(DuckDbStore::new(path.to_string_lossy().to_string())),
        }
    }

    #[test]
    fn first_run_loads_everything() -> Result<(), Box<dyn Error>> {
        let _ = env_logger::builder()
            .filter_level(log::LevelFilter::Info)
            .is_test(true)
            .try_init();
        let dir = tempfile::tempdir()?;
        let archive = archive(&dir, serve_once("200 OK", sample_body()));
        archive.setup()?;
        let summary = run(&archive)?;
        assert_eq!(
            summary,
            RunSummary {
                watermark: None,
                fetched_days: 3,
                loaded_rows: 3,
            }
        );
        assert_eq!(archive.store.most_recent_date()?, Some(date(2021, 1, 3)));
        Ok(())
    }

    #[test]
    fn second_run_is_a_noop() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        run(&archive(&dir, serve_once("200 OK", sample_body())))?;

        let summary = run(&archive(&dir, serve_once("200 OK", sample_body())))?;
        assert_eq!(summary.watermark, Some(date(2021, 1, 3)));
        assert_eq!(summary.fetched_days, 3);
        assert_eq!(summary.loaded_rows, 0);
        Ok(())
    }

    #[test]
    fn only_new_days_are_loaded() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        run(&archive(&dir, serve_once("200 OK", sample_body())))?;

        let body = r#"{"timeline": {
            "cases": {"1/2/21": 150, "1/3/21": 210, "1/4/21": 300},
            "deaths": {"1/2/21": 3, "1/3/21": 5, "1/4/21": 9}
        }}"#;
        let summary = run(&archive(&dir, serve_once("200 OK", body.to_string())))?;
        assert_eq!(summary.loaded_rows, 1);
        assert_eq!(summary.watermark, Some(date(2021, 1, 3)));
        Ok(())
    }

    #[test]
    fn failed_download_is_still_a_success() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let archive = archive(&dir, serve_once("503 Service Unavailable", "{}".to_string()));
        let summary = run(&archive)?;
        assert_eq!(summary, RunSummary::default());
        assert_eq!(archive.store.most_recent_date()?, None);
        Ok(())
    }

    #[test]
    fn unreadable_watermark_fails_the_run() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        // a directory is not a DuckDB file
        let archive = CovidUsDailyArchive {
            client: local_client(),
            url: "http://127.0.0.1:9/".to_string(),
            store: Box::new(DuckDbStore::new(dir.path().to_string_lossy().to_string())),
        };
        let mut stage = Stage::Start;
        assert!(run_stages(&archive, &mut stage).is_err());
        assert_eq!(stage, Stage::ReadWatermark);
        assert!(run(&archive).is_err());
        Ok(())
    }

    #[test]
    fn failed_load_fails_the_run_and_writes_nothing() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let body = r#"{"timeline": {
            "cases": {"1/1/21": 100, "1/2/21": 3000000000},
            "deaths": {"1/1/21": 2, "1/2/21": 3}
        }}"#;
        let archive = archive(&dir, serve_once("200 OK", body.to_string()));
        let mut stage = Stage::Start;
        let err = run_stages(&archive, &mut stage).unwrap_err();
        assert!(matches!(err, EtlError::DeltaOverflow { column: "new_cases", .. }));
        assert_eq!(stage, Stage::Load);
        assert_eq!(archive.store.most_recent_date()?, None);
        Ok(())
    }

    #[test]
    fn stage_names() {
        assert_eq!(Stage::ReadWatermark.to_string(), "read watermark");
        assert_eq!(Stage::Load.to_string(), "load");
    }
}
