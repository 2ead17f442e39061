use std::collections::BTreeMap;

use jiff::civil::Date;
use log::{info, warn};
use reqwest::blocking::Client;

use crate::db::store::DailyStore;
use crate::error::EtlError;

use super::lib_disease_sh::{fetch_timeline, RawTimeline};

/// One row of the `covid_us_daily` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyRecord {
    pub report_date: Date,
    pub total_cases: i64,
    /// Day over day change, negative when the source revised downwards.
    pub new_cases: i64,
    pub total_deaths: i64,
    pub new_deaths: i64,
}

/// Output of [`transform`].
#[derive(Debug, PartialEq, Eq)]
pub enum Transformed {
    /// Ascending by `report_date`, never empty.
    Records(Vec<DailyRecord>),
    NothingToDo,
}

/// Parse a source date like "3/15/22" or "03/15/22" (month/day/two-digit year).
/// Years 00-68 are 2000-2068, 69-99 are 1969-1999.
pub fn parse_source_date(s: &str) -> Option<Date> {
    let mut parts = s.trim().split('/');
    let month = parts.next()?.parse::<i8>().ok()?;
    let day = parts.next()?.parse::<i8>().ok()?;
    let yy = parts.next()?;
    if parts.next().is_some() || yy.len() != 2 {
        return None;
    }
    let yy = yy.parse::<i16>().ok()?;
    let year = if yy < 69 { 2000 + yy } else { 1900 + yy };
    Date::new(year, month, day).ok()
}

/// Join the cases and deaths series, compute the daily changes over the
/// full series and keep the days strictly after `most_recent_date`.
///
/// The changes of the first kept day are relative to the previous day of
/// the source, even when that day is filtered out.  Days already stored are
/// never revisited, so upstream revisions of old totals are not reconciled.
pub fn transform(data: Option<RawTimeline>, most_recent_date: Option<Date>) -> Transformed {
    let data = match data {
        Some(data) if !data.cases.is_empty() => data,
        _ => {
            warn!("No data to transform.");
            return Transformed::NothingToDo;
        }
    };

    info!("Transforming data...");
    let RawTimeline { cases, deaths } = data;
    let mut joined: BTreeMap<Date, (i64, i64)> = BTreeMap::new();
    for (key, total_cases) in cases {
        let Some(&total_deaths) = deaths.get(&key) else {
            continue;
        };
        let Some(report_date) = parse_source_date(&key) else {
            warn!("Malformed date '{}' in the timeline, nothing to transform.", key);
            return Transformed::NothingToDo;
        };
        joined.insert(report_date, (total_cases, total_deaths));
    }

    let mut previous: Option<(i64, i64)> = None;
    let mut records: Vec<DailyRecord> = Vec::with_capacity(joined.len());
    for (report_date, (total_cases, total_deaths)) in joined {
        let (prev_cases, prev_deaths) = previous.unwrap_or((total_cases, total_deaths));
        previous = Some((total_cases, total_deaths));
        records.push(DailyRecord {
            report_date,
            total_cases,
            new_cases: total_cases.saturating_sub(prev_cases),
            total_deaths,
            new_deaths: total_deaths.saturating_sub(prev_deaths),
        });
    }

    if let Some(last) = most_recent_date {
        records.retain(|r| r.report_date > last);
        info!("Found {} new records to load.", records.len());
    }

    if records.is_empty() {
        Transformed::NothingToDo
    } else {
        Transformed::Records(records)
    }
}

/// The daily USA series from disease.sh and the table it lands in.
pub struct CovidUsDailyArchive {
    pub client: Client,
    pub url: String,
    pub store: Box<dyn DailyStore>,
}

impl CovidUsDailyArchive {
    /// Create the target database if it is not there yet.
    pub fn setup(&self) -> Result<(), EtlError> {
        info!("Initializing database...");
        self.store.ensure_database()
    }

    /// Most recent `report_date` already stored, `None` on a first run.
    pub fn get_most_recent_date(&self) -> Result<Option<Date>, EtlError> {
        let res = self.store.most_recent_date()?;
        match res {
            Some(date) => info!("Most recent date in database is {}.", date),
            None => info!("No existing data found. Proceeding with a full load."),
        }
        Ok(res)
    }

    pub fn extract_data(&self) -> Option<RawTimeline> {
        fetch_timeline(&self.client, &self.url)
    }

    /// Upsert the records, return the number of rows written.
    pub fn load_data(&self, data: Transformed) -> Result<usize, EtlError> {
        let records = match data {
            Transformed::Records(records) => records,
            Transformed::NothingToDo => {
                warn!("No new data to load.");
                return Ok(0);
            }
        };
        info!("Loading {} records into {}...", records.len(), self.store.describe());
        let n = self.store.upsert(&records)?;
        info!("Data loaded successfully.");
        Ok(n)
    }
}
