// Historical COVID-19 counts from https://disease.sh (aggregates the JHU CSSE data).

use std::collections::BTreeMap;
use std::error::Error;

use log::{error, info};
use reqwest::blocking::Client;
use serde::Deserialize;

/// All the available days for the USA.
pub const API_URL: &str = "https://disease.sh/v3/covid-19/historical/usa?lastdays=all";

/// Cumulative counts keyed by the source date string, e.g. "3/15/22".
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
pub struct RawTimeline {
    #[serde(default)]
    pub cases: BTreeMap<String, i64>,
    #[serde(default)]
    pub deaths: BTreeMap<String, i64>,
}

#[derive(Debug, Deserialize)]
struct HistoricalResponse {
    #[serde(default)]
    timeline: RawTimeline,
}

/// Parse the body of the historical endpoint.  A body without a `timeline`
/// gives an empty timeline.
pub fn parse_timeline(body: &str) -> Result<RawTimeline, serde_json::Error> {
    let response: HistoricalResponse = serde_json::from_str(body)?;
    Ok(response.timeline)
}

/// One GET, no retries.  Any failure is logged and reported as `None`.
pub fn fetch_timeline(client: &Client, url: &str) -> Option<RawTimeline> {
    info!("Extracting data from API...");
    match download(client, url) {
        Ok(timeline) => Some(timeline),
        Err(e) => {
            error!("API data extraction error: {}", e);
            None
        }
    }
}

fn download(client: &Client, url: &str) -> Result<RawTimeline, Box<dyn Error>> {
    let response = client.get(url).send()?.error_for_status()?;
    let body = response.text()?;
    Ok(parse_timeline(&body)?)
}
