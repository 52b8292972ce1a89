//! Meteostat daily observations extract

use super::table_config::RawTableConfig;
use crate::config::{MeteostatCredentials, MeteostatSettings};
use crate::error::{PipelineError, Result};
use polars::prelude::DataFrame;
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::info;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct DailyResponse {
    data: Vec<Value>,
}

/// Client for the Meteostat daily endpoint
pub struct MeteostatClient {
    http: Client,
    credentials: MeteostatCredentials,
    settings: MeteostatSettings,
}

impl MeteostatClient {
    pub fn new(credentials: MeteostatCredentials, settings: MeteostatSettings) -> Result<Self> {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            credentials,
            settings,
        })
    }

    pub fn settings(&self) -> &MeteostatSettings {
        &self.settings
    }

    /// Download the raw daily records for the configured station and range
    pub fn fetch_records(&self) -> Result<Vec<Value>> {
        let start = self.settings.start_date.format("%Y-%m-%d").to_string();
        let end = self.settings.end_date.format("%Y-%m-%d").to_string();
        info!(
            url = %self.settings.endpoint,
            station = %self.settings.station_id,
            %start,
            %end,
            "Requesting data from Meteostat"
        );

        let response = self
            .http
            .get(&self.settings.endpoint)
            .header("x-rapidapi-key", &self.credentials.api_key)
            .header("x-rapidapi-host", &self.credentials.api_host)
            .query(&[
                ("station", self.settings.station_id.as_str()),
                ("start", start.as_str()),
                ("end", end.as_str()),
            ])
            .send()?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(PipelineError::Http(format!(
                "response status = {}, could not download data from Meteostat",
                status
            )));
        }

        let body: DailyResponse = response.json()?;
        info!(records = body.data.len(), "Data successfully downloaded");
        Ok(body.data)
    }

    /// Typed raw observations.
    ///
    /// An existing file at the output path is read instead of calling the
    /// API; otherwise the downloaded records are written there first.
    pub fn extract(&self, table_config: &RawTableConfig) -> Result<DataFrame> {
        let path = &self.settings.output_path;
        let records = if path.exists() {
            info!(path = %path.display(), "Raw file already exists, reading it");
            read_raw_file(path)?
        } else {
            let records = self.fetch_records()?;
            write_raw_file(path, &records)?;
            info!(path = %path.display(), "Stored raw data");
            records
        };

        table_config.build_frame(&self.settings.table_name, &records)
    }
}

/// Read a JSON array of raw records
pub fn read_raw_file(path: &Path) -> Result<Vec<Value>> {
    let text = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

/// Write raw records as pretty-printed JSON, creating parent directories
pub fn write_raw_file(path: &Path, records: &[Value]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string_pretty(records)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    const YAML: &str = "WeatherData:\n  columns: [date, tsun]\n  datatypes:\n    date: String\n    tsun: Float64\n";

    fn client(output: &Path) -> MeteostatClient {
        let settings = MeteostatSettings {
            // unroutable, any request would fail
            endpoint: "http://127.0.0.1:9/daily".to_string(),
            station_id: "10637".to_string(),
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
            table_name: "WeatherData".to_string(),
            yaml_config_file: "unused.yaml".into(),
            output_path: output.to_path_buf(),
        };
        let credentials = MeteostatCredentials {
            api_key: "key".to_string(),
            api_host: "host".to_string(),
        };
        MeteostatClient::new(credentials, settings).unwrap()
    }

    #[test]
    fn test_cached_file_skips_request() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("raw").join("weather.json");
        write_raw_file(&path, &[json!({"date": "2024-01-01", "tsun": 42.0})]).unwrap();

        let config = RawTableConfig::from_yaml(YAML).unwrap();
        let df = client(&path).extract(&config).unwrap();
        assert_eq!(df.shape(), (1, 2));
    }

    #[test]
    fn test_raw_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weather.json");
        let records = vec![json!({"date": "2024-01-01", "tsun": null})];
        write_raw_file(&path, &records).unwrap();
        assert_eq!(read_raw_file(&path).unwrap(), records);
        assert!(fs::read_to_string(&path).unwrap().contains('\n'));
    }

    #[test]
    fn test_unreachable_endpoint_is_http_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weather.json");
        let config = RawTableConfig::from_yaml(YAML).unwrap();
        assert!(matches!(client(&path).extract(&config), Err(PipelineError::Http(_))));
        assert!(!path.exists());
    }
}
