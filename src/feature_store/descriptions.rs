//! Descriptions and plausibility ranges of the weather features

use crate::error::Result;
use crate::utils::frame::column_f64;
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureDescription {
    pub name: String,
    pub description: String,
    /// Inclusive plausible range, `None` for non-numeric features
    pub range: Option<(f64, f64)>,
}

impl FeatureDescription {
    fn new(name: &str, description: &str, range: Option<(f64, f64)>) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            range,
        }
    }
}

/// Descriptions of the Meteostat daily columns and the derived label
pub fn weather_feature_descriptions() -> Vec<FeatureDescription> {
    let temp = Some((-20.0, 40.0));
    vec![
        FeatureDescription::new("date", "The date of the data point.", None),
        FeatureDescription::new("tavg", "Average temperature in degrees Celsius.", temp),
        FeatureDescription::new("tmin", "Minimum temperature in degrees Celsius.", temp),
        FeatureDescription::new("tmax", "Maximum temperature in degrees Celsius.", temp),
        FeatureDescription::new("prcp", "The daily precipitation total in mm.", Some((0.0, 1000.0))),
        FeatureDescription::new("snow", "The snow depth in mm.", Some((0.0, 100.0))),
        FeatureDescription::new("wdir", "The average wind direction in degrees.", Some((0.0, 360.0))),
        FeatureDescription::new("wspd", "The average wind speed in km/h.", Some((0.0, 100.0))),
        FeatureDescription::new("wpgt", "The peak wind gust in km/h.", Some((0.0, 100.0))),
        FeatureDescription::new("pres", "The average sea-level air pressure in hPa.", Some((900.0, 1100.0))),
        FeatureDescription::new("tsun", "The daily sunshine total in minutes.", Some((0.0, 1440.0))),
        FeatureDescription::new(
            "tsun_label",
            "The daily sunshine total in minutes as a label, shifted by 1 day.",
            Some((0.0, 1440.0)),
        ),
    ]
}

/// Values outside a feature's plausible range
#[derive(Debug, Clone, PartialEq)]
pub struct RangeViolation {
    pub feature: String,
    pub count: usize,
    pub low: f64,
    pub high: f64,
}

/// Count out-of-range values per described feature and log a warning for
/// each offender. Columns missing from `df` are skipped.
pub fn check_ranges(df: &DataFrame, descriptions: &[FeatureDescription]) -> Result<Vec<RangeViolation>> {
    let mut violations = Vec::new();
    for desc in descriptions {
        let Some((low, high)) = desc.range else {
            continue;
        };
        if df.column(&desc.name).is_err() {
            continue;
        }
        let count = column_f64(df, &desc.name)?
            .into_iter()
            .flatten()
            .filter(|v| *v < low || *v > high)
            .count();
        if count > 0 {
            warn!(feature = %desc.name, count, low, high, "Values outside plausible range");
            violations.push(RangeViolation {
                feature: desc.name.clone(),
                count,
                low,
                high,
            });
        }
    }
    Ok(violations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    #[test]
    fn test_descriptions_cover_label() {
        let descriptions = weather_feature_descriptions();
        assert_eq!(descriptions.len(), 12);
        let label = descriptions.iter().find(|d| d.name == "tsun_label").unwrap();
        assert_eq!(label.range, Some((0.0, 1440.0)));
    }

    #[test]
    fn test_check_ranges() {
        let df = df!(
            "tavg" => &[Some(10.0), Some(45.0), None],
            "pres" => &[1000.0, 850.0, 1200.0],
            "tsun" => &[0.0, 600.0, 1440.0]
        )
        .unwrap();
        let violations = check_ranges(&df, &weather_feature_descriptions()).unwrap();
        assert_eq!(violations.len(), 2);
        assert_eq!(violations[0].feature, "tavg");
        assert_eq!(violations[0].count, 1);
        assert_eq!(violations[1].feature, "pres");
        assert_eq!(violations[1].count, 2);
    }
}
