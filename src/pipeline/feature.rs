//! Feature pipeline: extract, transform, load, clean up

use crate::config::{FeaturePipelineSettings, FeatureStoreSettings};
use crate::error::Result;
use crate::etl::{delete_file, transform, MeteostatClient, RawTableConfig, TransformOptions};
use crate::feature_store::{
    check_ranges, weather_feature_descriptions, FeatureDescription, FeatureGroupSpec, FeatureSink,
    FeatureViewSpec, LocalFeatureStore, RangeViolation, UpsertSummary, WriteOptions,
};
use crate::utils::frame::column_names;
use std::time::Instant;
use tracing::info;

/// What a feature pipeline run did
#[derive(Debug, Clone)]
pub struct FeaturePipelineSummary {
    pub rows_extracted: usize,
    pub rows_loaded: usize,
    pub upsert: UpsertSummary,
    pub range_violations: Vec<RangeViolation>,
    pub feature_view: String,
    pub elapsed_secs: f64,
}

/// Feature group definition from the store settings
pub fn feature_group_spec(settings: &FeatureStoreSettings) -> FeatureGroupSpec {
    FeatureGroupSpec {
        name: settings.feature_group_name.clone(),
        version: settings.feature_group_version,
        description: settings.feature_group_description.clone(),
        primary_keys: settings.feature_group_primary_keys.clone(),
        event_time: settings.feature_group_event_time.clone(),
    }
}

/// Feature view definition from the store settings; the label is picked at training time
pub fn feature_view_spec(settings: &FeatureStoreSettings) -> FeatureViewSpec {
    FeatureViewSpec {
        name: settings.feature_view_name.clone(),
        version: settings.feature_view_version,
        description: format!("Basic features of {}", settings.feature_group_name),
        feature_group: settings.feature_group_name.clone(),
        feature_group_version: settings.feature_group_version,
        label: None,
    }
}

pub struct FeaturePipeline {
    settings: FeaturePipelineSettings,
    options: TransformOptions,
    descriptions: Vec<FeatureDescription>,
}

impl FeaturePipeline {
    pub fn new(settings: FeaturePipelineSettings) -> Self {
        Self {
            settings,
            options: TransformOptions::default(),
            descriptions: weather_feature_descriptions(),
        }
    }

    pub fn with_transform_options(mut self, options: TransformOptions) -> Self {
        self.options = options;
        self
    }

    pub fn settings(&self) -> &FeaturePipelineSettings {
        &self.settings
    }

    /// Run against the store configured in the settings
    pub fn run(&self) -> Result<FeaturePipelineSummary> {
        let mut store = LocalFeatureStore::open(&self.settings.store.root)?;
        self.run_with(&mut store)
    }

    /// Run against an already opened store.
    ///
    /// The raw extract file is only deleted after the load succeeded, so a
    /// failed run can be repeated without calling the API again.
    pub fn run_with(&self, store: &mut LocalFeatureStore) -> Result<FeaturePipelineSummary> {
        let start = Instant::now();
        let meteostat = &self.settings.meteostat;
        info!("Starting the feature pipeline");

        let table_config = RawTableConfig::load(&meteostat.yaml_config_file)?;
        let client = MeteostatClient::new(self.settings.credentials.clone(), meteostat.clone())?;
        let raw = client.extract(&table_config)?;
        info!(rows = raw.height(), columns = raw.width(), "Extracted raw data");

        let features = transform(&raw, &self.options)?;
        info!(rows = features.height(), "Transformed data");
        let range_violations = check_ranges(&features, &self.descriptions)?;

        let group = feature_group_spec(&self.settings.store);
        let options = WriteOptions {
            overwrite: self.settings.store.overwrite,
        };
        let upsert = store.upsert(&features, &group, &options)?;

        let columns = column_names(&features);
        for desc in self.descriptions.iter().filter(|d| columns.contains(&d.name)) {
            store.update_feature_description(&group.name, group.version, &desc.name, &desc.description)?;
        }

        let view = store.create_feature_view(&feature_view_spec(&self.settings.store))?;

        delete_file(&meteostat.output_path)?;

        let summary = FeaturePipelineSummary {
            rows_extracted: raw.height(),
            rows_loaded: features.height(),
            upsert,
            range_violations,
            feature_view: view.spec.name,
            elapsed_secs: start.elapsed().as_secs_f64(),
        };
        info!(
            rows = summary.rows_loaded,
            total = summary.upsert.total,
            secs = summary.elapsed_secs,
            "Feature pipeline completed"
        );
        Ok(summary)
    }
}
