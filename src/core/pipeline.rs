use crate::adapters::nominatim::NominatimGeocoder;
use crate::adapters::table::{self, dataset_from_tables, read_tables};
use crate::config::TomlConfig;
use crate::core::address::build_address;
use crate::core::clock::SystemClock;
use crate::core::geocode_client::{GeocodeClient, RetryPolicy};
use crate::core::reconcile::{apply_checkpoint, apply_manual_fixes, fill_states, summarize};
use crate::domain::model::{Dataset, TransformResult};
use crate::domain::ports::{Clock, Geocoder, Pipeline, Storage};
use crate::utils::error::{GeocodeError, Result};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    /// Geocode every unresolved row, then apply manual fixes.
    #[default]
    Full,
    /// Reload the existing output and only apply manual fixes.
    ManualFixesOnly,
}

/// What a run would do, for `--dry-run`.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkPlan {
    pub total: usize,
    pub to_geocode: usize,
    pub skipped: usize,
    pub estimated: Duration,
}

pub fn work_plan(dataset: &Dataset, policy: &RetryPolicy) -> WorkPlan {
    let skipped = dataset.records.iter().filter(|r| r.is_resolved()).count();
    let to_geocode = dataset.len() - skipped;

    WorkPlan {
        total: dataset.len(),
        to_geocode,
        skipped,
        estimated: policy.min_interval * to_geocode as u32,
    }
}

/// 地址解析管道：載入 → 逐列地理編碼 → 輸出
pub struct GeocodePipeline<S: Storage, G: Geocoder, C: Clock> {
    storage: S,
    config: TomlConfig,
    client: GeocodeClient<G, C>,
    mode: RunMode,
    skipped: usize,
}

impl<S: Storage> GeocodePipeline<S, NominatimGeocoder, SystemClock> {
    /// Pipeline talking to the configured Nominatim endpoint in real time.
    pub fn from_config(storage: S, config: TomlConfig) -> Result<Self> {
        let policy = config.retry_policy();
        let geocoder = NominatimGeocoder::new(
            &config.geocoder.endpoint,
            &config.geocoder.user_agent,
            policy.request_timeout,
        )?;
        let client = GeocodeClient::new(geocoder, SystemClock, policy);
        Ok(Self::new(storage, config, client))
    }
}

impl<S: Storage, G: Geocoder, C: Clock> GeocodePipeline<S, G, C> {
    pub fn new(storage: S, config: TomlConfig, client: GeocodeClient<G, C>) -> Self {
        Self {
            storage,
            config,
            client,
            mode: RunMode::Full,
            skipped: 0,
        }
    }

    pub fn with_mode(mut self, mode: RunMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn config(&self) -> &TomlConfig {
        &self.config
    }

    pub fn client(&self) -> &GeocodeClient<G, C> {
        &self.client
    }

    async fn load_dataset(&self, path: &str) -> Result<Dataset> {
        let bytes = self.storage.read_file(path).await?;
        let tables = read_tables(path, &bytes, self.config.combined_sheet())?;
        for table in &tables {
            tracing::info!(
                "   ✓ {}: {} records",
                table.label.as_deref().unwrap_or(path),
                table.rows.len()
            );
        }
        dataset_from_tables(path, tables)
    }

    async fn extract_source(&self) -> Result<Dataset> {
        let input = self.config.source.input.clone();
        if !self.storage.exists(&input).await {
            return Err(GeocodeError::NoUsableInput {
                checked: vec![input],
            });
        }

        tracing::info!("📁 Loading service data from: {}", input);
        let mut dataset = self.load_dataset(&input).await?;
        tracing::info!("📊 Total services loaded: {}", dataset.len());

        let filled = fill_states(&mut dataset);
        if filled > 0 {
            tracing::info!("🗺️  State filled for {} services", filled);
        }

        if let Some(checkpoint) = self.config.checkpoint_file() {
            if checkpoint == input {
                return Ok(dataset);
            }
            if self.storage.exists(&checkpoint).await {
                tracing::info!("📂 Reading checkpoint: {}", checkpoint);
                let previous = self.load_dataset(&checkpoint).await?;
                let applied = apply_checkpoint(&mut dataset, &previous);
                tracing::debug!("Reused {} results from checkpoint", applied);
            } else {
                tracing::debug!("No checkpoint at {}", checkpoint);
            }
        }

        Ok(dataset)
    }

    async fn extract_previous_output(&self) -> Result<Dataset> {
        let checkpoint = self
            .config
            .checkpoint_file()
            .ok_or_else(|| GeocodeError::MissingConfigError {
                field: "source.checkpoint".to_string(),
            })?;

        if !self.storage.exists(&checkpoint).await {
            return Err(GeocodeError::NoUsableInput {
                checked: vec![checkpoint],
            });
        }

        tracing::info!("📁 Loading geocoded data from: {}", checkpoint);
        self.load_dataset(&checkpoint).await
    }

    async fn geocode_unresolved(&mut self, dataset: &mut Dataset) {
        let total = dataset.len();

        for (index, record) in dataset.records.iter_mut().enumerate() {
            if record.is_resolved() {
                continue;
            }

            let address = build_address(&record.service);
            tracing::info!(
                "   [{}/{}] {} - {}",
                index + 1,
                total,
                record.service.source_group.as_deref().unwrap_or("-"),
                record.service.name
            );
            tracing::info!("       📍 {}", address);

            let result = self.client.geocode(&address).await;
            match result.coordinates {
                Some(coords) => tracing::info!(
                    "       ✓ ({:.6}, {:.6})",
                    coords.latitude,
                    coords.longitude
                ),
                None => tracing::warn!("       ✗ Failed ({})", result.accuracy),
            }
            record.geocode = Some(result);
        }
    }

    async fn write_outputs(&self, dataset: &Dataset) -> Result<Vec<String>> {
        let mut outputs = Vec::new();

        for format in &self.config.load.output_formats {
            let bytes = match format.as_str() {
                "csv" => table::write_csv(dataset)?,
                "json" => table::write_json(dataset)?,
                "xlsx" => table::write_workbook(
                    dataset,
                    self.config.combined_sheet(),
                    self.config.split_by_group(),
                )?,
                other => {
                    return Err(GeocodeError::InvalidConfigValueError {
                        field: "load.output_formats".to_string(),
                        value: other.to_string(),
                        reason: "Unsupported output format".to_string(),
                    })
                }
            };

            let path = self.config.output_file(format);
            tracing::debug!("Writing {} ({} bytes)", path, bytes.len());
            self.storage.write_file(&path, &bytes).await?;
            tracing::info!("   ✓ Saved {}: {}", format.to_uppercase(), path);
            outputs.push(path);
        }

        Ok(outputs)
    }
}

#[async_trait::async_trait]
impl<S: Storage, G: Geocoder, C: Clock> Pipeline for GeocodePipeline<S, G, C> {
    async fn extract(&mut self) -> Result<Dataset> {
        let dataset = match self.mode {
            RunMode::Full => self.extract_source().await?,
            RunMode::ManualFixesOnly => self.extract_previous_output().await?,
        };

        // fix-only 模式不略過任何列，只套用手動修正
        self.skipped = match self.mode {
            RunMode::Full => dataset.records.iter().filter(|r| r.is_resolved()).count(),
            RunMode::ManualFixesOnly => 0,
        };
        if self.skipped > 0 {
            tracing::info!(
                "⚠️  Found {} already geocoded services, only the rest will be geocoded",
                self.skipped
            );
        }

        Ok(dataset)
    }

    async fn transform(&mut self, mut data: Dataset) -> Result<TransformResult> {
        if self.mode == RunMode::Full {
            let plan = work_plan(&data, self.client.policy());
            tracing::info!(
                "🚀 Geocoding {} services (estimated time: ~{:.1} minutes)",
                plan.to_geocode,
                plan.estimated.as_secs_f64() / 60.0
            );
            self.geocode_unresolved(&mut data).await;
        }

        let fixed = if self.config.manual_fixes.is_empty() {
            0
        } else {
            apply_manual_fixes(&mut self.client, &mut data, &self.config.manual_fixes).await
        };

        let summary = summarize(&data, self.skipped, fixed, self.client.requests_issued());
        Ok(TransformResult {
            dataset: data,
            summary,
        })
    }

    async fn load(&mut self, result: &TransformResult) -> Result<Vec<String>> {
        tracing::info!("💾 Saving geocoded data...");
        self.write_outputs(&result.dataset).await
    }
}
