use crate::adapters::nominatim::DEFAULT_ENDPOINT;
use crate::adapters::table::WORKBOOK_EXTENSIONS;
use crate::core::geocode_client::RetryPolicy;
use crate::utils::error::{GeocodeError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

pub const OUTPUT_FORMATS: [&str; 3] = ["csv", "json", "xlsx"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    pub pipeline: PipelineConfig,
    pub source: SourceConfig,
    #[serde(default)]
    pub geocoder: GeocoderConfig,
    pub load: LoadConfig,
    /// 服務名稱 → 手動修正地址
    #[serde(default)]
    pub manual_fixes: BTreeMap<String, String>,
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub name: String,
    pub description: Option<String>,
    pub version: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// The file holding the complete dataset.
    pub input: String,
    /// Earlier output whose coordinates are reused; defaults to the CSV output.
    pub checkpoint: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocoderConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default)]
    pub user_agent: String,
    pub timeout_seconds: Option<u64>,
    pub retry_attempts: Option<u32>,
    pub retry_delay_seconds: Option<u64>,
    pub min_interval_ms: Option<u64>,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            user_agent: String::new(),
            timeout_seconds: None,
            retry_attempts: None,
            retry_delay_seconds: None,
            min_interval_ms: None,
        }
    }
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadConfig {
    pub output_path: String,
    pub output_formats: Vec<String>,
    pub split_by_group: Option<bool>,
    pub combined_sheet: Option<String>,
    pub filenames: Option<FilenameConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilenameConfig {
    pub csv: Option<String>,
    pub json: Option<String>,
    pub xlsx: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: Option<String>,
    pub json: Option<bool>,
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(GeocodeError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| GeocodeError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${NOMINATIM_URL})
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = regex::Regex::new(r"\$\{([^}]+)\}").map_err(|e| GeocodeError::ConfigError {
            message: e.to_string(),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn validate_config(&self) -> Result<()> {
        validation::validate_path("source.input", &self.source.input)?;
        let mut input_extensions = vec!["csv", "json"];
        input_extensions.extend(WORKBOOK_EXTENSIONS);
        validation::validate_file_extension("source.input", &self.source.input, &input_extensions)?;
        if let Some(checkpoint) = &self.source.checkpoint {
            validation::validate_file_extension("source.checkpoint", checkpoint, &input_extensions)?;
        }

        validation::validate_url("geocoder.endpoint", &self.geocoder.endpoint)?;
        validation::validate_non_empty_string("geocoder.user_agent", &self.geocoder.user_agent)?;

        // 服務條款：每秒最多一次請求
        validation::validate_positive_number(
            "geocoder.min_interval_ms",
            self.geocoder.min_interval_ms.unwrap_or(1100),
            1000,
        )?;
        validation::validate_positive_number(
            "geocoder.retry_attempts",
            u64::from(self.geocoder.retry_attempts.unwrap_or(3)),
            1,
        )?;
        validation::validate_positive_number(
            "geocoder.timeout_seconds",
            self.geocoder.timeout_seconds.unwrap_or(10),
            1,
        )?;

        validation::validate_path("load.output_path", &self.load.output_path)?;
        if self.load.output_formats.is_empty() {
            return Err(GeocodeError::MissingConfigError {
                field: "load.output_formats".to_string(),
            });
        }
        for format in &self.load.output_formats {
            validation::validate_one_of("load.output_formats", format, &OUTPUT_FORMATS)?;
        }
        validation::validate_non_empty_string("load.combined_sheet", self.combined_sheet())?;

        for (name, address) in &self.manual_fixes {
            validation::validate_non_empty_string(&format!("manual_fixes.{}", name), address)?;
        }

        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        let defaults = RetryPolicy::default();
        RetryPolicy {
            min_interval: self
                .geocoder
                .min_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.min_interval),
            request_timeout: self
                .geocoder
                .timeout_seconds
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            max_attempts: self.geocoder.retry_attempts.unwrap_or(defaults.max_attempts),
            retry_delay: self
                .geocoder
                .retry_delay_seconds
                .map(Duration::from_secs)
                .unwrap_or(defaults.retry_delay),
        }
    }

    pub fn output_path(&self) -> &str {
        &self.load.output_path
    }

    pub fn writes_format(&self, format: &str) -> bool {
        self.load.output_formats.iter().any(|f| f == format)
    }

    pub fn split_by_group(&self) -> bool {
        self.load.split_by_group.unwrap_or(true)
    }

    pub fn combined_sheet(&self) -> &str {
        self.load
            .combined_sheet
            .as_deref()
            .unwrap_or("All_Cities_Combined")
    }

    /// Full path of the output file for `format`.
    pub fn output_file(&self, format: &str) -> String {
        let filenames = self.load.filenames.as_ref();
        let configured = match format {
            "csv" => filenames.and_then(|f| f.csv.clone()),
            "json" => filenames.and_then(|f| f.json.clone()),
            "xlsx" => filenames.and_then(|f| f.xlsx.clone()),
            _ => None,
        };
        let filename = configured.unwrap_or_else(|| format!("services_geocoded.{}", format));

        Path::new(&self.load.output_path)
            .join(filename)
            .to_string_lossy()
            .into_owned()
    }

    /// Where previously resolved coordinates are read from.
    pub fn checkpoint_file(&self) -> Option<String> {
        match &self.source.checkpoint {
            Some(checkpoint) => Some(checkpoint.clone()),
            None if self.writes_format("csv") => Some(self.output_file("csv")),
            None => None,
        }
    }

    pub fn log_level(&self) -> Option<&str> {
        self.logging.as_ref().and_then(|l| l.level.as_deref())
    }

    pub fn log_json(&self) -> bool {
        self.logging.as_ref().and_then(|l| l.json).unwrap_or(false)
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
