pub mod toml_config;

pub use toml_config::TomlConfig;

#[cfg(feature = "cli")]
use clap::Parser;

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "service-geocoder")]
#[command(about = "Geocode service records and write enriched CSV, JSON and Excel outputs")]
pub struct CliConfig {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "geocode.toml")]
    pub config: String,

    /// Override [source].input
    #[arg(long)]
    pub input: Option<String>,

    /// Override [load].output_path
    #[arg(long)]
    pub output_path: Option<String>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Load the data and report the work plan without calling the geocoder
    #[arg(long)]
    pub dry_run: bool,

    /// Only run the manual-fix pass against the existing output
    #[arg(long)]
    pub fix_only: bool,
}

#[cfg(feature = "cli")]
impl CliConfig {
    /// 套用命令列覆蓋設定
    pub fn apply_overrides(&self, config: &mut TomlConfig) {
        if let Some(input) = &self.input {
            tracing::info!("🔧 Source input overridden to: {}", input);
            config.source.input = input.clone();
        }
        if let Some(output_path) = &self.output_path {
            tracing::info!("🔧 Output path overridden to: {}", output_path);
            config.load.output_path = output_path.clone();
        }
    }
}
