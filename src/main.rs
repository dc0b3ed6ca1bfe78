use clap::Parser;
use service_geocoder::core::etl::summary_lines;
use service_geocoder::core::pipeline::work_plan;
use service_geocoder::domain::ports::Pipeline;
use service_geocoder::utils::error::{ErrorSeverity, GeocodeError};
use service_geocoder::utils::{logger, validation::Validate};
use service_geocoder::{CliConfig, EtlEngine, GeocodePipeline, LocalStorage, RunMode, TomlConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliConfig::parse();

    // 載入 TOML 配置
    let mut config = match TomlConfig::from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load config file '{}': {}", args.config, e);
            eprintln!("💡 Make sure the file exists and is valid TOML format");
            std::process::exit(1);
        }
    };

    // 初始化日誌
    logger::init_logger(args.verbose, config.log_level(), config.log_json());
    tracing::info!("🗺️  Starting service-geocoder ({})", config.pipeline.name);
    if args.verbose {
        tracing::debug!("CLI args: {:?}", args);
    }

    args.apply_overrides(&mut config);

    if let Err(e) = config.validate() {
        exit_with(&e);
    }

    let mode = if args.fix_only {
        RunMode::ManualFixesOnly
    } else {
        RunMode::Full
    };

    let storage = LocalStorage::new(".");
    let pipeline = match GeocodePipeline::from_config(storage, config) {
        Ok(pipeline) => pipeline.with_mode(mode),
        Err(e) => exit_with(&e),
    };

    if args.dry_run {
        tracing::info!("🔍 DRY RUN MODE - the geocoder will not be called");
        let mut pipeline = pipeline;
        let dataset = match pipeline.extract().await {
            Ok(dataset) => dataset,
            Err(e) => exit_with(&e),
        };
        let plan = work_plan(&dataset, pipeline.client().policy());
        println!("📋 Work plan:");
        println!("  Services loaded:   {}", plan.total);
        println!("  Already geocoded:  {}", plan.skipped);
        println!("  To geocode:        {}", plan.to_geocode);
        println!(
            "  Estimated time:    ~{:.1} minutes",
            plan.estimated.as_secs_f64() / 60.0
        );
        return Ok(());
    }

    let mut engine = EtlEngine::new(pipeline);
    match engine.run().await {
        Ok(report) => {
            for line in summary_lines(&report.summary) {
                println!("{}", line);
            }
            println!();
            println!("✅ Geocoding complete!");
            println!("📁 Output files:");
            for output in &report.outputs {
                println!("   - {}", output);
            }
        }
        Err(e) => exit_with(&e),
    }

    Ok(())
}

fn exit_with(e: &GeocodeError) -> ! {
    tracing::error!(
        "❌ Geocoding run failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 Suggestion: {}", e.recovery_suggestion());

    let exit_code = match e.severity() {
        ErrorSeverity::Low => 0,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    };
    std::process::exit(exit_code);
}
