pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use adapters::{nominatim::NominatimGeocoder, storage::LocalStorage};
pub use config::TomlConfig;
pub use core::{
    etl::{EtlEngine, RunReport},
    geocode_client::{GeocodeClient, RetryPolicy},
    pipeline::{GeocodePipeline, RunMode},
};
pub use utils::error::{GeocodeError, Result};
