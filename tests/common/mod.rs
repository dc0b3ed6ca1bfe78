#![allow(dead_code)]

use service_geocoder::domain::ports::Clock;
use service_geocoder::{
    GeocodeClient, GeocodePipeline, LocalStorage, NominatimGeocoder, RetryPolicy, TomlConfig,
};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// 不真正等待的時鐘，sleep 只推進時間
#[derive(Clone)]
pub struct InstantClock {
    now: Arc<Mutex<Instant>>,
    slept: Arc<Mutex<Duration>>,
}

impl InstantClock {
    pub fn new() -> Self {
        Self {
            now: Arc::new(Mutex::new(Instant::now())),
            slept: Arc::new(Mutex::new(Duration::ZERO)),
        }
    }

    pub fn slept(&self) -> Duration {
        *self.slept.lock().unwrap()
    }
}

impl Clock for InstantClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap()
    }

    async fn sleep(&self, duration: Duration) {
        *self.now.lock().unwrap() += duration;
        *self.slept.lock().unwrap() += duration;
    }
}

pub fn config(endpoint: &str, formats: &[&str], extra: &str) -> TomlConfig {
    let formats = formats
        .iter()
        .map(|f| format!("\"{}\"", f))
        .collect::<Vec<_>>()
        .join(", ");

    TomlConfig::from_toml_str(&format!(
        r#"
[pipeline]
name = "integration-test"

[source]
input = "input/services.csv"

[geocoder]
endpoint = "{}"
user_agent = "service-geocoder-tests"
timeout_seconds = 5

[load]
output_path = "out"
output_formats = [{}]
{}
"#,
        endpoint, formats, extra
    ))
    .unwrap()
}

pub fn pipeline(
    base: &std::path::Path,
    config: TomlConfig,
    clock: InstantClock,
) -> GeocodePipeline<LocalStorage, NominatimGeocoder, InstantClock> {
    let policy: RetryPolicy = config.retry_policy();
    let geocoder = NominatimGeocoder::new(
        &config.geocoder.endpoint,
        &config.geocoder.user_agent,
        policy.request_timeout,
    )
    .unwrap();
    let client = GeocodeClient::new(geocoder, clock, policy);
    GeocodePipeline::new(LocalStorage::new(base), config, client)
}

pub fn write_input(base: &std::path::Path, content: &str) {
    let dir = base.join("input");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("services.csv"), content).unwrap();
}
