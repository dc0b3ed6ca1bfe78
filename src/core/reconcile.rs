//! Merging geocode results into the dataset.

use crate::core::address::build_address;
use crate::core::geocode_client::GeocodeClient;
use crate::core::state::{state_for_label, state_for_postcode};
use crate::domain::model::{
    Accuracy, Dataset, GeocodeResult, GroupStats, RunSummary, ServiceRecord, UnresolvedRow,
    COL_STATE,
};
use crate::domain::ports::{Clock, Geocoder};
use std::collections::{BTreeMap, HashMap};

/// 以名稱與地址比對列（不分大小寫、忽略前後空白）
fn record_key(service: &ServiceRecord) -> (String, String) {
    (
        service.name.trim().to_lowercase(),
        service
            .address
            .as_deref()
            .unwrap_or_default()
            .trim()
            .to_lowercase(),
    )
}

/// Fill missing State values: postcode ranges first, then the source label.
/// Returns how many rows were filled.
pub fn fill_states(dataset: &mut Dataset) -> usize {
    dataset.ensure_column(COL_STATE);

    let mut filled = 0;
    for record in &mut dataset.records {
        let service = &mut record.service;
        if service.state.is_some() {
            continue;
        }

        let mut state = state_for_postcode(service.postcode_number());
        if !state.is_known() {
            if let Some(label) = service.source_group.as_deref() {
                state = state_for_label(label);
            }
        }

        service.state = Some(state.code().to_string());
        filled += 1;
    }
    filled
}

/// Copy resolved coordinates from an earlier output onto matching rows that
/// have none. Rows are matched on (name, address); only located results are
/// taken. Returns the number of rows that will be skipped.
pub fn apply_checkpoint(dataset: &mut Dataset, checkpoint: &Dataset) -> usize {
    let mut resolved: HashMap<(String, String), &GeocodeResult> = HashMap::new();
    for record in &checkpoint.records {
        if let Some(geocode) = record.geocode.as_ref().filter(|g| g.is_located()) {
            resolved.entry(record_key(&record.service)).or_insert(geocode);
        }
    }

    let mut applied = 0;
    for record in &mut dataset.records {
        if record.is_resolved() {
            continue;
        }
        if let Some(geocode) = resolved.get(&record_key(&record.service)) {
            record.geocode = Some((*geocode).clone());
            applied += 1;
        }
    }
    applied
}

/// Retry still-unresolved rows named in `fixes` with their corrected address.
///
/// A success is recorded as `manual_fix`; on failure the row keeps its
/// earlier result. Returns the number of rows fixed.
pub async fn apply_manual_fixes<G: Geocoder, C: Clock>(
    client: &mut GeocodeClient<G, C>,
    dataset: &mut Dataset,
    fixes: &BTreeMap<String, String>,
) -> usize {
    let mut fixed = 0;

    for record in dataset.records.iter_mut().filter(|r| !r.is_resolved()) {
        let Some(corrected) = fixes.get(record.service.name.trim()) else {
            continue;
        };

        tracing::info!("🔧 Fixing: {}", record.service.name);
        tracing::info!("   New address: {}", corrected);

        let mut result = client.geocode(corrected).await;
        if let Some(coords) = result.coordinates {
            result.accuracy = Accuracy::ManualFix;
            tracing::info!(
                "   ✓ Success: ({:.6}, {:.6})",
                coords.latitude,
                coords.longitude
            );
            record.geocode = Some(result);
            fixed += 1;
        } else {
            tracing::warn!("   ✗ Still failed");
        }
    }

    fixed
}

pub fn summarize(
    dataset: &Dataset,
    skipped: usize,
    manually_fixed: usize,
    requests_issued: usize,
) -> RunSummary {
    let mut summary = RunSummary {
        total: dataset.len(),
        skipped,
        manually_fixed,
        requests_issued,
        ..Default::default()
    };

    let mut by_group: Vec<(String, GroupStats)> = Vec::new();

    for record in &dataset.records {
        let resolved = record.is_resolved();

        if resolved {
            summary.resolved += 1;
        } else {
            match record.accuracy() {
                Some(Accuracy::Failed) => summary.failed += 1,
                Some(Accuracy::Error) => summary.error += 1,
                _ => {}
            }
            summary.unresolved.push(UnresolvedRow {
                group: record.service.source_group.clone(),
                name: record.service.name.clone(),
                address: build_address(&record.service),
                accuracy: record.accuracy(),
            });
        }

        if let Some(group) = record.service.source_group.as_deref() {
            let index = match by_group.iter().position(|(g, _)| g == group) {
                Some(index) => index,
                None => {
                    by_group.push((group.to_string(), GroupStats::default()));
                    by_group.len() - 1
                }
            };
            let stats = &mut by_group[index].1;
            stats.total += 1;
            if resolved {
                stats.resolved += 1;
            }
        }
    }

    summary.by_group = by_group;
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geocode_client::RetryPolicy;
    use crate::domain::model::{EnrichedRecord, Location};
    use crate::domain::ports::LookupError;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};
    use std::time::{Duration, Instant};

    fn service(name: &str, address: &str, postcode: Option<&str>, group: Option<&str>) -> ServiceRecord {
        ServiceRecord {
            name: name.to_string(),
            address: Some(address.to_string()),
            postcode: postcode.map(String::from),
            source_group: group.map(String::from),
            ..Default::default()
        }
    }

    fn located(lat: f64, lon: f64) -> GeocodeResult {
        GeocodeResult::located(
            Location {
                latitude: lat,
                longitude: lon,
                display_name: "somewhere".to_string(),
            },
            "Nominatim",
        )
    }

    #[test]
    fn test_fill_states_prefers_postcode_then_label() {
        let mut dataset = Dataset {
            columns: vec!["Name".to_string()],
            records: vec![
                EnrichedRecord::unresolved(service("A", "1 Rd", Some("3141"), Some("Sydney_clean"))),
                EnrichedRecord::unresolved(service("B", "2 Rd", None, Some("Darwin_clean"))),
                EnrichedRecord::unresolved(service("C", "3 Rd", Some("9999"), None)),
            ],
        };
        let mut kept = service("D", "4 Rd", Some("5006"), None);
        kept.state = Some("South Australia".to_string());
        dataset.records.push(EnrichedRecord::unresolved(kept));

        assert_eq!(fill_states(&mut dataset), 3);

        let states: Vec<_> = dataset
            .records
            .iter()
            .map(|r| r.service.state.clone().unwrap())
            .collect();
        assert_eq!(states, vec!["VIC", "NT", "Australia", "South Australia"]);
        assert!(dataset.columns.iter().any(|c| c == COL_STATE));
    }

    #[test]
    fn test_apply_checkpoint_matches_name_and_address() {
        let mut dataset = Dataset {
            columns: vec![],
            records: vec![
                EnrichedRecord::unresolved(service("Redkite SA", "202 Greenhill Road", None, None)),
                EnrichedRecord::unresolved(service("Redkite SA", "Other Street", None, None)),
                EnrichedRecord::unresolved(service("New Clinic", "9 New St", None, None)),
            ],
        };
        let checkpoint = Dataset {
            columns: vec![],
            records: vec![
                EnrichedRecord {
                    service: service(" redkite sa ", "202 GREENHILL ROAD", None, None),
                    geocode: Some(located(-34.94, 138.62)),
                },
                EnrichedRecord {
                    service: service("New Clinic", "9 New St", None, None),
                    geocode: Some(GeocodeResult::no_match("Nominatim")),
                },
            ],
        };

        assert_eq!(apply_checkpoint(&mut dataset, &checkpoint), 1);
        assert!(dataset.records[0].is_resolved());
        assert!(!dataset.records[1].is_resolved());
        assert_eq!(dataset.records[2].geocode, None);
    }

    #[test]
    fn test_summarize_counts_and_groups() {
        let dataset = Dataset {
            columns: vec![],
            records: vec![
                EnrichedRecord {
                    service: service("A", "1 Rd", None, Some("Perth")),
                    geocode: Some(located(-31.9, 115.8)),
                },
                EnrichedRecord {
                    service: service("B", "2 Rd", None, Some("Perth")),
                    geocode: Some(GeocodeResult::no_match("Nominatim")),
                },
                EnrichedRecord {
                    service: service("C", "3 Rd", None, Some("Hobart")),
                    geocode: Some(GeocodeResult::error("Nominatim")),
                },
            ],
        };

        let summary = summarize(&dataset, 0, 0, 5);

        assert_eq!(summary.total, 3);
        assert_eq!(summary.resolved, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.error, 1);
        assert_eq!(summary.success_rate_display(), "33.3%");
        assert_eq!(summary.by_group[0].0, "Perth");
        assert_eq!(summary.by_group[0].1, GroupStats { total: 2, resolved: 1 });
        assert_eq!(summary.by_group[1].1, GroupStats { total: 1, resolved: 0 });
        let names: Vec<_> = summary.unresolved.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, vec!["B", "C"]);
    }

    struct FixGeocoder {
        calls: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Geocoder for FixGeocoder {
        async fn lookup(&self, address: &str) -> Result<Option<Location>, LookupError> {
            self.calls.lock().unwrap().push(address.to_string());
            if address.starts_with("202 Greenhill Road") {
                Ok(Some(Location {
                    latitude: -34.9447,
                    longitude: 138.6273,
                    display_name: "Greenhill Road, Eastwood".to_string(),
                }))
            } else {
                Ok(None)
            }
        }

        fn provider_name(&self) -> &str {
            "Nominatim"
        }
    }

    #[derive(Clone)]
    struct InstantClock(Arc<Mutex<Instant>>);

    impl Clock for InstantClock {
        fn now(&self) -> Instant {
            *self.0.lock().unwrap()
        }

        async fn sleep(&self, duration: Duration) {
            *self.0.lock().unwrap() += duration;
        }
    }

    #[tokio::test]
    async fn test_manual_fixes_only_touch_unresolved_named_rows() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut client = GeocodeClient::new(
            FixGeocoder { calls: calls.clone() },
            InstantClock(Arc::new(Mutex::new(Instant::now()))),
            RetryPolicy::default(),
        );

        let mut dataset = Dataset {
            columns: vec![],
            records: vec![
                EnrichedRecord {
                    service: service("Redkite SA", "bad address", None, None),
                    geocode: Some(GeocodeResult::no_match("Nominatim")),
                },
                EnrichedRecord {
                    service: service("UniSA Psychology Clinic", "bad", None, None),
                    geocode: Some(GeocodeResult::error("Nominatim")),
                },
                EnrichedRecord {
                    service: service("Look Good Feel Better SA", "fine", None, None),
                    geocode: Some(located(-34.9, 138.6)),
                },
                EnrichedRecord {
                    service: service("Not In Table", "bad", None, None),
                    geocode: Some(GeocodeResult::no_match("Nominatim")),
                },
            ],
        };

        let mut fixes = BTreeMap::new();
        fixes.insert(
            "Redkite SA".to_string(),
            "202 Greenhill Road, Eastwood SA 5063, Australia".to_string(),
        );
        fixes.insert(
            "UniSA Psychology Clinic".to_string(),
            "St Bernards Road, Magill SA 5072, Australia".to_string(),
        );
        fixes.insert(
            "Look Good Feel Better SA".to_string(),
            "202 Greenhill Road, Eastwood SA 5063, Australia".to_string(),
        );

        let fixed = apply_manual_fixes(&mut client, &mut dataset, &fixes).await;

        assert_eq!(fixed, 1);
        assert_eq!(dataset.records[0].accuracy(), Some(Accuracy::ManualFix));
        assert!(dataset.records[0].is_resolved());
        // 修正失敗時保留原結果
        assert_eq!(dataset.records[1].accuracy(), Some(Accuracy::Error));
        assert_eq!(dataset.records[2].accuracy(), Some(Accuracy::High));
        assert_eq!(calls.lock().unwrap().len(), 2);
    }
}
