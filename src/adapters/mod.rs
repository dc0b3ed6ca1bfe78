// Adapters layer: concrete implementations for external systems (geocoding API, filesystem, table formats).

pub mod nominatim;
pub mod storage;
pub mod table;
