use crate::domain::model::ServiceRecord;

pub const COUNTRY: &str = "Australia";

/// 組合送往 geocoder 的地址字串
///
/// Order: street address, suburb, state, postcode, country. Absent or blank
/// fields are dropped; a postcode that is not numeric is dropped too.
pub fn build_address(record: &ServiceRecord) -> String {
    let postcode = record.postcode_number().map(|p| p.to_string());

    [
        record.address.as_deref(),
        record.suburb.as_deref(),
        record.state.as_deref(),
        postcode.as_deref(),
        Some(COUNTRY),
    ]
    .into_iter()
    .flatten()
    .map(str::trim)
    .filter(|part| !part.is_empty())
    .collect::<Vec<_>>()
    .join(", ")
}
