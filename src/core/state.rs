use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AustralianState {
    Nsw,
    Vic,
    Qld,
    Sa,
    Wa,
    Tas,
    Nt,
    /// No match; renders as the country name.
    Unknown,
}

impl AustralianState {
    pub fn code(&self) -> &'static str {
        match self {
            AustralianState::Nsw => "NSW",
            AustralianState::Vic => "VIC",
            AustralianState::Qld => "QLD",
            AustralianState::Sa => "SA",
            AustralianState::Wa => "WA",
            AustralianState::Tas => "TAS",
            AustralianState::Nt => "NT",
            AustralianState::Unknown => "Australia",
        }
    }

    pub fn is_known(&self) -> bool {
        *self != AustralianState::Unknown
    }
}

impl fmt::Display for AustralianState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

// 依序比對，下界包含、上界不包含
const POSTCODE_RANGES: [(u32, u32, AustralianState); 7] = [
    (2000, 3000, AustralianState::Nsw),
    (3000, 4000, AustralianState::Vic),
    (4000, 5000, AustralianState::Qld),
    (5000, 6000, AustralianState::Sa),
    (6000, 7000, AustralianState::Wa),
    (7000, 8000, AustralianState::Tas),
    (800, 900, AustralianState::Nt),
];

// "adelaid" also covers the truncated sheet name
const CITY_LABELS: [(&str, AustralianState); 7] = [
    ("sydney", AustralianState::Nsw),
    ("melbourne", AustralianState::Vic),
    ("brisbane", AustralianState::Qld),
    ("adelaid", AustralianState::Sa),
    ("perth", AustralianState::Wa),
    ("hobart", AustralianState::Tas),
    ("darwin", AustralianState::Nt),
];

pub fn state_for_postcode(postcode: Option<u32>) -> AustralianState {
    let Some(postcode) = postcode else {
        return AustralianState::Unknown;
    };

    POSTCODE_RANGES
        .iter()
        .find(|(lower, upper, _)| (*lower..*upper).contains(&postcode))
        .map(|(_, _, state)| *state)
        .unwrap_or(AustralianState::Unknown)
}

/// Case-insensitive substring match of a source label (e.g. a sheet name)
/// against the capital cities.
pub fn state_for_label(label: &str) -> AustralianState {
    let label = label.to_lowercase();

    CITY_LABELS
        .iter()
        .find(|(city, _)| label.contains(city))
        .map(|(_, state)| *state)
        .unwrap_or(AustralianState::Unknown)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_postcode_ranges() {
        assert_eq!(state_for_postcode(Some(5006)).code(), "SA");
        assert_eq!(state_for_postcode(Some(3141)).code(), "VIC");
        assert_eq!(state_for_postcode(Some(850)).code(), "NT");
        assert_eq!(state_for_postcode(Some(2000)).code(), "NSW");
        assert_eq!(state_for_postcode(Some(7999)).code(), "TAS");
        assert_eq!(state_for_postcode(Some(9999)).code(), "Australia");
        assert_eq!(state_for_postcode(Some(900)).code(), "Australia");
        assert_eq!(state_for_postcode(None).code(), "Australia");
    }

    #[test]
    fn test_city_labels() {
        assert_eq!(state_for_label("Sydney_clean"), AustralianState::Nsw);
        assert_eq!(state_for_label("MELBOURNE"), AustralianState::Vic);
        assert_eq!(state_for_label("Adelaid_clean"), AustralianState::Sa);
        assert_eq!(state_for_label("Greater Perth"), AustralianState::Wa);
        assert_eq!(state_for_label("Canberra"), AustralianState::Unknown);
        assert!(!state_for_label("").is_known());
    }
}
