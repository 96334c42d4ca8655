use std::collections::BTreeMap;
use std::sync::OnceLock;

/// States-and-cities lookup data, embedded at compile time so the binary
/// has no runtime file dependency. BTreeMap keeps state listing stable.
static STATES_CITIES: OnceLock<BTreeMap<String, Vec<String>>> = OnceLock::new();

const RAW_DATA: &str = include_str!("../../data/states_cities.json");

fn dataset() -> &'static BTreeMap<String, Vec<String>> {
    STATES_CITIES.get_or_init(|| {
        serde_json::from_str(RAW_DATA).unwrap_or_else(|e| {
            // The dataset ships inside the binary; failing to parse it is a
            // build defect, not a runtime condition.
            panic!("embedded states_cities.json is invalid: {e}")
        })
    })
}

pub fn states() -> Vec<&'static str> {
    dataset().keys().map(String::as_str).collect()
}

pub fn cities_of(state: &str) -> Option<&'static [String]> {
    dataset().get(state).map(Vec::as_slice)
}
