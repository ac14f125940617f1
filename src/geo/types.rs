//! Geo lookup API response types.

use serde::Deserialize;

/// Body of an ip-api style `/json/{ip}?fields=status,countryCode` lookup.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoResponse {
    pub status: String,
    #[serde(default)]
    pub country_code: Option<String>,
}

impl GeoResponse {
    /// Country code of a successful lookup.
    pub fn country(self) -> Option<String> {
        if self.status != "success" {
            return None;
        }
        self.country_code.filter(|c| !c.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_success() {
        let resp: GeoResponse =
            serde_json::from_str(r#"{"status":"success","countryCode":"TW"}"#).unwrap();
        assert_eq!(resp.country().as_deref(), Some("TW"));
    }

    #[test]
    fn test_parse_fail() {
        let resp: GeoResponse =
            serde_json::from_str(r#"{"status":"fail","message":"reserved range"}"#).unwrap();
        assert!(resp.country().is_none());
    }
}
