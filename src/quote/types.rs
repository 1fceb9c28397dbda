use serde::Deserialize;

/// Deserialize string-encoded decimals (e.g. `"6321.44"`) to f64.
pub fn string_to_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    s.trim().parse::<f64>().map_err(serde::de::Error::custom)
}

/// Asset summary (GET /v2/assets/summary/{id}).
#[derive(Debug, Clone, Deserialize)]
pub struct AssetSummary {
    #[serde(default)]
    pub base: String,
    #[serde(default)]
    pub currency: String,
    #[serde(deserialize_with = "string_to_f64")]
    pub latest: f64,
}

#[derive(Debug, Deserialize)]
pub struct AssetSummaryResponse {
    pub data: AssetSummary,
}
