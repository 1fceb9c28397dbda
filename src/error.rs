use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(String),

    #[error("quote source '{url}' returned unexpected status code {status}")]
    QuoteStatus { url: String, status: u16 },

    #[error("quote decode error: {0}")]
    QuoteDecode(String),

    #[error("price fetch for '{asset_id}' timed out after {timeout_ms}ms")]
    FetchTimeout { asset_id: String, timeout_ms: u64 },

    #[error("non-finite price {value} for '{asset_id}'")]
    NonFinitePrice { asset_id: String, value: f64 },

    #[error("unknown asset '{0}': no quote summary id configured")]
    UnknownAsset(String),

    #[error("watch store error: {0}")]
    Store(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}
