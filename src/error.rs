use thiserror::Error;

#[derive(Error, Debug)]
pub enum Rep365Error {
    #[error("API error: {0}")]
    Api(String),

    #[error("Rate limit exceeded{}", retry_after.map(|s| format!(" (retry after {}s)", s)).unwrap_or_default())]
    RateLimited { retry_after: Option<u64> },

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Record schema error: {0}")]
    Schema(String),

    #[error("Output shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("Reference table error: {0}")]
    ReferenceLoad(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Purge made no progress: {0}")]
    NoProgress(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("API token not found. Set the token environment variable or run 'rep365 config init'")]
    TokenNotFound,
}

pub type Result<T> = std::result::Result<T, Rep365Error>;

// Alias for backward compatibility
pub use Rep365Error as Error;

/// Parse an API error response body and provide helpful context
pub fn enhance_api_error(error_response: &str) -> String {
    // Try to parse as JSON to extract error details
    if let Ok(error_json) = serde_json::from_str::<serde_json::Value>(error_response) {
        if let Some(error_obj) = error_json.get("error") {
            let code = error_obj
                .get("code")
                .and_then(|c| c.as_str())
                .unwrap_or("Unknown");
            let message = error_obj
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("No message");

            let hint = match code {
                "Unauthorized" | "InvalidAuthenticationToken" => {
                    "\nHint: Your token may have expired. Refresh it and update the token environment variable."
                }
                "Forbidden" | "InsufficientPrivileges" => {
                    "\nHint: Check that your app registration has the required API permissions and admin consent is granted."
                }
                "NotFound" => {
                    "\nHint: The requested resource doesn't exist. Check IDs and resource names."
                }
                "TooManyRequests" => {
                    "\nHint: API rate limit exceeded. Lower [rate_limit] requests in the config or wait and retry."
                }
                _ => "",
            };

            return format!("{}: {}{}", code, message, hint);
        }
    }

    // If we can't parse it, return the raw error
    error_response.to_string()
}
