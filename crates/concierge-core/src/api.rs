//! The `{success, data, message, error}` envelope every API route answers with.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};

/// Failure text when the server gave none.
pub const REQUEST_FAILED: &str = "API request failed";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    #[serde(default)]
    pub success: bool,
    pub data: Option<T>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl<T> ApiEnvelope<T> {
    /// The server's non-blank `error` text. `message` is confirmation text, never a reason.
    pub fn reason(&self) -> Option<&str> {
        self.error
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// `data` of a successful envelope; `CoreError::Api` otherwise.
    pub fn into_data(self) -> CoreResult<T> {
        if !self.success {
            return Err(CoreError::Api(
                self.reason().unwrap_or(REQUEST_FAILED).to_string(),
            ));
        }
        self.data
            .ok_or_else(|| CoreError::Api("response carried no data".to_string()))
    }

    /// Success check for routes that answer with only a `message`.
    pub fn into_message(self) -> CoreResult<Option<String>> {
        if self.success {
            Ok(self.message)
        } else {
            Err(CoreError::Api(
                self.reason().unwrap_or(REQUEST_FAILED).to_string(),
            ))
        }
    }
}
