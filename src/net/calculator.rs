//! Calculator and history endpoints.
//!
//! Guests and signed-in users share `calculate` and `history`; the backend
//! scopes rows by session or user and enforces the guest quotas. Clearing and
//! deleting history require a signed-in user.

#[cfg(test)]
#[path = "calculator_test.rs"]
mod calculator_test;

use super::api::ApiClient;
use super::types::{Ack, ApiError, CalculationRequest, CalculationResult, HistoryEntry};

const CALCULATE_PATH: &str = "/calculate/";
const HISTORY_PATH: &str = "/history/";
const CLEAR_HISTORY_PATH: &str = "/history/clear/";

fn history_item_path(id: i64) -> String {
    format!("/history/{id}/")
}

impl ApiClient {
    /// `POST /calculate/`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Invalid`] for non-finite operands without a network
    /// call; division by zero and guest limits come back as [`ApiError::Status`].
    pub async fn calculate(&self, request: &CalculationRequest) -> Result<CalculationResult, ApiError> {
        request.validate()?;
        self.post_json(CALCULATE_PATH, request).await
    }

    /// `GET /history/`, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or rows cannot be decoded.
    pub async fn history(&self) -> Result<Vec<HistoryEntry>, ApiError> {
        self.get_json(HISTORY_PATH).await
    }

    /// `DELETE /history/clear/`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the user is not signed in.
    pub async fn clear_history(&self) -> Result<Ack, ApiError> {
        self.delete_json(CLEAR_HISTORY_PATH).await
    }

    /// `DELETE /history/{id}/`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Status`] (404) when the row does not belong to the user.
    pub async fn delete_history_item(&self, id: i64) -> Result<Ack, ApiError> {
        self.delete_json(&history_item_path(id)).await
    }
}
