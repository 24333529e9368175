//! Request and response shapes of the REST order service.
//!
//! Field names follow the backend's snake_case JSON.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Response to creating a new group order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCreated {
    pub order_id: String,
    pub user_id: String,
}

/// Response to joining an existing order.
///
/// The service only returns the participant and restaurant; `order_id` is
/// filled in by the join orchestrator with the canonical identifier it joined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinedOrder {
    #[serde(default)]
    pub order_id: String,
    pub user_id: String,
    pub restaurant_id: String,
}

/// One line of a participant's cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLineItem {
    pub id: String,
    pub name: String,
    pub price: f64,
    pub img_url: String,
    pub quantity: u32,
    #[serde(default)]
    pub ingredients: Vec<String>,
}

/// Add, update, or remove (`quantity == 0`) a product in a participant's cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderModification {
    pub product_id: String,
    pub quantity: u32,
    #[serde(default)]
    pub ingredients: Vec<String>,
}

impl OrderModification {
    pub fn is_removal(&self) -> bool {
        self.quantity == 0
    }
}

/// Response to resolving a short code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortCodeResolution {
    pub object_id: String,
}

/// Generic acknowledgement body (`{"message": "..."}` and similar).
pub type Ack = HashMap<String, String>;

/// Lowest accepted review rating.
pub const MIN_RATING: u8 = 1;
/// Highest accepted review rating.
pub const MAX_RATING: u8 = 5;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReviewError {
    #[error("rating {0} is outside {MIN_RATING}..={MAX_RATING}")]
    RatingOutOfRange(u8),
    #[error("restaurant id must not be empty")]
    MissingRestaurant,
}

/// A restaurant review submitted after the order completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewRequest {
    pub restaurant_id: String,
    pub rating: u8,
}

impl ReviewRequest {
    /// Builds a review, rejecting empty restaurants and out-of-range ratings.
    pub fn new(restaurant_id: impl Into<String>, rating: u8) -> Result<Self, ReviewError> {
        let restaurant_id = restaurant_id.into();
        if restaurant_id.trim().is_empty() {
            return Err(ReviewError::MissingRestaurant);
        }
        if !(MIN_RATING..=MAX_RATING).contains(&rating) {
            return Err(ReviewError::RatingOutOfRange(rating));
        }
        Ok(Self {
            restaurant_id,
            rating,
        })
    }
}
