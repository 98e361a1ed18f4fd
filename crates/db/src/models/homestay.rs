//! Homestay listing model.

use lodging_core::del_state::DelStateId;
use lodging_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::SoftDelete;

/// Listing is hidden from guests.
pub const ROW_STATE_OFF_SHELF: i64 = 0;
/// Listing is bookable.
pub const ROW_STATE_ON_SHELF: i64 = 1;

/// Sold per room.
pub const ROW_TYPE_PER_ROOM: i64 = 0;
/// Sold per guest.
pub const ROW_TYPE_PER_PERSON: i64 = 1;

/// A row from the `homestay` table. Prices are in minor currency units.
#[derive(Debug, Clone, Default, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Homestay {
    pub id: DbId,
    pub create_time: Timestamp,
    pub update_time: Timestamp,
    pub delete_time: Option<Timestamp>,
    pub del_state: DelStateId,
    /// Bumped by every update.
    pub version: i64,
    pub title: String,
    pub sub_title: String,
    /// Carousel image URLs; the first one is the cover.
    pub banner: String,
    pub info: String,
    /// How many guests the listing holds.
    pub people_num: i64,
    pub homestay_business_id: DbId,
    /// Host user. Denormalized from the business.
    pub user_id: DbId,
    /// [`ROW_STATE_OFF_SHELF`] or [`ROW_STATE_ON_SHELF`].
    pub row_state: i64,
    /// [`ROW_TYPE_PER_ROOM`] or [`ROW_TYPE_PER_PERSON`].
    pub row_type: i64,
    pub food_info: String,
    pub food_price: i64,
    pub homestay_price: i64,
    pub market_homestay_price: i64,
}

impl SoftDelete for Homestay {
    fn del_state(&self) -> DelStateId {
        self.del_state
    }
}
