//! Cached stores, one per table.

pub mod homestay_repo;

pub use homestay_repo::HomestayRepo;
