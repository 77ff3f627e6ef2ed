//! Upstream shelter feeds.
//!
//! Two [`ShelterSource`](shelter_core::source::ShelterSource)
//! implementations live here:
//!
//! - [`NaturalDisasterSource`] reads the city open-data JSON dataset. A
//!   payload that does not match the dataset shape fails the whole fetch.
//! - [`AirRaidSource`] reads a KML export. A placemark that cannot be mapped
//!   is logged and skipped; the rest of the batch is kept.

pub mod air_raid;
pub mod client;
pub mod flags;
pub mod natural;

pub use air_raid::AirRaidSource;
pub use client::HttpFetcher;
pub use natural::NaturalDisasterSource;
