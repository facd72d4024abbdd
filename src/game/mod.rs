//! Game backend module.
//!
//! A thin REST wrapper over the mini-app's API plus the JSON shapes it
//! returns.

mod client;
mod types;

pub use client::{ApiError, Endpoint, GameApi, INIT_DATA_HEADER, PROXY_CHECK_URL};
pub use types::{ClaimInfo, FarmInfo, LevelPrice, ProfileInfo};
