//! Market data for charting: quotes, candle series with RSI indicators and
//! symbol search, served from a priority list of upstream providers with a
//! mock fallback.

pub mod config;
pub mod data;
pub mod error;
pub mod indicators;
pub mod mock;
pub mod orchestrator;
pub mod provider;
pub mod routes;
