//! Core library for the `weather-dashboard` CLI.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - The OpenWeather data source and the position providers
//! - Shared domain models (position, readings, forecast filtering)
//! - The controller that fetches once per position and reconciles view state
//!
//! It is used by `weather-dashboard`, but can also drive other front ends.

pub mod config;
pub mod controller;
pub mod error;
pub mod location;
pub mod model;
pub mod provider;
pub mod state;

pub use config::{ApiSettings, Config};
pub use controller::{Command, Controller, ControllerHandle};
pub use error::{ControllerStopped, FetchError, LocationError};
pub use location::{FixedPosition, PositionProvider};
pub use model::{
    CurrentConditions, ForecastEntry, ForecastList, Position, Reading, filter_morning_slot,
};
pub use provider::{OpenWeatherSource, WeatherSource, source_from_settings};
pub use state::{Content, SlotState, ViewState};
