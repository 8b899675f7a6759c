use async_trait::async_trait;
use std::fmt::Debug;

use crate::{
    config::ApiSettings,
    error::FetchError,
    model::{CurrentConditions, ForecastList, Position},
};

pub mod openweather;

pub use openweather::OpenWeatherSource;

/// Where the controller gets its data from.
///
/// Both calls are independent; the controller may have them in flight at
/// the same time and makes no assumption about completion order.
#[async_trait]
pub trait WeatherSource: Send + Sync + Debug {
    /// Current conditions at `position`.
    async fn current(&self, position: Position) -> Result<CurrentConditions, FetchError>;

    /// Forecast for `position`, already reduced to one morning reading per day.
    async fn forecast(&self, position: Position) -> Result<ForecastList, FetchError>;
}

/// Construct the HTTP source from resolved settings.
pub fn source_from_settings(settings: &ApiSettings) -> anyhow::Result<OpenWeatherSource> {
    OpenWeatherSource::new(settings)
}
