use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::{
    config::ApiSettings,
    error::FetchError,
    model::{CurrentConditions, ForecastEntry, ForecastList, Position, filter_morning_slot},
};

use super::WeatherSource;

/// OpenWeather data API (`/weather` and `/forecast`), metric units.
#[derive(Debug, Clone)]
pub struct OpenWeatherSource {
    base_url: String,
    api_key: String,
    http: Client,
}

impl OpenWeatherSource {
    pub fn new(settings: &ApiSettings) -> anyhow::Result<Self> {
        let http = Client::builder().timeout(settings.timeout).build()?;

        Ok(Self {
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET `{base}{endpoint}` for `position` and return the body as a JSON object.
    async fn fetch_object(
        &self,
        endpoint: &str,
        position: Position,
    ) -> Result<Map<String, Value>, FetchError> {
        let url = format!("{}{}", self.base_url, endpoint);
        let lat = position.latitude.to_string();
        let lon = position.longitude.to_string();

        let res = self
            .http
            .get(&url)
            .query(&[
                ("lat", lat.as_str()),
                ("lon", lon.as_str()),
                ("units", "metric"),
                ("APPID", self.api_key.as_str()),
            ])
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            // The body only decorates the message; a failed read keeps the status.
            let body = res.text().await.unwrap_or_default();
            tracing::warn!(%url, %status, "weather request failed");
            return Err(FetchError::Status { status: status.as_u16(), body: truncate_body(&body) });
        }

        let body = res.text().await?;

        match serde_json::from_str::<Value>(&body) {
            Ok(Value::Object(object)) => Ok(object),
            Ok(_) => Err(FetchError::MalformedBody("expected a JSON object".to_string())),
            Err(err) => Err(FetchError::MalformedBody(err.to_string())),
        }
    }
}

#[derive(Debug, Deserialize)]
struct OwForecastResponse {
    list: Vec<ForecastEntry>,
}

#[async_trait]
impl WeatherSource for OpenWeatherSource {
    async fn current(&self, position: Position) -> Result<CurrentConditions, FetchError> {
        let object = self.fetch_object("/weather/", position).await?;
        CurrentConditions::from_object(object).ok_or(FetchError::Empty)
    }

    async fn forecast(&self, position: Position) -> Result<ForecastList, FetchError> {
        let object = self.fetch_object("/forecast", position).await?;
        if object.is_empty() {
            return Err(FetchError::Empty);
        }

        let parsed: OwForecastResponse = serde_json::from_value(Value::Object(object))
            .map_err(|err| FetchError::MalformedBody(err.to_string()))?;

        let list = filter_morning_slot(parsed.list);
        tracing::debug!(
            entries = list.len(),
            times = ?list.iter().map(ForecastEntry::key).collect::<Vec<_>>(),
            "forecast fetched"
        );

        Ok(list)
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() > MAX {
        let mut end = MAX;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &body[..end])
    } else {
        body.to_string()
    }
}
