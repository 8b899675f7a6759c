//! Plain-text rendering of the view state.

use chrono::NaiveDateTime;
use weather_dashboard_core::{Content, ForecastEntry, Reading, ViewState};

/// Label of the toggle control for the view currently shown.
pub fn toggle_label(show_forecast: bool) -> &'static str {
    if show_forecast { "Todays forecast" } else { "5 day forecast" }
}

pub fn render(view: &ViewState) -> String {
    match view.content() {
        Content::Loading => "Loading..".to_string(),
        Content::Failed(err) => format!("{}\n({err})", err.user_message()),
        Content::Today(current) => {
            reading_block(current.location_name().unwrap_or("Current conditions"), current)
        }
        Content::Forecast([]) => "No forecast readings available.".to_string(),
        Content::Forecast(entries) => entries
            .iter()
            .map(|entry| reading_block(&forecast_heading(entry), entry))
            .collect::<Vec<_>>()
            .join("\n\n"),
    }
}

fn forecast_heading(entry: &ForecastEntry) -> String {
    match entry.timestamp() {
        Some(ts) => format_time(ts),
        None => entry.key().to_string(),
    }
}

fn format_time(ts: NaiveDateTime) -> String {
    ts.format("%A %d %b, %H:%M").to_string()
}

fn reading_block(heading: &str, reading: &impl Reading) -> String {
    let mut lines = vec![heading.to_string()];

    if let Some(description) = reading.description() {
        lines.push(format!("  {}", capitalize(description)));
    }
    lines.push(format!("  Temperature: {}", with_unit(reading.temperature(), "°C")));
    lines.push(format!("  Feels like:  {}", with_unit(reading.feels_like(), "°C")));
    lines.push(format!(
        "  Humidity:    {}",
        reading.humidity().map_or_else(|| "n/a".to_string(), |h| format!("{h}%"))
    ));
    lines.push(format!("  Wind:        {}", with_unit(reading.wind_speed(), " m/s")));

    lines.join("\n")
}

fn with_unit(value: Option<f64>, unit: &str) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{v:.1}{unit}"))
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
