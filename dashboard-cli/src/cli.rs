use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use clap::{Args, Parser, Subcommand};
use inquire::{Password, Select, Text};
use weather_dashboard_core::{
    Config, Content, Controller, ControllerHandle, FixedPosition, Position, PositionProvider,
    ViewState, config::DEFAULT_API_URL, source_from_settings,
};

use crate::render::{render, toggle_label};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather-dashboard", version, about = "Today's weather and a 5 day forecast")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store the API key, base URL and default location.
    Configure,

    /// Fetch once and print today's conditions or the forecast.
    Show {
        #[command(flatten)]
        position: PositionArgs,

        /// Print the 5 day forecast instead of today's conditions.
        #[arg(long)]
        forecast: bool,
    },

    /// Interactive view with a toggle between today and the forecast.
    Dashboard {
        #[command(flatten)]
        position: PositionArgs,
    },
}

/// Coordinates given on the command line; fall back to the configured location.
#[derive(Debug, Args)]
pub struct PositionArgs {
    /// Latitude in degrees.
    #[arg(long, requires = "lon", allow_negative_numbers = true)]
    pub lat: Option<f64>,

    /// Longitude in degrees.
    #[arg(long, requires = "lat", allow_negative_numbers = true)]
    pub lon: Option<f64>,
}

impl PositionArgs {
    fn position(&self) -> Result<Option<Position>> {
        match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => Ok(Some(Position::new(lat, lon)?)),
            _ => Ok(None),
        }
    }
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Configure => configure(),
            Command::Show { position, forecast } => {
                let (handle, mut view) = start(&position).await?;
                if forecast {
                    view = toggle(&handle, &view).await?;
                }
                println!("{}", render(&view));
                handle.shutdown();
                shown(&view)
            }
            Command::Dashboard { position } => dashboard(&position).await,
        }
    }
}

fn configure() -> Result<()> {
    let path = Config::config_file_path()?;
    let mut cfg = Config::load_from(&path)?;

    let api_key = Password::new("OpenWeather API key:")
        .without_confirmation()
        .prompt()
        .context("Failed to read API key")?;
    if !api_key.trim().is_empty() {
        cfg.api_key = Some(api_key.trim().to_string());
    }

    let current_url = cfg.api_url.clone().unwrap_or_else(|| DEFAULT_API_URL.to_string());
    let api_url = Text::new("API base URL:")
        .with_default(&current_url)
        .prompt()
        .context("Failed to read API base URL")?;
    cfg.api_url = (api_url.trim() != DEFAULT_API_URL).then(|| api_url.trim().to_string());

    let location = Text::new("Default location as `lat, lon` (leave empty to skip):")
        .prompt()
        .context("Failed to read default location")?;
    if !location.trim().is_empty() {
        cfg.set_location(parse_lat_lon(&location)?);
    }

    cfg.save_to(&path)?;
    println!("Saved configuration to {}", path.display());
    Ok(())
}

fn parse_lat_lon(input: &str) -> Result<Position> {
    let (lat, lon) = input
        .split_once(',')
        .ok_or_else(|| anyhow!("Expected `lat, lon`, got '{input}'"))?;

    let lat: f64 = lat.trim().parse().with_context(|| format!("Invalid latitude '{lat}'"))?;
    let lon: f64 = lon.trim().parse().with_context(|| format!("Invalid longitude '{lon}'"))?;

    Ok(Position::new(lat, lon)?)
}

/// Resolve the position, start the controller and wait for both fetches.
async fn start(args: &PositionArgs) -> Result<(ControllerHandle, ViewState)> {
    let config = Config::load()?;
    let settings = config.api_settings()?;
    let source = source_from_settings(&settings)?;

    let provider = FixedPosition::first_of(args.position()?, config.default_position()?);
    let position = provider.locate().await.context(
        "No position to show weather for.\n\
         Hint: pass --lat and --lon, or run `weather-dashboard configure` \
         to store a default location.",
    )?;

    tracing::info!(%position, base_url = %settings.base_url, "starting dashboard");
    let handle = Controller::spawn(Arc::new(source));
    handle.resolve_position(position)?;
    eprintln!("{}", render(&handle.view()));

    let view = handle.settled().await?;
    Ok((handle, view))
}

/// A view that ended in an error fails the command.
fn shown(view: &ViewState) -> Result<()> {
    match view.content() {
        Content::Failed(err) => Err(anyhow!("Weather fetch failed: {err}")),
        _ => Ok(()),
    }
}

async fn toggle(handle: &ControllerHandle, view: &ViewState) -> Result<ViewState> {
    let was = view.show_forecast;
    handle.toggle_forecast()?;
    Ok(handle.wait_for(|v| v.show_forecast != was).await?)
}

async fn dashboard(args: &PositionArgs) -> Result<()> {
    const QUIT: &str = "Quit";

    let (handle, mut view) = start(args).await?;

    loop {
        println!("\n{}\n", render(&view));

        let choice = Select::new("", vec![toggle_label(view.show_forecast), QUIT])
            .prompt()
            .context("Failed to read selection")?;
        if choice == QUIT {
            break;
        }

        view = toggle(&handle, &view).await?;
    }

    handle.shutdown();
    Ok(())
}
