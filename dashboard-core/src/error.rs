use thiserror::Error;

/// Why a fetch did not produce data.
///
/// Stored in view state when a slot fails, so it stays `Clone` and carries
/// rendered messages rather than transport error values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Network(String),

    #[error("server responded with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unexpected response body: {0}")]
    MalformedBody(String),

    #[error("response contained no data")]
    Empty,

    /// Reported by sources that abort a request on their own. Controller
    /// teardown drops in-flight fetches instead and never produces it.
    #[error("fetch cancelled")]
    Cancelled,
}

impl FetchError {
    /// Short message suitable for showing in place of the content area.
    pub fn user_message(&self) -> &'static str {
        match self {
            FetchError::Network(_) => "Unable to reach the weather service. Check your connection.",
            FetchError::Status { status, .. } if *status == 401 => {
                "The weather service rejected the API key."
            }
            FetchError::Status { status, .. } if *status >= 500 => {
                "The weather service is having trouble. Try again later."
            }
            FetchError::Status { .. } => "The weather request failed.",
            FetchError::MalformedBody(_) => "The weather service sent an unexpected response.",
            FetchError::Empty => "No weather data is available for this location.",
            FetchError::Cancelled => "The request was cancelled.",
        }
    }
}

impl From<reqwest::Error> for FetchError {
    /// The request URL carries the API key in its query, so it is dropped.
    fn from(err: reqwest::Error) -> Self {
        let err = err.without_url();
        if err.is_timeout() {
            FetchError::Network(format!("timed out: {err}"))
        } else {
            FetchError::Network(err.to_string())
        }
    }
}

/// Position acquisition errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LocationError {
    #[error("no position available")]
    Unavailable,

    #[error("invalid coordinates ({latitude}, {longitude})")]
    InvalidCoordinates { latitude: f64, longitude: f64 },
}

/// The controller behind a handle is gone (torn down or finished).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("weather controller has stopped")]
pub struct ControllerStopped;
