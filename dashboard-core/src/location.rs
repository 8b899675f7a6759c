//! Position acquisition.
//!
//! The controller only needs a position once; providers resolve it
//! asynchronously and the caller forwards the result.

use async_trait::async_trait;
use std::fmt::Debug;

use crate::{error::LocationError, model::Position};

#[async_trait]
pub trait PositionProvider: Send + Sync + Debug {
    async fn locate(&self) -> Result<Position, LocationError>;
}

/// Resolves to coordinates known up front (command line or config file).
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedPosition(Option<Position>);

impl FixedPosition {
    pub fn new(position: Option<Position>) -> Self {
        Self(position)
    }

    /// First available of `preferred` and `fallback`.
    pub fn first_of(preferred: Option<Position>, fallback: Option<Position>) -> Self {
        Self(preferred.or(fallback))
    }
}

#[async_trait]
impl PositionProvider for FixedPosition {
    async fn locate(&self) -> Result<Position, LocationError> {
        self.0.ok_or(LocationError::Unavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fixed_position_resolves() {
        let pos = Position::new(30.49, -86.45).unwrap();
        assert_eq!(FixedPosition::new(Some(pos)).locate().await, Ok(pos));
    }

    #[tokio::test]
    async fn missing_position_is_unavailable() {
        assert_eq!(FixedPosition::default().locate().await, Err(LocationError::Unavailable));
    }

    #[tokio::test]
    async fn command_line_wins_over_config() {
        let cli = Position::new(1.0, 2.0).unwrap();
        let stored = Position::new(3.0, 4.0).unwrap();

        assert_eq!(FixedPosition::first_of(Some(cli), Some(stored)).locate().await, Ok(cli));
        assert_eq!(FixedPosition::first_of(None, Some(stored)).locate().await, Ok(stored));
    }
}
