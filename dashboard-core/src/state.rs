//! View state consumed by renderers.

use crate::{
    error::FetchError,
    model::{CurrentConditions, ForecastEntry, ForecastList},
};

/// Lifecycle of one independently fetched piece of data.
#[derive(Debug, Clone, PartialEq)]
pub enum SlotState<T> {
    NotRequested,
    Loading,
    Ready(T),
    Failed(FetchError),
}

// Written out so `Default` carries no `T: Default` bound.
impl<T> Default for SlotState<T> {
    fn default() -> Self {
        SlotState::NotRequested
    }
}

impl<T> SlotState<T> {
    pub fn is_loading(&self) -> bool {
        matches!(self, SlotState::Loading)
    }

    /// True once the fetch has settled, either way.
    pub fn is_settled(&self) -> bool {
        matches!(self, SlotState::Ready(_) | SlotState::Failed(_))
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            SlotState::Ready(data) => Some(data),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&FetchError> {
        match self {
            SlotState::Failed(err) => Some(err),
            _ => None,
        }
    }

    pub(crate) fn settle(&mut self, result: Result<T, FetchError>) {
        *self = match result {
            Ok(data) => SlotState::Ready(data),
            Err(err) => SlotState::Failed(err),
        };
    }
}

/// Everything a renderer needs.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ViewState {
    pub current: SlotState<CurrentConditions>,
    pub forecast: SlotState<ForecastList>,
    pub show_forecast: bool,
}

/// What the content area shows right now.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Content<'a> {
    Loading,
    Failed(&'a FetchError),
    Today(&'a CurrentConditions),
    Forecast(&'a [ForecastEntry]),
}

impl ViewState {
    /// True while at least one fetch is outstanding.
    pub fn loading(&self) -> bool {
        self.current.is_loading() || self.forecast.is_loading()
    }

    /// Both fetches have settled.
    pub fn is_settled(&self) -> bool {
        self.current.is_settled() && self.forecast.is_settled()
    }

    pub fn current_conditions(&self) -> Option<&CurrentConditions> {
        self.current.data()
    }

    pub fn forecast_list(&self) -> Option<&[ForecastEntry]> {
        self.forecast.data().map(Vec::as_slice)
    }

    pub fn current_error(&self) -> Option<&FetchError> {
        self.current.error()
    }

    pub fn forecast_error(&self) -> Option<&FetchError> {
        self.forecast.error()
    }

    /// Select what to render.
    ///
    /// Loading, or current conditions not yet in, shows the loading
    /// indicator whichever view is toggled.
    pub fn content(&self) -> Content<'_> {
        if self.loading() {
            return Content::Loading;
        }

        let current = match &self.current {
            SlotState::NotRequested | SlotState::Loading => return Content::Loading,
            SlotState::Failed(err) => return Content::Failed(err),
            SlotState::Ready(current) => current,
        };

        if !self.show_forecast {
            return Content::Today(current);
        }

        match &self.forecast {
            SlotState::Ready(list) => Content::Forecast(list),
            SlotState::Failed(err) => Content::Failed(err),
            SlotState::NotRequested | SlotState::Loading => Content::Loading,
        }
    }
}
