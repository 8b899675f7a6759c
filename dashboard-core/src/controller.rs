//! Weather acquisition and view-state reconciliation.
//!
//! The [`Controller`] runs as a single task that owns the [`ViewState`].
//! It reacts to commands (position resolved, toggle) and fetch completions
//! one at a time, re-evaluates the fetch triggers after each, and publishes
//! a snapshot for renderers over a watch channel.
//!
//! Fetch triggers are level-triggered: a slot is fetched whenever a position
//! is known and the slot is still `NotRequested`. A slot that settles never
//! goes back to `NotRequested`, so each slot is fetched exactly once.

use std::{future::Future, sync::Arc};

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::{
    error::{ControllerStopped, FetchError},
    model::{CurrentConditions, ForecastList, Position},
    provider::WeatherSource,
    state::{SlotState, ViewState},
};

/// Input from the position provider and the renderer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    ResolvePosition(Position),
    ToggleForecast,
}

#[derive(Debug)]
enum Completion {
    Current(Result<CurrentConditions, FetchError>),
    Forecast(Result<ForecastList, FetchError>),
}

pub struct Controller {
    source: Arc<dyn WeatherSource>,
    position: Option<Position>,
    state: ViewState,
    commands: mpsc::UnboundedReceiver<Command>,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions: mpsc::UnboundedReceiver<Completion>,
    view: watch::Sender<ViewState>,
    lifetime: CancellationToken,
}

/// Cheap, cloneable access to a running controller.
///
/// The controller stops when [`ControllerHandle::shutdown`] is called or
/// every handle has been dropped; in-flight fetches are cancelled with it.
#[derive(Debug, Clone)]
pub struct ControllerHandle {
    commands: mpsc::UnboundedSender<Command>,
    view: watch::Receiver<ViewState>,
    lifetime: CancellationToken,
}

impl Controller {
    pub fn new(source: Arc<dyn WeatherSource>) -> (Self, ControllerHandle) {
        let (commands_tx, commands) = mpsc::unbounded_channel();
        let (completions_tx, completions) = mpsc::unbounded_channel();
        let (view, view_rx) = watch::channel(ViewState::default());
        let lifetime = CancellationToken::new();

        let handle = ControllerHandle {
            commands: commands_tx,
            view: view_rx,
            lifetime: lifetime.clone(),
        };

        let controller = Self {
            source,
            position: None,
            state: ViewState::default(),
            commands,
            completions_tx,
            completions,
            view,
            lifetime,
        };

        (controller, handle)
    }

    /// Start a controller on the current tokio runtime.
    pub fn spawn(source: Arc<dyn WeatherSource>) -> ControllerHandle {
        let (controller, handle) = Self::new(source);
        tokio::spawn(controller.run());
        handle
    }

    pub async fn run(mut self) {
        tracing::debug!("weather controller started");

        loop {
            tokio::select! {
                biased;

                _ = self.lifetime.cancelled() => break,
                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
                Some(done) = self.completions.recv() => self.handle_completion(done),
            }

            self.reconcile();
            self.publish();
        }

        self.lifetime.cancel();
        tracing::debug!("weather controller stopped");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::ResolvePosition(position) => match self.position {
                Some(known) => {
                    tracing::warn!(
                        %known,
                        ignored = %position,
                        "position already resolved, ignoring"
                    );
                }
                None => {
                    tracing::info!(%position, "position resolved");
                    self.position = Some(position);
                }
            },
            Command::ToggleForecast => {
                self.state.show_forecast = !self.state.show_forecast;
                tracing::debug!(show_forecast = self.state.show_forecast, "view toggled");
            }
        }
    }

    fn handle_completion(&mut self, done: Completion) {
        match done {
            Completion::Current(result) => {
                log_settled("current", &result);
                self.state.current.settle(result);
            }
            Completion::Forecast(result) => {
                log_settled("forecast", &result);
                self.state.forecast.settle(result);
            }
        }
    }

    /// Start every fetch whose trigger condition holds.
    fn reconcile(&mut self) {
        let Some(position) = self.position else {
            return;
        };

        if matches!(self.state.current, SlotState::NotRequested) {
            self.state.current = SlotState::Loading;
            let source = Arc::clone(&self.source);
            self.spawn_fetch("current", async move {
                Completion::Current(source.current(position).await)
            });
        }

        if matches!(self.state.forecast, SlotState::NotRequested) {
            self.state.forecast = SlotState::Loading;
            let source = Arc::clone(&self.source);
            self.spawn_fetch("forecast", async move {
                Completion::Forecast(source.forecast(position).await)
            });
        }
    }

    fn spawn_fetch<F>(&self, kind: &'static str, fetch: F)
    where
        F: Future<Output = Completion> + Send + 'static,
    {
        let token = self.lifetime.child_token();
        let done_tx = self.completions_tx.clone();

        tracing::debug!(kind, "fetch started");
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => tracing::debug!(kind, "fetch cancelled"),
                done = fetch => {
                    // Controller already gone: nothing left to update.
                    let _ = done_tx.send(done);
                }
            }
        });
    }

    fn publish(&self) {
        let state = &self.state;
        self.view.send_if_modified(|published| {
            if published == state {
                false
            } else {
                *published = state.clone();
                true
            }
        });
    }
}

fn log_settled<T>(kind: &'static str, result: &Result<T, FetchError>) {
    match result {
        Ok(_) => tracing::info!(kind, "fetch settled"),
        Err(err) => tracing::warn!(kind, error = %err, "fetch failed"),
    }
}

impl ControllerHandle {
    /// Hand the controller the position from the position provider.
    pub fn resolve_position(&self, position: Position) -> Result<(), ControllerStopped> {
        self.send(Command::ResolvePosition(position))
    }

    /// Flip between today's view and the forecast. Never triggers a fetch.
    pub fn toggle_forecast(&self) -> Result<(), ControllerStopped> {
        self.send(Command::ToggleForecast)
    }

    pub fn send(&self, command: Command) -> Result<(), ControllerStopped> {
        self.commands.send(command).map_err(|_| ControllerStopped)
    }

    /// Latest published view state.
    pub fn view(&self) -> ViewState {
        self.view.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ViewState> {
        self.view.clone()
    }

    /// Wait until the published view state satisfies `predicate`.
    pub async fn wait_for(
        &self,
        predicate: impl FnMut(&ViewState) -> bool,
    ) -> Result<ViewState, ControllerStopped> {
        let mut view = self.view.clone();
        let state = view.wait_for(predicate).await.map_err(|_| ControllerStopped)?;
        Ok(state.clone())
    }

    /// Wait until both fetches have settled.
    pub async fn settled(&self) -> Result<ViewState, ControllerStopped> {
        self.wait_for(ViewState::is_settled).await
    }

    /// Tear the controller down, cancelling in-flight fetches.
    pub fn shutdown(&self) {
        self.lifetime.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.lifetime.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{model::ForecastEntry, state::Content};
    use async_trait::async_trait;
    use serde_json::{Map, json};
    use std::{
        sync::{
            Mutex,
            atomic::{AtomicUsize, Ordering},
        },
        time::Duration,
    };
    use tokio::{sync::oneshot, time::timeout};

    type CurrentReply = oneshot::Sender<Result<CurrentConditions, FetchError>>;
    type ForecastReply = oneshot::Sender<Result<ForecastList, FetchError>>;

    /// Source whose replies are released by the test.
    #[derive(Debug, Default)]
    struct ScriptedSource {
        current_calls: AtomicUsize,
        forecast_calls: AtomicUsize,
        current_reply: Mutex<Option<oneshot::Receiver<Result<CurrentConditions, FetchError>>>>,
        forecast_reply: Mutex<Option<oneshot::Receiver<Result<ForecastList, FetchError>>>>,
    }

    impl ScriptedSource {
        fn new() -> (Arc<Self>, CurrentReply, ForecastReply) {
            let (current_tx, current_rx) = oneshot::channel();
            let (forecast_tx, forecast_rx) = oneshot::channel();
            let source = Self {
                current_reply: Mutex::new(Some(current_rx)),
                forecast_reply: Mutex::new(Some(forecast_rx)),
                ..Self::default()
            };
            (Arc::new(source), current_tx, forecast_tx)
        }

        fn calls(&self) -> (usize, usize) {
            (
                self.current_calls.load(Ordering::SeqCst),
                self.forecast_calls.load(Ordering::SeqCst),
            )
        }
    }

    #[async_trait]
    impl WeatherSource for ScriptedSource {
        async fn current(&self, _position: Position) -> Result<CurrentConditions, FetchError> {
            self.current_calls.fetch_add(1, Ordering::SeqCst);
            let reply = self.current_reply.lock().unwrap().take();
            match reply {
                Some(rx) => rx.await.unwrap_or(Err(FetchError::Cancelled)),
                None => std::future::pending().await,
            }
        }

        async fn forecast(&self, _position: Position) -> Result<ForecastList, FetchError> {
            self.forecast_calls.fetch_add(1, Ordering::SeqCst);
            let reply = self.forecast_reply.lock().unwrap().take();
            match reply {
                Some(rx) => rx.await.unwrap_or(Err(FetchError::Cancelled)),
                None => std::future::pending().await,
            }
        }
    }

    fn niceville() -> Position {
        Position::new(30.49, -86.45).unwrap()
    }

    fn conditions() -> CurrentConditions {
        let fields = Map::from_iter([("main".to_string(), json!({ "temp": 21 }))]);
        CurrentConditions::from_object(fields).unwrap()
    }

    fn five_days() -> ForecastList {
        (1..=5)
            .map(|day| ForecastEntry {
                dt_txt: format!("2023-01-0{day} 09:00:00"),
                fields: Map::new(),
            })
            .collect()
    }

    async fn wait_for(
        handle: &ControllerHandle,
        predicate: impl FnMut(&ViewState) -> bool,
    ) -> ViewState {
        timeout(Duration::from_secs(5), handle.wait_for(predicate))
            .await
            .expect("timed out waiting for view state")
            .expect("controller stopped")
    }

    #[tokio::test]
    async fn no_position_means_no_fetch() {
        let (source, _current, _forecast) = ScriptedSource::new();
        let handle = Controller::spawn(source.clone());

        handle.toggle_forecast().unwrap();
        let view = wait_for(&handle, |v| v.show_forecast).await;

        assert!(!view.loading());
        assert_eq!(view.current, SlotState::NotRequested);
        assert_eq!(source.calls(), (0, 0));
    }

    #[tokio::test]
    async fn fetches_each_slot_once_per_position() {
        let (source, current, forecast) = ScriptedSource::new();
        let handle = Controller::spawn(source.clone());

        handle.resolve_position(niceville()).unwrap();
        wait_for(&handle, ViewState::loading).await;

        current.send(Ok(conditions())).unwrap();
        forecast.send(Ok(five_days())).unwrap();
        let view = wait_for(&handle, ViewState::is_settled).await;

        assert_eq!(source.calls(), (1, 1));
        assert!(!view.loading());
        assert_eq!(view.forecast_list().map(<[_]>::len), Some(5));

        // A second position and toggles do not refetch.
        handle.resolve_position(Position::new(1.0, 1.0).unwrap()).unwrap();
        handle.toggle_forecast().unwrap();
        let view = wait_for(&handle, |v| v.show_forecast).await;

        assert_eq!(source.calls(), (1, 1));
        assert!(matches!(view.content(), Content::Forecast(list) if list.len() == 5));
    }

    #[tokio::test]
    async fn loading_holds_until_last_fetch_settles_current_first() {
        let (source, current, forecast) = ScriptedSource::new();
        let handle = Controller::spawn(source);

        handle.resolve_position(niceville()).unwrap();
        wait_for(&handle, ViewState::loading).await;

        current.send(Ok(conditions())).unwrap();
        let view = wait_for(&handle, |v| v.current.is_settled()).await;
        assert!(view.loading());
        assert_eq!(view.content(), Content::Loading);

        forecast.send(Ok(five_days())).unwrap();
        let view = wait_for(&handle, ViewState::is_settled).await;
        assert!(!view.loading());
        assert!(matches!(view.content(), Content::Today(_)));
    }

    #[tokio::test]
    async fn loading_holds_until_last_fetch_settles_forecast_first() {
        let (source, current, forecast) = ScriptedSource::new();
        let handle = Controller::spawn(source);

        handle.resolve_position(niceville()).unwrap();
        wait_for(&handle, ViewState::loading).await;

        forecast.send(Err(FetchError::Empty)).unwrap();
        let view = wait_for(&handle, |v| v.forecast.is_settled()).await;
        assert!(view.loading());

        current.send(Ok(conditions())).unwrap();
        let view = wait_for(&handle, ViewState::is_settled).await;
        assert!(!view.loading());
        assert_eq!(view.forecast_error(), Some(&FetchError::Empty));
    }

    #[tokio::test]
    async fn server_error_is_an_error_state_not_data() {
        let (source, current, forecast) = ScriptedSource::new();
        let handle = Controller::spawn(source.clone());

        handle.resolve_position(niceville()).unwrap();
        current
            .send(Err(FetchError::Status { status: 500, body: "oops".into() }))
            .unwrap();
        forecast.send(Ok(five_days())).unwrap();

        let view = wait_for(&handle, ViewState::is_settled).await;

        assert!(!view.loading());
        assert!(view.current_conditions().is_none());
        assert!(matches!(view.current_error(), Some(FetchError::Status { status: 500, .. })));
        assert!(matches!(view.content(), Content::Failed(_)));
        // Failed slots are terminal.
        assert_eq!(source.calls(), (1, 1));
    }

    #[tokio::test]
    async fn source_side_cancellation_settles_the_slot() {
        let (source, current, forecast) = ScriptedSource::new();
        let handle = Controller::spawn(source);

        handle.resolve_position(niceville()).unwrap();
        drop(current);
        forecast.send(Ok(five_days())).unwrap();

        let view = wait_for(&handle, ViewState::is_settled).await;

        assert!(!view.loading());
        assert_eq!(view.current_error(), Some(&FetchError::Cancelled));
        assert!(matches!(view.content(), Content::Failed(FetchError::Cancelled)));
    }

    #[tokio::test]
    async fn shutdown_cancels_in_flight_fetches() {
        let (source, mut current, _forecast) = ScriptedSource::new();
        let handle = Controller::spawn(source);

        handle.resolve_position(niceville()).unwrap();
        wait_for(&handle, ViewState::loading).await;

        handle.shutdown();

        // The fetch future is dropped, releasing its reply channel.
        timeout(Duration::from_secs(5), current.closed())
            .await
            .expect("fetch was not cancelled");

        let stopped = timeout(Duration::from_secs(5), handle.wait_for(|_| false)).await.unwrap();
        assert_eq!(stopped, Err(ControllerStopped));

        assert!(handle.is_stopped());
        assert_eq!(handle.toggle_forecast(), Err(ControllerStopped));
        // Last snapshot is frozen; nothing is applied after teardown.
        assert!(handle.view().loading());
    }

    #[tokio::test]
    async fn dropping_every_handle_stops_the_controller() {
        let (source, mut current, _forecast) = ScriptedSource::new();
        let (controller, handle) = Controller::new(source);
        let task = tokio::spawn(controller.run());

        handle.resolve_position(niceville()).unwrap();
        drop(handle);

        timeout(Duration::from_secs(5), task).await.unwrap().unwrap();
        timeout(Duration::from_secs(5), current.closed()).await.unwrap();
    }
}
