use crate::{
    error::SessionError,
    profile::{KindFilter, SelectedProfileInfo, TableColumn, TableRow},
    reconciler::{ChannelReconciler, InboundEvent, Transport},
    session::{SessionController, SessionInput, SessionOutput, UserIntent},
    system::{
        config::Configuration,
        events::{PresentationEvent, Presenter},
    },
    telemetry::{LiveSnapshot, RunProgress},
    types::{SessionState, Waypoint},
};
use embassy_futures::select::{select, Either};
use embassy_sync::{blocking_mutex::raw::NoopRawMutex, channel::Channel};
use log::{debug, info, warn};

pub const INBOUND_QUEUE_DEPTH: usize = 32;
pub const INTENT_QUEUE_DEPTH: usize = 8;

/// Raw events from all four channels, in receipt order.
pub type InboundQueue = Channel<NoopRawMutex, InboundEvent, INBOUND_QUEUE_DEPTH>;
pub type IntentQueue = Channel<NoopRawMutex, UserIntent, INTENT_QUEUE_DEPTH>;

/// The single writer of all session state. Channel events and user intents
/// are handled one at a time, to completion.
pub struct KilnSession<T: Transport, P: Presenter> {
    controller: SessionController,
    reconciler: ChannelReconciler,
    transport: T,
    presenter: P,
}

impl<T: Transport, P: Presenter> KilnSession<T, P> {
    pub fn new(transport: T, presenter: P) -> Self {
        Self {
            controller: SessionController::new(),
            reconciler: ChannelReconciler::new(),
            transport,
            presenter,
        }
    }

    pub async fn run(&mut self, inbound: &InboundQueue, intents: &IntentQueue) {
        info!("Starting session loop");

        loop {
            match select(inbound.receive(), intents.receive()).await {
                Either::First(event) => self.handle_channel_event(event),
                Either::Second(intent) => self.handle_intent(intent),
            }
        }
    }

    /// Handle whatever is already queued without waiting. Returns the number of
    /// events handled.
    pub fn drain(&mut self, inbound: &InboundQueue, intents: &IntentQueue) -> usize {
        let mut handled = 0;
        while let Ok(event) = inbound.try_receive() {
            self.handle_channel_event(event);
            handled += 1;
        }
        while let Ok(intent) = intents.try_receive() {
            self.handle_intent(intent);
            handled += 1;
        }
        handled
    }

    pub fn handle_channel_event(&mut self, event: InboundEvent) {
        match self.reconciler.inbound(event) {
            Ok(input) => self.dispatch(input),
            Err(err) => warn!("Dropping inbound message: {}", err),
        }
    }

    pub fn handle_intent(&mut self, intent: UserIntent) {
        debug!("User intent: {:?}", intent);
        self.dispatch(intent.into());
    }

    fn dispatch(&mut self, input: SessionInput) {
        for output in self.controller.handle_input(input) {
            match output {
                SessionOutput::Send { channel, message } => {
                    if let Err(err) = self.reconciler.outbound(&mut self.transport, channel, &message)
                    {
                        self.report(err);
                    }
                }
                SessionOutput::Present(event) => self.presenter.present(&event),
            }
        }
    }

    fn report(&mut self, err: SessionError) {
        warn!("{}", err);
        self.presenter.present(&PresentationEvent::Error(err));
    }

    // === collaborator surface ===

    pub fn displayed_waypoints(&self) -> Vec<Waypoint> {
        self.controller.displayed_waypoints()
    }

    pub fn live_series(&self) -> LiveSnapshot {
        self.controller.live_snapshot()
    }

    pub fn session_state(&self) -> SessionState {
        self.controller.state()
    }

    pub fn selected_profile_summary(&self) -> Option<SelectedProfileInfo> {
        self.controller.summary()
    }

    pub fn run_progress(&self) -> Option<RunProgress> {
        self.controller.progress()
    }

    pub fn profile_table(&self) -> Vec<TableRow> {
        self.controller.table()
    }

    pub fn configuration(&self) -> &Configuration {
        &self.controller.context().config
    }

    pub fn list_by_kind(&self, filter: KindFilter) -> Vec<(usize, String)> {
        self.controller.context().profiles.list_by_kind(filter)
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    // === intents ===

    pub fn select_profile(&mut self, name: &str) {
        self.handle_intent(UserIntent::SelectProfile(name.to_string()));
    }

    pub fn enter_new(&mut self) {
        self.handle_intent(UserIntent::EnterNew);
    }

    pub fn enter_edit(&mut self, name: &str) {
        self.handle_intent(UserIntent::EnterEdit(name.to_string()));
    }

    pub fn leave_edit(&mut self) {
        self.handle_intent(UserIntent::LeaveEdit);
    }

    pub fn save(&mut self, name: &str) {
        self.handle_intent(UserIntent::Save {
            name: name.to_string(),
        });
    }

    pub fn add_point(&mut self, temperature: f64) {
        self.handle_intent(UserIntent::AddPoint { temperature });
    }

    pub fn upsert_point(&mut self, index: usize, point: Waypoint) {
        self.handle_intent(UserIntent::UpsertPoint { index, point });
    }

    pub fn edit_cell(&mut self, row: usize, column: TableColumn, value: f64) {
        self.handle_intent(UserIntent::EditCell { row, column, value });
    }

    pub fn remove_point(&mut self) {
        self.handle_intent(UserIntent::RemovePoint);
    }

    pub fn run_firing(&mut self) {
        self.handle_intent(UserIntent::Run);
    }

    pub fn pause(&mut self) {
        self.handle_intent(UserIntent::Pause);
    }

    pub fn simulate(&mut self) {
        self.handle_intent(UserIntent::Simulate);
    }

    pub fn stop(&mut self) {
        self.handle_intent(UserIntent::Stop);
    }

    pub fn delete_selected(&mut self) {
        self.handle_intent(UserIntent::DeleteSelected);
    }

    pub fn confirm_overwrite(&mut self, confirmed: bool) {
        self.handle_intent(UserIntent::ConfirmOverwrite(confirmed));
    }
}
