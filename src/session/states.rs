//! Session state machine: Idle, Editing, Running, Paused
//! Fed by user intents and decoded channel messages; emits outbound channel
//! messages and presentation events.

use crate::error::SessionError;
use crate::profile::{
    apply_cell_edit, profile_table, ProfileModel, SelectedProfileInfo, TableColumn, TableRow,
};
use crate::protocol::{
    Backlog, ControlCommand, ControlVerb, OutboundMessage, SimulationSample, StorageCommand,
    StorageResponse,
};
use crate::reconciler::ChannelKind;
use crate::system::config::Configuration;
use crate::system::events::{Notification, PresentationEvent};
use crate::telemetry::{DeviceStatus, LiveSnapshot, RunProgress, TelemetryAggregator};
use crate::types::{DeviceState, SessionState, Waypoint, MAX_OUTPUTS_PER_INPUT};
use log::{debug, info, warn};
use statig::prelude::*;

// Intents from the user, already validated into typed values
#[derive(Debug, Clone, PartialEq)]
pub enum UserIntent {
    SelectProfile(String),
    EnterNew,
    EnterEdit(String),
    LeaveEdit,
    Save { name: String },
    AddPoint { temperature: f64 },
    UpsertPoint { index: usize, point: Waypoint },
    /// Edit one cell of the point table; `row` is 0-based, `value` in display units.
    EditCell { row: usize, column: TableColumn, value: f64 },
    RemovePoint,
    Run,
    Pause,
    Simulate,
    Stop,
    DeleteSelected,
    /// Answer to a storage name collision.
    ConfirmOverwrite(bool),
}

// Input events to the state machine
#[derive(Debug, Clone, PartialEq)]
pub enum SessionInput {
    User(UserIntent),

    // From the channel reconciler
    ChannelOpened(ChannelKind),
    ChannelClosed(ChannelKind),
    Backlog(Backlog),
    DeviceStatus(DeviceStatus),
    Simulation(SimulationSample),
    ConfigReceived(Configuration),
    Storage(StorageResponse),
}

impl From<UserIntent> for SessionInput {
    fn from(intent: UserIntent) -> Self {
        SessionInput::User(intent)
    }
}

// Output events from the state machine
#[derive(Debug, Clone, PartialEq)]
pub enum SessionOutput {
    Send {
        channel: ChannelKind,
        message: OutboundMessage,
    },
    Present(PresentationEvent),
}

// Shared context for the state machine
#[derive(Debug, Default)]
pub struct SessionContext {
    pub profiles: ProfileModel,
    pub telemetry: TelemetryAggregator,
    pub config: Configuration,

    last_status: Option<DeviceStatus>,
    last_device_state: Option<DeviceState>,
    stop_pending: bool,

    // Storage command awaiting a reply, and one awaiting an overwrite decision
    pending_storage: Option<StorageCommand>,
    awaiting_overwrite: Option<StorageCommand>,

    outputs: heapless::Vec<SessionOutput, MAX_OUTPUTS_PER_INPUT>,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last status report that was applied (never one received while editing).
    pub fn last_status(&self) -> Option<&DeviceStatus> {
        self.last_status.as_ref()
    }

    pub fn last_device_state(&self) -> Option<DeviceState> {
        self.last_device_state
    }

    pub fn stop_pending(&self) -> bool {
        self.stop_pending
    }

    pub fn awaiting_overwrite(&self) -> Option<&StorageCommand> {
        self.awaiting_overwrite.as_ref()
    }

    fn emit(&mut self, output: SessionOutput) {
        if let Err(dropped) = self.outputs.push(output) {
            warn!("Output buffer full, dropping {:?}", dropped);
        }
    }

    fn send(&mut self, channel: ChannelKind, message: OutboundMessage) {
        self.emit(SessionOutput::Send { channel, message });
    }

    fn present(&mut self, event: PresentationEvent) {
        self.emit(SessionOutput::Present(event));
    }

    fn notify(&mut self, notification: Notification) {
        self.present(PresentationEvent::Notify(notification));
    }

    /// Recoverable errors go to the user; the state is left as is.
    fn surface(&mut self, err: SessionError) {
        warn!("{}", err);
        self.notify(Notification::error("Error", &err.to_string()));
        self.present(PresentationEvent::Error(err));
    }
}

#[derive(Debug, Default)]
pub struct SessionStateMachine;

#[state_machine(
    initial = "State::idle()",
    state(derive(Debug)),
    on_transition = "Self::on_transition"
)]
impl SessionStateMachine {
    /// Nothing firing, not editing
    #[state]
    fn idle(context: &mut SessionContext, event: &SessionInput) -> Response<State> {
        use Response::*;

        match event {
            SessionInput::User(UserIntent::EnterNew) => {
                context.profiles.begin_new_profile();
                Self::enter_editing(context)
            }
            SessionInput::User(UserIntent::EnterEdit(name)) => {
                match context.profiles.begin_edit_profile(name) {
                    Ok(()) => Self::enter_editing(context),
                    Err(err) => {
                        context.surface(err);
                        Handled
                    }
                }
            }
            SessionInput::User(UserIntent::Run) => {
                Self::start_firing(context, ControlVerb::Run, State::running())
            }
            SessionInput::User(UserIntent::Pause) => {
                Self::start_firing(context, ControlVerb::Pause, State::paused())
            }
            SessionInput::User(UserIntent::Simulate) => {
                Self::start_firing(context, ControlVerb::Simulate, State::running())
            }
            SessionInput::User(UserIntent::Stop) => {
                // Nothing we know of is firing, but the device may disagree
                context.send(
                    ChannelKind::Control,
                    OutboundMessage::Control(ControlCommand::stop()),
                );
                Handled
            }
            SessionInput::User(UserIntent::DeleteSelected) => {
                Self::delete_selected(context);
                Handled
            }
            SessionInput::DeviceStatus(status) => {
                Self::follow_device(context, status, SessionState::Idle)
            }
            _ => Self::handle_common(context, event),
        }
    }

    /// Working copy open; device state changes are not followed
    #[state]
    fn editing(context: &mut SessionContext, event: &SessionInput) -> Response<State> {
        use Response::*;

        match event {
            SessionInput::User(UserIntent::LeaveEdit) => {
                context.profiles.discard_edit();
                Self::finish_edit(context)
            }
            SessionInput::User(UserIntent::Save { name }) => {
                match context.profiles.commit_working(name) {
                    Ok(profile) => {
                        info!("Saving profile '{}'", profile.name);
                        context.profiles.defer_selection(&profile.name);
                        let command = StorageCommand::put(profile);
                        context.pending_storage = Some(command.clone());
                        context.send(ChannelKind::Storage, OutboundMessage::Storage(command));
                        context.profiles.discard_edit();
                        Self::finish_edit(context)
                    }
                    Err(err) => {
                        context.surface(err);
                        Handled
                    }
                }
            }
            SessionInput::User(UserIntent::AddPoint { temperature }) => {
                let result = context.profiles.append_point(*temperature).map(|point| {
                    debug!("Added point {:?}", point);
                });
                Self::after_point_edit(context, result)
            }
            SessionInput::User(UserIntent::UpsertPoint { index, point }) => {
                let result = context.profiles.upsert_point(*index, *point);
                Self::after_point_edit(context, result)
            }
            SessionInput::User(UserIntent::EditCell { row, column, value }) => {
                let current = context
                    .profiles
                    .working_copy()
                    .and_then(|working| working.points.get(*row).copied());
                let result = match current {
                    Some(point) => {
                        let edited = apply_cell_edit(point, *column, *value, &context.config);
                        context.profiles.upsert_point(*row, edited)
                    }
                    None => Err(SessionError::InvalidProfile(format!(
                        "row {} does not exist",
                        row + 1
                    ))),
                };
                Self::after_point_edit(context, result)
            }
            SessionInput::User(UserIntent::RemovePoint) => {
                let result = context.profiles.remove_last_point().map(|removed| {
                    debug!("Removed point {:?}", removed);
                });
                Self::after_point_edit(context, result)
            }
            SessionInput::User(UserIntent::DeleteSelected) => {
                Self::delete_selected(context);
                context.profiles.discard_edit();
                context.present(PresentationEvent::EditModeChanged { editing: false });
                Transition(State::idle())
            }
            SessionInput::User(UserIntent::SelectProfile(name)) => {
                debug!("Selection of '{}' ignored while editing", name);
                Handled
            }
            SessionInput::DeviceStatus(status) => {
                debug!("Status '{}' suppressed while editing", status.state);
                Handled
            }
            _ => Self::handle_common(context, event),
        }
    }

    /// Device firing the selected profile (or simulating it)
    #[state]
    fn running(context: &mut SessionContext, event: &SessionInput) -> Response<State> {
        match event {
            SessionInput::User(UserIntent::Stop) => Self::stop_firing(context),
            SessionInput::DeviceStatus(status) => {
                Self::follow_device(context, status, SessionState::Running)
            }
            _ => Self::handle_common(context, event),
        }
    }

    #[state]
    fn paused(context: &mut SessionContext, event: &SessionInput) -> Response<State> {
        match event {
            SessionInput::User(UserIntent::Stop) => Self::stop_firing(context),
            SessionInput::DeviceStatus(status) => {
                Self::follow_device(context, status, SessionState::Paused)
            }
            _ => Self::handle_common(context, event),
        }
    }

    fn on_transition(&mut self, source: &State, target: &State) {
        let source_state = Self::state_to_session_state(source);
        let target_state = Self::state_to_session_state(target);

        if source_state != target_state {
            info!("Session state transition: {:?} -> {:?}", source_state, target_state);
        }
    }

    /// Convert internal State to SessionState for the external interface
    fn state_to_session_state(state: &State) -> SessionState {
        match state {
            State::Idle {} => SessionState::Idle,
            State::Editing {} => SessionState::Editing,
            State::Running {} => SessionState::Running,
            State::Paused {} => SessionState::Paused,
        }
    }
}

// Handlers shared between states
impl SessionStateMachine {
    /// Channel traffic and intents that behave the same in every state.
    fn handle_common(context: &mut SessionContext, event: &SessionInput) -> Response<State> {
        match event {
            SessionInput::ChannelOpened(channel) => {
                match channel {
                    ChannelKind::Status => {
                        context.notify(Notification::info("Initialising", "Status channel connected"))
                    }
                    ChannelKind::Config | ChannelKind::Storage => {
                        context.send(*channel, OutboundMessage::Get)
                    }
                    ChannelKind::Control => debug!("Control channel ready"),
                }
            }
            SessionInput::ChannelClosed(channel) => {
                if *channel == ChannelKind::Status {
                    context.notify(Notification::error(
                        "Status channel not available",
                        "The controller is not reachable",
                    ));
                }
                context.present(PresentationEvent::Error(SessionError::ChannelUnavailable(
                    *channel,
                )));
            }
            SessionInput::Backlog(backlog) => Self::apply_backlog(context, backlog),
            SessionInput::Simulation(sample) => {
                context.telemetry.append((*sample).into());
                context.present(PresentationEvent::LiveSeriesChanged);
            }
            SessionInput::ConfigReceived(config) => {
                info!("Configuration replaced: {:?}", config);
                context.config = config.clone();
                context.present(PresentationEvent::ConfigChanged(config.clone()));
                // Cost and display units depend on the configuration
                if let Some(summary) = context.profiles.summary(&context.config) {
                    context.present(PresentationEvent::ProfileSelected(summary));
                }
            }
            SessionInput::Storage(response) => Self::apply_storage(context, response),
            SessionInput::User(UserIntent::ConfirmOverwrite(confirmed)) => {
                match context.awaiting_overwrite.take() {
                    Some(command) if *confirmed => {
                        info!("Overwriting '{}'", command.profile.name);
                        let forced = command.forced();
                        context.pending_storage = Some(forced.clone());
                        context.send(ChannelKind::Storage, OutboundMessage::Storage(forced));
                        context.send(ChannelKind::Storage, OutboundMessage::Get);
                    }
                    Some(command) => info!("Overwrite of '{}' declined", command.profile.name),
                    None => warn!("No storage command is awaiting confirmation"),
                }
            }
            SessionInput::User(UserIntent::SelectProfile(name)) => {
                match context.profiles.select_profile(name, &context.config) {
                    Ok(summary) => {
                        context.present(PresentationEvent::ProfileSelected(summary));
                        context.present(PresentationEvent::WaypointsChanged);
                    }
                    Err(err) => context.surface(err),
                }
            }
            SessionInput::User(intent) => {
                info!("{:?} ignored in current state", intent);
            }
            SessionInput::DeviceStatus(status) => {
                debug!("Unhandled status {:?}", status);
            }
        }
        Response::Handled
    }

    fn apply_backlog(context: &mut SessionContext, backlog: &Backlog) {
        if let Some(hint) = &backlog.profile {
            info!("Controller is firing '{}'", hint.name);
            if context.profiles.apply_selection_hint(&hint.name) {
                if let Some(summary) = context.profiles.summary(&context.config) {
                    context.present(PresentationEvent::ProfileSelected(summary));
                    context.present(PresentationEvent::WaypointsChanged);
                }
            }
        }

        let replayed = context
            .telemetry
            .replay_backlog(backlog.log.iter().cloned().map(Into::into));
        if replayed > 0 {
            context.present(PresentationEvent::LiveSeriesChanged);
        }
    }

    fn apply_storage(context: &mut SessionContext, response: &StorageResponse) {
        match response {
            StorageResponse::Profiles(profiles) => {
                // Replies come in order, so any earlier command has been answered
                context.pending_storage = None;
                context.profiles.replace_profile_set(profiles.clone());
                context.present(PresentationEvent::ProfilesChanged {
                    names: context.profiles.names(),
                });
                match context.profiles.summary(&context.config) {
                    Some(summary) => context.present(PresentationEvent::ProfileSelected(summary)),
                    None => context.present(PresentationEvent::SelectionCleared),
                }
                if !context.profiles.is_editing() {
                    context.present(PresentationEvent::WaypointsChanged);
                }
            }
            reply if reply.is_conflict() => match context.pending_storage.take() {
                Some(command) => {
                    let name = command.profile.name.clone();
                    context.present(PresentationEvent::Error(SessionError::StorageConflict {
                        command: command.cmd.as_str(),
                        name: name.clone(),
                    }));
                    context.present(PresentationEvent::ConfirmOverwrite { name });
                    context.awaiting_overwrite = Some(command);
                }
                None => warn!("Storage conflict without a pending command"),
            },
            StorageResponse::Reply { resp } => {
                debug!("Storage replied '{}'", resp);
                context.pending_storage = None;
            }
        }
    }

    /// Apply a status report and follow the device into the state it reports.
    fn follow_device(
        context: &mut SessionContext,
        status: &DeviceStatus,
        current: SessionState,
    ) -> Response<State> {
        let Some(reported) = DeviceState::parse(&status.state) else {
            warn!("Unknown device state '{}'", status.state);
            return Response::Handled;
        };

        if context.last_device_state == Some(DeviceState::Running) && reported != DeviceState::Running
        {
            info!("Firing completed");
            context.notify(Notification::firing_completed());
        }
        context.last_device_state = Some(reported);
        context.last_status = Some(status.clone());

        match reported {
            DeviceState::Running => {
                context.telemetry.append(status.sample());
                context.present(PresentationEvent::LiveSeriesChanged);
            }
            DeviceState::Idle if context.stop_pending => {
                context.stop_pending = false;
                context.telemetry.reset();
                context.present(PresentationEvent::LiveSeriesChanged);
            }
            _ => {}
        }
        context.present(PresentationEvent::RunStatusChanged);

        if SessionState::from(reported) == current {
            return Response::Handled;
        }
        Response::Transition(match reported {
            DeviceState::Idle => State::idle(),
            DeviceState::Running => State::running(),
            DeviceState::Paused => State::paused(),
        })
    }

    fn start_firing(context: &mut SessionContext, verb: ControlVerb, target: State) -> Response<State> {
        let Some(profile) = context.profiles.selected_profile().cloned() else {
            let name = context.profiles.selected_name().unwrap_or("(none)").to_string();
            context.surface(SessionError::NotFound(name));
            return Response::Handled;
        };

        info!("{:?} with profile '{}'", verb, profile.name);
        context.telemetry.reset();
        context.stop_pending = false;
        context.send(
            ChannelKind::Control,
            OutboundMessage::Control(ControlCommand::start(verb, profile)),
        );
        context.present(PresentationEvent::LiveSeriesChanged);
        Response::Transition(target)
    }

    fn stop_firing(context: &mut SessionContext) -> Response<State> {
        info!("Stop requested");
        context.stop_pending = true;
        context.send(
            ChannelKind::Control,
            OutboundMessage::Control(ControlCommand::stop()),
        );
        Response::Transition(State::idle())
    }

    fn delete_selected(context: &mut SessionContext) {
        let Some(name) = context.profiles.selected_name().map(str::to_string) else {
            context.surface(SessionError::NotFound("(none)".to_string()));
            return;
        };

        info!("Deleting profile '{}'", name);
        let command = StorageCommand::delete(&name);
        context.pending_storage = Some(command.clone());
        context.send(ChannelKind::Storage, OutboundMessage::Storage(command));
        // The refreshed set no longer holds the name, so selection falls back to the first profile
        context.send(ChannelKind::Storage, OutboundMessage::Get);
    }

    fn enter_editing(context: &mut SessionContext) -> Response<State> {
        context.present(PresentationEvent::EditModeChanged { editing: true });
        context.present(PresentationEvent::WaypointsChanged);
        Response::Transition(State::editing())
    }

    /// Back to Idle after leaving or saving: refresh the set from storage.
    fn finish_edit(context: &mut SessionContext) -> Response<State> {
        context.send(ChannelKind::Storage, OutboundMessage::Get);
        context.present(PresentationEvent::EditModeChanged { editing: false });
        context.present(PresentationEvent::WaypointsChanged);
        Response::Transition(State::idle())
    }

    fn after_point_edit(context: &mut SessionContext, result: Result<(), SessionError>) -> Response<State> {
        match result {
            Ok(()) => context.present(PresentationEvent::WaypointsChanged),
            Err(err) => context.surface(err),
        }
        Response::Handled
    }
}

// Main interface for the session state machine
pub struct SessionController {
    machine: statig::prelude::StateMachine<SessionStateMachine>,
    context: SessionContext,
}

impl Default for SessionController {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionController {
    pub fn new() -> Self {
        Self {
            machine: SessionStateMachine::default().state_machine(),
            context: SessionContext::default(),
        }
    }

    /// Process an input event and return output events
    pub fn handle_input(
        &mut self,
        input: SessionInput,
    ) -> heapless::Vec<SessionOutput, MAX_OUTPUTS_PER_INPUT> {
        self.context.outputs.clear();

        let previous_state = self.state();
        self.machine.handle_with_context(&input, &mut self.context);
        let new_state = self.state();

        if previous_state != new_state {
            self.context
                .emit(SessionOutput::Present(PresentationEvent::StateChanged {
                    from: previous_state,
                    to: new_state,
                }));
        }

        std::mem::take(&mut self.context.outputs)
    }

    pub fn state(&self) -> SessionState {
        SessionStateMachine::state_to_session_state(self.machine.state())
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub fn displayed_waypoints(&self) -> Vec<Waypoint> {
        self.context.profiles.displayed_waypoints()
    }

    pub fn live_snapshot(&self) -> LiveSnapshot {
        self.context.telemetry.snapshot()
    }

    pub fn summary(&self) -> Option<SelectedProfileInfo> {
        self.context.profiles.summary(&self.context.config)
    }

    /// Run view, only while a firing is followed and the device has reported.
    pub fn progress(&self) -> Option<RunProgress> {
        match self.state() {
            SessionState::Running => self.context.last_status().map(RunProgress::from_status),
            _ => None,
        }
    }

    pub fn table(&self) -> Vec<TableRow> {
        profile_table(&self.displayed_waypoints(), &self.context.config)
    }
}
