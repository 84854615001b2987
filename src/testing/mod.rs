//! Deterministic in-memory session backend for exercising the engine without
//! camera hardware.
//!
//! [`SyntheticSession`] models inputs, sinks, previews, and connections with
//! the same staged-transaction semantics a real backend must provide, so the
//! reconciliation engine can be driven end to end in tests. A
//! [`SyntheticProbe`] keeps a window into the model after the backend moves
//! into the session task, and a [`CompletionInjector`] stands in for the
//! hardware's asynchronous completion callbacks.

use crate::backend::{CompletionEvent, ConnectionTarget, SessionBackend};
use crate::errors::SessionError;
use crate::types::{
    ConnectionId, Device, InputId, InputPort, MediaKind, PhotoArtifact, PreviewId, SinkId,
};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, watch};

/// Where a modeled connection draws frames from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Camera(Device),
    Microphone,
}

/// Snapshot of one connection in the committed graph.
#[derive(Debug, Clone)]
pub struct ConnectionSnapshot {
    pub id: ConnectionId,
    pub target: ConnectionTarget,
    pub mirrored: bool,
    pub sources: Vec<SourceKind>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InputKind {
    Camera(Device),
    Microphone,
}

#[derive(Debug, Clone)]
struct ConnectionModel {
    ports: Vec<InputPort>,
    target: ConnectionTarget,
    mirrored: bool,
}

/// The mutable graph. Cloned wholesale at `begin_configuration` so an abort
/// restores every field, counters included.
#[derive(Debug, Clone, Default)]
struct GraphModel {
    inputs: HashMap<InputId, InputKind>,
    previews: HashSet<PreviewId>,
    sinks: HashSet<SinkId>,
    attached: HashSet<SinkId>,
    connections: HashMap<ConnectionId, ConnectionModel>,
    connections_created: u64,
    sink_attaches: u64,
    previews_created: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Trigger {
    Photo { settings_id: u64 },
    RecordStart { path: PathBuf },
    RecordStop,
}

struct State {
    committed: GraphModel,
    staged: Option<GraphModel>,
    depth: u32,
    aborted: bool,
    next_id: u64,
    denied_cameras: HashSet<Device>,
    microphone_denied: bool,
    reject_next_attach: bool,
    reject_next_connection: bool,
    running_tx: watch::Sender<bool>,
    triggers: Vec<Trigger>,
}

impl State {
    fn model(&self) -> &GraphModel {
        self.staged.as_ref().unwrap_or(&self.committed)
    }

    fn model_mut(&mut self) -> &mut GraphModel {
        self.staged.as_mut().unwrap_or(&mut self.committed)
    }

    fn mint_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-memory [`SessionBackend`] with configurable failure injection.
pub struct SyntheticSession {
    state: Arc<Mutex<State>>,
    events_tx: mpsc::UnboundedSender<CompletionEvent>,
}

impl SyntheticSession {
    /// Create a backend plus the completion channel the session task drains.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<CompletionEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (running_tx, _) = watch::channel(false);
        let state = State {
            committed: GraphModel::default(),
            staged: None,
            depth: 0,
            aborted: false,
            next_id: 0,
            denied_cameras: HashSet::new(),
            microphone_denied: false,
            reject_next_attach: false,
            reject_next_connection: false,
            running_tx,
            triggers: Vec::new(),
        };
        (
            Self {
                state: Arc::new(Mutex::new(state)),
                events_tx,
            },
            events_rx,
        )
    }

    /// A handle for inspecting and steering the model after the backend has
    /// been moved into the session task.
    pub fn probe(&self) -> SyntheticProbe {
        SyntheticProbe {
            state: self.state.clone(),
        }
    }

    /// A handle for delivering hardware completions from tests.
    pub fn injector(&self) -> CompletionInjector {
        CompletionInjector {
            tx: self.events_tx.clone(),
        }
    }

    /// Make the camera at `device` unavailable.
    pub fn deny_camera(&self, device: Device) {
        self.probe().deny_camera(device);
    }

    /// Make the microphone unavailable.
    pub fn deny_microphone(&self) {
        self.probe().deny_microphone();
    }
}

impl SessionBackend for SyntheticSession {
    fn begin_configuration(&mut self) {
        let mut state = self.state.lock().expect("lock poisoned");
        if state.depth == 0 {
            state.staged = Some(state.committed.clone());
            state.aborted = false;
        }
        state.depth += 1;
    }

    fn commit_configuration(&mut self) {
        let mut state = self.state.lock().expect("lock poisoned");
        state.depth = state.depth.saturating_sub(1);
        if state.depth == 0 {
            if state.aborted {
                state.staged = None;
            } else if let Some(model) = state.staged.take() {
                state.committed = model;
            }
        }
    }

    fn abort_configuration(&mut self) {
        let mut state = self.state.lock().expect("lock poisoned");
        state.aborted = true;
        state.depth = state.depth.saturating_sub(1);
        if state.depth == 0 {
            state.staged = None;
        }
    }

    fn add_camera_input(&mut self, device: Device) -> Result<InputId, SessionError> {
        let mut state = self.state.lock().expect("lock poisoned");
        if state.denied_cameras.contains(&device) {
            return Err(SessionError::DeviceUnavailable(format!(
                "Could not find the {} camera",
                device
            )));
        }
        let input = InputId(state.mint_id());
        state
            .model_mut()
            .inputs
            .insert(input, InputKind::Camera(device));
        Ok(input)
    }

    fn add_microphone_input(&mut self) -> Result<InputId, SessionError> {
        let mut state = self.state.lock().expect("lock poisoned");
        if state.microphone_denied {
            return Err(SessionError::DeviceUnavailable(
                "Could not find the microphone".to_string(),
            ));
        }
        let input = InputId(state.mint_id());
        state.model_mut().inputs.insert(input, InputKind::Microphone);
        Ok(input)
    }

    fn port(&self, input: InputId, media: MediaKind) -> Result<InputPort, SessionError> {
        let state = self.state.lock().expect("lock poisoned");
        let kind = state
            .model()
            .inputs
            .get(&input)
            .ok_or_else(|| SessionError::DeviceUnavailable(format!("Unknown input {:?}", input)))?;
        let available = match kind {
            InputKind::Camera(_) => MediaKind::Video,
            InputKind::Microphone => MediaKind::Audio,
        };
        if media != available {
            return Err(SessionError::DeviceUnavailable(format!(
                "Input {:?} has no {:?} port",
                input, media
            )));
        }
        Ok(InputPort { input, media })
    }

    fn create_preview(&mut self) -> PreviewId {
        let mut state = self.state.lock().expect("lock poisoned");
        let preview = PreviewId(state.mint_id());
        let model = state.model_mut();
        model.previews.insert(preview);
        model.previews_created += 1;
        preview
    }

    fn release_preview(&mut self, preview: PreviewId) {
        let mut state = self.state.lock().expect("lock poisoned");
        state.model_mut().previews.remove(&preview);
    }

    fn create_photo_sink(&mut self) -> SinkId {
        let mut state = self.state.lock().expect("lock poisoned");
        let sink = SinkId(state.mint_id());
        state.model_mut().sinks.insert(sink);
        sink
    }

    fn create_motion_sink(&mut self) -> SinkId {
        let mut state = self.state.lock().expect("lock poisoned");
        let sink = SinkId(state.mint_id());
        state.model_mut().sinks.insert(sink);
        sink
    }

    fn attach_sink(&mut self, sink: SinkId) -> Result<(), SessionError> {
        let mut state = self.state.lock().expect("lock poisoned");
        if state.reject_next_attach {
            state.reject_next_attach = false;
            return Err(SessionError::GraphRejected(
                "Could not add the output".to_string(),
            ));
        }
        if !state.model().sinks.contains(&sink) {
            return Err(SessionError::GraphRejected(format!(
                "Unknown sink {:?}",
                sink
            )));
        }
        let model = state.model_mut();
        if model.attached.insert(sink) {
            model.sink_attaches += 1;
        }
        Ok(())
    }

    fn detach_sink(&mut self, sink: SinkId) {
        let mut state = self.state.lock().expect("lock poisoned");
        let model = state.model_mut();
        model.attached.remove(&sink);
        model
            .connections
            .retain(|_, c| c.target != ConnectionTarget::Sink(sink));
    }

    fn is_sink_attached(&self, sink: SinkId) -> bool {
        let state = self.state.lock().expect("lock poisoned");
        state.model().attached.contains(&sink)
    }

    fn add_connection(
        &mut self,
        ports: &[InputPort],
        target: ConnectionTarget,
        mirrored: bool,
    ) -> Result<ConnectionId, SessionError> {
        let mut state = self.state.lock().expect("lock poisoned");
        if state.reject_next_connection {
            state.reject_next_connection = false;
            return Err(SessionError::GraphRejected(
                "Could not add a connection".to_string(),
            ));
        }
        let target_present = match target {
            ConnectionTarget::Preview(preview) => state.model().previews.contains(&preview),
            ConnectionTarget::Sink(sink) => state.model().attached.contains(&sink),
        };
        if !target_present {
            return Err(SessionError::GraphRejected(format!(
                "Connection target {:?} is not part of the session",
                target
            )));
        }
        let connection = ConnectionId(state.mint_id());
        let model = state.model_mut();
        model.connections.insert(
            connection,
            ConnectionModel {
                ports: ports.to_vec(),
                target,
                mirrored,
            },
        );
        model.connections_created += 1;
        Ok(connection)
    }

    fn remove_connection(&mut self, connection: ConnectionId) {
        let mut state = self.state.lock().expect("lock poisoned");
        state.model_mut().connections.remove(&connection);
    }

    fn connections(&self) -> Vec<(ConnectionId, ConnectionTarget)> {
        let state = self.state.lock().expect("lock poisoned");
        let mut list: Vec<_> = state
            .model()
            .connections
            .iter()
            .map(|(id, c)| (*id, c.target))
            .collect();
        list.sort_by_key(|(id, _)| id.0);
        list
    }

    fn start_running(&mut self) -> Result<(), SessionError> {
        let state = self.state.lock().expect("lock poisoned");
        let _ = state.running_tx.send(true);
        Ok(())
    }

    fn stop_running(&mut self) -> Result<(), SessionError> {
        let state = self.state.lock().expect("lock poisoned");
        let _ = state.running_tx.send(false);
        Ok(())
    }

    fn running(&self) -> watch::Receiver<bool> {
        let state = self.state.lock().expect("lock poisoned");
        state.running_tx.subscribe()
    }

    fn capture_photo(&mut self, _sink: SinkId, settings_id: u64) -> Result<(), SessionError> {
        let mut state = self.state.lock().expect("lock poisoned");
        state.triggers.push(Trigger::Photo { settings_id });
        Ok(())
    }

    fn start_recording(&mut self, _sink: SinkId, destination: &Path) -> Result<(), SessionError> {
        let mut state = self.state.lock().expect("lock poisoned");
        state.triggers.push(Trigger::RecordStart {
            path: destination.to_path_buf(),
        });
        Ok(())
    }

    fn stop_recording(&mut self, _sink: SinkId) {
        let mut state = self.state.lock().expect("lock poisoned");
        state.triggers.push(Trigger::RecordStop);
    }
}

/// Inspection and failure-injection handle over a [`SyntheticSession`] model.
#[derive(Clone)]
pub struct SyntheticProbe {
    state: Arc<Mutex<State>>,
}

impl SyntheticProbe {
    pub fn deny_camera(&self, device: Device) {
        let mut state = self.state.lock().expect("lock poisoned");
        state.denied_cameras.insert(device);
    }

    pub fn deny_microphone(&self) {
        let mut state = self.state.lock().expect("lock poisoned");
        state.microphone_denied = true;
    }

    /// Make the next sink attach fail with `GraphRejected`.
    pub fn reject_next_attach(&self) {
        let mut state = self.state.lock().expect("lock poisoned");
        state.reject_next_attach = true;
    }

    /// Make the next connection add fail with `GraphRejected`.
    pub fn reject_next_connection(&self) {
        let mut state = self.state.lock().expect("lock poisoned");
        state.reject_next_connection = true;
    }

    pub fn input_count(&self) -> usize {
        let state = self.state.lock().expect("lock poisoned");
        state.committed.inputs.len()
    }

    pub fn preview_count(&self) -> usize {
        let state = self.state.lock().expect("lock poisoned");
        state.committed.previews.len()
    }

    pub fn attached_sink_count(&self) -> usize {
        let state = self.state.lock().expect("lock poisoned");
        state.committed.attached.len()
    }

    pub fn connection_count(&self) -> usize {
        let state = self.state.lock().expect("lock poisoned");
        state.committed.connections.len()
    }

    /// Cumulative connections ever created by committed passes.
    pub fn connections_created(&self) -> u64 {
        let state = self.state.lock().expect("lock poisoned");
        state.committed.connections_created
    }

    /// Cumulative sink attaches performed by committed passes.
    pub fn sink_attaches(&self) -> u64 {
        let state = self.state.lock().expect("lock poisoned");
        state.committed.sink_attaches
    }

    /// Cumulative preview constructs ever created by committed passes.
    pub fn previews_created(&self) -> u64 {
        let state = self.state.lock().expect("lock poisoned");
        state.committed.previews_created
    }

    /// Snapshot of every committed connection with its resolved sources.
    pub fn connection_snapshots(&self) -> Vec<ConnectionSnapshot> {
        let state = self.state.lock().expect("lock poisoned");
        let model = &state.committed;
        let mut list: Vec<_> = model
            .connections
            .iter()
            .map(|(id, c)| ConnectionSnapshot {
                id: *id,
                target: c.target,
                mirrored: c.mirrored,
                sources: c
                    .ports
                    .iter()
                    .filter_map(|port| model.inputs.get(&port.input))
                    .map(|kind| match kind {
                        InputKind::Camera(device) => SourceKind::Camera(*device),
                        InputKind::Microphone => SourceKind::Microphone,
                    })
                    .collect(),
            })
            .collect();
        list.sort_by_key(|snapshot| snapshot.id.0);
        list
    }

    /// Connections targeting sinks (photo/motion wiring).
    pub fn sink_connections(&self) -> Vec<ConnectionSnapshot> {
        self.connection_snapshots()
            .into_iter()
            .filter(|c| matches!(c.target, ConnectionTarget::Sink(_)))
            .collect()
    }

    /// Connections targeting previews.
    pub fn preview_connections(&self) -> Vec<ConnectionSnapshot> {
        self.connection_snapshots()
            .into_iter()
            .filter(|c| matches!(c.target, ConnectionTarget::Preview(_)))
            .collect()
    }

    /// Settings ids of photo captures triggered so far.
    pub fn photo_triggers(&self) -> Vec<u64> {
        let state = self.state.lock().expect("lock poisoned");
        state
            .triggers
            .iter()
            .filter_map(|t| match t {
                Trigger::Photo { settings_id } => Some(*settings_id),
                _ => None,
            })
            .collect()
    }

    /// Destination of the most recently started recording.
    pub fn last_recording_destination(&self) -> Option<PathBuf> {
        let state = self.state.lock().expect("lock poisoned");
        state.triggers.iter().rev().find_map(|t| match t {
            Trigger::RecordStart { path } => Some(path.clone()),
            _ => None,
        })
    }

    /// Number of times the hardware was asked to finalize a recording.
    pub fn record_stop_count(&self) -> usize {
        let state = self.state.lock().expect("lock poisoned");
        state
            .triggers
            .iter()
            .filter(|t| matches!(t, Trigger::RecordStop))
            .count()
    }
}

/// Delivers hardware completions into the session task, standing in for the
/// uncontrolled context real callbacks arrive on.
#[derive(Clone)]
pub struct CompletionInjector {
    tx: mpsc::UnboundedSender<CompletionEvent>,
}

impl CompletionInjector {
    pub fn photo_finished(&self, settings_id: u64, result: Result<Option<PhotoArtifact>, String>) {
        let _ = self.tx.send(CompletionEvent::Photo {
            settings_id,
            result,
        });
    }

    pub fn recording_finished(&self, path: PathBuf, result: Result<(), String>) {
        let _ = self.tx.send(CompletionEvent::Recording { path, result });
    }
}
