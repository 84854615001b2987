//! Reconciliation of desired capture outputs against the live session graph.
//!
//! Each pass runs inside one bracketed configuration transaction and works as
//! a set-diff: entries reuse existing wiring where the binding is unchanged,
//! create fresh connections where it is not, and everything left unmarked at
//! the end is pruned. Rebuilding only what changed keeps the hardware from
//! flashing or re-initializing on every pass.

use crate::backend::{ConnectionTarget, SessionBackend};
use crate::errors::SessionError;
use crate::session::catalog::DeviceCatalog;
use crate::types::{
    ConnectionId, Device, MediaKind, PreviewId, PreviewSlot, PreviewUpdate, SinkConfig, SinkId,
};
use std::collections::{HashMap, HashSet};
use tokio::sync::mpsc;

/// The two singleton output sinks a pass may wire.
#[derive(Debug, Clone, Copy)]
pub struct OutputSinks {
    pub photo: SinkId,
    pub motion: SinkId,
}

#[derive(Debug, Clone)]
struct PreviewBinding {
    preview: PreviewId,
    connection: ConnectionId,
    /// The external surface most recently notified for this binding, so a
    /// prune can tell it the handle went away.
    slot: PreviewSlot,
}

#[derive(Debug, Clone)]
struct OutputBinding {
    device: Device,
    connections: Vec<ConnectionId>,
}

/// Preview updates are buffered during a pass and emitted only after commit.
/// Per slot the bind event wins: a prune `None` is recorded only for slots
/// the same pass did not just bind.
#[derive(Default)]
struct PreviewNotes {
    order: Vec<PreviewSlot>,
    map: HashMap<PreviewSlot, Option<PreviewId>>,
}

impl PreviewNotes {
    fn bound(&mut self, slot: PreviewSlot, preview: PreviewId) {
        if !self.map.contains_key(&slot) {
            self.order.push(slot);
        }
        self.map.insert(slot, Some(preview));
    }

    fn unbound(&mut self, slot: PreviewSlot) {
        if !self.map.contains_key(&slot) {
            self.order.push(slot);
            self.map.insert(slot, None);
        }
    }

    fn emit(mut self, updates: &mpsc::UnboundedSender<PreviewUpdate>) {
        for slot in self.order {
            if let Some(handle) = self.map.remove(&slot) {
                // A gone consumer is not a graph failure.
                let _ = updates.send(PreviewUpdate { slot, handle });
            }
        }
    }
}

/// Bookkeeping for the engine's view of the session graph: which device each
/// preview and output sink is currently bound to, and through which
/// connections.
#[derive(Debug, Clone, Default)]
pub struct SessionGraph {
    previews: HashMap<Device, PreviewBinding>,
    outputs: HashMap<SinkId, OutputBinding>,
}

impl SessionGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mutate the session graph to match `configs`, with minimal churn.
    ///
    /// Runs one bracketed transaction: on any failure the transaction is
    /// aborted and the engine's bookkeeping (catalog cache included) is
    /// restored, so the published graph is never left half-updated. Preview
    /// updates go out on `updates` only after a successful commit.
    ///
    /// Entries are processed in list order; ordering is insignificant except
    /// that the last entry wins when two claim the same sink role for
    /// different devices.
    pub fn apply_configurations<B: SessionBackend>(
        &mut self,
        backend: &mut B,
        catalog: &mut DeviceCatalog,
        sinks: OutputSinks,
        configs: &[SinkConfig],
        updates: &mpsc::UnboundedSender<PreviewUpdate>,
    ) -> Result<(), SessionError> {
        let graph_before = self.clone();
        let catalog_before = catalog.clone();
        let mut notes = PreviewNotes::default();

        backend.begin_configuration();
        match self.apply_inner(backend, catalog, sinks, configs, &mut notes) {
            Ok(()) => {
                backend.commit_configuration();
                notes.emit(updates);
                log::debug!("Applied {} desired configuration(s)", configs.len());
                Ok(())
            }
            Err(err) => {
                backend.abort_configuration();
                *self = graph_before;
                *catalog = catalog_before;
                log::warn!("Reconciliation pass aborted: {}", err);
                Err(err)
            }
        }
    }

    fn apply_inner<B: SessionBackend>(
        &mut self,
        backend: &mut B,
        catalog: &mut DeviceCatalog,
        sinks: OutputSinks,
        configs: &[SinkConfig],
        notes: &mut PreviewNotes,
    ) -> Result<(), SessionError> {
        let mut used: HashSet<ConnectionId> = HashSet::new();

        for config in configs {
            match *config {
                SinkConfig::Preview { device, slot } => {
                    self.wire_preview(backend, catalog, device, slot, &mut used, notes)?;
                }
                SinkConfig::Photo { device } => {
                    self.wire_output(backend, catalog, sinks.photo, device, false, &mut used)?;
                }
                SinkConfig::Motion { device } => {
                    self.wire_output(backend, catalog, sinks.motion, device, true, &mut used)?;
                }
            }
        }

        self.prune(backend, &used, notes);
        Ok(())
    }

    fn wire_preview<B: SessionBackend>(
        &mut self,
        backend: &mut B,
        catalog: &mut DeviceCatalog,
        device: Device,
        slot: PreviewSlot,
        used: &mut HashSet<ConnectionId>,
        notes: &mut PreviewNotes,
    ) -> Result<(), SessionError> {
        if let Some(binding) = self.previews.get_mut(&device) {
            // Already wired for this device; re-notify is idempotent.
            used.insert(binding.connection);
            binding.slot = slot;
            notes.bound(slot, binding.preview);
            return Ok(());
        }

        let input = catalog.camera_input(backend, device)?;
        let port = backend.port(input, MediaKind::Video)?;
        let preview = backend.create_preview();
        let connection =
            backend.add_connection(&[port], ConnectionTarget::Preview(preview), false)?;
        used.insert(connection);

        self.previews.insert(
            device,
            PreviewBinding {
                preview,
                connection,
                slot,
            },
        );
        notes.bound(slot, preview);
        Ok(())
    }

    fn wire_output<B: SessionBackend>(
        &mut self,
        backend: &mut B,
        catalog: &mut DeviceCatalog,
        sink: SinkId,
        device: Device,
        with_audio: bool,
        used: &mut HashSet<ConnectionId>,
    ) -> Result<(), SessionError> {
        if backend.is_sink_attached(sink) {
            if let Some(binding) = self.outputs.get(&sink) {
                if binding.device == device {
                    // Same binding as last pass; keep the wiring untouched.
                    used.extend(binding.connections.iter().copied());
                    return Ok(());
                }
            }
            // Rebinding: drop only this sink's connections, not the sink.
            if let Some(binding) = self.outputs.remove(&sink) {
                for connection in binding.connections {
                    backend.remove_connection(connection);
                }
            }
        } else {
            backend.attach_sink(sink)?;
        }

        let input = catalog.camera_input(backend, device)?;
        let port = backend.port(input, MediaKind::Video)?;
        // Mirror output frames from the front camera, matching what its
        // preview shows.
        let video =
            backend.add_connection(&[port], ConnectionTarget::Sink(sink), device.is_front())?;
        used.insert(video);
        let mut connections = vec![video];

        if with_audio {
            let microphone = catalog.microphone_input(backend)?;
            let audio_port = backend.port(microphone, MediaKind::Audio)?;
            let audio =
                backend.add_connection(&[audio_port], ConnectionTarget::Sink(sink), false)?;
            used.insert(audio);
            connections.push(audio);
        }

        self.outputs.insert(sink, OutputBinding { device, connections });
        Ok(())
    }

    /// Tear down every connection the pass did not mark used. Preview
    /// connections are unwired and their low-level handle released (the
    /// external surface is told, but keeps existing); an output connection's
    /// sink is detached from the session entirely.
    fn prune<B: SessionBackend>(
        &mut self,
        backend: &mut B,
        used: &HashSet<ConnectionId>,
        notes: &mut PreviewNotes,
    ) {
        for (connection, target) in backend.connections() {
            if used.contains(&connection) {
                continue;
            }
            match target {
                ConnectionTarget::Preview(preview) => {
                    backend.remove_connection(connection);
                    backend.release_preview(preview);
                    let owner = self
                        .previews
                        .iter()
                        .find(|(_, binding)| binding.connection == connection)
                        .map(|(device, binding)| (*device, binding.slot));
                    match owner {
                        Some((device, slot)) => {
                            self.previews.remove(&device);
                            notes.unbound(slot);
                        }
                        None => {
                            log::warn!(
                                "Pruned preview connection {:?} with no binding on record",
                                connection
                            );
                        }
                    }
                }
                ConnectionTarget::Sink(sink) => {
                    if backend.is_sink_attached(sink) {
                        backend.detach_sink(sink);
                    }
                    self.outputs.remove(&sink);
                }
            }
        }
    }
}
