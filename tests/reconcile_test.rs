//! Reconciliation properties of the session graph: idempotence, minimal
//! churn, rebinding, pruning, and mirroring.

use multicam::session::{DeviceCatalog, OutputSinks, SessionGraph};
use multicam::testing::{SourceKind, SyntheticProbe, SyntheticSession};
use multicam::{ConnectionTarget, Device, PreviewSlot, PreviewUpdate, SessionError, SinkConfig};
use multicam::SessionBackend;
use tokio::sync::mpsc;

struct Rig {
    backend: SyntheticSession,
    probe: SyntheticProbe,
    catalog: DeviceCatalog,
    graph: SessionGraph,
    sinks: OutputSinks,
    updates_tx: mpsc::UnboundedSender<PreviewUpdate>,
    updates_rx: mpsc::UnboundedReceiver<PreviewUpdate>,
}

impl Rig {
    fn new() -> Self {
        let (mut backend, _events) = SyntheticSession::new();
        let probe = backend.probe();
        let sinks = OutputSinks {
            photo: backend.create_photo_sink(),
            motion: backend.create_motion_sink(),
        };
        let (updates_tx, updates_rx) = mpsc::unbounded_channel();
        Self {
            backend,
            probe,
            catalog: DeviceCatalog::new(),
            graph: SessionGraph::new(),
            sinks,
            updates_tx,
            updates_rx,
        }
    }

    fn apply(&mut self, configs: &[SinkConfig]) -> Result<(), SessionError> {
        self.graph.apply_configurations(
            &mut self.backend,
            &mut self.catalog,
            self.sinks,
            configs,
            &self.updates_tx,
        )
    }

    fn drain_updates(&mut self) -> Vec<PreviewUpdate> {
        let mut updates = Vec::new();
        while let Ok(update) = self.updates_rx.try_recv() {
            updates.push(update);
        }
        updates
    }
}

#[test]
fn test_second_identical_pass_is_a_noop() {
    let mut rig = Rig::new();
    let slot = PreviewSlot::new();
    let desired = [
        SinkConfig::Preview {
            device: Device::Front,
            slot,
        },
        SinkConfig::Photo {
            device: Device::Back,
        },
        SinkConfig::Motion {
            device: Device::Back,
        },
    ];

    rig.apply(&desired).unwrap();
    let connections_after_first = rig.probe.connections_created();
    let attaches_after_first = rig.probe.sink_attaches();
    let previews_after_first = rig.probe.previews_created();
    let snapshot_first = rig.probe.connection_snapshots();

    rig.apply(&desired).unwrap();

    assert_eq!(rig.probe.connections_created(), connections_after_first);
    assert_eq!(rig.probe.sink_attaches(), attaches_after_first);
    assert_eq!(rig.probe.previews_created(), previews_after_first);
    assert_eq!(rig.probe.attached_sink_count(), 2);

    // Object identity of every connection is preserved.
    let snapshot_second = rig.probe.connection_snapshots();
    let first_ids: Vec<_> = snapshot_first.iter().map(|c| c.id).collect();
    let second_ids: Vec<_> = snapshot_second.iter().map(|c| c.id).collect();
    assert_eq!(first_ids, second_ids);
}

#[test]
fn test_unchanged_binding_keeps_connections() {
    let mut rig = Rig::new();
    let desired = [SinkConfig::Photo {
        device: Device::Back,
    }];

    rig.apply(&desired).unwrap();
    let before: Vec<_> = rig.probe.sink_connections().iter().map(|c| c.id).collect();

    rig.apply(&desired).unwrap();
    let after: Vec<_> = rig.probe.sink_connections().iter().map(|c| c.id).collect();
    assert_eq!(before, after);
}

#[test]
fn test_rebinding_replaces_only_that_sinks_connections() {
    let mut rig = Rig::new();

    rig.apply(&[
        SinkConfig::Photo {
            device: Device::Back,
        },
        SinkConfig::Motion {
            device: Device::Back,
        },
    ])
    .unwrap();

    let motion_target = ConnectionTarget::Sink(rig.sinks.motion);
    let motion_before: Vec<_> = rig
        .probe
        .sink_connections()
        .iter()
        .filter(|c| c.target == motion_target)
        .map(|c| c.id)
        .collect();
    assert_eq!(motion_before.len(), 2);
    let all_before: Vec<_> = rig.probe.sink_connections().iter().map(|c| c.id).collect();
    assert_eq!(all_before.len(), 3);

    // Rebind the photo sink to the front camera; motion stays on back.
    rig.apply(&[
        SinkConfig::Photo {
            device: Device::Front,
        },
        SinkConfig::Motion {
            device: Device::Back,
        },
    ])
    .unwrap();

    let after = rig.probe.sink_connections();
    assert_eq!(after.len(), 3);

    // The motion sink's connections survived untouched.
    for id in motion_before {
        assert!(after.iter().any(|c| c.id == id));
    }

    // The photo sink now has exactly one fresh, mirrored front connection.
    let front_connections: Vec<_> = after
        .iter()
        .filter(|c| c.sources.contains(&SourceKind::Camera(Device::Front)))
        .collect();
    assert_eq!(front_connections.len(), 1);
    assert!(front_connections[0].mirrored);
    assert!(!all_before.contains(&front_connections[0].id));

    // Both sinks are still attached; nothing was detached to rewire.
    assert_eq!(rig.probe.attached_sink_count(), 2);
}

#[test]
fn test_omitted_sink_is_fully_detached() {
    let mut rig = Rig::new();

    rig.apply(&[SinkConfig::Motion {
        device: Device::Back,
    }])
    .unwrap();
    assert_eq!(rig.probe.attached_sink_count(), 1);
    assert_eq!(rig.probe.connection_count(), 2);

    rig.apply(&[]).unwrap();
    assert_eq!(rig.probe.attached_sink_count(), 0);
    assert_eq!(rig.probe.connection_count(), 0);
}

#[test]
fn test_pruned_preview_releases_handle_and_notifies_none() {
    let mut rig = Rig::new();
    let slot = PreviewSlot::new();

    rig.apply(&[SinkConfig::Preview {
        device: Device::Front,
        slot,
    }])
    .unwrap();
    let updates = rig.drain_updates();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].slot, slot);
    assert!(updates[0].handle.is_some());
    assert_eq!(rig.probe.preview_count(), 1);

    rig.apply(&[]).unwrap();
    let updates = rig.drain_updates();
    assert_eq!(updates, vec![PreviewUpdate { slot, handle: None }]);
    assert_eq!(rig.probe.preview_count(), 0);
    assert_eq!(rig.probe.connection_count(), 0);
}

#[test]
fn test_front_output_connections_are_mirrored() {
    let mut rig = Rig::new();

    rig.apply(&[SinkConfig::Motion {
        device: Device::Front,
    }])
    .unwrap();

    for connection in rig.probe.sink_connections() {
        if connection.sources.contains(&SourceKind::Camera(Device::Front)) {
            assert!(connection.mirrored, "front video connection must mirror");
        }
        if connection.sources.contains(&SourceKind::Microphone) {
            assert!(!connection.mirrored, "audio connection must not mirror");
        }
    }
}

#[test]
fn test_back_output_connections_are_not_mirrored() {
    let mut rig = Rig::new();

    rig.apply(&[SinkConfig::Photo {
        device: Device::Back,
    }])
    .unwrap();

    let connections = rig.probe.sink_connections();
    assert_eq!(connections.len(), 1);
    assert!(!connections[0].mirrored);
}

#[test]
fn test_preview_connections_are_never_mirrored() {
    let mut rig = Rig::new();

    rig.apply(&[SinkConfig::Preview {
        device: Device::Front,
        slot: PreviewSlot::new(),
    }])
    .unwrap();

    let connections = rig.probe.preview_connections();
    assert_eq!(connections.len(), 1);
    assert!(!connections[0].mirrored);
}

#[test]
fn test_preview_device_switch_renotifies_same_slot() {
    let mut rig = Rig::new();
    let slot = PreviewSlot::new();

    rig.apply(&[SinkConfig::Preview {
        device: Device::Front,
        slot,
    }])
    .unwrap();
    let first = rig.drain_updates();
    let first_handle = first[0].handle.unwrap();

    rig.apply(&[SinkConfig::Preview {
        device: Device::Back,
        slot,
    }])
    .unwrap();

    // The old front wiring is gone and the slot was renotified with the new
    // handle, not with an unbind.
    let second = rig.drain_updates();
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].slot, slot);
    let second_handle = second[0].handle.expect("rebind must carry a handle");
    assert_ne!(second_handle, first_handle);

    assert_eq!(rig.probe.preview_count(), 1);
    assert_eq!(rig.probe.preview_connections().len(), 1);
    let sources = &rig.probe.preview_connections()[0].sources;
    assert_eq!(sources, &vec![SourceKind::Camera(Device::Back)]);
}

#[test]
fn test_photo_applied_twice_attaches_once() {
    let mut rig = Rig::new();
    let desired = [SinkConfig::Photo {
        device: Device::Back,
    }];

    rig.apply(&desired).unwrap();
    assert_eq!(rig.probe.sink_attaches(), 1);
    assert_eq!(rig.probe.connections_created(), 1);

    rig.apply(&desired).unwrap();
    assert_eq!(rig.probe.sink_attaches(), 1);
    assert_eq!(rig.probe.connections_created(), 1);
}

#[test]
fn test_last_entry_wins_for_conflicting_devices() {
    let mut rig = Rig::new();

    rig.apply(&[
        SinkConfig::Photo {
            device: Device::Front,
        },
        SinkConfig::Photo {
            device: Device::Back,
        },
    ])
    .unwrap();

    let connections = rig.probe.sink_connections();
    assert_eq!(connections.len(), 1);
    assert_eq!(connections[0].sources, vec![SourceKind::Camera(Device::Back)]);
    assert!(!connections[0].mirrored);
    assert_eq!(rig.probe.attached_sink_count(), 1);
}

#[test]
fn test_failed_pass_leaves_graph_untouched() {
    let mut rig = Rig::new();

    rig.apply(&[SinkConfig::Photo {
        device: Device::Back,
    }])
    .unwrap();
    let before = rig.probe.connection_snapshots();

    rig.probe.reject_next_connection();
    let err = rig
        .apply(&[
            SinkConfig::Photo {
                device: Device::Back,
            },
            SinkConfig::Motion {
                device: Device::Front,
            },
        ])
        .unwrap_err();
    assert!(matches!(err, SessionError::GraphRejected(_)));

    // Prior graph state is preserved in full.
    let after = rig.probe.connection_snapshots();
    assert_eq!(before.len(), after.len());
    assert_eq!(before[0].id, after[0].id);
    assert_eq!(rig.probe.attached_sink_count(), 1);

    // The same list succeeds once the session stops rejecting.
    rig.apply(&[
        SinkConfig::Photo {
            device: Device::Back,
        },
        SinkConfig::Motion {
            device: Device::Front,
        },
    ])
    .unwrap();
    assert_eq!(rig.probe.attached_sink_count(), 2);
}

#[test]
fn test_failed_pass_emits_no_preview_updates() {
    let mut rig = Rig::new();
    rig.probe.reject_next_connection();

    let slot = PreviewSlot::new();
    rig.apply(&[SinkConfig::Preview {
        device: Device::Back,
        slot,
    }])
    .unwrap_err();

    assert!(rig.drain_updates().is_empty());
    assert_eq!(rig.probe.preview_count(), 0);
}

#[test]
fn test_missing_device_aborts_whole_pass() {
    let mut rig = Rig::new();
    rig.probe.deny_camera(Device::Front);

    let err = rig
        .apply(&[
            SinkConfig::Photo {
                device: Device::Back,
            },
            SinkConfig::Motion {
                device: Device::Front,
            },
        ])
        .unwrap_err();
    assert!(matches!(err, SessionError::DeviceUnavailable(_)));

    // Even the entries that would have succeeded are rolled back.
    assert_eq!(rig.probe.attached_sink_count(), 0);
    assert_eq!(rig.probe.connection_count(), 0);
}

#[test]
fn test_inputs_are_created_once_across_passes() {
    let mut rig = Rig::new();
    let slot = PreviewSlot::new();

    rig.apply(&[
        SinkConfig::Preview {
            device: Device::Back,
            slot,
        },
        SinkConfig::Photo {
            device: Device::Back,
        },
        SinkConfig::Motion {
            device: Device::Back,
        },
    ])
    .unwrap();
    // One back camera input shared by all three, plus the microphone.
    assert_eq!(rig.probe.input_count(), 2);

    rig.apply(&[SinkConfig::Photo {
        device: Device::Back,
    }])
    .unwrap();
    // Pruning never removes inputs.
    assert_eq!(rig.probe.input_count(), 2);
}
