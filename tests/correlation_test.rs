//! Correlation table contract: key uniqueness, loud violations, and the
//! cancellation outcome.

use multicam::output::{CorrelationKey, CorrelationTable, PendingRequest};
use multicam::{PhotoArtifact, SessionError};
use std::path::PathBuf;

#[test]
fn test_register_resolve_round_trip() {
    let mut table = CorrelationTable::new();
    let (request, mut rx) = PendingRequest::<PathBuf>::new();
    let key = CorrelationKey::RecordingPath(PathBuf::from("/tmp/clip.mp4"));

    table.register(key.clone(), request).unwrap();
    table
        .resolve::<PathBuf>(&key, Ok(PathBuf::from("/tmp/clip.mp4")))
        .unwrap();

    assert_eq!(rx.try_recv().unwrap(), Ok(PathBuf::from("/tmp/clip.mp4")));
    assert!(table.is_empty());
}

#[test]
fn test_register_on_pending_key_fails() {
    let mut table = CorrelationTable::new();
    let (first, _rx1) = PendingRequest::<PhotoArtifact>::new();
    let (second, _rx2) = PendingRequest::<PhotoArtifact>::new();

    table
        .register(CorrelationKey::PhotoSettings(7), first)
        .unwrap();
    let err = table
        .register(CorrelationKey::PhotoSettings(7), second)
        .unwrap_err();
    assert!(matches!(err, SessionError::CorrelationViolation(_)));
    // The original registration is untouched.
    assert_eq!(table.len(), 1);
}

#[test]
fn test_resolve_without_pending_entry_fails() {
    let mut table = CorrelationTable::new();
    let err = table
        .resolve::<PhotoArtifact>(&CorrelationKey::PhotoSettings(1), Err(SessionError::NoImageProduced))
        .unwrap_err();
    assert!(matches!(err, SessionError::CorrelationViolation(_)));
}

#[test]
fn test_keys_with_coinciding_text_never_match() {
    // "42" as a settings id and "42" as a path render the same, but the
    // variants differ, so they can coexist and resolve independently.
    let numeric = CorrelationKey::PhotoSettings(42);
    let textual = CorrelationKey::RecordingPath(PathBuf::from("42"));
    assert_ne!(numeric, textual);

    let mut table = CorrelationTable::new();
    let (photo, mut photo_rx) = PendingRequest::<PhotoArtifact>::new();
    let (recording, mut recording_rx) = PendingRequest::<PathBuf>::new();
    table.register(numeric.clone(), photo).unwrap();
    table.register(textual.clone(), recording).unwrap();

    table
        .resolve::<PathBuf>(&textual, Ok(PathBuf::from("42")))
        .unwrap();
    assert_eq!(table.len(), 1);
    assert!(recording_rx.try_recv().unwrap().is_ok());
    assert!(photo_rx.try_recv().is_err());
}

#[test]
fn test_resolved_key_can_be_reused() {
    let mut table = CorrelationTable::new();
    let key = CorrelationKey::PhotoSettings(1);

    let (first, mut rx1) = PendingRequest::<u8>::new();
    table.register(key.clone(), first).unwrap();
    table.resolve::<u8>(&key, Ok(1)).unwrap();
    assert_eq!(rx1.try_recv().unwrap(), Ok(1));

    // Once resolved, the key is free again.
    let (second, mut rx2) = PendingRequest::<u8>::new();
    table.register(key.clone(), second).unwrap();
    table.resolve::<u8>(&key, Ok(2)).unwrap();
    assert_eq!(rx2.try_recv().unwrap(), Ok(2));
}

#[test]
fn test_teardown_delivers_cancellation() {
    let (request, mut rx) = PendingRequest::<PhotoArtifact>::new();
    {
        let mut table = CorrelationTable::new();
        table
            .register(CorrelationKey::PhotoSettings(3), request)
            .unwrap();
        // Dropped with the request still pending.
    }
    assert_eq!(rx.try_recv().unwrap(), Err(SessionError::Cancelled));
}
