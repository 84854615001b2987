//! Lazy, cached resolution of logical devices to session inputs.

use crate::backend::SessionBackend;
use crate::errors::SessionError;
use crate::types::{Device, InputId};

/// Creates and caches one input per logical device for the session lifetime.
///
/// Inputs are attached to the session without connections and are never torn
/// down until the owning session is. Creation happens under its own backend
/// configuration transaction; a cached input is returned with no backend
/// traffic at all.
///
/// The catalog is `Clone` so the reconciliation engine can snapshot it before
/// a pass: when the pass aborts, inputs whose backend-side add was discarded
/// must not stay cached.
#[derive(Debug, Clone, Default)]
pub struct DeviceCatalog {
    front: Option<InputId>,
    back: Option<InputId>,
    microphone: Option<InputId>,
}

impl DeviceCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// The camera input for `device`, created on first use.
    pub fn camera_input<B: SessionBackend>(
        &mut self,
        backend: &mut B,
        device: Device,
    ) -> Result<InputId, SessionError> {
        let slot = match device {
            Device::Front => &mut self.front,
            Device::Back => &mut self.back,
        };
        if let Some(input) = *slot {
            return Ok(input);
        }

        backend.begin_configuration();
        let input = match backend.add_camera_input(device) {
            Ok(input) => input,
            Err(err) => {
                backend.abort_configuration();
                return Err(err);
            }
        };
        backend.commit_configuration();

        log::debug!("Opened {} camera input {:?}", device, input);
        *slot = Some(input);
        Ok(input)
    }

    /// The microphone input, created on first use.
    pub fn microphone_input<B: SessionBackend>(
        &mut self,
        backend: &mut B,
    ) -> Result<InputId, SessionError> {
        if let Some(input) = self.microphone {
            return Ok(input);
        }

        backend.begin_configuration();
        let input = match backend.add_microphone_input() {
            Ok(input) => input,
            Err(err) => {
                backend.abort_configuration();
                return Err(err);
            }
        };
        backend.commit_configuration();

        log::debug!("Opened microphone input {:?}", input);
        self.microphone = Some(input);
        Ok(input)
    }
}
