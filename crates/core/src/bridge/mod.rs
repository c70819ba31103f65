use std::{
    cell::RefCell,
    collections::HashMap,
    rc::{Rc, Weak},
};

use serde::{Deserialize, Serialize};

use crate::{
    config::BridgeConfig,
    events::{EventBus, Subscription},
    gesture::{CircularSurface, SurfaceActions},
    protocol::{Action, HostEvent, NoteEvent, ParameterUpdate, SliceWaveforms, NOTE_CHANNEL},
    store::{ParameterChange, ParameterStore},
    transport::{InboundHandler, Transport},
};

/// Last slice positions reported by the host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Playheads {
    pub triggered: Option<u8>,
    pub original: Option<u8>,
}

#[derive(Debug, Default)]
struct HostState {
    is_standalone: bool,
    playheads: Playheads,
    waveforms: Option<SliceWaveforms>,
}

/// Everything the view layer talks to.
///
/// One instance per host connection, shared by reference. All methods take
/// `&self` so callbacks registered on the bridge can call back into it.
#[derive(Debug)]
pub struct Bridge {
    config: BridgeConfig,
    transport: Rc<Transport>,
    parameters: ParameterStore,
    events: EventBus<HostEvent>,
    host: RefCell<HostState>,
}

impl Bridge {
    /// Builds the bridge and, unless disabled, asks the host to push its
    /// current parameter set through the normal echo path.
    pub fn connect(transport: Transport, config: BridgeConfig) -> Self {
        let transport = Rc::new(transport);
        let bridge = Self {
            parameters: ParameterStore::new(transport.clone()),
            events: EventBus::new(),
            host: RefCell::new(HostState::default()),
            transport,
            config,
        };

        if !bridge.transport.is_connected() {
            tracing::warn!("bridge running without a host; actions will be dropped");
        }
        if bridge.config.request_initial_state {
            bridge.transport.invoke(Action::RequestInitialState);
        }
        bridge
    }

    /// Drops every subscription. Cached values stay readable.
    pub fn teardown(&self) {
        self.events.clear();
        self.parameters.clear_subscribers();
        tracing::debug!("bridge torn down");
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    /// Clamps to the configured range, writes optimistically and forwards.
    pub fn send_parameter(&self, id: &str, value: f64) {
        if !value.is_finite() {
            tracing::warn!(id, value, "dropping non-finite parameter value");
            return;
        }
        let value = match self.config.range_for(id) {
            Some(range) => range.clamp(value),
            None => value,
        };
        self.parameters.write(id, value);
    }

    pub fn parameter(&self, id: &str) -> Option<f64> {
        self.parameters.read(id)
    }

    pub fn get_parameter(&self, id: &str, default: f64) -> f64 {
        self.parameter(id).unwrap_or(default)
    }

    pub fn parameters(&self) -> HashMap<String, f64> {
        self.parameters.snapshot()
    }

    pub fn subscribe_parameters(
        &self,
        callback: impl Fn(&ParameterChange) + 'static,
    ) -> Subscription {
        self.parameters.subscribe(callback)
    }

    pub fn add_event_listener(
        &self,
        channel: &str,
        callback: impl Fn(&HostEvent) + 'static,
    ) -> Subscription {
        self.events.subscribe(channel, callback)
    }

    pub fn playheads(&self) -> Playheads {
        self.host.borrow().playheads
    }

    pub fn waveforms(&self) -> Option<SliceWaveforms> {
        self.host.borrow().waveforms.clone()
    }

    pub fn is_standalone(&self) -> bool {
        self.host.borrow().is_standalone
    }

    /// Decodes one raw line from the host and routes it.
    pub fn receive(&self, line: &str) {
        self.transport.deliver(line, self);
    }

    pub fn perform_sequence_reset(&self) {
        self.transport.invoke(Action::PerformSequenceReset);
    }

    pub fn perform_soft_reset(&self) {
        self.transport.invoke(Action::PerformSoftReset);
    }

    pub fn perform_hard_reset(&self) {
        self.transport.invoke(Action::PerformHardReset);
    }

    pub fn trigger_note(&self, index: u8) {
        self.transport.invoke(Action::TriggerNoteFromUi { index });
    }

    pub fn load_sample(&self, name: &str) {
        self.transport.invoke(Action::LoadSample {
            name: name.to_string(),
        });
    }

    pub fn get_device_list(&self) {
        self.transport.invoke(Action::GetDeviceList);
    }

    pub fn set_audio_device(&self, name: &str) {
        self.transport.invoke(Action::SetAudioDevice {
            name: name.to_string(),
        });
    }

    pub fn set_midi_input(&self, id: &str, enabled: bool) {
        self.transport.invoke(Action::SetMidiInput {
            id: id.to_string(),
            enabled,
        });
    }

    pub fn set_audio_input_channel(&self, index: u32) {
        self.transport.invoke(Action::SetAudioInputChannel { index });
    }

    pub fn open_bluetooth_pairing_dialog(&self) {
        self.transport.invoke(Action::OpenBluetoothPairingDialog);
    }

    /// Routes `note` events into `surface` so a held slice re-fires as the
    /// host playhead moves.
    pub fn bind_surface(self: &Rc<Self>, surface: Rc<RefCell<CircularSurface>>) -> Subscription {
        let weak: Weak<Self> = Rc::downgrade(self);
        self.add_event_listener(NOTE_CHANNEL, move |event| {
            let (HostEvent::Note(note), Some(bridge)) = (event, weak.upgrade()) else {
                return;
            };
            match surface.try_borrow_mut() {
                Ok(mut surface) => {
                    surface.on_note(note, &*bridge);
                }
                Err(_) => tracing::warn!("surface busy; skipping playhead re-trigger"),
            }
        })
    }

    fn record(&self, event: &HostEvent) {
        let mut host = self.host.borrow_mut();
        match event {
            HostEvent::Note(NoteEvent { triggered, original }) => {
                if triggered.is_some() {
                    host.playheads.triggered = *triggered;
                }
                if original.is_some() {
                    host.playheads.original = *original;
                }
            }
            HostEvent::Waveform(waveforms) => host.waveforms = Some(waveforms.clone()),
            HostEvent::Environment { is_standalone } => {
                host.is_standalone = *is_standalone;
                let mode = if *is_standalone { "standalone" } else { "plugin" };
                tracing::info!(mode, "host environment detected");
            }
            HostEvent::Custom { .. } => {}
        }
    }
}

impl InboundHandler for Bridge {
    fn on_parameter_update(&self, update: ParameterUpdate) {
        self.parameters.apply_echo(&update.id, update.value);
    }

    fn on_event(&self, event: HostEvent) {
        self.record(&event);
        self.events.publish(event.channel(), &event);
    }
}

impl SurfaceActions for Bridge {
    fn trigger_slice(&self, index: u8) {
        self.trigger_note(index);
    }

    fn soft_reset(&self) {
        self.perform_soft_reset();
    }

    fn sync_playheads(&self) {
        self.perform_sequence_reset();
    }
}
