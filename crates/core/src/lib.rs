//! Core library for the Chopper Surface control panel.
//!
//! Two subsystems live here. The host bridge ([`Bridge`]) speaks the invoke
//! protocol to the audio host, caches parameter values optimistically and
//! fans host notifications out to observers. The gesture recognizer
//! ([`gesture`]) turns pointer motion over the circular slice surface into
//! slice triggers and hub resets, which it hands back to the bridge.
//!
//! Everything is single-threaded and callback driven; nothing blocks waiting
//! for the host.

pub mod bridge;
pub mod config;
pub mod error;
pub mod events;
pub mod gesture;
pub mod protocol;
pub mod store;
pub mod transport;

pub use bridge::{Bridge, Playheads};
pub use config::{AppConfig, BridgeConfig, ParameterRange, SurfaceConfig};
pub use error::{ChopperError, Result};
pub use events::{EventBus, Subscription};
pub use gesture::{
    hit_test, CircularSurface, GestureCommand, GestureSession, GestureState, HitRegion, Point,
    SurfaceActions, SurfaceGeometry,
};
pub use protocol::{
    Action, HostEvent, InboundMessage, InvokeEnvelope, InvokePayload, NoteEvent, ParameterUpdate,
    SliceWaveforms, PROTOCOL_VERSION,
};
pub use store::{ChangeOrigin, ParameterChange, ParameterStore};
pub use transport::{HostChannel, HostLink, InboundHandler, RecordingChannel, Transport, WriterChannel};
