//! Wire schema spoken between the surface and the host.
//!
//! Outbound traffic is a single envelope shape wrapping one [`Action`].
//! Inbound traffic is either a parameter echo or a named event; the reserved
//! event names decode into typed [`HostEvent`] variants and everything else is
//! passed through as raw JSON.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{ChopperError, Result};

/// Bumped whenever an action's name or argument tuple changes.
pub const PROTOCOL_VERSION: u32 = 1;

/// `eventId` carried by every outbound envelope.
pub const INVOKE_EVENT_ID: &str = "__bridge__invoke";

pub const SLICE_COUNT: usize = 16;
pub const SAMPLES_PER_SLICE: usize = 32;
pub const WAVEFORM_LEN: usize = SLICE_COUNT * SAMPLES_PER_SLICE;

/// Offset of the original-sequence note range (`note2`) on the wire.
const ORIGINAL_NOTE_BASE: u8 = 32;

pub const NOTE_CHANNEL: &str = "note";
pub const WAVEFORM_CHANNEL: &str = "waveform";
pub const ENVIRONMENT_CHANNEL: &str = "environment";

/// Every native function the host exposes. None of them return a value.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    SendParameterValue { id: String, value: f64 },
    PerformSequenceReset,
    PerformSoftReset,
    PerformHardReset,
    TriggerNoteFromUi { index: u8 },
    RequestInitialState,
    GetDeviceList,
    SetAudioDevice { name: String },
    SetMidiInput { id: String, enabled: bool },
    SetAudioInputChannel { index: u32 },
    OpenBluetoothPairingDialog,
    LoadSample { name: String },
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::SendParameterValue { .. } => "sendParameterValue",
            Action::PerformSequenceReset => "performSequenceReset",
            Action::PerformSoftReset => "performSoftReset",
            Action::PerformHardReset => "performHardReset",
            Action::TriggerNoteFromUi { .. } => "triggerNoteFromUi",
            Action::RequestInitialState => "requestInitialState",
            Action::GetDeviceList => "getDeviceList",
            Action::SetAudioDevice { .. } => "setAudioDevice",
            Action::SetMidiInput { .. } => "setMidiInput",
            Action::SetAudioInputChannel { .. } => "setAudioInputChannel",
            Action::OpenBluetoothPairingDialog => "openBluetoothPairingDialog",
            Action::LoadSample { .. } => "loadSample",
        }
    }

    /// Ordered positional arguments for the envelope's `params` list.
    pub fn params(&self) -> Vec<Value> {
        match self {
            Action::SendParameterValue { id, value } => vec![json!(id), json!(value)],
            Action::TriggerNoteFromUi { index } => vec![json!(index)],
            Action::SetAudioDevice { name } | Action::LoadSample { name } => vec![json!(name)],
            Action::SetMidiInput { id, enabled } => vec![json!(id), json!(enabled)],
            Action::SetAudioInputChannel { index } => vec![json!(index)],
            Action::PerformSequenceReset
            | Action::PerformSoftReset
            | Action::PerformHardReset
            | Action::RequestInitialState
            | Action::GetDeviceList
            | Action::OpenBluetoothPairingDialog => Vec::new(),
        }
    }

    pub fn into_envelope(self, result_id: u64) -> InvokeEnvelope {
        InvokeEnvelope {
            event_id: INVOKE_EVENT_ID.to_string(),
            protocol_version: PROTOCOL_VERSION,
            payload: InvokePayload {
                name: self.name().to_string(),
                params: self.params(),
                result_id,
            },
        }
    }

    /// Host-side decoding of an invoke payload back into an action.
    pub fn from_payload(payload: &InvokePayload) -> Result<Self> {
        let name = payload.name.as_str();
        let args = ArgReader::new(name, &payload.params);
        let action = match name {
            "sendParameterValue" => Action::SendParameterValue {
                id: args.string(0)?,
                value: args.number(1)?,
            },
            "performSequenceReset" => Action::PerformSequenceReset,
            "performSoftReset" => Action::PerformSoftReset,
            "performHardReset" => Action::PerformHardReset,
            "triggerNoteFromUi" => Action::TriggerNoteFromUi {
                index: args.slice_index(0)?,
            },
            "requestInitialState" => Action::RequestInitialState,
            "getDeviceList" => Action::GetDeviceList,
            "setAudioDevice" => Action::SetAudioDevice {
                name: args.string(0)?,
            },
            "setMidiInput" => Action::SetMidiInput {
                id: args.string(0)?,
                enabled: args.boolean(1)?,
            },
            "setAudioInputChannel" => Action::SetAudioInputChannel {
                index: args.unsigned(0)?,
            },
            "openBluetoothPairingDialog" => Action::OpenBluetoothPairingDialog,
            "loadSample" => Action::LoadSample {
                name: args.string(0)?,
            },
            other => return Err(ChopperError::UnknownAction(other.to_string())),
        };

        let expected = action.params().len();
        if payload.params.len() != expected {
            return Err(ChopperError::invalid(
                name,
                format!("expected {expected} arguments, got {}", payload.params.len()),
            ));
        }
        Ok(action)
    }
}

struct ArgReader<'a> {
    name: &'a str,
    params: &'a [Value],
}

impl<'a> ArgReader<'a> {
    fn new(name: &'a str, params: &'a [Value]) -> Self {
        Self { name, params }
    }

    fn get(&self, index: usize) -> Result<&'a Value> {
        self.params
            .get(index)
            .ok_or_else(|| ChopperError::invalid(self.name, format!("missing argument {index}")))
    }

    fn fail(&self, index: usize, expected: &str) -> ChopperError {
        ChopperError::invalid(self.name, format!("argument {index} must be {expected}"))
    }

    fn string(&self, index: usize) -> Result<String> {
        self.get(index)?
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| self.fail(index, "a string"))
    }

    fn number(&self, index: usize) -> Result<f64> {
        self.get(index)?
            .as_f64()
            .ok_or_else(|| self.fail(index, "a number"))
    }

    fn boolean(&self, index: usize) -> Result<bool> {
        self.get(index)?
            .as_bool()
            .ok_or_else(|| self.fail(index, "a boolean"))
    }

    fn unsigned(&self, index: usize) -> Result<u32> {
        self.get(index)?
            .as_u64()
            .and_then(|value| u32::try_from(value).ok())
            .ok_or_else(|| self.fail(index, "an unsigned integer"))
    }

    fn slice_index(&self, index: usize) -> Result<u8> {
        self.unsigned(index)
            .ok()
            .and_then(|value| u8::try_from(value).ok())
            .filter(|value| usize::from(*value) < SLICE_COUNT)
            .ok_or_else(|| self.fail(index, "a slice index below 16"))
    }
}

/// Outbound remote-invocation record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvokeEnvelope {
    #[serde(rename = "eventId")]
    pub event_id: String,
    #[serde(rename = "protocolVersion")]
    pub protocol_version: u32,
    pub payload: InvokePayload,
}

impl InvokeEnvelope {
    /// Host-side decoding of a whole envelope. Envelopes written against
    /// another schema version are refused before the payload is looked at.
    pub fn to_action(&self) -> Result<Action> {
        if self.event_id != INVOKE_EVENT_ID {
            return Err(ChopperError::invalid(
                "envelope",
                format!("unexpected eventId `{}`", self.event_id),
            ));
        }
        if self.protocol_version != PROTOCOL_VERSION {
            return Err(ChopperError::UnsupportedVersion {
                found: self.protocol_version,
                supported: PROTOCOL_VERSION,
            });
        }
        Action::from_payload(&self.payload)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvokePayload {
    pub name: String,
    pub params: Vec<Value>,
    /// Correlation token. The host does not answer with it yet.
    #[serde(rename = "resultId")]
    pub result_id: u64,
}

/// One raw inbound line.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InboundMessage {
    Parameter {
        id: String,
        value: Value,
    },
    Event {
        #[serde(rename = "type")]
        kind: String,
        #[serde(default)]
        data: Value,
    },
}

impl InboundMessage {
    pub fn parse(line: &str) -> Result<Self> {
        Ok(serde_json::from_str(line)?)
    }
}

/// Authoritative echo of one parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterUpdate {
    pub id: String,
    pub value: f64,
}

impl ParameterUpdate {
    pub fn decode(id: String, value: &Value) -> Result<Self> {
        match value.as_f64() {
            Some(value) => Ok(Self { id, value }),
            None => Err(ChopperError::invalid(
                "parameter",
                format!("value for `{id}` is not numeric: {value}"),
            )),
        }
    }
}

/// Triggered and original playhead positions carried by a `note` event.
///
/// Either side may be missing when the host sent it out of range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteEvent {
    pub triggered: Option<u8>,
    pub original: Option<u8>,
}

impl NoteEvent {
    pub fn decode(data: &Value) -> Result<Self> {
        let triggered = note_field(data, "note1").filter(|note| usize::from(*note) < SLICE_COUNT);
        let original = note_field(data, "note2")
            .and_then(|note| note.checked_sub(ORIGINAL_NOTE_BASE))
            .filter(|note| usize::from(*note) < SLICE_COUNT);

        if triggered.is_none() && original.is_none() {
            return Err(ChopperError::invalid(
                NOTE_CHANNEL,
                format!("no usable note1/note2 in {data}"),
            ));
        }
        Ok(Self { triggered, original })
    }
}

/// Whole-number field that fits a MIDI-style note byte.
fn note_field(data: &Value, key: &str) -> Option<u8> {
    let value = data.get(key)?.as_f64()?;
    let in_range = (0.0..=f64::from(u8::MAX)).contains(&value) && value.fract() == 0.0;
    in_range.then_some(value as u8)
}

/// A waveform snapshot split into one block per slice, in slice order.
#[derive(Debug, Clone, PartialEq)]
pub struct SliceWaveforms {
    slices: [[f64; SAMPLES_PER_SLICE]; SLICE_COUNT],
}

impl Default for SliceWaveforms {
    fn default() -> Self {
        Self {
            slices: [[0.0; SAMPLES_PER_SLICE]; SLICE_COUNT],
        }
    }
}

impl SliceWaveforms {
    /// Chunks exactly [`WAVEFORM_LEN`] samples into slices.
    pub fn from_samples(samples: &[f64]) -> Result<Self> {
        if samples.len() != WAVEFORM_LEN {
            return Err(ChopperError::invalid(
                WAVEFORM_CHANNEL,
                format!("expected {WAVEFORM_LEN} samples, got {}", samples.len()),
            ));
        }
        let mut waveforms = Self::default();
        for (slice, chunk) in waveforms
            .slices
            .iter_mut()
            .zip(samples.chunks_exact(SAMPLES_PER_SLICE))
        {
            slice.copy_from_slice(chunk);
        }
        Ok(waveforms)
    }

    pub fn decode(data: &Value) -> Result<Self> {
        let raw = data
            .get("data")
            .and_then(Value::as_array)
            .ok_or_else(|| ChopperError::invalid(WAVEFORM_CHANNEL, "missing `data` array"))?;
        let samples = raw
            .iter()
            .map(Value::as_f64)
            .collect::<Option<Vec<f64>>>()
            .ok_or_else(|| ChopperError::invalid(WAVEFORM_CHANNEL, "non-numeric sample"))?;
        Self::from_samples(&samples)
    }

    pub fn slices(&self) -> &[[f64; SAMPLES_PER_SLICE]; SLICE_COUNT] {
        &self.slices
    }

    pub fn slice(&self, index: usize) -> Option<&[f64; SAMPLES_PER_SLICE]> {
        self.slices.get(index)
    }
}

/// Non-parameter notification from the host.
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    Note(NoteEvent),
    Waveform(SliceWaveforms),
    Environment { is_standalone: bool },
    /// Any event type outside the reserved set.
    Custom { channel: String, data: Value },
}

impl HostEvent {
    pub fn decode(channel: &str, data: Value) -> Result<Self> {
        match channel {
            NOTE_CHANNEL => NoteEvent::decode(&data).map(HostEvent::Note),
            WAVEFORM_CHANNEL => SliceWaveforms::decode(&data).map(HostEvent::Waveform),
            ENVIRONMENT_CHANNEL => data
                .get("isStandalone")
                .and_then(Value::as_bool)
                .map(|is_standalone| HostEvent::Environment { is_standalone })
                .ok_or_else(|| {
                    ChopperError::invalid(ENVIRONMENT_CHANNEL, "`isStandalone` must be a boolean")
                }),
            other => Ok(HostEvent::Custom {
                channel: other.to_string(),
                data,
            }),
        }
    }

    pub fn channel(&self) -> &str {
        match self {
            HostEvent::Note(_) => NOTE_CHANNEL,
            HostEvent::Waveform(_) => WAVEFORM_CHANNEL,
            HostEvent::Environment { .. } => ENVIRONMENT_CHANNEL,
            HostEvent::Custom { channel, .. } => channel.as_str(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_matches_wire_shape() {
        let envelope = Action::SendParameterValue {
            id: "delayAdjust".to_string(),
            value: 12.0,
        }
        .into_envelope(7);

        let wire = serde_json::to_value(&envelope).unwrap();
        assert_eq!(
            wire,
            json!({
                "eventId": "__bridge__invoke",
                "protocolVersion": PROTOCOL_VERSION,
                "payload": { "name": "sendParameterValue", "params": ["delayAdjust", 12.0], "resultId": 7 }
            })
        );
    }

    #[test]
    fn bare_actions_carry_no_params() {
        let envelope = Action::RequestInitialState.into_envelope(1);
        assert_eq!(envelope.payload.name, "requestInitialState");
        assert!(envelope.payload.params.is_empty());
    }

    #[test]
    fn decodes_payload_back_into_action() {
        let payload = Action::SetMidiInput {
            id: "usb-1".to_string(),
            enabled: true,
        }
        .into_envelope(3)
        .payload;
        assert_eq!(
            Action::from_payload(&payload).unwrap(),
            Action::SetMidiInput {
                id: "usb-1".to_string(),
                enabled: true
            }
        );
    }

    #[test]
    fn envelope_version_is_checked_on_decode() {
        let envelope = Action::TriggerNoteFromUi { index: 5 }.into_envelope(2);
        assert_eq!(envelope.protocol_version, 1);
        assert_eq!(envelope.to_action().unwrap(), Action::TriggerNoteFromUi { index: 5 });

        let future = InvokeEnvelope {
            protocol_version: PROTOCOL_VERSION + 1,
            ..envelope.clone()
        };
        assert!(matches!(
            future.to_action(),
            Err(ChopperError::UnsupportedVersion { found: 2, supported: 1 })
        ));

        let untagged: std::result::Result<InvokeEnvelope, _> = serde_json::from_value(json!({
            "eventId": "__bridge__invoke",
            "payload": { "name": "performSoftReset", "params": [], "resultId": 1 }
        }));
        assert!(untagged.is_err());

        let foreign = InvokeEnvelope {
            event_id: "resize".to_string(),
            ..envelope
        };
        assert!(foreign.to_action().is_err());
    }

    #[test]
    fn rejects_unknown_action_and_bad_arguments() {
        let unknown = InvokePayload {
            name: "launchMissiles".to_string(),
            params: Vec::new(),
            result_id: 0,
        };
        assert!(matches!(
            Action::from_payload(&unknown),
            Err(ChopperError::UnknownAction(name)) if name == "launchMissiles"
        ));

        let bad_index = InvokePayload {
            name: "triggerNoteFromUi".to_string(),
            params: vec![json!(16)],
            result_id: 0,
        };
        assert!(Action::from_payload(&bad_index).is_err());

        let extra = InvokePayload {
            name: "performSoftReset".to_string(),
            params: vec![json!(1)],
            result_id: 0,
        };
        assert!(Action::from_payload(&extra).is_err());
    }

    #[test]
    fn parses_inbound_lines() {
        let parameter = InboundMessage::parse(r#"{"kind":"parameter","id":"gain","value":0.5}"#).unwrap();
        assert!(matches!(parameter, InboundMessage::Parameter { ref id, .. } if id == "gain"));

        let event =
            InboundMessage::parse(r#"{"kind":"event","type":"note","data":{"note1":3}}"#).unwrap();
        assert!(matches!(event, InboundMessage::Event { ref kind, .. } if kind == "note"));
    }

    #[test]
    fn non_numeric_parameter_is_invalid() {
        assert!(ParameterUpdate::decode("gain".to_string(), &json!("loud")).is_err());
        let update = ParameterUpdate::decode("gain".to_string(), &json!(2)).unwrap();
        assert_eq!(update.value, 2.0);
    }

    #[test]
    fn note_ranges_are_checked_per_field() {
        let note = NoteEvent::decode(&json!({ "note1": 4, "note2": 47 })).unwrap();
        assert_eq!(note.triggered, Some(4));
        assert_eq!(note.original, Some(15));

        let half = NoteEvent::decode(&json!({ "note1": 16, "note2": 32 })).unwrap();
        assert_eq!(half.triggered, None);
        assert_eq!(half.original, Some(0));

        assert!(NoteEvent::decode(&json!({ "note1": -1, "note2": 48 })).is_err());
        assert!(NoteEvent::decode(&json!({ "note1": 2.5 })).is_err());
    }

    #[test]
    fn extreme_note_values_are_rejected() {
        for extreme in [json!(i64::MIN), json!(-1e300), json!(1e300), json!(u64::MAX), json!(287)] {
            assert!(NoteEvent::decode(&json!({ "note1": extreme, "note2": extreme })).is_err());
        }
        // Below the original-note base.
        assert!(NoteEvent::decode(&json!({ "note2": 20 })).is_err());

        let partial = NoteEvent::decode(&json!({ "note1": 9, "note2": i64::MIN })).unwrap();
        assert_eq!(partial.triggered, Some(9));
        assert_eq!(partial.original, None);
    }

    #[test]
    fn waveform_zeros_chunk_into_sixteen_blocks() {
        let data = json!({ "data": vec![0.0; WAVEFORM_LEN] });
        let waveforms = SliceWaveforms::decode(&data).unwrap();
        assert_eq!(waveforms.slices().len(), 16);
        assert!(waveforms
            .slices()
            .iter()
            .all(|slice| slice.len() == 32 && slice.iter().all(|s| *s == 0.0)));
    }

    #[test]
    fn waveform_chunks_preserve_order() {
        let samples: Vec<f64> = (0..WAVEFORM_LEN).map(|i| i as f64).collect();
        let waveforms = SliceWaveforms::from_samples(&samples).unwrap();
        assert_eq!(waveforms.slice(0).unwrap()[0], 0.0);
        assert_eq!(waveforms.slice(1).unwrap()[0], 32.0);
        assert_eq!(waveforms.slice(15).unwrap()[31], 511.0);
    }

    #[test]
    fn waveform_with_wrong_length_is_invalid() {
        assert!(SliceWaveforms::decode(&json!({ "data": vec![0.0; 511] })).is_err());
        assert!(SliceWaveforms::decode(&json!({ "data": "nope" })).is_err());
    }

    #[test]
    fn waveform_samples_keep_full_range() {
        let mut samples = vec![0.0; WAVEFORM_LEN];
        samples[0] = 1e300;
        samples[33] = 0.1;
        let waveforms = SliceWaveforms::decode(&json!({ "data": samples })).unwrap();
        assert_eq!(waveforms.slice(0).unwrap()[0], 1e300);
        assert_eq!(waveforms.slice(1).unwrap()[1], 0.1);
    }

    #[test]
    fn reserved_channels_decode_to_typed_events() {
        let env = HostEvent::decode("environment", json!({ "isStandalone": true })).unwrap();
        assert_eq!(env, HostEvent::Environment { is_standalone: true });
        assert!(HostEvent::decode("environment", json!({ "isStandalone": "yes" })).is_err());

        let custom = HostEvent::decode("deviceList", json!(["a", "b"])).unwrap();
        assert_eq!(custom.channel(), "deviceList");
    }
}
