use std::{
    cell::{Cell, RefCell},
    fmt,
    io::Write,
    rc::Rc,
};

use crate::{
    protocol::{Action, HostEvent, InboundMessage, InvokeEnvelope, ParameterUpdate},
    ChopperError, Result,
};

/// Outbound half of a host connection.
pub trait HostChannel {
    /// Hands one serialised envelope to the host.
    fn post_message(&self, message: &str) -> Result<()>;
}

/// Receiver for decoded inbound notifications.
pub trait InboundHandler {
    fn on_parameter_update(&self, update: ParameterUpdate);
    fn on_event(&self, event: HostEvent);
}

/// Whether a host is reachable at all.
pub enum HostLink {
    Connected(Box<dyn HostChannel>),
    Disconnected,
}

impl fmt::Debug for HostLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostLink::Connected(_) => f.write_str("Connected"),
            HostLink::Disconnected => f.write_str("Disconnected"),
        }
    }
}

/// Encodes outbound actions and decodes raw inbound lines.
#[derive(Debug)]
pub struct Transport {
    link: HostLink,
    next_result_id: Cell<u64>,
}

impl Transport {
    pub fn new(link: HostLink) -> Self {
        Self {
            link,
            next_result_id: Cell::new(1),
        }
    }

    pub fn connected(channel: impl HostChannel + 'static) -> Self {
        Self::new(HostLink::Connected(Box::new(channel)))
    }

    pub fn disconnected() -> Self {
        Self::new(HostLink::Disconnected)
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.link, HostLink::Connected(_))
    }

    /// Fire-and-forget invocation of a native host function.
    ///
    /// Never fails: a missing host or a failed post is logged and dropped.
    pub fn invoke(&self, action: Action) {
        let channel = match &self.link {
            HostLink::Connected(channel) => channel,
            HostLink::Disconnected => {
                tracing::warn!(action = action.name(), "cannot invoke: no host connection");
                return;
            }
        };

        let result_id = self.next_result_id.get();
        self.next_result_id.set(result_id.wrapping_add(1));
        let name = action.name();

        if let Err(err) = Self::encode(action.into_envelope(result_id))
            .and_then(|message| channel.post_message(&message))
        {
            tracing::warn!(action = name, %err, "invoke dropped");
            return;
        }
        tracing::debug!(action = name, result_id, "invoked");
    }

    fn encode(envelope: InvokeEnvelope) -> Result<String> {
        Ok(serde_json::to_string(&envelope)?)
    }

    /// Decodes one raw inbound line and hands it to `handler`.
    ///
    /// Lines are processed synchronously, so notifications reach the handler
    /// in the order the host sent them. Malformed lines are dropped.
    pub fn deliver(&self, line: &str, handler: &dyn InboundHandler) {
        match Self::decode(line) {
            Ok(Inbound::Parameter(update)) => {
                tracing::debug!(id = %update.id, value = update.value, "parameter echo");
                handler.on_parameter_update(update);
            }
            Ok(Inbound::Event(event)) => {
                tracing::debug!(channel = event.channel(), "host event");
                handler.on_event(event);
            }
            Err(err) => tracing::warn!(%err, "dropping inbound message"),
        }
    }

    fn decode(line: &str) -> Result<Inbound> {
        match InboundMessage::parse(line)? {
            InboundMessage::Parameter { id, value } => {
                ParameterUpdate::decode(id, &value).map(Inbound::Parameter)
            }
            InboundMessage::Event { kind, data } => {
                HostEvent::decode(&kind, data).map(Inbound::Event)
            }
        }
    }
}

enum Inbound {
    Parameter(ParameterUpdate),
    Event(HostEvent),
}

/// Keeps every posted message in memory. Clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct RecordingChannel {
    messages: Rc<RefCell<Vec<String>>>,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.borrow().clone()
    }

    /// Posted envelopes, parsed back. Unparseable entries are skipped.
    pub fn envelopes(&self) -> Vec<InvokeEnvelope> {
        self.messages
            .borrow()
            .iter()
            .filter_map(|message| serde_json::from_str(message).ok())
            .collect()
    }

    /// Names of the invoked actions, oldest first.
    pub fn action_names(&self) -> Vec<String> {
        self.envelopes()
            .into_iter()
            .map(|envelope| envelope.payload.name)
            .collect()
    }

    pub fn clear(&self) {
        self.messages.borrow_mut().clear();
    }
}

impl HostChannel for RecordingChannel {
    fn post_message(&self, message: &str) -> Result<()> {
        self.messages.borrow_mut().push(message.to_string());
        Ok(())
    }
}

/// Writes each envelope as one line to the wrapped writer and flushes.
pub struct WriterChannel<W: Write> {
    writer: RefCell<W>,
}

impl<W: Write> WriterChannel<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: RefCell::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl<W: Write> HostChannel for WriterChannel<W> {
    fn post_message(&self, message: &str) -> Result<()> {
        let mut writer = self
            .writer
            .try_borrow_mut()
            .map_err(|_| ChopperError::msg("host writer is already in use"))?;
        writeln!(writer, "{message}")?;
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingChannel;

    impl HostChannel for FailingChannel {
        fn post_message(&self, _message: &str) -> Result<()> {
            Err(ChopperError::msg("pipe closed"))
        }
    }

    #[derive(Default)]
    struct Collector {
        seen: RefCell<Vec<String>>,
    }

    impl InboundHandler for Collector {
        fn on_parameter_update(&self, update: ParameterUpdate) {
            self.seen
                .borrow_mut()
                .push(format!("{}={}", update.id, update.value));
        }

        fn on_event(&self, event: HostEvent) {
            self.seen.borrow_mut().push(event.channel().to_string());
        }
    }

    #[test]
    fn result_ids_increase_per_invoke() {
        let channel = RecordingChannel::new();
        let transport = Transport::connected(channel.clone());

        transport.invoke(Action::PerformSoftReset);
        transport.invoke(Action::TriggerNoteFromUi { index: 3 });

        let envelopes = channel.envelopes();
        assert_eq!(envelopes.len(), 2);
        assert_eq!(envelopes[0].payload.result_id, 1);
        assert_eq!(envelopes[1].payload.result_id, 2);
        assert_eq!(envelopes[1].payload.name, "triggerNoteFromUi");
    }

    #[test]
    fn disconnected_invoke_is_a_no_op() {
        let transport = Transport::disconnected();
        assert!(!transport.is_connected());
        transport.invoke(Action::PerformHardReset);
    }

    #[test]
    fn failed_post_is_swallowed() {
        let transport = Transport::connected(FailingChannel);
        transport.invoke(Action::GetDeviceList);
    }

    #[test]
    fn writer_channel_emits_one_line_per_envelope() {
        let channel = WriterChannel::new(Vec::new());
        channel.post_message("{\"a\":1}").unwrap();
        channel.post_message("{\"b\":2}").unwrap();
        let written = String::from_utf8(channel.into_inner()).unwrap();
        assert_eq!(written, "{\"a\":1}\n{\"b\":2}\n");
    }

    #[test]
    fn delivers_in_order_and_drops_malformed_lines() {
        let transport = Transport::disconnected();
        let collector = Collector::default();

        for line in [
            r#"{"kind":"parameter","id":"gain","value":1.5}"#,
            "not json",
            r#"{"kind":"parameter","id":"gain","value":"high"}"#,
            r#"{"kind":"event","type":"waveform","data":{"data":[1,2,3]}}"#,
            r#"{"kind":"event","type":"environment","data":{"isStandalone":false}}"#,
            r#"{"kind":"parameter","id":"mix","value":0}"#,
        ] {
            transport.deliver(line, &collector);
        }

        assert_eq!(
            collector.seen.into_inner(),
            vec!["gain=1.5", "environment", "mix=0"]
        );
    }
}
