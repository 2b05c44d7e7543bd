//! Session level scenarios over in-memory streams

use crate::codec::Frame;
use crate::connection::{FrameReader, Inbound};
use crate::datatypes::*;
use crate::gate::Gate;
use crate::hex;
use crate::server::serve_connection;
use crate::session::{
    GateEvents, KeepAliveConfig, NewMessage, Session, SessionConfig, SessionState, SmppError,
    SubmitError,
};
use bytes::Bytes;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncWriteExt, DuplexStream, WriteHalf};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tracing::Level;

/// Upper bound for any single expected event or frame
const WAIT: Duration = Duration::from_secs(2);

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Event {
    Log(Level, String),
    Channel(String, String),
    Message(NewMessage),
    Status(String, MessageStatus, Option<String>),
    Report(String, MessageStatus),
}

/// Observer that queues every callback for the test to await
#[derive(Clone)]
pub(crate) struct RecordingEvents {
    tx: mpsc::UnboundedSender<Event>,
    rx: Arc<Mutex<mpsc::UnboundedReceiver<Event>>>,
}

impl GateEvents for RecordingEvents {
    fn log(&self, level: Level, text: &str) {
        let _ = self.tx.send(Event::Log(level, text.to_string()));
    }

    fn channel_event(&self, channel: &str, description: &str, _pdu: Option<&str>) {
        let _ = self
            .tx
            .send(Event::Channel(channel.to_string(), description.to_string()));
    }

    fn new_message(&self, message: &NewMessage) {
        let _ = self.tx.send(Event::Message(message.clone()));
    }

    fn message_status_changed(&self, local_id: &str, status: MessageStatus, remote_id: Option<&str>) {
        let _ = self.tx.send(Event::Status(
            local_id.to_string(),
            status,
            remote_id.map(str::to_string),
        ));
    }

    fn delivery_report(&self, remote_id: &str, status: MessageStatus) {
        let _ = self
            .tx
            .send(Event::Report(remote_id.to_string(), status));
    }
}

impl RecordingEvents {
    pub(crate) fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Arc::new(Mutex::new(rx)),
        }
    }

    /// Skip events until `pick` accepts one
    async fn next_where<T>(&self, what: &str, mut pick: impl FnMut(Event) -> Option<T>) -> T {
        let mut rx = self.rx.lock().await;
        loop {
            match tokio::time::timeout(WAIT, rx.recv()).await {
                Ok(Some(event)) => {
                    if let Some(found) = pick(event) {
                        return found;
                    }
                }
                Ok(None) => panic!("event channel closed waiting for {what}"),
                Err(_) => panic!("timed out waiting for {what}"),
            }
        }
    }

    pub(crate) async fn next_status(&self) -> (String, MessageStatus, Option<String>) {
        self.next_where("a status change", |event| match event {
            Event::Status(local_id, status, remote_id) => Some((local_id, status, remote_id)),
            _ => None,
        })
        .await
    }

    pub(crate) async fn next_message(&self) -> NewMessage {
        self.next_where("a new message", |event| match event {
            Event::Message(message) => Some(message),
            _ => None,
        })
        .await
    }

    pub(crate) async fn next_report(&self) -> (String, MessageStatus) {
        self.next_where("a delivery report", |event| match event {
            Event::Report(remote_id, status) => Some((remote_id, status)),
            _ => None,
        })
        .await
    }

    pub(crate) async fn next_channel_event(&self, containing: &str) -> String {
        self.next_where(containing, |event| match event {
            Event::Channel(_, description) if description.contains(containing) => {
                Some(description)
            }
            _ => None,
        })
        .await
    }

    /// A status change already queued, without waiting
    pub(crate) fn try_next_status(&self) -> Option<(String, MessageStatus, Option<String>)> {
        let mut rx = self.rx.try_lock().ok()?;
        while let Ok(event) = rx.try_recv() {
            if let Event::Status(local_id, status, remote_id) = event {
                return Some((local_id, status, remote_id));
            }
        }
        None
    }
}

/// The far end of an in-memory stream, driven by hand
pub(crate) struct Peer {
    reader: FrameReader,
    writer: WriteHalf<DuplexStream>,
}

impl Peer {
    pub(crate) fn new(io: DuplexStream) -> Self {
        let (read, writer) = tokio::io::split(io);
        Self {
            reader: FrameReader::new(Box::new(read)),
            writer,
        }
    }

    pub(crate) async fn expect_inbound(&mut self) -> (Frame, Bytes) {
        match tokio::time::timeout(WAIT, self.reader.read_frame()).await {
            Ok(Ok(Some(Inbound::Frame { frame, raw }))) => (frame, raw),
            other => panic!("expected a frame, got {other:?}"),
        }
    }

    pub(crate) async fn expect_frame(&mut self) -> Frame {
        self.expect_inbound().await.0
    }

    /// The other side closed the stream
    pub(crate) async fn expect_closed(&mut self) {
        match tokio::time::timeout(WAIT, self.reader.read_frame()).await {
            Ok(Ok(None)) | Ok(Err(_)) => {}
            other => panic!("expected the stream to close, got {other:?}"),
        }
    }

    pub(crate) async fn send(&mut self, frame: Frame) {
        let bytes = frame.to_bytes().unwrap();
        self.send_raw(&bytes).await;
    }

    pub(crate) async fn send_raw(&mut self, bytes: &[u8]) {
        self.writer.write_all(bytes).await.unwrap();
        self.writer.flush().await.unwrap();
    }
}

fn quiet_keep_alive() -> KeepAliveConfig {
    KeepAliveConfig::disabled()
        .with_timeout(Duration::from_millis(150))
        .with_grace(Duration::from_millis(30))
        .with_sweep_interval(Duration::from_millis(10))
}

fn esme_config() -> SessionConfig {
    SessionConfig::new("systemId", "MyPass")
        .with_system_type("ESME")
        .with_multipart_delay(Duration::from_millis(1))
        .with_keep_alive(quiet_keep_alive())
}

/// A client session bound to a hand-driven peer
async fn bound_client(config: SessionConfig) -> (Session, Peer, RecordingEvents) {
    let events = RecordingEvents::new();
    let session = Session::client("smsc", config, Arc::new(events.clone()));
    let (local, remote) = tokio::io::duplex(64 * 1024);
    session.connect_over(local).await.unwrap();

    let mut peer = Peer::new(remote);
    let bind = peer.expect_frame().await;
    peer.send(Frame::BindTransceiverResp(BindTransceiverResponse::new(
        bind.sequence_number(),
        "SMSC",
    )))
    .await;
    assert!(session.wait_bound(WAIT).await);
    (session, peer, events)
}

struct Loopback {
    // Sessions only hold a weak handle to the gate
    _gate: Gate,
    server: Session,
    server_events: RecordingEvents,
    client: Session,
    client_events: RecordingEvents,
}

/// A client session bound through the acceptor to a server session
async fn loopback(server_config: SessionConfig, client_config: SessionConfig) -> Loopback {
    let server_events = RecordingEvents::new();
    let gate = Gate::new(Arc::new(server_events.clone()));
    let server = gate.add_server("esme", server_config).unwrap();

    let (local, remote) = tokio::io::duplex(64 * 1024);
    let acceptor = gate.clone();
    let accepted = tokio::spawn(async move { serve_connection(&acceptor, remote).await });

    let client_events = RecordingEvents::new();
    let client = Session::client("smsc", client_config, Arc::new(client_events.clone()));
    client.connect_over(local).await.unwrap();

    assert!(client.wait_bound(WAIT).await);
    accepted.await.unwrap().unwrap();
    assert!(server.is_bound());
    assert!(gate.is_active("esme"));

    Loopback {
        _gate: gate,
        server,
        server_events,
        client,
        client_events,
    }
}

#[tokio::test]
async fn client_bind_matches_reference_bytes() {
    let session = Session::client("smsc", esme_config(), Arc::new(RecordingEvents::new()));
    let (local, remote) = tokio::io::duplex(4096);
    session.connect_over(local).await.unwrap();

    let mut peer = Peer::new(remote);
    let (frame, raw) = peer.expect_inbound().await;
    assert_eq!(frame.command_id(), CommandId::BindTransceiver);
    assert_eq!(
        hex::encode(&raw),
        "0000002900000009000000000000000173797374656D4964004D79506173730045534D450034000000"
    );
    assert_eq!(session.pending_commands(), 1);
}

#[tokio::test]
async fn latin_deliver_sm_becomes_new_message() {
    let (_session, mut peer, events) = bound_client(esme_config()).await;

    let pdu = hex::decode(
        "00 00 00 45 00 00 00 05 00 00 00 00 00 00 00 12 00 01 01 34 37 39 37 35 30 39 31 38 \
         31 00 00 00 39 31 30 30 00 00 00 00 00 00 00 00 03 00 16 4E 6F 72 77 65 67 69 61 6E \
         20 63 68 61 72 3A 20 E6 F8 E5 C6 D8 C5",
    )
    .unwrap();
    peer.send_raw(&pdu).await;

    let Frame::DeliverSmResp(resp) = peer.expect_frame().await else {
        panic!("expected deliver_sm_resp");
    };
    assert_eq!(resp.sequence_number, 0x12);
    assert_eq!(resp.message_id.len(), 32);

    let message = events.next_message().await;
    assert_eq!(message.body, "Norwegian char: æøåÆØÅ");
    assert_eq!(message.format, BodyFormat::Latin);
    assert_eq!(message.sender, "4797509181");
    assert_eq!(message.recipient, "9100");
    assert_eq!(message.message_id, resp.message_id);
}

#[tokio::test]
async fn long_message_travels_in_three_parts() {
    let link = loopback(esme_config(), esme_config()).await;
    let text: String = "0123456789".repeat(32) + "X";
    assert_eq!(text.len(), 321);

    link.client
        .submit("long-1", "ACME", "4790000000", &text, BodyFormat::Ascii, true)
        .await
        .unwrap();

    // The response to the first part may overtake the later parts
    let mut progress = 0;
    let mut sent = None;
    for _ in 0..4 {
        let (local_id, status, remote_id) = link.client_events.next_status().await;
        assert_eq!(local_id, "long-1");
        match status {
            MessageStatus::SubmittedWaitingForAck => progress += 1,
            MessageStatus::Sent => sent = remote_id,
            other => panic!("unexpected status {other:?}"),
        }
    }
    assert_eq!(progress, 3);
    assert_eq!(sent.map(|id| id.len()), Some(32));

    let message = link.server_events.next_message().await;
    assert_eq!(message.body, text);
    assert_eq!(message.channel, "esme");
    assert_eq!(message.registered_delivery, 1);

    // Parts two and three are answered too
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(link.client.pending_commands(), 0);
    assert_eq!(link.client.pending_submissions(), 0);
}

#[tokio::test]
async fn server_sends_data_sm_and_delivery_reports() {
    let link = loopback(esme_config(), esme_config()).await;

    link.server
        .submit("s1", "2222", "4790000000", "Hi there", BodyFormat::Ascii, false)
        .await
        .unwrap();
    let message = link.client_events.next_message().await;
    assert_eq!(message.body, "Hi there");
    assert_eq!(message.sender, "2222");
    assert_eq!(
        link.server_events.next_status().await.1,
        MessageStatus::ReceivedRouted
    );
    assert_eq!(link.server_events.next_status().await.1, MessageStatus::Sent);

    link.server
        .submit_delivery_report("abc123", MessageStatus::DeliveredAckReceived)
        .await
        .unwrap();
    assert_eq!(
        link.client_events.next_report().await,
        ("abc123".to_string(), MessageStatus::DeliveredAckReceived)
    );
}

#[tokio::test]
async fn unbound_submit_is_refused_without_traffic() {
    let events = RecordingEvents::new();
    let session = Session::client("smsc", esme_config(), Arc::new(events.clone()));

    let err = session
        .submit("m1", "ACME", "4790000000", "hello", BodyFormat::Ascii, true)
        .await
        .unwrap_err();
    assert!(matches!(err, SubmitError::NotConnected));
    assert_eq!(err.code(), 1);
    assert_eq!(
        events.next_status().await,
        ("m1".to_string(), MessageStatus::ReceivedRouteFailure, None)
    );
    assert_eq!(session.pending_commands(), 0);
    assert_eq!(session.pending_submissions(), 0);
}

#[tokio::test]
async fn throttled_submit_is_queued() {
    let (session, mut peer, events) = bound_client(esme_config().with_max_per_second(1)).await;

    session
        .submit("a", "ACME", "4790000000", "one", BodyFormat::Ascii, false)
        .await
        .unwrap();
    peer.expect_frame().await;

    let err = session
        .submit("b", "ACME", "4790000000", "two", BodyFormat::Ascii, false)
        .await
        .unwrap_err();
    assert_eq!(err.code(), 2);

    assert_eq!(events.next_status().await.1, MessageStatus::ReceivedRouted);
    assert_eq!(
        events.next_status().await,
        ("b".to_string(), MessageStatus::Queued, None)
    );
    assert_eq!(session.pending_submissions(), 1);
}

#[tokio::test]
async fn responses_resolve_in_any_order() {
    let (session, mut peer, events) = bound_client(esme_config()).await;

    session
        .submit("first", "ACME", "4790000001", "one", BodyFormat::Ascii, false)
        .await
        .unwrap();
    session
        .submit("second", "ACME", "4790000002", "two", BodyFormat::Ascii, false)
        .await
        .unwrap();

    let first = peer.expect_frame().await;
    let second = peer.expect_frame().await;
    assert_ne!(first.sequence_number(), second.sequence_number());

    peer.send(Frame::SubmitSmResp(SubmitSmResponse::new(
        second.sequence_number(),
        "R2",
    )))
    .await;
    peer.send(Frame::SubmitSmResp(SubmitSmResponse::new(
        first.sequence_number(),
        "R1",
    )))
    .await;

    let mut resolved = Vec::new();
    while resolved.len() < 2 {
        let (local_id, status, remote_id) = events.next_status().await;
        if status == MessageStatus::Sent {
            resolved.push((local_id, remote_id));
        }
    }
    assert_eq!(
        resolved,
        vec![
            ("second".to_string(), Some("R2".to_string())),
            ("first".to_string(), Some("R1".to_string())),
        ]
    );
    assert_eq!(session.pending_submissions(), 0);
}

#[tokio::test]
async fn unanswered_submit_times_out() {
    let (session, mut peer, events) = bound_client(esme_config()).await;

    session
        .submit("late", "ACME", "4790000000", "anyone there?", BodyFormat::Ascii, false)
        .await
        .unwrap();
    peer.expect_frame().await;

    assert_eq!(events.next_status().await.1, MessageStatus::ReceivedRouted);
    assert_eq!(
        events.next_status().await,
        ("late".to_string(), MessageStatus::Timeout, None)
    );
    assert_eq!(session.state(), SessionState::Disconnected);
    assert_eq!(session.pending_commands(), 0);
    events.next_channel_event("Disconnecting").await;
    peer.expect_closed().await;
}

#[tokio::test]
async fn late_response_on_busy_channel_is_not_a_timeout() {
    let config = esme_config().with_keep_alive(
        quiet_keep_alive()
            .with_timeout(Duration::from_millis(100))
            .with_grace(Duration::from_millis(150)),
    );
    let (session, mut peer, events) = bound_client(config).await;

    session
        .submit("slow", "ACME", "4790000000", "hello", BodyFormat::Ascii, false)
        .await
        .unwrap();
    let submit = peer.expect_frame().await;

    // Keep the channel busy past the timeout, then answer
    for seq in 0..20 {
        peer.send(Frame::EnquireLink(EnquireLink::new(900 + seq))).await;
        peer.expect_frame().await;
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    peer.send(Frame::SubmitSmResp(SubmitSmResponse::new(
        submit.sequence_number(),
        "R",
    )))
    .await;

    assert_eq!(events.next_status().await.1, MessageStatus::ReceivedRouted);
    assert_eq!(events.next_status().await.1, MessageStatus::Sent);
    assert!(session.is_bound());
}

#[tokio::test]
async fn acceptor_refuses_bad_credentials() {
    let gate = Gate::new(Arc::new(RecordingEvents::new()));
    gate.add_server("esme", esme_config()).unwrap();

    let (local, remote) = tokio::io::duplex(4096);
    let acceptor = gate.clone();
    let accepted = tokio::spawn(async move { serve_connection(&acceptor, remote).await });

    let mut peer = Peer::new(local);
    peer.send(Frame::BindTransmitter(BindTransmitter::new(
        7, "systemId", "wrong", "",
    )))
    .await;

    let resp = peer.expect_frame().await;
    assert_eq!(resp.command_id(), CommandId::BindTransmitterResp);
    assert_eq!(resp.sequence_number(), 7);
    assert_eq!(resp.command_status(), CommandStatus::BindFailed);
    peer.expect_closed().await;

    assert!(matches!(
        accepted.await.unwrap(),
        Err(SmppError::AuthenticationFailed(id)) if id == "systemId"
    ));
    assert!(!gate.is_active("esme"));
}

#[tokio::test]
async fn acceptor_requires_bind_first() {
    let gate = Gate::new(Arc::new(RecordingEvents::new()));
    gate.add_server("esme", esme_config()).unwrap();

    let (local, remote) = tokio::io::duplex(4096);
    let acceptor = gate.clone();
    let accepted = tokio::spawn(async move { serve_connection(&acceptor, remote).await });

    let mut peer = Peer::new(local);
    peer.send(Frame::EnquireLink(EnquireLink::new(1))).await;
    peer.expect_closed().await;

    assert!(matches!(
        accepted.await.unwrap(),
        Err(SmppError::UnexpectedPdu { .. })
    ));
}

#[tokio::test]
async fn server_session_binds_once_and_releases_on_unbind() {
    let gate = Gate::new(Arc::new(RecordingEvents::new()));
    let server = gate.add_server("esme", esme_config()).unwrap();

    let (local, remote) = tokio::io::duplex(4096);
    let acceptor = gate.clone();
    let accepted = tokio::spawn(async move { serve_connection(&acceptor, remote).await });

    let mut peer = Peer::new(local);
    peer.send(BindType::Receiver.request(3, &esme_config().credentials()))
        .await;
    let resp = peer.expect_frame().await;
    assert_eq!(resp.command_id(), CommandId::BindReceiverResp);
    assert_eq!(resp.command_status(), CommandStatus::Ok);
    accepted.await.unwrap().unwrap();
    assert!(gate.is_active("esme"));

    // A second ESME with the same credentials is turned away
    let (second, remote) = tokio::io::duplex(4096);
    let acceptor = gate.clone();
    let refused = tokio::spawn(async move { serve_connection(&acceptor, remote).await });
    let mut intruder = Peer::new(second);
    intruder
        .send(BindType::Transmitter.request(1, &esme_config().credentials()))
        .await;
    assert_eq!(
        intruder.expect_frame().await.command_status(),
        CommandStatus::AlreadyBoundState
    );
    assert!(refused.await.unwrap().is_err());

    peer.send(Frame::Unbind(Unbind::new(4))).await;
    assert_eq!(peer.expect_frame().await.command_id(), CommandId::UnbindResp);
    assert!(
        server
            .wait_for_state(SessionState::Disconnected, WAIT)
            .await
    );
    let released = tokio::time::timeout(WAIT, async {
        while gate.is_active("esme") {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(released.is_ok());
}

#[tokio::test]
async fn racing_binds_leave_the_first_esme_bound() {
    let config =
        esme_config().with_keep_alive(quiet_keep_alive().with_timeout(Duration::from_secs(5)));
    let gate = Gate::new(Arc::new(RecordingEvents::new()));
    let server = gate.add_server("esme", config.clone()).unwrap();

    // A tiny pipe stalls the bind_resp until the first ESME reads it
    let (first, remote) = tokio::io::duplex(8);
    let acceptor = gate.clone();
    let accepted = tokio::spawn(async move { serve_connection(&acceptor, remote).await });
    let mut peer = Peer::new(first);
    peer.send(BindType::Transceiver.request(1, &config.credentials()))
        .await;

    let claimed = tokio::time::timeout(WAIT, async {
        while !gate.is_active("esme") {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await;
    assert!(claimed.is_ok());

    let (second, remote) = tokio::io::duplex(4096);
    let acceptor = gate.clone();
    let refused = tokio::spawn(async move { serve_connection(&acceptor, remote).await });
    let mut intruder = Peer::new(second);
    intruder
        .send(BindType::Transceiver.request(1, &config.credentials()))
        .await;
    assert_eq!(
        intruder.expect_frame().await.command_status(),
        CommandStatus::AlreadyBoundState
    );
    intruder.expect_closed().await;
    assert!(matches!(
        refused.await.unwrap(),
        Err(SmppError::InvalidState(_))
    ));

    let resp = peer.expect_frame().await;
    assert_eq!(resp.command_id(), CommandId::BindTransceiverResp);
    assert_eq!(resp.command_status(), CommandStatus::Ok);
    accepted.await.unwrap().unwrap();
    assert!(server.is_bound());

    // The first stream still carries the session
    peer.send(Frame::EnquireLink(EnquireLink::new(2))).await;
    let answer = peer.expect_frame().await;
    assert_eq!(answer.command_id(), CommandId::EnquireLinkResp);
    assert_eq!(answer.sequence_number(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_submits_get_distinct_sequence_numbers() {
    const SUBMITS: usize = 32;
    let (session, mut peer, events) = bound_client(esme_config()).await;

    let mut submits = JoinSet::new();
    for n in 0..SUBMITS {
        let session = session.clone();
        submits.spawn(async move {
            session
                .submit(&format!("m{n}"), "ACME", "4790000000", "hi", BodyFormat::Ascii, false)
                .await
        });
    }
    while let Some(result) = submits.join_next().await {
        result.unwrap().unwrap();
    }

    let mut sequence_numbers = HashSet::new();
    for _ in 0..SUBMITS {
        let frame = peer.expect_frame().await;
        assert_eq!(frame.command_id(), CommandId::SubmitSm);
        assert!(sequence_numbers.insert(frame.sequence_number()));
    }
    assert_eq!(session.pending_submissions(), SUBMITS);

    for seq in &sequence_numbers {
        peer.send(Frame::SubmitSmResp(SubmitSmResponse::new(*seq, &format!("R{seq}"))))
            .await;
    }

    let mut sent = HashSet::new();
    while sent.len() < SUBMITS {
        let (local_id, status, _) = events.next_status().await;
        if status == MessageStatus::Sent {
            assert!(sent.insert(local_id));
        }
    }
    assert_eq!(session.pending_submissions(), 0);
    assert_eq!(session.pending_commands(), 0);
}
