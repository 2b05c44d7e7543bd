// ABOUTME: The per-channel SMPP state machine shared by client and server sessions
// ABOUTME: Owns the transport halves, the timers and the request correlation maps

use super::{
    GateEvents, KeepAliveManager, KeepAliveStatus, NewMessage, SessionConfig, SmppError,
    SmppResult, SubmissionTracker, SubmitError, Throttle,
};
use crate::codec::Frame;
use crate::connection::{self, FrameReader, FrameWriter, Inbound};
use crate::datatypes::{
    BindType, BodyFormat, CommandId, CommandStatus, DataSmResponse, DeliverSm,
    DeliverSmResponse, DeliveryReceipt, ESM_CLASS_DELIVERY_RECEIPT, EnquireLink,
    EnquireLinkResponse, GenericNack, MessageStatus, SmBody, SubmitSm, SubmitSmResponse,
    Unbind, UnbindResponse,
};
use crate::gate::GateShared;
use crate::hex;
use crate::message::{Envelope, InboundMessage, generate_message_id};
use crate::multipart::{MultipartBuffer, Segment, segment};
use bytes::Bytes;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tracing::{Level, debug, warn};

/// Shortest timer period accepted, so a zero in the configuration cannot
/// turn a timer into a busy loop
const MIN_TIMER_PERIOD: Duration = Duration::from_millis(1);

/// Which end of the bind this session plays
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    /// Connects out and binds to an SMSC
    Client,
    /// Waits for an ESME to connect and bind
    Server,
}

/// Life cycle of a session
///
/// ```text
/// client: Disconnected → Connecting → AwaitingBindResponse → Bound → Unbinding → Disconnected
/// server: Disconnected → AwaitingBind → Bound → Disconnected
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SessionState {
    Disconnected,
    Connecting,
    AwaitingBindResponse,
    AwaitingBind,
    Bound,
    Unbinding,
}

/// Why a transport was released
#[derive(Clone, Debug)]
enum Teardown {
    Timeout,
    SendFailure(String),
    ReadFailure(String),
    PeerClosed,
    Unbound,
    BindRejected(CommandStatus),
    Quit,
}

impl Teardown {
    fn description(&self) -> String {
        match self {
            Teardown::Timeout => "Command timeout".to_string(),
            Teardown::SendFailure(err) => format!("Command sending failed: {}", err),
            Teardown::ReadFailure(err) => format!("Connection lost: {}", err),
            Teardown::PeerClosed => "Connection closed by peer".to_string(),
            Teardown::Unbound => "Unbind received".to_string(),
            Teardown::BindRejected(status) => {
                format!("Bind rejected: {} ({})", status.short_code(), status.description())
            }
            Teardown::Quit => "Quit".to_string(),
        }
    }
}

/// Outcome of handing one frame to the transport
#[derive(Debug, PartialEq, Eq)]
enum Sent {
    Ok,
    /// The frame could not be encoded; the channel is unaffected
    Invalid,
    /// No transport, or writing failed and the channel was torn down
    Down,
}

/// The live transport of a session. Each attach gets a new epoch; tasks
/// started for an epoch stop acting once the epoch is gone.
struct Attachment {
    epoch: u64,
    stop: watch::Sender<bool>,
}

struct Inner {
    name: String,
    role: Role,
    config: SessionConfig,
    events: Arc<dyn GateEvents>,
    gate: Weak<GateShared>,

    state: watch::Sender<SessionState>,
    attachment: Mutex<Option<Attachment>>,
    epochs: AtomicU64,

    // Held across writes only; never while a map lock is held
    writer: tokio::sync::Mutex<Option<FrameWriter>>,

    tracker: SubmissionTracker,
    keepalive: Mutex<KeepAliveManager>,
    throttle: Mutex<Throttle>,
    multipart: Mutex<MultipartBuffer>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Handle to one SMPP channel.
///
/// Cloning is cheap; all clones drive the same session. A session reads on
/// one background task and runs two timers: one sends `enquire_link` while
/// bound, the other tears the channel down when a request goes unanswered
/// past the response timeout.
///
/// # Example
///
/// ```rust,no_run
/// use smpp_gate::datatypes::BodyFormat;
/// use smpp_gate::session::{Session, SessionConfig, TracingEvents};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = SessionConfig::new("esme01", "secret").with_address("localhost", 2775);
/// let session = Session::client("smsc-a", config, Arc::new(TracingEvents));
///
/// session.connect().await?;
/// session.wait_bound(Duration::from_secs(5)).await;
///
/// session
///     .submit("42", "ACME", "4790000000", "Hello!", BodyFormat::Ascii, true)
///     .await?;
///
/// session.quit().await;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("name", &self.inner.name)
            .field("role", &self.inner.role)
            .field("state", &self.state())
            .finish()
    }
}

impl Session {
    /// A client session with no gate behind it. It never reconnects on its
    /// own.
    pub fn client(
        name: impl Into<String>,
        config: SessionConfig,
        events: Arc<dyn GateEvents>,
    ) -> Session {
        Session::new(name.into(), Role::Client, config, events, Weak::new())
    }

    /// A server session with no gate behind it
    pub fn server(
        name: impl Into<String>,
        config: SessionConfig,
        events: Arc<dyn GateEvents>,
    ) -> Session {
        Session::new(name.into(), Role::Server, config, events, Weak::new())
    }

    pub(crate) fn new(
        name: String,
        role: Role,
        config: SessionConfig,
        events: Arc<dyn GateEvents>,
        gate: Weak<GateShared>,
    ) -> Session {
        let (state, _) = watch::channel(SessionState::Disconnected);

        Session {
            inner: Arc::new(Inner {
                tracker: SubmissionTracker::new(),
                keepalive: Mutex::new(KeepAliveManager::new(config.keep_alive.clone())),
                throttle: Mutex::new(Throttle::new(config.max_per_second)),
                multipart: Mutex::new(MultipartBuffer::new(config.multipart_retention)),
                name,
                role,
                config,
                events,
                gate,
                state,
                attachment: Mutex::new(None),
                epochs: AtomicU64::new(0),
                writer: tokio::sync::Mutex::new(None),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn role(&self) -> Role {
        self.inner.role
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    pub fn state(&self) -> SessionState {
        *self.inner.state.borrow()
    }

    pub fn is_bound(&self) -> bool {
        self.state() == SessionState::Bound
    }

    /// Watch state transitions
    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    /// Wait until the session is bound, up to `limit`. Returns whether it is.
    pub async fn wait_bound(&self, limit: Duration) -> bool {
        self.wait_for_state(SessionState::Bound, limit).await
    }

    /// Wait until the session reaches `target`, up to `limit`
    pub async fn wait_for_state(&self, target: SessionState, limit: Duration) -> bool {
        let mut states = self.subscribe_state();
        let reached = tokio::time::timeout(limit, async {
            states.wait_for(|state| *state == target).await.is_ok()
        })
        .await;
        reached.unwrap_or(false)
    }

    /// Submissions still waiting for their response
    pub fn pending_submissions(&self) -> usize {
        self.inner.tracker.pending_submissions()
    }

    /// Requests of any kind still waiting for their response
    pub fn pending_commands(&self) -> usize {
        self.inner.tracker.pending_commands()
    }

    pub fn keep_alive_status(&self) -> KeepAliveStatus {
        lock(&self.inner.keepalive).status()
    }

    fn set_state(&self, state: SessionState) {
        let previous = self.inner.state.send_replace(state);
        if previous != state {
            debug!(channel = %self.inner.name, "{:?} -> {:?}", previous, state);
        }
    }

    fn current_epoch(&self) -> Option<u64> {
        lock(&self.inner.attachment).as_ref().map(|a| a.epoch)
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.current_epoch() == Some(epoch)
    }

    fn bound_epoch(&self) -> Option<u64> {
        if self.is_bound() {
            self.current_epoch()
        } else {
            None
        }
    }

    fn channel_event(&self, description: &str) {
        self.inner
            .events
            .channel_event(&self.inner.name, description, None);
    }

    fn pdu_event(&self, description: &str, raw: &[u8]) {
        if self.inner.config.debug {
            self.inner
                .events
                .channel_event(&self.inner.name, description, Some(&hex::encode(raw)));
        } else {
            self.channel_event(description);
        }
    }

    fn status_changed(&self, local_id: &str, status: MessageStatus, remote_id: Option<&str>) {
        self.inner
            .events
            .message_status_changed(local_id, status, remote_id);
    }

    /// Open a TCP connection to the configured SMSC and send the bind.
    ///
    /// Returns once the bind request is written; the bind response arrives
    /// asynchronously (see [`Session::wait_bound`]). On failure a retry is
    /// scheduled through the gate, if there is one.
    pub async fn connect(&self) -> SmppResult<()> {
        if self.inner.role != Role::Client {
            return Err(SmppError::InvalidState(
                "server sessions are attached by the acceptor".to_string(),
            ));
        }
        let mut found = SessionState::Disconnected;
        let claimed = self.inner.state.send_if_modified(|state| {
            found = *state;
            if *state == SessionState::Disconnected {
                *state = SessionState::Connecting;
                true
            } else {
                false
            }
        });
        if !claimed {
            return Err(SmppError::InvalidState(format!(
                "cannot connect while {:?}",
                found
            )));
        }
        debug!(channel = %self.inner.name, "Disconnected -> Connecting");
        let addr = format!("{}:{}", self.inner.config.host, self.inner.config.port);
        self.channel_event(&format!("Connecting to {}", addr));

        let limit = self.inner.config.keep_alive.timeout;
        let stream = match tokio::time::timeout(limit, TcpStream::connect(&addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(err)) => return Err(self.connect_failed(SmppError::Connection(err))),
            Err(_) => return Err(self.connect_failed(SmppError::Timeout)),
        };

        self.connect_over(stream).await
    }

    fn connect_failed(&self, err: SmppError) -> SmppError {
        self.set_state(SessionState::Disconnected);
        self.channel_event(&format!("Connection failed: {}", err));
        self.schedule_reconnect();
        err
    }

    /// Bind over an already established stream.
    ///
    /// [`Session::connect`] uses this after dialing; tests and custom
    /// transports (TLS, in-memory pipes) call it directly.
    pub async fn connect_over<T>(&self, io: T) -> SmppResult<()>
    where
        T: AsyncRead + AsyncWrite + Send + 'static,
    {
        let Some(bind_type) = self.inner.config.bind_type() else {
            self.set_state(SessionState::Disconnected);
            return Err(SmppError::InvalidConfig(
                "session neither sends nor receives".to_string(),
            ));
        };

        let (reader, writer) = connection::split(io);
        let epoch = self
            .attach(reader, writer, SessionState::AwaitingBindResponse)
            .await?;

        let sequence_number = match self.track_request(bind_type.command_id()) {
            Ok(sequence_number) => sequence_number,
            Err(err) => {
                self.teardown(epoch, Teardown::Quit).await;
                return Err(SmppError::InvalidState(err.to_string()));
            }
        };

        let bind = bind_type.request(sequence_number, &self.inner.config.credentials());
        match self.send(epoch, &bind).await {
            Sent::Ok => Ok(()),
            Sent::Invalid => {
                self.teardown(epoch, Teardown::Quit).await;
                Err(SmppError::InvalidConfig(
                    "bind credentials cannot be encoded".to_string(),
                ))
            }
            Sent::Down => {
                self.inner.tracker.complete_command(sequence_number);
                Err(SmppError::ConnectionClosed)
            }
        }
    }

    /// Take over a stream whose bind the acceptor has already validated,
    /// answer the bind and start serving.
    pub(crate) async fn accept_bind(
        &self,
        reader: FrameReader,
        writer: FrameWriter,
        bind_type: BindType,
        sequence_number: u32,
    ) -> SmppResult<()> {
        let epoch = self.attach(reader, writer, SessionState::AwaitingBind).await?;

        let response = bind_type.response(
            sequence_number,
            CommandStatus::Ok,
            &self.inner.config.system_id,
        );
        if self.send(epoch, &response).await != Sent::Ok {
            self.teardown(epoch, Teardown::Quit).await;
            return Err(SmppError::ConnectionClosed);
        }

        self.set_state(SessionState::Bound);
        self.channel_event(&format!("Bound as {:?}", bind_type));
        Ok(())
    }

    /// Make the stream the live transport of this session.
    ///
    /// A session carries one transport at a time: while another is attached
    /// the new stream is refused and dropped, which closes it.
    async fn attach(
        &self,
        reader: FrameReader,
        writer: FrameWriter,
        state: SessionState,
    ) -> SmppResult<u64> {
        let epoch = self.inner.epochs.fetch_add(1, Ordering::SeqCst) + 1;
        let (stop, stop_rx) = watch::channel(false);

        {
            let mut current = lock(&self.inner.attachment);
            if current.is_some() {
                return Err(SmppError::InvalidState(format!(
                    "{} already has a live connection",
                    self.inner.name
                )));
            }
            *current = Some(Attachment { epoch, stop });
        }

        *self.inner.writer.lock().await = Some(writer);
        lock(&self.inner.keepalive).reset();
        self.set_state(state);

        self.spawn_tasks(epoch, reader, stop_rx);
        Ok(epoch)
    }

    fn spawn_tasks(&self, epoch: u64, reader: FrameReader, stop: watch::Receiver<bool>) {
        tokio::spawn(self.clone().read_loop(epoch, reader, stop.clone()));
        tokio::spawn(self.clone().keep_alive_loop(epoch, stop.clone()));
        tokio::spawn(self.clone().sweep_loop(epoch, stop));
    }

    async fn read_loop(self, epoch: u64, mut reader: FrameReader, mut stop: watch::Receiver<bool>) {
        loop {
            let result = tokio::select! {
                result = reader.read_frame() => result,
                _ = stop.changed() => return,
            };

            match result {
                Ok(Some(inbound)) => self.handle_inbound(epoch, inbound).await,
                Ok(None) => {
                    self.teardown(epoch, Teardown::PeerClosed).await;
                    return;
                }
                Err(err) => {
                    self.teardown(epoch, Teardown::ReadFailure(err.to_string()))
                        .await;
                    return;
                }
            }

            if !self.is_current(epoch) {
                return;
            }
        }
    }

    async fn keep_alive_loop(self, epoch: u64, mut stop: watch::Receiver<bool>) {
        if !lock(&self.inner.keepalive).is_enabled() {
            return;
        }

        let period = self.inner.config.keep_alive.interval.max(MIN_TIMER_PERIOD);
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = stop.changed() => return,
            }

            if !self.is_current(epoch) {
                return;
            }
            if self.is_bound() {
                self.send_enquire_link(epoch).await;
            }
        }
    }

    async fn sweep_loop(self, epoch: u64, mut stop: watch::Receiver<bool>) {
        let period = self
            .inner
            .config
            .keep_alive
            .sweep_interval
            .max(MIN_TIMER_PERIOD);
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = stop.changed() => return,
            }

            if !self.is_current(epoch) {
                return;
            }

            let now = Instant::now();
            let dropped = lock(&self.inner.multipart).expire(now);
            if !dropped.is_empty() {
                debug!(channel = %self.inner.name, "Dropped incomplete multipart sets {:?}", dropped);
            }

            let expired = self
                .inner
                .tracker
                .oldest_outstanding(now)
                .is_some_and(|age| lock(&self.inner.keepalive).is_expired(age, now));
            if expired {
                self.teardown(epoch, Teardown::Timeout).await;
                return;
            }
        }
    }

    async fn send_enquire_link(&self, epoch: u64) {
        let sequence_number = match self.track_request(CommandId::EnquireLink) {
            Ok(sequence_number) => sequence_number,
            Err(err) => {
                warn!(channel = %self.inner.name, "Skipping enquire_link: {}", err);
                return;
            }
        };
        lock(&self.inner.keepalive).on_ping_sent(Instant::now());

        let frame = Frame::EnquireLink(EnquireLink::new(sequence_number));
        if self.send(epoch, &frame).await != Sent::Ok {
            self.inner.tracker.complete_command(sequence_number);
        }
    }

    /// Take a fresh sequence number and queue a request under it
    fn track_request(&self, command_id: CommandId) -> Result<u32, SubmitError> {
        let sequence_number = self.inner.tracker.next_sequence();
        self.inner
            .tracker
            .record_command(sequence_number, command_id, Instant::now())?;
        Ok(sequence_number)
    }

    /// Write one frame. A transport failure tears the channel down; a
    /// failure on a channel that is already down is ignored.
    async fn send(&self, epoch: u64, frame: &Frame) -> Sent {
        let limit = self.inner.config.keep_alive.timeout;
        let result = {
            let mut writer = self.inner.writer.lock().await;
            match writer.as_mut() {
                Some(writer) if self.is_current(epoch) => {
                    match tokio::time::timeout(limit, writer.write_frame(frame)).await {
                        Ok(result) => result,
                        Err(_) => Err(io::Error::new(io::ErrorKind::TimedOut, "write timed out")),
                    }
                }
                _ => return Sent::Down,
            }
        };

        match result {
            Ok(raw) => {
                self.pdu_event(&format!("Sending [{}]", frame.command_id().name()), &raw);
                Sent::Ok
            }
            Err(err) if err.kind() == io::ErrorKind::InvalidData => {
                self.inner.events.log(
                    Level::ERROR,
                    &format!(
                        "{} - cannot encode {}: {}",
                        self.inner.name,
                        frame.command_id().name(),
                        err
                    ),
                );
                Sent::Invalid
            }
            Err(err) => {
                self.teardown(epoch, Teardown::SendFailure(err.to_string()))
                    .await;
                Sent::Down
            }
        }
    }

    async fn handle_inbound(&self, epoch: u64, inbound: Inbound) {
        match inbound {
            Inbound::Frame { frame, raw } => {
                lock(&self.inner.keepalive).on_pdu_received(Instant::now());
                self.pdu_event(&format!("Received [{}]", frame.command_id().name()), &raw);
                self.dispatch(epoch, frame).await;
            }
            Inbound::Malformed {
                command_id,
                sequence_number,
                raw,
                error,
            } => {
                lock(&self.inner.keepalive).on_pdu_received(Instant::now());
                self.inner.events.log(
                    Level::ERROR,
                    &format!(
                        "{} - cannot decode {}: {} [{}]",
                        self.inner.name,
                        CommandId::describe(command_id),
                        error,
                        hex::encode(&raw)
                    ),
                );

                // Requests get a generic_nack; a broken response has no one
                // to answer to.
                if command_id & 0x8000_0000 == 0 {
                    let nack = GenericNack::for_error(sequence_number, &error);
                    self.send(epoch, &Frame::GenericNack(nack)).await;
                }
            }
            Inbound::Discarded { error, dropped } => {
                warn!(channel = %self.inner.name, "Discarded {} buffered bytes: {}", dropped, error);
            }
        }
    }

    async fn dispatch(&self, epoch: u64, frame: Frame) {
        let sequence_number = frame.sequence_number();
        let status = frame.command_status();
        let use_8bit = self.inner.config.use_8bit;

        match &frame {
            Frame::BindTransmitterResp(_)
            | Frame::BindReceiverResp(_)
            | Frame::BindTransceiverResp(_) => {
                self.on_bind_response(epoch, sequence_number, status).await;
            }
            Frame::BindTransmitter(_) | Frame::BindReceiver(_) | Frame::BindTransceiver(_) => {
                // The acceptor handles the first bind; a second one on a live
                // channel is refused.
                if let Some((bind_type, ..)) = frame.bind_request() {
                    let response = bind_type.response(
                        sequence_number,
                        CommandStatus::AlreadyBoundState,
                        &self.inner.config.system_id,
                    );
                    self.send(epoch, &response).await;
                }
            }
            Frame::SubmitSmResp(resp) => {
                self.on_submit_response(sequence_number, status, &resp.message_id);
            }
            Frame::DeliverSmResp(resp) => {
                self.on_submit_response(sequence_number, status, &resp.message_id);
            }
            Frame::DataSmResp(resp) => {
                self.on_submit_response(sequence_number, status, &resp.message_id);
            }
            Frame::SubmitSm(pdu) => {
                let message_id = generate_message_id();
                let resp = SubmitSmResponse::new(sequence_number, message_id.clone());
                self.send(epoch, &Frame::SubmitSmResp(resp)).await;
                self.on_message(message_id, InboundMessage::from_sm_body(&pdu.body, use_8bit));
            }
            Frame::DeliverSm(pdu) => {
                let message_id = generate_message_id();
                let resp = DeliverSmResponse::new(sequence_number, message_id.clone());
                self.send(epoch, &Frame::DeliverSmResp(resp)).await;

                if pdu.body.is_delivery_receipt() {
                    self.on_receipt(&pdu.body);
                } else {
                    self.on_message(message_id, InboundMessage::from_sm_body(&pdu.body, use_8bit));
                }
            }
            Frame::DataSm(pdu) => {
                let message_id = generate_message_id();
                let resp = DataSmResponse::new(sequence_number, message_id.clone());
                self.send(epoch, &Frame::DataSmResp(resp)).await;
                self.on_message(message_id, InboundMessage::from_data_sm(pdu, use_8bit));
            }
            Frame::EnquireLink(_) => {
                let resp = EnquireLinkResponse::new(sequence_number);
                self.send(epoch, &Frame::EnquireLinkResp(resp)).await;
            }
            Frame::EnquireLinkResp(_) => {
                self.inner.tracker.complete_command(sequence_number);
                lock(&self.inner.keepalive).on_pong();
            }
            Frame::Unbind(_) => {
                let resp = UnbindResponse::new(sequence_number);
                self.send(epoch, &Frame::UnbindResp(resp)).await;
                self.teardown(epoch, Teardown::Unbound).await;
            }
            Frame::UnbindResp(_) => {
                self.inner.tracker.complete_command(sequence_number);
            }
            Frame::GenericNack(_) => {
                warn!(
                    channel = %self.inner.name,
                    "generic_nack for sequence {}: {}",
                    sequence_number,
                    status.description()
                );
            }
            Frame::Unknown { header, .. } => {
                debug!(
                    channel = %self.inner.name,
                    "Ignoring unsupported {}",
                    header.command_id.name()
                );
                if !header.command_id.is_response() {
                    let nack = GenericNack::invalid_command_id(sequence_number);
                    self.send(epoch, &Frame::GenericNack(nack)).await;
                }
            }
        }
    }

    async fn on_bind_response(&self, epoch: u64, sequence_number: u32, status: CommandStatus) {
        self.inner.tracker.complete_command(sequence_number);

        if self.state() != SessionState::AwaitingBindResponse {
            warn!(channel = %self.inner.name, "Unexpected bind response in {:?}", self.state());
            return;
        }

        if status.is_ok() {
            self.set_state(SessionState::Bound);
            if let Some(gate) = self.inner.gate.upgrade() {
                gate.on_bound(&self.inner.name);
            }
            self.channel_event("Bound");
        } else {
            self.teardown(epoch, Teardown::BindRejected(status)).await;
        }
    }

    fn on_submit_response(&self, sequence_number: u32, status: CommandStatus, message_id: &str) {
        self.inner.tracker.complete_command(sequence_number);
        let remote_id = Some(message_id).filter(|id| !id.is_empty());

        if let Some(submission) = self.inner.tracker.resolve_submission(sequence_number) {
            let outcome = if status.is_ok() {
                MessageStatus::Sent
            } else {
                MessageStatus::Rejected
            };
            self.status_changed(&submission.local_id, outcome, remote_id);
        }

        if status.is_ok() {
            self.channel_event(&format!("Message reference: {}", message_id));
        } else {
            self.channel_event(&format!("Error sending: {}", status.short_code()));
        }
    }

    fn on_message(&self, message_id: String, message: InboundMessage) {
        let InboundMessage {
            sender,
            recipient,
            body,
            registered_delivery,
        } = message;

        let text = match body.udh {
            Some(udh) if udh.total > 1 => {
                let complete = lock(&self.inner.multipart).ingest(udh, body.text);
                match complete {
                    Some(text) => text,
                    None => {
                        self.channel_event(&format!(
                            "Multipart {} part {} of {}",
                            udh.reference, udh.index, udh.total
                        ));
                        return;
                    }
                }
            }
            _ => body.text,
        };

        self.inner.events.new_message(&NewMessage {
            channel: self.inner.name.clone(),
            message_id,
            sender,
            recipient,
            body: text,
            format: body.format,
            registered_delivery,
        });
    }

    fn on_receipt(&self, body: &SmBody) {
        let text = hex::latin1_string(&body.payload());
        let receipt = DeliveryReceipt::parse(&text);

        match receipt.stat.message_status() {
            Some(status) => self.inner.events.delivery_report(&receipt.id, status),
            None => warn!(
                channel = %self.inner.name,
                "Ignoring delivery receipt with status {:?}: {}",
                receipt.stat,
                text
            ),
        }
    }

    /// Send a message.
    ///
    /// Client sessions send `submit_sm`; server sessions send `deliver_sm`
    /// or `data_sm` depending on `use_deliver_sm`. Bodies over the single
    /// part limit follow the configured large message method. Every part is
    /// reported to the observer as it goes out, and the `*_resp` to the
    /// first part reports the final status against `local_id`.
    ///
    /// A transport failure while sending is not an error here: it tears the
    /// channel down, and the submission is reported as timed out.
    pub async fn submit(
        &self,
        local_id: &str,
        sender: &str,
        recipient: &str,
        body: &str,
        format: BodyFormat,
        want_receipt: bool,
    ) -> Result<(), SubmitError> {
        let Some(epoch) = self.bound_epoch() else {
            self.status_changed(local_id, MessageStatus::ReceivedRouteFailure, None);
            return Err(SubmitError::NotConnected);
        };

        if !lock(&self.inner.throttle).try_acquire(Instant::now()) {
            self.status_changed(local_id, MessageStatus::Queued, None);
            return Err(SubmitError::RateLimited);
        }

        let parts = match segment(body, format, &self.inner.config.segment_options()) {
            Ok(parts) => parts,
            Err(err) => {
                self.channel_event(&format!("Message {} refused: {}", local_id, err));
                self.status_changed(local_id, MessageStatus::Rejected, None);
                return Err(err.into());
            }
        };

        let tracker = &self.inner.tracker;
        let base = tracker.reserve(parts.len() as u32);
        match self.register_on(epoch, base, local_id, want_receipt) {
            Ok(true) => {}
            Ok(false) => return Ok(()),
            Err(err) => {
                self.channel_event("Duplicate sequence number.");
                self.status_changed(local_id, MessageStatus::Queued, None);
                return Err(err);
            }
        }

        self.channel_event(&format!("Sending from {} to {}", sender, recipient));

        let envelope = self.inner.config.envelope(want_receipt);
        let progress = if self.inner.config.registered_delivery != 0 && want_receipt {
            MessageStatus::SubmittedWaitingForAck
        } else {
            MessageStatus::ReceivedRouted
        };

        for (index, part) in parts.iter().enumerate() {
            let sequence_number = base + index as u32;
            let frame =
                self.message_frame(sequence_number, sender, recipient, format, part, &envelope);
            if let Err(err) =
                tracker.record_command(sequence_number, frame.command_id(), Instant::now())
            {
                self.channel_event("Duplicate sequence number.");
                if tracker.resolve_submission(base).is_some() {
                    self.status_changed(local_id, MessageStatus::Queued, None);
                }
                return Err(err);
            }

            match self.send(epoch, &frame).await {
                Sent::Ok => self.status_changed(local_id, progress, None),
                Sent::Invalid => {
                    tracker.complete_command(sequence_number);
                    if tracker.resolve_submission(base).is_some() {
                        self.status_changed(local_id, MessageStatus::Rejected, None);
                    }
                    return Ok(());
                }
                Sent::Down => {
                    tracker.complete_command(sequence_number);
                    if tracker.resolve_submission(base).is_some() {
                        self.status_changed(local_id, MessageStatus::Timeout, None);
                    }
                    return Ok(());
                }
            }

            if index + 1 < parts.len() {
                tokio::time::sleep(self.inner.config.multipart_delay).await;
            }
        }

        Ok(())
    }

    /// Register a submission made while `epoch` was bound.
    ///
    /// Returns `false` if the channel went down first. A teardown may have
    /// drained the maps before the registration landed, so the submission
    /// is settled here as timed out.
    fn register_on(
        &self,
        epoch: u64,
        base: u32,
        local_id: &str,
        want_receipt: bool,
    ) -> Result<bool, SubmitError> {
        let tracker = &self.inner.tracker;
        tracker.register_submission(base, local_id, want_receipt, Instant::now())?;
        if self.is_current(epoch) {
            return Ok(true);
        }

        if tracker.resolve_submission(base).is_some() {
            self.status_changed(local_id, MessageStatus::Timeout, None);
        }
        Ok(false)
    }

    fn message_frame(
        &self,
        sequence_number: u32,
        sender: &str,
        recipient: &str,
        format: BodyFormat,
        part: &Segment,
        envelope: &Envelope,
    ) -> Frame {
        let config = &self.inner.config;

        match self.inner.role {
            Role::Client => {
                let body = envelope
                    .sm_body(sender, recipient, format, part)
                    .service_type(config.system_type.clone());
                Frame::SubmitSm(Box::new(SubmitSm::new(sequence_number, body)))
            }
            Role::Server if config.use_deliver_sm => {
                let body = envelope.sm_body(sender, recipient, format, part);
                Frame::DeliverSm(Box::new(DeliverSm::new(sequence_number, body)))
            }
            Role::Server => Frame::DataSm(Box::new(envelope.data_sm(
                sequence_number,
                sender,
                recipient,
                format,
                part,
            ))),
        }
    }

    /// Send a delivery receipt for a message the peer submitted earlier,
    /// reporting `status` against the id the gateway returned for it.
    pub async fn submit_delivery_report(
        &self,
        remote_id: &str,
        status: MessageStatus,
    ) -> Result<(), SubmitError> {
        let Some(epoch) = self.bound_epoch() else {
            return Err(SubmitError::NotConnected);
        };

        let now = chrono::Local::now().naive_local();
        let text = DeliveryReceipt::render(remote_id, status, now, now);
        let body = SmBody::new("", "")
            .esm_class(ESM_CLASS_DELIVERY_RECEIPT)
            .short_message(Bytes::from(hex::latin1_bytes(&text)));

        let sequence_number = self.track_request(CommandId::DeliverSm)?;

        self.channel_event(&format!("Sending delivery report for {}", remote_id));
        let frame = Frame::DeliverSm(Box::new(DeliverSm::new(sequence_number, body)));
        if self.send(epoch, &frame).await != Sent::Ok {
            self.inner.tracker.complete_command(sequence_number);
        }
        Ok(())
    }

    /// Leave the channel: unbind if bound, then release the transport and
    /// forget everything in flight. No reconnect follows.
    pub async fn quit(&self) {
        if let Some(gate) = self.inner.gate.upgrade() {
            gate.cancel_reconnect(&self.inner.name);
        }

        let Some(epoch) = self.current_epoch() else {
            self.inner.tracker.drain();
            lock(&self.inner.multipart).clear();
            self.set_state(SessionState::Disconnected);
            return;
        };

        if self.is_bound() {
            self.set_state(SessionState::Unbinding);
            match self.track_request(CommandId::Unbind) {
                Ok(sequence_number) => {
                    self.send(epoch, &Frame::Unbind(Unbind::new(sequence_number)))
                        .await;
                }
                Err(err) => debug!(channel = %self.inner.name, "Not sending unbind: {}", err),
            }
        }

        self.teardown(epoch, Teardown::Quit).await;
    }

    /// Release the transport of `epoch` and reset the session.
    ///
    /// Only the first caller for an epoch does anything, so a timeout and a
    /// write failure racing each other produce one teardown.
    async fn teardown(&self, epoch: u64, reason: Teardown) {
        let attachment = {
            let mut current = lock(&self.inner.attachment);
            if current.as_ref().is_some_and(|attachment| attachment.epoch == epoch) {
                current.take()
            } else {
                None
            }
        };
        let Some(attachment) = attachment else {
            debug!(channel = %self.inner.name, "Already down: {}", reason.description());
            return;
        };

        let _ = attachment.stop.send(true);
        self.set_state(SessionState::Disconnected);

        self.channel_event(&reason.description());
        self.channel_event("Disconnecting....");

        let writer = self.inner.writer.lock().await.take();
        if let Some(mut writer) = writer {
            let limit = self.inner.config.keep_alive.timeout;
            let _ = tokio::time::timeout(limit, writer.shutdown()).await;
        }

        let pending = self.inner.tracker.drain();
        if !matches!(reason, Teardown::Quit) {
            for submission in pending {
                self.status_changed(&submission.local_id, MessageStatus::Timeout, None);
            }
        }
        lock(&self.inner.multipart).clear();
        lock(&self.inner.keepalive).reset();

        match (self.inner.role, reason) {
            (Role::Server, _) => {
                if let Some(gate) = self.inner.gate.upgrade() {
                    gate.deactivate(&self.inner.name);
                }
            }
            (Role::Client, Teardown::Quit) => {}
            (Role::Client, _) => self.schedule_reconnect(),
        }
    }

    fn schedule_reconnect(&self) {
        let delay = self.inner.config.keep_alive.reconnect_delay;
        match self.inner.gate.upgrade() {
            Some(gate) => {
                self.channel_event(&format!("Reconnecting in {:?}", delay));
                gate.schedule_reconnect(self.clone(), delay);
            }
            None => debug!(channel = %self.inner.name, "No gate, not reconnecting"),
        }
    }
}
