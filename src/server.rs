// ABOUTME: TCP acceptor for server sessions: authenticates the first bind and hands the socket over
// ABOUTME: Accept loop with exponential back-off and graceful shutdown

use crate::codec::Frame;
use crate::connection::{self, FrameReader, FrameWriter, Inbound};
use crate::datatypes::{CommandStatus, GenericNack};
use crate::gate::Gate;
use crate::session::{SmppError, SmppResult};
use std::future::Future;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

/// How long a new connection may take to send its bind
pub const BIND_TIMEOUT: Duration = Duration::from_secs(10);

/// Longest pause between failed accepts
const MAX_BACKOFF: u64 = 64;

/// Server listener state. Created in the `run` call. It includes a `run`
/// method which performs the TCP listening and initialization of
/// per-connection state.
#[derive(Debug)]
struct Listener {
    gate: Gate,
    listener: TcpListener,
}

/// Run the acceptor.
///
/// Accepts connections from the supplied listener. For each inbound
/// connection, a task is spawned to authenticate the bind and attach the
/// socket to the matching server session. The acceptor runs until the
/// `shutdown` future completes, at which point every session in the gate is
/// shut down.
///
/// `tokio::signal::ctrl_c()` can be used as the `shutdown` argument.
pub async fn run(listener: TcpListener, gate: Gate, shutdown: impl Future) {
    let mut server = Listener {
        gate: gate.clone(),
        listener,
    };

    tokio::select! {
        res = server.run() => {
            // If an error is received here, accepting connections from the TCP
            // listener failed multiple times and the server is giving up.
            if let Err(err) = res {
                error!(cause = %err, "failed to accept");
            }
        }
        _ = shutdown => {
            info!("shutting down");
        }
    }

    gate.shutdown().await;
}

impl Listener {
    /// Listen for inbound connections and hand each one to its own task.
    ///
    /// Returns `Err` only if accepting returns errors repeatedly.
    async fn run(&mut self) -> SmppResult<()> {
        info!("accepting inbound connections");

        loop {
            let (socket, peer) = self.accept().await?;
            debug!(%peer, "connection accepted");

            let gate = self.gate.clone();
            tokio::spawn(async move {
                if let Err(err) = serve_connection(&gate, socket).await {
                    warn!(%peer, cause = %err, "connection refused");
                }
            });
        }
    }

    /// Accept an inbound connection.
    ///
    /// Errors are handled by backing off and retrying. An exponential
    /// backoff strategy is used. After the first failure, the task waits for
    /// 1 second. After the second failure, the task waits for 2 seconds.
    /// Each subsequent failure doubles the wait time. If accepting fails on
    /// the 6th try after waiting for 64 seconds, then this function returns
    /// with an error.
    async fn accept(&mut self) -> SmppResult<(TcpStream, std::net::SocketAddr)> {
        let mut backoff = 1;

        loop {
            match self.listener.accept().await {
                Ok(accepted) => return Ok(accepted),
                Err(err) => {
                    if backoff > MAX_BACKOFF {
                        return Err(err.into());
                    }
                    warn!(cause = %err, "accept failed, retrying in {}s", backoff);
                }
            }

            tokio::time::sleep(Duration::from_secs(backoff)).await;
            backoff *= 2;
        }
    }
}

/// Authenticate the first PDU on `io` and attach the stream to the server
/// session it names.
///
/// The first PDU must be a bind. Anything else, or bad credentials, closes
/// the stream; bad credentials are answered with `ESME_RBINDFAIL` first.
pub async fn serve_connection<T>(gate: &Gate, io: T) -> SmppResult<()>
where
    T: AsyncRead + AsyncWrite + Send + 'static,
{
    let (mut reader, mut writer) = connection::split(io);

    let frame = match tokio::time::timeout(BIND_TIMEOUT, first_frame(&mut reader, &mut writer))
        .await
    {
        Ok(frame) => frame?,
        Err(_) => {
            let _ = writer.shutdown().await;
            return Err(SmppError::Timeout);
        }
    };

    let Some((bind_type, system_id, password)) = frame.bind_request() else {
        let _ = writer.shutdown().await;
        return Err(SmppError::UnexpectedPdu {
            expected: "bind".to_string(),
            actual: frame.command_id().name().to_string(),
        });
    };
    let sequence_number = frame.sequence_number();

    let Some(session) = gate.find_server(system_id, password) else {
        gate.events().channel_event(
            "",
            &format!("Bind refused for {}", system_id),
            None,
        );
        refuse(&mut writer, &frame, CommandStatus::BindFailed).await;
        return Err(SmppError::AuthenticationFailed(system_id.to_string()));
    };

    if !gate.try_activate(session.name()) {
        refuse(&mut writer, &frame, CommandStatus::AlreadyBoundState).await;
        return Err(SmppError::InvalidState(format!(
            "{} is already bound",
            session.name()
        )));
    }

    info!(channel = %session.name(), "ESME {} bound as {:?}", system_id, bind_type);
    session
        .accept_bind(reader, writer, bind_type, sequence_number)
        .await
}

/// Read until the first decodable PDU. Undecodable requests get a
/// generic_nack, as they would on a bound session.
async fn first_frame(reader: &mut FrameReader, writer: &mut FrameWriter) -> SmppResult<Frame> {
    loop {
        match reader.read_frame().await? {
            Some(Inbound::Frame { frame, .. }) => return Ok(frame),
            Some(Inbound::Malformed {
                command_id,
                sequence_number,
                error,
                ..
            }) => {
                debug!("undecodable PDU before bind: {}", error);
                if command_id & 0x8000_0000 == 0 {
                    let nack = GenericNack::for_error(sequence_number, &error);
                    writer.write_frame(&Frame::GenericNack(nack)).await?;
                }
            }
            Some(Inbound::Discarded { error, dropped }) => {
                debug!("discarded {} bytes before bind: {}", dropped, error);
            }
            None => return Err(SmppError::ConnectionClosed),
        }
    }
}

async fn refuse(writer: &mut FrameWriter, bind: &Frame, status: CommandStatus) {
    if let Some((bind_type, ..)) = bind.bind_request() {
        let response = bind_type.response(bind.sequence_number(), status, "");
        if let Err(err) = writer.write_frame(&response).await {
            debug!("could not send bind refusal: {}", err);
        }
    }
    let _ = writer.shutdown().await;
}
