// ABOUTME: A tiny SMSC that accepts one configured ESME on a TCP port
// ABOUTME: Every message the ESME submits is acknowledged with a delivered receipt

use argh::FromArgs;
use smpp_gate::datatypes::MessageStatus;
use smpp_gate::gate::Gate;
use smpp_gate::server;
use smpp_gate::session::{GateEvents, NewMessage, SessionConfig, TracingEvents};
use std::error::Error;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{Level, info, warn};
use tracing_subscriber::FmtSubscriber;

/// Minimal SMSC answering one ESME with delivery receipts
#[derive(FromArgs)]
struct CliArgs {
    /// whether or not to enable debugging
    #[argh(switch, short = 'd')]
    debugging: bool,

    /// the system id the ESME must bind with
    #[argh(option)]
    system_id: String,

    /// the password the ESME must bind with
    #[argh(option)]
    password: String,

    /// the port to listen on (default: 2775)
    #[argh(option, short = 'p')]
    port: Option<u16>,

    /// send receipts as deliver_sm instead of data_sm
    #[argh(switch)]
    deliver_sm: bool,
}

/// Logs everything and queues received messages for a receipt
struct ReceiptQueue {
    received: mpsc::UnboundedSender<NewMessage>,
}

impl GateEvents for ReceiptQueue {
    fn log(&self, level: Level, text: &str) {
        TracingEvents.log(level, text);
    }

    fn channel_event(&self, channel: &str, description: &str, pdu: Option<&str>) {
        TracingEvents.channel_event(channel, description, pdu);
    }

    fn new_message(&self, message: &NewMessage) {
        TracingEvents.new_message(message);
        let _ = self.received.send(message.clone());
    }

    fn message_status_changed(&self, local_id: &str, status: MessageStatus, remote_id: Option<&str>) {
        TracingEvents.message_status_changed(local_id, status, remote_id);
    }

    fn delivery_report(&self, remote_id: &str, status: MessageStatus) {
        TracingEvents.delivery_report(remote_id, status);
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli_args: CliArgs = argh::from_env();

    let level = if cli_args.debugging {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let (received, mut received_rx) = mpsc::unbounded_channel();
    let gate = Gate::new(Arc::new(ReceiptQueue { received }));

    let config = SessionConfig::new(cli_args.system_id, cli_args.password)
        .with_deliver_sm(cli_args.deliver_sm)
        .with_debug(cli_args.debugging);
    gate.add_server("esme", config)?;

    let receipts = gate.clone();
    tokio::spawn(async move {
        while let Some(message) = received_rx.recv().await {
            let Some(session) = receipts.session(&message.channel) else {
                continue;
            };
            if message.registered_delivery == 0 {
                continue;
            }
            if let Err(err) = session
                .submit_delivery_report(&message.message_id, MessageStatus::DeliveredAckReceived)
                .await
            {
                warn!(channel = %message.channel, "No receipt for {}: {}", message.message_id, err);
            }
        }
    });

    let port = cli_args.port.unwrap_or(2775);
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    info!("SMSC listening on port {}", port);

    server::run(listener, gate, tokio::signal::ctrl_c()).await;
    Ok(())
}
