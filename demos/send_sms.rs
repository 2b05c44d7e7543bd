// ABOUTME: Example application demonstrating SMS sending through a client session
// ABOUTME: Connects, binds, submits one message and waits for the SMSC's verdict

use argh::FromArgs;
use smpp_gate::datatypes::{BodyFormat, MessageStatus};
use smpp_gate::session::{
    GateEvents, KeepAliveConfig, NewMessage, Session, SessionConfig, TracingEvents,
};
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Example application to show the simplest case of sending an SMS message
#[derive(FromArgs)]
struct CliArgs {
    /// whether or not to enable debugging
    #[argh(switch, short = 'd')]
    debugging: bool,

    /// the system id
    #[argh(option)]
    system_id: Option<String>,

    /// the password
    #[argh(option)]
    password: Option<String>,

    /// the hostname of IP address of the SMSC (default: localhost)
    #[argh(option)]
    host: Option<String>,

    /// the port to use when connecting to the SMSC (default: 2775)
    #[argh(option, short = 'p')]
    port: Option<u16>,

    /// the message to send
    #[argh(option, short = 'm')]
    message: String,

    /// the recipient telephone number
    #[argh(option, short = 't')]
    to: String,

    /// the telephone number that the message will be from
    #[argh(option, short = 'f')]
    from: String,

    /// send the body as UCS-2
    #[argh(switch, short = 'u')]
    unicode: bool,
}

/// Logs everything and forwards status changes to `main`
struct StatusForwarder {
    statuses: mpsc::UnboundedSender<(MessageStatus, Option<String>)>,
}

impl GateEvents for StatusForwarder {
    fn log(&self, level: Level, text: &str) {
        TracingEvents.log(level, text);
    }

    fn channel_event(&self, channel: &str, description: &str, pdu: Option<&str>) {
        TracingEvents.channel_event(channel, description, pdu);
    }

    fn new_message(&self, message: &NewMessage) {
        TracingEvents.new_message(message);
    }

    fn message_status_changed(&self, local_id: &str, status: MessageStatus, remote_id: Option<&str>) {
        TracingEvents.message_status_changed(local_id, status, remote_id);
        let _ = self.statuses.send((status, remote_id.map(str::to_string)));
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

    let host = cli_args.host.unwrap_or_else(|| "localhost".to_owned());
    let port = cli_args.port.unwrap_or(2775);
    let system_id = cli_args.system_id.unwrap_or_default();
    let password = cli_args.password.unwrap_or_default();

    let config = SessionConfig::new(system_id, password)
        .with_address(host, port)
        .with_direction(true, false)
        .with_debug(cli_args.debugging)
        .with_keep_alive(KeepAliveConfig::new(Duration::from_secs(30)));

    let (statuses, mut status_rx) = mpsc::unbounded_channel();
    let session = Session::client("smsc", config, Arc::new(StatusForwarder { statuses }));

    session.connect().await?;
    if !session.wait_bound(Duration::from_secs(10)).await {
        session.quit().await;
        return Err("bind failed".into());
    }
    println!("Connected and bound successfully");

    let format = if cli_args.unicode {
        BodyFormat::Unicode
    } else {
        BodyFormat::Ascii
    };
    if let Err(e) = session
        .submit("1", &cli_args.from, &cli_args.to, &cli_args.message, format, true)
        .await
    {
        eprintln!("Failed to send message: {e} (code {})", e.code());
        session.quit().await;
        return Err(e.into());
    }

    let verdict = tokio::time::timeout(Duration::from_secs(30), async {
        while let Some((status, remote_id)) = status_rx.recv().await {
            match status {
                MessageStatus::Sent | MessageStatus::Rejected | MessageStatus::Timeout => {
                    return Some((status, remote_id));
                }
                _ => {}
            }
        }
        None
    })
    .await;

    match verdict {
        Ok(Some((MessageStatus::Sent, remote_id))) => {
            println!(
                "Message sent successfully! Message ID: {}",
                remote_id.unwrap_or_default()
            );
        }
        Ok(Some((status, _))) => eprintln!("Message not sent: {status}"),
        _ => eprintln!("No response from the SMSC"),
    }

    session.quit().await;
    Ok(())
}
