use std::fs;
use std::net::IpAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use artnet_core::discovery::{DiscoveryConfig, DiscoveryError, Node, NodeDiscovery};
use artnet_core::packets::{ArtDmx, ArtNetPacket, NodeStyle, ReportCode, layout};
use artnet_core::server::{ArtNetServer, ServerConfig, ServerError, ServerListener};
use artnet_core::ListenerResult;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("ARTNET_BUILD_COMMIT"),
    " ",
    env!("ARTNET_BUILD_DATE"),
    ")"
);

#[derive(Parser, Debug)]
#[command(name = "artnet")]
#[command(version, long_version = LONG_VERSION)]
#[command(
    about = "Art-Net controller tools: node discovery, DMX output and traffic inspection.",
    long_about = None,
    after_help = "Examples:\n  artnet discover --stdout --pretty\n  artnet send-dmx --universe 1 255,128,0\n  artnet listen --duration-ms 2000"
)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Broadcast ArtPoll and report the nodes that answer.
    #[command(
        after_help = "Examples:\n  artnet discover --stdout\n  artnet discover --wait-ms 5000 -o nodes.json"
    )]
    Discover {
        #[command(flatten)]
        net: NetArgs,

        /// How long to collect replies, in milliseconds
        #[arg(long, default_value_t = 3000)]
        wait_ms: u64,

        /// Re-poll interval, in milliseconds
        #[arg(long, default_value_t = 1000)]
        interval_ms: u64,

        /// Output report path (JSON)
        #[arg(short = 'o', long, required_unless_present = "stdout")]
        report: Option<PathBuf>,

        /// Write JSON report to stdout
        #[arg(long, conflicts_with = "report")]
        stdout: bool,

        /// Pretty-print JSON output
        #[arg(long, conflicts_with = "compact")]
        pretty: bool,

        /// Compact JSON output (default)
        #[arg(long)]
        compact: bool,
    },
    /// Send ArtDmx frames to one universe.
    #[command(
        after_help = "Examples:\n  artnet send-dmx --universe 1 255,128,0\n  artnet send-dmx --subnet 2 --target 10.0.0.20 --frames 10 0,0,255"
    )]
    SendDmx {
        #[command(flatten)]
        net: NetArgs,

        /// Comma-separated slot values (0-255), starting at channel 1
        values: String,

        /// Subnet (0-15)
        #[arg(long, default_value_t = 0)]
        subnet: u8,

        /// Universe within the subnet (0-15)
        #[arg(long, default_value_t = 0)]
        universe: u8,

        /// Channel count; missing values are sent as zero
        #[arg(long)]
        channels: Option<usize>,

        /// Unicast to this host instead of broadcasting
        #[arg(long)]
        target: Option<String>,

        /// Number of frames to send
        #[arg(long, default_value_t = 1)]
        frames: u32,

        /// Delay between frames, in milliseconds
        #[arg(long, default_value_t = 25)]
        frame_interval_ms: u64,

        /// Sequence number of the first frame
        #[arg(long, default_value_t = 1)]
        sequence: u32,
    },
    /// Print received Art-Net packets as JSON lines.
    #[command(after_help = "Examples:\n  artnet listen\n  artnet listen --count 10 --port 0")]
    Listen {
        #[command(flatten)]
        net: NetArgs,

        /// Stop after this many milliseconds
        #[arg(long, default_value_t = 5000)]
        duration_ms: u64,

        /// Stop after this many packets
        #[arg(long)]
        count: Option<usize>,
    },
}

#[derive(Args, Debug)]
struct NetArgs {
    /// Local address to bind (defaults to all interfaces)
    #[arg(long)]
    bind: Option<IpAddr>,

    /// Local UDP port (0 picks a free port)
    #[arg(long, default_value_t = layout::DEFAULT_PORT)]
    port: u16,

    /// Destination port for outgoing packets
    #[arg(long, default_value_t = layout::DEFAULT_PORT)]
    send_port: u16,

    /// Broadcast address or host name
    #[arg(long)]
    broadcast: Option<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let result = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")
        .map_err(CliError::from)
        .and_then(|runtime| runtime.block_on(run(cli.command, cli.quiet)));

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {}", err.message);
            if let Some(hint) = err.hint {
                eprintln!("hint: {}", hint);
            }
            ExitCode::from(2)
        }
    }
}

fn init_logging(verbose: u8, quiet: bool) {
    let default = match (quiet, verbose) {
        (true, _) => "artnet=warn",
        (false, 0) => "artnet=info",
        (false, 1) => "artnet=debug",
        (false, _) => "artnet=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(command: Commands, quiet: bool) -> Result<(), CliError> {
    match command {
        Commands::Discover {
            net,
            wait_ms,
            interval_ms,
            report,
            stdout,
            pretty,
            compact,
        } => cmd_discover(net, wait_ms, interval_ms, report, stdout, pretty, compact, quiet).await,
        Commands::SendDmx {
            net,
            values,
            subnet,
            universe,
            channels,
            target,
            frames,
            frame_interval_ms,
            sequence,
        } => {
            let frame = DmxFrame {
                values: parse_values(&values)?,
                subnet: check_nibble("subnet", subnet)?,
                universe: check_nibble("universe", universe)?,
                channels,
            };
            cmd_send_dmx(net, frame, target, frames, frame_interval_ms, sequence, quiet).await
        }
        Commands::Listen {
            net,
            duration_ms,
            count,
        } => cmd_listen(net, duration_ms, count).await,
    }
}

#[derive(Debug)]
struct CliError {
    message: String,
    hint: Option<String>,
}

impl CliError {
    fn new(message: impl Into<String>, hint: Option<String>) -> Self {
        Self {
            message: message.into(),
            hint,
        }
    }
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

impl From<anyhow::Error> for CliError {
    fn from(err: anyhow::Error) -> Self {
        CliError::new(format!("{err:#}"), None)
    }
}

impl From<ServerError> for CliError {
    fn from(err: ServerError) -> Self {
        let hint = match &err {
            ServerError::Bind { .. } => {
                Some("another Art-Net application may own the port; try --port 0".to_string())
            }
            ServerError::UnknownHost { .. } => {
                Some("check the host name or pass an IP address".to_string())
            }
            ServerError::Send { .. } => {
                Some("check the network route or use --broadcast/--target".to_string())
            }
            _ => None,
        };
        CliError::new(err.to_string(), hint)
    }
}

impl From<DiscoveryError> for CliError {
    fn from(err: DiscoveryError) -> Self {
        match err {
            DiscoveryError::Server(err) => err.into(),
            other => CliError::new(other.to_string(), None),
        }
    }
}

#[derive(Debug, Serialize)]
struct ToolInfo {
    name: &'static str,
    version: &'static str,
    commit: &'static str,
}

impl ToolInfo {
    fn current() -> Self {
        Self {
            name: "artnet",
            version: env!("CARGO_PKG_VERSION"),
            commit: env!("ARTNET_BUILD_COMMIT"),
        }
    }
}

/// JSON report written by `artnet discover`.
#[derive(Debug, Serialize)]
struct DiscoveryReport {
    tool: ToolInfo,
    /// RFC3339 timestamp of the end of the collection window.
    generated_at: String,
    local_addr: Option<String>,
    broadcast_addr: Option<String>,
    wait_ms: u64,
    nodes: Vec<Node>,
}

async fn start_server(net: &NetArgs) -> Result<Arc<ArtNetServer>, CliError> {
    let server = Arc::new(ArtNetServer::new(
        ServerConfig::default()
            .port(net.port)
            .send_port(net.send_port),
    ));
    if let Some(broadcast) = &net.broadcast {
        server.set_broadcast_address(broadcast).await?;
    }
    server.start(net.bind)?;
    Ok(server)
}

#[allow(clippy::too_many_arguments)]
async fn cmd_discover(
    net: NetArgs,
    wait_ms: u64,
    interval_ms: u64,
    report: Option<PathBuf>,
    stdout: bool,
    pretty: bool,
    compact: bool,
    quiet: bool,
) -> Result<(), CliError> {
    if pretty && compact {
        return Err(CliError::new(
            "cannot use --pretty and --compact together",
            Some("choose one output format".to_string()),
        ));
    }
    let report_path = if stdout {
        None
    } else {
        Some(report.ok_or_else(|| {
            CliError::new(
                "missing output path",
                Some("use -o/--report or --stdout".to_string()),
            )
        })?)
    };
    if interval_ms == 0 {
        return Err(CliError::new(
            "--interval-ms must be greater than zero",
            Some("use at least 100 ms between polls".to_string()),
        ));
    }

    let server = start_server(&net).await?;
    let discovery = NodeDiscovery::new(
        Arc::clone(&server),
        DiscoveryConfig::default().poll_interval(Some(Duration::from_millis(interval_ms))),
    );
    let outcome = async {
        discovery.start().await?;
        tokio::time::sleep(Duration::from_millis(wait_ms)).await;
        Ok::<_, CliError>(())
    }
    .await;
    discovery.stop();
    let local_addr = server.local_addr();
    let broadcast_addr = server.broadcast_address();
    server.stop();
    outcome?;

    let rep = DiscoveryReport {
        tool: ToolInfo::current(),
        generated_at: now_rfc3339()?,
        local_addr: local_addr.map(|addr| addr.to_string()),
        broadcast_addr: broadcast_addr.map(|addr| addr.to_string()),
        wait_ms,
        nodes: discovery.active_nodes(),
    };
    let json = serialize_json(&rep, pretty)?;

    let Some(report_path) = report_path else {
        println!("{}", json);
        return Ok(());
    };
    if let Some(parent) = report_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create output directory: {}", parent.display())
            })?;
        }
    }
    fs::write(&report_path, json)
        .with_context(|| format!("Failed to write report: {}", report_path.display()))?;
    if !quiet {
        eprintln!(
            "OK: {} node(s) -> {}",
            rep.nodes.len(),
            report_path.display()
        );
    }
    Ok(())
}

struct DmxFrame {
    values: Vec<u8>,
    subnet: u8,
    universe: u8,
    channels: Option<usize>,
}

async fn cmd_send_dmx(
    net: NetArgs,
    frame: DmxFrame,
    target: Option<String>,
    frames: u32,
    frame_interval_ms: u64,
    sequence: u32,
    quiet: bool,
) -> Result<(), CliError> {
    let channels = frame.channels.unwrap_or(frame.values.len());
    if channels == 0 || channels > layout::DMX_MAX_SLOTS {
        return Err(CliError::new(
            format!("invalid channel count: {channels}"),
            Some(format!("use 1 to {} channels", layout::DMX_MAX_SLOTS)),
        ));
    }

    let mut dmx = ArtDmx::new();
    dmx.set_universe(frame.subnet, frame.universe)
        .context("Failed to build ArtDmx")?;
    dmx.set_dmx(&frame.values, channels)
        .context("Failed to build ArtDmx")?;

    let server = start_server(&net).await?;
    let outcome = async {
        let mut sent = 0;
        for index in 0..frames {
            dmx.set_sequence_id(sequence.wrapping_add(index))
                .context("Failed to build ArtDmx")?;
            let packet = ArtNetPacket::from(dmx.clone());
            sent += match &target {
                Some(host) => server.unicast_packet_to_host(&packet, host).await?,
                None => server.broadcast_packet(&packet).await?,
            };
            if index + 1 < frames {
                tokio::time::sleep(Duration::from_millis(frame_interval_ms)).await;
            }
        }
        Ok::<_, CliError>(sent)
    }
    .await;
    server.stop();
    let sent = outcome?;

    if !quiet {
        let destination = target.unwrap_or_else(|| {
            server
                .broadcast_address()
                .map(|addr| addr.to_string())
                .unwrap_or_else(|| "broadcast".to_string())
        });
        eprintln!(
            "OK: {frames} ArtDmx frame(s), {channels} channel(s), {sent} bytes -> {destination}"
        );
    }
    Ok(())
}

/// One stdout line per received packet.
#[derive(Debug, Serialize)]
struct ReceivedLine {
    received_at: String,
    source: String,
    #[serde(flatten)]
    packet: PacketSummary,
}

#[derive(Debug, Serialize)]
#[serde(tag = "packet", rename_all = "snake_case")]
enum PacketSummary {
    ArtDmx {
        subnet: u8,
        universe: u8,
        sequence: u8,
        channels: usize,
        data: Vec<u8>,
    },
    ArtPoll {
        flags: u8,
        priority: u8,
    },
    ArtPollReply {
        ip: String,
        short_name: String,
        long_name: String,
        report_code: Option<ReportCode>,
        style: Option<NodeStyle>,
    },
}

impl From<&ArtNetPacket> for PacketSummary {
    fn from(packet: &ArtNetPacket) -> Self {
        match packet {
            ArtNetPacket::Dmx(dmx) => Self::ArtDmx {
                subnet: dmx.subnet_id(),
                universe: dmx.universe_id(),
                sequence: dmx.sequence_id(),
                channels: dmx.num_channels(),
                data: dmx.dmx().to_vec(),
            },
            ArtNetPacket::Poll(poll) => Self::ArtPoll {
                flags: poll.flags(),
                priority: poll.priority(),
            },
            ArtNetPacket::PollReply(reply) => Self::ArtPollReply {
                ip: reply.ip_address().to_string(),
                short_name: reply.short_name().to_string(),
                long_name: reply.long_name().to_string(),
                report_code: reply.report_code(),
                style: reply.style(),
            },
        }
    }
}

/// Forwards decoded packets from the receive task to the printer.
struct Forwarder(mpsc::UnboundedSender<ReceivedLine>);

impl ServerListener for Forwarder {
    fn on_received(&self, packet: &ArtNetPacket, source: std::net::SocketAddr) -> ListenerResult {
        let line = ReceivedLine {
            received_at: now_rfc3339().map_err(|err| err.message)?,
            source: source.to_string(),
            packet: packet.into(),
        };
        self.0.send(line).map_err(|_| "printer closed")?;
        Ok(())
    }
}

async fn cmd_listen(net: NetArgs, duration_ms: u64, count: Option<usize>) -> Result<(), CliError> {
    let server = start_server(&net).await?;
    let (tx, mut rx) = mpsc::unbounded_channel();
    server.add_listener(Arc::new(Forwarder(tx)));

    let deadline = tokio::time::sleep(Duration::from_millis(duration_ms));
    tokio::pin!(deadline);
    let mut printed = 0usize;
    let outcome = loop {
        if count.is_some_and(|limit| printed >= limit) {
            break Ok(());
        }
        tokio::select! {
            _ = &mut deadline => break Ok(()),
            line = rx.recv() => {
                let Some(line) = line else { break Ok(()) };
                match serde_json::to_string(&line).context("JSON serialization failed") {
                    Ok(json) => println!("{json}"),
                    Err(err) => break Err(CliError::from(err)),
                }
                printed += 1;
            }
        }
    };
    server.stop();
    tracing::debug!(printed, "listen finished");
    outcome
}

fn serialize_json<T: Serialize>(value: &T, pretty: bool) -> Result<String, CliError> {
    if pretty {
        serde_json::to_string_pretty(value)
            .context("JSON serialization failed")
            .map_err(Into::into)
    } else {
        serde_json::to_string(value)
            .context("JSON serialization failed")
            .map_err(Into::into)
    }
}

fn now_rfc3339() -> Result<String, CliError> {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .context("Failed to format timestamp")
        .map_err(Into::into)
}

fn parse_values(input: &str) -> Result<Vec<u8>, CliError> {
    let values = input
        .split(',')
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(|value| {
            value.parse::<u8>().map_err(|_| {
                CliError::new(
                    format!("invalid DMX value '{value}'"),
                    Some("use comma-separated values between 0 and 255".to_string()),
                )
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    if values.len() > layout::DMX_MAX_SLOTS {
        return Err(CliError::new(
            format!("too many DMX values: {}", values.len()),
            Some(format!("a universe holds {} channels", layout::DMX_MAX_SLOTS)),
        ));
    }
    Ok(values)
}

fn check_nibble(name: &str, value: u8) -> Result<u8, CliError> {
    if value > 0x0f {
        return Err(CliError::new(
            format!("{name} out of range: {value}"),
            Some(format!("{name} must be between 0 and 15")),
        ));
    }
    Ok(value)
}
