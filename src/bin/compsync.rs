use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use compsync::clock::{AdjustedClock, ClockCalibrator, HttpTimeProbe, SystemTimeSource};
use compsync::config::AppConfig;
use compsync::control::CommandKind;
use compsync::cues::{write_cue_wav, Cue, LogCueSink};
use compsync::display::{run_display, DisplayFrame, DisplaySession};
use compsync::error::ErrorCode;
use compsync::operator::{generate_room_id, OperatorClient, OperatorPanel};
use compsync::server::{run_http_server, ServerState};
use compsync::store::{MemoryRoundStore, RemoteRoundFeed};
use compsync::timer::{format_hms, parse_hms};

fn main() -> ExitCode {
    let cli = Cli::parse();
    compsync::init_logging(cli.verbose);
    match cli.execute() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("compsync error: {err:?}");
            ExitCode::from(1)
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "compsync", about = "Synchronized countdown timer for competition rounds")]
struct Cli {
    /// JSON configuration file (defaults to ./compsync.json when present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Enable debug logging.
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

impl Cli {
    fn execute(self) -> Result<()> {
        let config = match &self.config {
            Some(path) => AppConfig::try_load_from_file(path)
                .with_context(|| format!("loading {}", path.display()))?
                .with_env_overrides(),
            None => AppConfig::load(),
        };

        match self.command {
            Command::Serve(args) => serve_command(config, args),
            Command::Display(args) => display_command(config, args),
            Command::Control(args) => control_command(config, args),
            Command::NewRoom(args) => new_room_command(config, args),
            Command::RenderCues(args) => render_cues_command(args),
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the clock, control and round store server.
    Serve(ServeArgs),
    /// Follow a room and show its countdown in the terminal.
    Display(DisplayArgs),
    /// Send START/STOP/RESET for a room.
    Control(ControlArgs),
    /// Print a fresh room id and its display URL.
    NewRoom(ConnectionArgs),
    /// Write every cue as a WAV file.
    RenderCues(RenderCuesArgs),
}

#[derive(Args, Debug, Clone)]
struct ServeArgs {
    /// Listen address, e.g. 0.0.0.0:8787.
    #[arg(long)]
    addr: Option<String>,
    /// Shared secret required by the control endpoint.
    #[arg(long)]
    token: Option<String>,
    /// Delay between a START and the round's first second (milliseconds).
    #[arg(long)]
    start_lead_ms: Option<i64>,
}

#[derive(Args, Debug, Clone)]
struct ConnectionArgs {
    /// Base URL of the compsync server.
    #[arg(long)]
    server: Option<String>,
    /// Shared operator secret.
    #[arg(long)]
    token: Option<String>,
}

#[derive(Args, Debug, Clone)]
struct DisplayArgs {
    /// Room to follow.
    #[arg(long)]
    room: String,
    #[command(flatten)]
    connection: ConnectionArgs,
    /// Suppress audible cues.
    #[arg(long, default_value_t = false)]
    muted: bool,
    /// Make this display responsible for recurring restarts.
    #[arg(long, default_value_t = false)]
    controller: bool,
    /// Scheduling tick (milliseconds).
    #[arg(long)]
    tick_ms: Option<u64>,
    /// Print frames as JSON lines instead of status text.
    #[arg(long, default_value_t = false)]
    json: bool,
}

#[derive(Args, Debug, Clone)]
struct ControlArgs {
    #[command(subcommand)]
    action: ControlCommandArg,
    #[command(flatten)]
    connection: ConnectionArgs,
}

#[derive(Subcommand, Debug, Clone)]
enum ControlCommandArg {
    /// Schedule a new round.
    Start(StartArgs),
    /// Stop the running round.
    Stop(RoomArg),
    /// Clear the room.
    Reset(RoomArg),
}

#[derive(Args, Debug, Clone)]
struct RoomArg {
    #[arg(long)]
    room: String,
}

#[derive(Args, Debug, Clone)]
struct StartArgs {
    #[arg(long)]
    room: String,
    /// Climbing time as SS, M:SS or H:MM:SS.
    #[arg(long, value_parser = parse_duration_arg)]
    climb: Option<u64>,
    /// Preparation time as SS, M:SS or H:MM:SS (enables preparation).
    #[arg(long, value_parser = parse_duration_arg)]
    prep: Option<u64>,
    /// Restart automatically after each natural end.
    #[arg(long, default_value_t = false)]
    recurring: bool,
}

#[derive(Args, Debug, Clone)]
struct RenderCuesArgs {
    /// Output directory.
    #[arg(long, default_value = "cues")]
    out: PathBuf,
    #[arg(long, default_value_t = 48_000)]
    sample_rate: u32,
}

fn parse_duration_arg(raw: &str) -> std::result::Result<u64, String> {
    parse_hms(raw).ok_or_else(|| format!("expected SS, M:SS or H:MM:SS, got '{raw}'"))
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("building tokio runtime")
}

fn serve_command(mut config: AppConfig, args: ServeArgs) -> Result<()> {
    if let Some(addr) = args.addr {
        config.server.bind_addr = addr;
    }
    if let Some(token) = args.token {
        config.server.admin_token = Some(token);
    }
    if let Some(lead) = args.start_lead_ms {
        config.broadcast.start_lead_ms = lead;
    }
    config.validate().context("invalid configuration")?;

    let addr: SocketAddr = config
        .server
        .bind_addr
        .parse()
        .with_context(|| format!("invalid listen address {}", config.server.bind_addr))?;
    let state = ServerState::new(
        Arc::new(MemoryRoundStore::new()),
        Arc::new(SystemTimeSource::default()),
        config.server.admin_token.clone(),
        config.broadcast.start_lead_ms,
    );

    println!("compsync server on http://{addr} (Ctrl+C to stop)");
    runtime()?.block_on(run_http_server(state, addr))
}

fn display_command(config: AppConfig, args: DisplayArgs) -> Result<()> {
    let base = args
        .connection
        .server
        .clone()
        .unwrap_or_else(|| config.display.server_url.clone());
    let token = args.connection.token.clone().or(config.server.admin_token.clone());
    let tick = Duration::from_millis(args.tick_ms.unwrap_or(config.display.tick_interval_ms));
    let muted = args.muted || config.display.muted;

    runtime()?.block_on(async move {
        let probe = HttpTimeProbe::new(&base)?;
        let offset = ClockCalibrator::new(probe, SystemTimeSource::default())
            .calibrate_or_default()
            .await;
        let clock = AdjustedClock::new(SystemTimeSource::default(), offset);

        let feed = RemoteRoundFeed::new(
            &base,
            Duration::from_millis(config.display.reconnect_delay_ms),
        )?;
        let starter = if args.controller {
            Some(Arc::new(OperatorClient::new(&base, token)?))
        } else {
            None
        };

        let mut session = DisplaySession::new(args.room.clone(), muted, args.controller);
        let mut sink = LogCueSink::default();
        let room = args.room.clone();
        let json = args.json;

        run_display(
            &mut session,
            &feed,
            &clock,
            &mut sink,
            starter,
            tick,
            |frame: &DisplayFrame| {
                if json {
                    if let Ok(line) = serde_json::to_string(frame) {
                        println!("{line}");
                    }
                } else {
                    println!("{}", frame.status_line(&room));
                }
            },
            async {
                let _ = tokio::signal::ctrl_c().await;
            },
        )
        .await
    })
}

fn control_command(config: AppConfig, args: ControlArgs) -> Result<()> {
    let base = args
        .connection
        .server
        .unwrap_or_else(|| config.display.server_url.clone());
    let token = args.connection.token.or(config.server.admin_token.clone());
    let client = OperatorClient::new(&base, token)?;

    let mut round = config.round.to_round_config();
    let (room, kind) = match args.action {
        ControlCommandArg::Start(start) => {
            if let Some(secs) = start.climb {
                round.climbing_duration_ms = secs.saturating_mul(1_000);
            }
            if let Some(secs) = start.prep {
                round.preparation_enabled = true;
                round.preparation_duration_ms = secs.saturating_mul(1_000);
            }
            round.recurring |= start.recurring;
            (start.room, CommandKind::Start)
        }
        ControlCommandArg::Stop(arg) => (arg.room, CommandKind::Stop),
        ControlCommandArg::Reset(arg) => (arg.room, CommandKind::Reset),
    };

    let mut panel = OperatorPanel::new(room.clone(), round);
    panel.set_room_id(&room)?;

    runtime()?.block_on(async {
        let result = panel.broadcast(&client, kind).await;
        println!("{}", panel.status().unwrap_or_default());
        match result {
            Ok(ack) => {
                if let Some(start) = ack.start_time {
                    let round = panel.config();
                    println!(
                        "round starts at {start} (climb {})",
                        format_hms(round.climbing_duration_ms / 1_000)
                    );
                }
                Ok(())
            }
            Err(err) => bail!("{} failed (code {})", kind.as_str(), err.code()),
        }
    })
}

fn new_room_command(config: AppConfig, args: ConnectionArgs) -> Result<()> {
    let base = args.server.unwrap_or(config.display.server_url);
    let room = generate_room_id();
    let panel = OperatorPanel::new(room.clone(), config.round.to_round_config());
    println!("{room}");
    println!("{}", panel.display_url(&base));
    Ok(())
}

fn render_cues_command(args: RenderCuesArgs) -> Result<()> {
    if args.sample_rate == 0 {
        bail!("Sample rate must be greater than zero");
    }
    std::fs::create_dir_all(&args.out)
        .with_context(|| format!("creating {}", args.out.display()))?;

    for cue in Cue::all() {
        let path = args.out.join(format!("{}.wav", cue.slug()));
        write_cue_wav(&path, cue, args.sample_rate)?;
        println!("{}", path.display());
    }
    Ok(())
}
