//! systa-probe CLI - SystaComfort UDP protocol tool.

use clap::Parser;
use colored::Colorize;
use tokio::signal;

use systa_probe::cli::*;
use systa_probe::config::{init_logging, Config};
use systa_probe::discovery::{DiscoveryClient, InterfaceLister, StaticInterfaces};
use systa_probe::error::Result;
use systa_probe::session::{FrameAction, OffsetProber, ProbeTrial, SessionListener, TrialOutcome};
use systa_probe::types::DeviceIdentity;
use systa_probe::util::{self, SystemInterfaces};
use systa_probe::VERSION;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load config if specified
    let mut config = if let Some(ref path) = cli.config {
        Config::load(path)?
    } else if Config::default_path().exists() {
        Config::load(Config::default_path())?
    } else {
        Config::default()
    };

    if let Some(ref level) = cli.log_level {
        config.logging.level.clone_from(level);
    }
    if cli.no_color {
        config.logging.color = false;
        colored::control::set_override(false);
    }
    init_logging(&config.logging)?;

    let format = cli.format;
    match cli.command {
        Commands::Discover(args) => run_discover(args, config, format).await,
        Commands::Listen(args) => run_listen(args, config, format).await,
        Commands::Probe(args) => run_probe(args, config, format).await,
        Commands::SetMode(args) => run_set_mode(args, config, format).await,
        Commands::Config(args) => run_config(args, &config),
    }
}

/// Discover the unit or fail with a readable error.
async fn find_unit(args: &InterfaceArgs, config: &mut Config) -> Result<DeviceIdentity> {
    if let Some(timeout) = args.timeout {
        config.discovery.timeout = timeout;
    }

    let lister: Box<dyn InterfaceLister> = if !args.interfaces.is_empty() {
        Box::new(StaticInterfaces::new(args.interfaces.clone()))
    } else if !config.interfaces.is_empty() {
        Box::new(StaticInterfaces::new(config.interfaces.clone()))
    } else {
        Box::new(SystemInterfaces::new())
    };

    let client = DiscoveryClient::new(config.discovery.clone(), config.transport.clone());
    client
        .discover(lister.as_ref())
        .await?
        .ok_or_else(|| anyhow::anyhow!("no SystaComfort unit answered on any interface").into())
}

fn bind_session(identity: &DeviceIdentity, config: &Config) -> Result<SessionListener> {
    SessionListener::bind(
        identity,
        config.session.clone(),
        &config.transport,
        config.checksum_engine(),
    )
    .map_err(|e| {
        if config.session.port < 1024 && !util::is_root() {
            eprintln!(
                "{} Ports below 1024 usually need root privileges",
                "⚠".yellow()
            );
        }
        e
    })
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).map_err(anyhow::Error::from)?;
    println!("{text}");
    Ok(())
}

fn print_identity(identity: &DeviceIdentity) {
    let unit = &identity.unit;
    println!("{}", "SystaComfort unit".bright_white().bold());
    println!("{}", "─".repeat(40));
    println!("  {:<16} {}", "MAC:".cyan(), unit.mac);
    println!("  {:<16} {}", "IP:".cyan(), unit.ip);
    println!("  {:<16} {}", "Name:".cyan(), unit.name);
    println!("  {:<16} {}", "ID:".cyan(), unit.id);
    println!("  {:<16} {}", "App:".cyan(), unit.id.app);
    println!(
        "  {:<16} {}{}",
        "Platform:".cyan(),
        unit.id.platform,
        unit.id
            .platform_name()
            .map(|n| format!(" ({n})"))
            .unwrap_or_default()
    );
    println!("  {:<16} {}", "Version:".cyan(), unit.id.version_string());
    println!("  {:<16} {}", "Base version:".cyan(), unit.base_version);
    match (identity.stouch_port, identity.password.as_deref()) {
        (Some(port), password) => {
            println!("  {:<16} {}", "S-Touch port:".cyan(), port);
            println!("  {:<16} {}", "UDP password:".cyan(), password.unwrap_or("-"));
        }
        (None, _) => println!("  {:<16} {}", "S-Touch:".cyan(), "not supported".yellow()),
    }
    println!("  {:<16} {}", "Found via:".cyan(), identity.interface);
    println!("{}", "─".repeat(40));
}

async fn run_discover(args: DiscoverArgs, mut config: Config, format: OutputFormat) -> Result<()> {
    let identity = find_unit(&args.interfaces, &mut config).await?;

    match format {
        OutputFormat::Json => {
            let mut value = serde_json::to_value(&identity).map_err(anyhow::Error::from)?;
            value["version"] = serde_json::Value::String(identity.unit.id.version_string());
            print_json(&value)
        }
        OutputFormat::Text => {
            print_identity(&identity);
            Ok(())
        }
    }
}

async fn run_listen(args: ListenArgs, mut config: Config, format: OutputFormat) -> Result<()> {
    if let Some(port) = args.port {
        config.session.port = port;
    }
    config.validate()?;

    let identity = find_unit(&args.interfaces, &mut config).await?;
    let mut session = bind_session(&identity, &config)?;

    if format == OutputFormat::Text {
        println!(
            "{} systa-probe {} listening on {}",
            "→".cyan(),
            VERSION,
            session.local_addr()?
        );
    }

    let limit = args.frames;
    let mut seen = 0u64;
    let run = session.run(|received| {
        seen += 1;
        let header = received.frame.header();
        if format == OutputFormat::Text {
            println!(
                "{} #{:<5} type {:#04x} from {}  {}",
                "←".green(),
                header.counter,
                header.packet_type,
                received.from,
                received.frame.hex().dimmed()
            );
        }
        match limit {
            Some(max) if seen >= max => FrameAction::Stop,
            _ => FrameAction::Acknowledge,
        }
    });

    let finished = tokio::select! {
        result = run => Some(result),
        _ = signal::ctrl_c() => None,
    };
    let stats = match finished {
        Some(result) => result?,
        None => {
            println!();
            session.stats().clone()
        }
    };

    match format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "frames_received": stats.frames_received,
            "acks_sent": stats.acks_sent,
            "malformed": stats.malformed,
            "last_remote": stats.last_remote,
        })),
        OutputFormat::Text => {
            println!(
                "{} {} frames received, {} acknowledged",
                "✓".green(),
                stats.frames_received,
                stats.acks_sent
            );
            Ok(())
        }
    }
}

fn print_trial(trial: &ProbeTrial, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            if let Ok(line) = serde_json::to_string(trial) {
                println!("{line}");
            }
        }
        OutputFormat::Text => {
            let outcome = match trial.outcome {
                TrialOutcome::Accepted => "accepted".green().bold(),
                TrialOutcome::Rejected => "rejected".red(),
            };
            let (packet_type, subtype) = trial.channel;
            println!(
                "  trial {:>4}  offset {:#06X}  channel {:#04x}/{}  {}",
                trial.attempt,
                trial.offset,
                packet_type,
                subtype.map_or_else(|| "-".to_string(), |s| format!("{s:#04x}")),
                outcome
            );
        }
    }
}

async fn run_probe(args: ProbeArgs, mut config: Config, format: OutputFormat) -> Result<()> {
    if let Some(initial) = args.initial {
        config.probe.initial_offset = initial;
    }
    if args.seed.is_some() {
        config.probe.seed = args.seed;
    }
    if args.max_trials.is_some() {
        config.probe.max_trials = args.max_trials;
    }
    config.validate()?;

    let identity = find_unit(&args.interfaces, &mut config).await?;
    let mut session = bind_session(&identity, &config)?;

    if format == OutputFormat::Text {
        println!(
            "{} Searching offsets from {:#06X} on {}",
            "→".cyan(),
            config.probe.initial_offset,
            session.local_addr()?
        );
    }

    let mut search = config.probe.search();
    let mut prober = OffsetProber::new(&mut session, config.probe.clone());
    let result = prober
        .search_offset(&mut search, |trial| print_trial(trial, format))
        .await?;

    match format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "offset": result.offset,
            "trials": result.trials,
            "packet_type": result.header.packet_type,
            "subtype": result.header.subtype,
            "parameter": result.header.parameter,
        })),
        OutputFormat::Text => {
            println!(
                "{} Unit accepted offset {} after {} trials",
                "✓".green(),
                format!("{:#06X}", result.offset).bright_green().bold(),
                result.trials
            );
            Ok(())
        }
    }
}

async fn run_set_mode(args: SetModeArgs, mut config: Config, format: OutputFormat) -> Result<()> {
    if let Some(skip) = args.skip {
        config.session.skip_count = skip;
    }
    config.validate()?;

    let identity = find_unit(&args.interfaces, &mut config).await?;
    let mut session = bind_session(&identity, &config)?;
    let skip = config.session.skip_count;

    let announced = session.await_burst_then_announce(skip).await?;

    match format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "skipped": skip,
            "announcement": announced.announcement.hex(),
            "response": announced.response.frame.hex(),
            "response_counter": announced.response.frame.header().counter,
        })),
        OutputFormat::Text => {
            println!("{} sent {}", "→".cyan(), announced.announcement.hex());
            println!("{} got  {}", "←".green(), announced.response.frame.hex());
            Ok(())
        }
    }
}

fn run_config(args: ConfigArgs, effective: &Config) -> Result<()> {
    let output = if args.effective {
        effective.to_toml()?
    } else {
        Config::example().to_toml()?
    };

    if let Some(ref path) = args.output {
        std::fs::write(path, &output)?;
        println!("{} Wrote configuration to {}", "✓".green(), path.display());
    } else {
        print!("{output}");
    }

    Ok(())
}
