// ampctl -- command-line tool for driving an AE6MC amplifier and
// supervising its serial link, against real hardware or an emulated
// device.
//
// Usage:
//   ampctl --port /dev/ttyUSB0 version
//   ampctl --port /dev/ttyUSB0 volume set 0 40
//   ampctl --port /dev/ttyUSB0 --dialect legacy bass get 2
//   ampctl --port /dev/ttyUSB0 link 1 0
//   ampctl --mock power 3 on
//   ampctl --config /etc/ampctl.toml monitor
//   ampctl --state-file zones.toml restore
//   ampctl list

mod config;
mod mock;
mod state;
mod stress;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

use ampctl::ae6mc::builder::Ae6mcBuilder;
use ampctl::ae6mc::{Ae6mcAmplifier, models};
use ampctl::monitor::{MemoryZoneSource, ZoneStateSource, replay_zone_states};
use ampctl::{Amplifier, Dialect, InputId, ZoneId};

use config::AmpConfig;
use state::{FileZoneSource, StateFile};

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// ampctl -- control an AE6MC multi-zone amplifier over RS-232.
#[derive(Parser)]
#[command(name = "ampctl", version, about)]
struct Cli {
    /// Config file (default: ./ampctl.toml if present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Serial port path (e.g. /dev/ttyUSB0, COM3). Overrides the config file.
    #[arg(long, global = true)]
    port: Option<String>,

    /// Firmware dialect: legacy or constrained. Overrides the config file.
    #[arg(long, global = true)]
    dialect: Option<Dialect>,

    /// Pause after each write, in milliseconds. Overrides the config file.
    #[arg(long, global = true)]
    write_delay_ms: Option<u64>,

    /// Zone state file replayed by `monitor` and `restore`.
    #[arg(long, global = true)]
    state_file: Option<PathBuf>,

    /// Talk to an emulated amplifier instead of a serial port.
    #[arg(long, global = true)]
    mock: bool,

    /// More log output (-v debug, -vv trace). RUST_LOG takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print model, dialect and sizes.
    Info,

    /// Query the firmware version.
    Version,

    /// Reset the amplifier.
    Reset,

    /// Turn a zone on or off.
    Power {
        /// Zone index (0-based).
        zone: u8,
        state: Switch,
    },

    /// Mute or unmute a zone.
    Mute {
        /// Zone index (0-based).
        zone: u8,
        state: Switch,
    },

    /// Mute or unmute every zone.
    MuteAll { state: Switch },

    /// Zone volume (0-100).
    Volume {
        #[command(subcommand)]
        action: LevelAction,
    },

    /// Zone bass level (0-100 legacy, 0-15 constrained).
    Bass {
        #[command(subcommand)]
        action: LevelAction,
    },

    /// Zone treble level (0-100 legacy, 0-15 constrained).
    Treble {
        #[command(subcommand)]
        action: LevelAction,
    },

    /// Route an input to an output zone.
    Link {
        /// Input index (0-based).
        input: u8,
        /// Output zone index (0-based).
        output: u8,
    },

    /// Push every zone in the state file to the amplifier once.
    Restore,

    /// Run the health monitor and print link events.
    Monitor {
        /// Duration in seconds (0 = run until Ctrl-C).
        #[arg(long, default_value_t = 0)]
        duration: u64,
    },

    /// Concurrent volume write/read-back cycles across zones.
    Stress {
        /// Number of cycles per zone.
        #[arg(long, default_value_t = 50)]
        count: u32,

        /// Number of zones to exercise at once, starting from zone 0.
        #[arg(long, default_value_t = 6)]
        zones: u8,
    },

    /// List supported amplifier models.
    List,
}

#[derive(Subcommand)]
enum LevelAction {
    /// Read the current level.
    Get {
        /// Zone index (0-based).
        zone: u8,
    },
    /// Set a new level.
    Set {
        /// Zone index (0-based).
        zone: u8,
        level: u8,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Switch {
    On,
    Off,
}

impl Switch {
    fn is_on(self) -> bool {
        matches!(self, Switch::On)
    }
}

#[derive(Clone, Copy)]
enum Level {
    Volume,
    Bass,
    Treble,
}

// ---------------------------------------------------------------------------
// Setup
// ---------------------------------------------------------------------------

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Merge command-line overrides into the loaded config.
fn effective_config(cli: &Cli) -> Result<AmpConfig> {
    let mut config = AmpConfig::load(cli.config.as_deref())?;
    if let Some(port) = &cli.port {
        config.port_name = Some(port.clone());
    }
    if let Some(dialect) = cli.dialect {
        config.dialect = dialect;
    }
    if let Some(ms) = cli.write_delay_ms {
        config.write_delay_ms = ms;
    }
    if let Some(path) = &cli.state_file {
        config.state_file = Some(path.clone());
    }
    Ok(config)
}

fn create_amplifier(cli: &Cli, config: &AmpConfig) -> Result<Ae6mcAmplifier> {
    let builder = Ae6mcBuilder::new(models::ae6mc())
        .dialect(config.dialect)
        .write_delay(config.write_delay());

    if cli.mock {
        let amp = builder
            .build_with_connector(Box::new(mock::connector(config.dialect)))
            .context("failed to build amplifier with mock connector")?;
        println!("Using emulated amplifier ({} firmware)", config.dialect);
        return Ok(amp);
    }

    let port = config
        .port_name
        .as_deref()
        .context("a serial port is required: pass --port or set port_name in the config file")?;
    builder
        .serial_port(port)
        .build()
        .with_context(|| format!("failed to set up amplifier on {port}"))
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

fn cmd_list() -> Result<()> {
    println!("{:<8} {:>7} {:>7}", "Model", "Zones", "Inputs");
    for model in ampctl::supported_amplifiers() {
        println!("{:<8} {:>7} {:>7}", model.name, model.outputs, model.inputs);
    }
    Ok(())
}

fn cmd_info(amp: &Ae6mcAmplifier, config: &AmpConfig) -> Result<()> {
    let info = amp.info();
    println!("Amplifier");
    println!("  Model:          {}", info.model_name);
    println!("  Dialect:        {}", info.dialect);
    println!("  Zones:          {}", info.outputs);
    println!("  Inputs:         {}", info.inputs);
    println!(
        "  Tone range:     0-{}",
        info.dialect.max_tone_level()
    );
    println!();
    println!("Line");
    println!("  Port:           {}", amp.line().endpoint());
    println!("  Write delay:    {} ms", config.write_delay_ms);
    println!(
        "  Read timeout:   {} ms",
        amp.line().timing().read_timeout.as_millis()
    );
    Ok(())
}

async fn cmd_level_get(amp: &dyn Amplifier, level: Level, zone: ZoneId) -> Result<()> {
    let value = match level {
        Level::Volume => amp.get_volume(zone).await?,
        Level::Bass => amp.get_bass(zone).await?,
        Level::Treble => amp.get_treble(zone).await?,
    };
    if value < 0 {
        println!("{zone}: reply could not be decoded");
    } else {
        println!("{zone}: {value}");
    }
    Ok(())
}

async fn cmd_level_set(amp: &dyn Amplifier, level: Level, zone: ZoneId, value: u8) -> Result<()> {
    match level {
        Level::Volume => amp.set_volume(zone, value).await?,
        Level::Bass => amp.set_bass(zone, value).await?,
        Level::Treble => amp.set_treble(zone, value).await?,
    }
    println!("{zone}: set to {value}");
    Ok(())
}

async fn cmd_restore(amp: &Ae6mcAmplifier, config: &AmpConfig) -> Result<()> {
    let path = config
        .state_file
        .as_deref()
        .context("restore needs a state file: pass --state-file or set state_file")?;
    let file = StateFile::load(path)?;
    file.validate(amp.info())?;

    replay_zone_states(amp, &file.zones)
        .await
        .context("replaying zone states")?;
    println!("Restored {} zones from {}", file.zones.len(), path.display());
    Ok(())
}

async fn cmd_monitor(amp: Ae6mcAmplifier, config: &AmpConfig, duration_secs: u64) -> Result<()> {
    let source: Arc<dyn ZoneStateSource> = match &config.state_file {
        Some(path) => {
            // Fail early on a broken file; it is re-read on every recovery.
            StateFile::load(path)?.validate(amp.info())?;
            Arc::new(FileZoneSource::new(path.clone()))
        }
        None => {
            tracing::warn!("No state file configured, recovery will not restore any zone");
            Arc::new(MemoryZoneSource::default())
        }
    };

    let handle = ampctl::spawn_monitor(Arc::new(amp), source, config.monitor_period());
    let mut event_rx = handle.subscribe();

    println!(
        "Monitoring every {}s (Ctrl-C to stop)...",
        config.monitor_period_secs
    );

    let deadline = if duration_secs > 0 {
        Some(Instant::now() + Duration::from_secs(duration_secs))
    } else {
        None
    };

    loop {
        let timeout = match deadline {
            Some(dl) => {
                let remaining = dl.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    println!("Monitor duration elapsed.");
                    break;
                }
                remaining
            }
            None => Duration::from_secs(3600),
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!("Interrupted.");
                break;
            }
            result = tokio::time::timeout(timeout, event_rx.recv()) => match result {
                Ok(Ok(event)) => println!("[event] {event:?}"),
                Ok(Err(RecvError::Lagged(n))) => {
                    println!("[warning] missed {n} events (consumer too slow)");
                }
                Ok(Err(RecvError::Closed)) => {
                    println!("Event channel closed.");
                    break;
                }
                Err(_) => {
                    if deadline.is_some() {
                        println!("Monitor duration elapsed.");
                        break;
                    }
                }
            },
        }
    }

    println!("Final state: {}", handle.state());
    handle.shutdown().await;
    Ok(())
}

fn zone_id(amp: &dyn Amplifier, zone: u8) -> Result<ZoneId> {
    if zone >= amp.output_amount() {
        bail!("zone {zone} out of range (0-{})", amp.output_amount() - 1);
    }
    Ok(ZoneId::new(zone))
}

fn input_id(amp: &dyn Amplifier, input: u8) -> Result<InputId> {
    if input >= amp.input_amount() {
        bail!("input {input} out of range (0-{})", amp.input_amount() - 1);
    }
    Ok(InputId::new(input))
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // The `list` command does not need an amplifier.
    if matches!(cli.command, Command::List) {
        return cmd_list();
    }

    let config = effective_config(&cli)?;
    let amp = create_amplifier(&cli, &config)?;

    let result = match &cli.command {
        Command::Info => cmd_info(&amp, &config),
        Command::Version => {
            let version = amp.get_version().await?;
            println!("{version}");
            Ok(())
        }
        Command::Reset => amp.reset().await.map_err(Into::into),
        Command::Power { zone, state } => {
            let zone = zone_id(&amp, *zone)?;
            amp.set_on_state(zone, state.is_on()).await.map_err(Into::into)
        }
        Command::Mute { zone, state } => {
            let zone = zone_id(&amp, *zone)?;
            amp.set_mute_state(zone, state.is_on()).await.map_err(Into::into)
        }
        Command::MuteAll { state } => amp.mute_all(state.is_on()).await.map_err(Into::into),
        Command::Volume { action } | Command::Bass { action } | Command::Treble { action } => {
            let level = match &cli.command {
                Command::Bass { .. } => Level::Bass,
                Command::Treble { .. } => Level::Treble,
                _ => Level::Volume,
            };
            match action {
                LevelAction::Get { zone } => {
                    let zone = zone_id(&amp, *zone)?;
                    cmd_level_get(&amp, level, zone).await
                }
                LevelAction::Set { zone, level: value } => {
                    let zone = zone_id(&amp, *zone)?;
                    cmd_level_set(&amp, level, zone, *value).await
                }
            }
        }
        Command::Link { input, output } => {
            let input = input_id(&amp, *input)?;
            let output = zone_id(&amp, *output)?;
            amp.link(input, output).await.map_err(Into::into)
        }
        Command::Restore => cmd_restore(&amp, &config).await,
        Command::Monitor { duration } => return cmd_monitor(amp, &config, *duration).await,
        Command::Stress { count, zones } => {
            return stress::cmd_stress(Arc::new(amp), *zones, *count).await;
        }
        Command::List => unreachable!("list handled above"),
    };

    amp.line().disconnect().await.ok();
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "ampctl", "volume", "set", "2", "40", "--dialect", "legacy", "--mock", "-vv",
        ])
        .unwrap();
        assert!(cli.mock);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.dialect, Some(Dialect::Legacy));
        assert!(matches!(
            cli.command,
            Command::Volume {
                action: LevelAction::Set { zone: 2, level: 40 }
            }
        ));
    }

    #[test]
    fn rejects_unknown_dialect() {
        assert!(Cli::try_parse_from(["ampctl", "--dialect", "modern", "version"]).is_err());
    }

    #[test]
    fn flags_override_config() {
        let cli = Cli::try_parse_from([
            "ampctl",
            "--port",
            "/dev/ttyS9",
            "--write-delay-ms",
            "20",
            "info",
        ])
        .unwrap();
        let config = effective_config(&cli).unwrap();
        assert_eq!(config.port_name.as_deref(), Some("/dev/ttyS9"));
        assert_eq!(config.write_delay_ms, 20);
    }
}
