//! holofleet entry point.
//!
//! ```text
//! holofleet scan 192.168.1 --add     # find units and register them
//! holofleet send model http://host/cube.glb --loop
//! holofleet run                      # keep connections up, broadcast stdin lines
//! ```

mod config;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use holofleet_connection::{
    FleetManager, FleetSnapshot, FleetStore, JsonFileStore, Registry, RegistryError,
    ShortcutTable, WsConnector,
};
use holofleet_discovery::{Scanner, WsProbe};
use holofleet_protocol::{DeviceCommand, DeviceRecord, ShortcutRecord};

use crate::config::FleetConfig;

/// Control a fleet of networked display units.
#[derive(Parser, Debug)]
#[command(name = "holofleet")]
#[command(version)]
struct Args {
    /// Configuration file (defaults to the platform config directory).
    #[arg(long, global = true, env = "HOLOFLEET_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scan a /24 prefix for units
    Scan {
        /// Prefix such as 192.168.1 (defaults to the configured or local one)
        prefix: Option<String>,
        /// Register every unit found that is not yet known
        #[arg(long)]
        add: bool,
    },
    /// Register a unit
    Add {
        nickname: String,
        device_id: String,
        ip: String,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Unregister a unit
    Remove { nickname: String },
    /// Rename a registered unit
    Rename { old: String, new: String },
    /// List registered units
    List,
    /// Manage model shortcuts
    Shortcut {
        #[command(subcommand)]
        action: ShortcutAction,
    },
    /// Broadcast one command to every registered unit
    Send {
        /// Seconds to wait for units to connect before sending
        #[arg(long, default_value_t = 5)]
        wait: u64,
        #[command(subcommand)]
        command: SendCommand,
    },
    /// Keep every unit connected and broadcast each stdin line
    Run,
}

#[derive(Subcommand, Debug)]
enum ShortcutAction {
    Add {
        keyword: String,
        url: String,
        description: Vec<String>,
    },
    Remove {
        keyword: String,
    },
    List,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
enum SendCommand {
    Model {
        url: String,
        #[arg(long)]
        repeat: Option<u32>,
        #[arg(long = "loop")]
        looping: bool,
    },
    Video {
        url: String,
    },
    StopVideo,
    Rpm {
        value: f64,
    },
    Phase {
        #[arg(allow_hyphen_values = true)]
        degrees: i32,
    },
    Light {
        value: f64,
    },
    Reset,
    /// Load the model behind a shortcut keyword
    Shortcut {
        keyword: String,
    },
}

/// What a `send` invocation asks for.
#[derive(Debug, PartialEq)]
enum Outgoing {
    Command(DeviceCommand),
    /// Keyword still to be looked up in the shortcut table.
    Shortcut(String),
}

impl SendCommand {
    fn into_outgoing(self) -> Outgoing {
        let command = match self {
            SendCommand::Model {
                url,
                repeat,
                looping,
            } => DeviceCommand::Model {
                url,
                repeat,
                looping,
            },
            SendCommand::Video { url } => DeviceCommand::Video { url },
            SendCommand::StopVideo => DeviceCommand::StopVideo,
            SendCommand::Rpm { value } => DeviceCommand::Rpm { value },
            SendCommand::Phase { degrees } => DeviceCommand::Phase { degrees },
            SendCommand::Light { value } => DeviceCommand::Light { value },
            SendCommand::Reset => DeviceCommand::Reset,
            SendCommand::Shortcut { keyword } => return Outgoing::Shortcut(keyword),
        };
        Outgoing::Command(command)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config_path = match args.config {
        Some(path) => path,
        None => config::config_path()?,
    };
    let config = match FleetConfig::load_from(&config_path) {
        Ok(c) => {
            tracing::debug!(path = %config_path.display(), "configuration loaded");
            c
        }
        Err(e) => {
            tracing::warn!(error = %e, "failed to load config, using defaults");
            FleetConfig::default()
        }
    };

    match args.command {
        Command::Scan { prefix, add } => scan(&config, prefix.as_deref(), add).await,
        Command::Add {
            nickname,
            device_id,
            ip,
            port,
        } => {
            let port = port.unwrap_or(config.default_port);
            let record = edit_fleet(&config, |registry, _| {
                let record = DeviceRecord::new(&nickname, &device_id, &ip, port)?;
                registry.add(record.clone())?;
                Ok(record)
            })?;
            println!("added {} ({}) at {}", record.nickname, record.device_id, record.address());
            Ok(())
        }
        Command::Remove { nickname } => {
            edit_fleet(&config, |registry, _| registry.remove(&nickname))?;
            println!("removed {nickname}");
            Ok(())
        }
        Command::Rename { old, new } => {
            edit_fleet(&config, |registry, _| registry.rename(&old, &new))?;
            println!("renamed {old} to {new}");
            Ok(())
        }
        Command::List => {
            let snapshot = JsonFileStore::new(config.store_path()?).load()?;
            if snapshot.devices.is_empty() {
                println!("no devices registered");
            }
            for rec in snapshot.devices.values() {
                println!("{:<16} {:<24} {}", rec.nickname, rec.device_id, rec.address());
            }
            Ok(())
        }
        Command::Shortcut { action } => shortcut(&config, action),
        Command::Send { wait, command } => send(&config, wait, command).await,
        Command::Run => run(&config).await,
    }
}

/// Applies a registry or shortcut edit straight to the fleet file.
///
/// No supervisors are started, so nothing dials the units. The file is only
/// written when the edit succeeds.
fn edit_fleet<T>(
    config: &FleetConfig,
    edit: impl FnOnce(&mut Registry, &mut ShortcutTable) -> Result<T, RegistryError>,
) -> anyhow::Result<T> {
    let store = JsonFileStore::new(config.store_path()?);
    let snapshot = store.load()?;
    let mut registry = Registry::from_map(snapshot.devices);
    let mut shortcuts = ShortcutTable::from_map(snapshot.shortcuts);

    let value = edit(&mut registry, &mut shortcuts)?;
    store.save(&FleetSnapshot {
        devices: registry.to_map(),
        shortcuts: shortcuts.to_map(),
    })?;
    Ok(value)
}

async fn open_fleet(config: &FleetConfig) -> anyhow::Result<FleetManager> {
    let store_path = config.store_path()?;
    let fleet = FleetManager::open(
        config.supervisor_config(),
        Arc::new(WsConnector::new()),
        Arc::new(JsonFileStore::new(&store_path)),
    )
    .await
    .with_context(|| format!("opening fleet at {}", store_path.display()))?;
    Ok(fleet)
}

async fn scan(config: &FleetConfig, prefix: Option<&str>, add: bool) -> anyhow::Result<()> {
    let prefix = config.ip_prefix(prefix);
    let scanner = Scanner::new(config.liveness(), WsProbe::new(&config.scan_config()));

    let devices = if add {
        let fleet = open_fleet(config).await?;
        let result = fleet.discover(&scanner, &prefix).await;
        if let Ok(found) = &result {
            for rec in fleet.adopt(found).await {
                println!("registered {} at {}", rec.nickname, rec.address());
            }
        }
        fleet.shutdown().await;
        result?
    } else {
        scanner.scan(&prefix).await?
    };

    println!("{} unit(s) found under {prefix}", devices.len());
    for dev in &devices {
        println!("{:<22} {:<24} {}", dev.address(), dev.device_id, dev.id_source);
    }
    Ok(())
}

fn shortcut(config: &FleetConfig, action: ShortcutAction) -> anyhow::Result<()> {
    match action {
        ShortcutAction::Add {
            keyword,
            url,
            description,
        } => {
            let shortcut = ShortcutRecord::new(&keyword, &url, &description.join(" "));
            let name = shortcut.keyword.clone();
            let replaced = edit_fleet(config, |_, shortcuts| Ok(shortcuts.upsert(shortcut)))?;
            let verb = if replaced.is_some() { "updated" } else { "added" };
            println!("{verb} shortcut {name}");
        }
        ShortcutAction::Remove { keyword } => {
            let removed = edit_fleet(config, |_, shortcuts| shortcuts.remove(&keyword))?;
            println!("removed shortcut {}", removed.keyword);
        }
        ShortcutAction::List => {
            let snapshot = JsonFileStore::new(config.store_path()?).load()?;
            for sc in snapshot.shortcuts.values() {
                println!("{:<16} {:<40} {}", sc.keyword, sc.target_url, sc.description);
            }
        }
    }
    Ok(())
}

async fn send(config: &FleetConfig, wait: u64, command: SendCommand) -> anyhow::Result<()> {
    let fleet = open_fleet(config).await?;

    let command = match command.into_outgoing() {
        Outgoing::Command(cmd) => cmd,
        Outgoing::Shortcut(keyword) => match fleet.shortcut(&keyword).await {
            Some(sc) => DeviceCommand::model(sc.target_url),
            None => {
                fleet.shutdown().await;
                bail!("unknown shortcut {keyword:?}");
            }
        },
    };

    let connected = fleet.wait_until_connected(Duration::from_secs(wait)).await;
    tracing::debug!(connected, "sending");
    let outcome = fleet.send_to_all(&command).await;
    fleet.shutdown().await;

    println!("sent to {outcome} devices");
    Ok(())
}

async fn run(config: &FleetConfig) -> anyhow::Result<()> {
    let fleet = open_fleet(config).await?;
    tracing::info!(devices = fleet.len().await, "fleet running; type commands, `status`, or EOF to stop");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let result = loop {
        tokio::select! {
            _ = &mut ctrl_c => break Ok(()),
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => break Ok(()),
                    Err(e) => break Err(e),
                };
                match line.trim() {
                    "" => {}
                    "status" => print_status(&fleet).await,
                    command => {
                        let outcome = fleet.send_to_all(command).await;
                        println!("sent to {outcome} devices");
                    }
                }
            }
        }
    };

    fleet.shutdown().await;
    result.context("reading stdin")
}

async fn print_status(fleet: &FleetManager) {
    let status = fleet.status().await;
    if status.is_empty() {
        println!("no devices registered");
    }
    for entry in &status {
        let detail = match &entry.state.last_error {
            Some(err) => format!("retry in {}s: {err}", entry.state.reconnect_delay.as_secs()),
            None => String::new(),
        };
        println!(
            "{:<16} {:<24} {:<22} {:<12} {}",
            entry.record.nickname,
            entry.record.device_id,
            entry.record.address(),
            entry.state.phase,
            detail
        );
    }

    let stats = fleet.stats();
    println!(
        "connected {}/{} | messages {} | commands {} | discovered {} | up {}s",
        fleet.connected_count().await,
        status.len(),
        stats.messages_sent,
        stats.commands_executed,
        stats.devices_discovered,
        stats.uptime.as_secs()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use holofleet_protocol::constants::DEFAULT_PORT;

    #[test]
    fn parses_model_with_loop() {
        let args = Args::try_parse_from([
            "holofleet", "send", "--wait", "2", "model", "http://x/a.glb", "--loop",
        ])
        .unwrap();
        let Command::Send { wait, command } = args.command else {
            panic!("expected send");
        };
        assert_eq!(wait, 2);
        let Outgoing::Command(cmd) = command.into_outgoing() else {
            panic!("expected a command");
        };
        assert_eq!(cmd.to_string(), "model http://x/a.glb loop");
    }

    #[test]
    fn parses_scalar_commands() {
        let args = Args::try_parse_from(["holofleet", "send", "phase", "-90"]).unwrap();
        let Command::Send { command, .. } = args.command else {
            panic!("expected send");
        };
        assert_eq!(
            command.into_outgoing(),
            Outgoing::Command(DeviceCommand::Phase { degrees: -90 })
        );

        let args = Args::try_parse_from(["holofleet", "send", "stop-video"]).unwrap();
        let Command::Send { command, .. } = args.command else {
            panic!("expected send");
        };
        assert_eq!(command.into_outgoing(), Outgoing::Command(DeviceCommand::StopVideo));
    }

    #[test]
    fn shortcut_needs_lookup() {
        let cmd = SendCommand::Shortcut {
            keyword: "cube".into(),
        };
        assert_eq!(cmd.into_outgoing(), Outgoing::Shortcut("cube".to_string()));
    }

    #[test]
    fn add_defaults_port_to_none() {
        let args =
            Args::try_parse_from(["holofleet", "add", "holo1", "DEV1", "10.0.0.5"]).unwrap();
        let Command::Add { port, .. } = args.command else {
            panic!("expected add");
        };
        assert_eq!(port.unwrap_or(DEFAULT_PORT), 8080);
    }

    fn config_in(dir: &std::path::Path) -> FleetConfig {
        FleetConfig {
            store_path: dir.join("fleet.json").display().to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn registry_edits_write_the_fleet_file() {
        let tmp = tempfile::tempdir().unwrap();
        let config = config_in(tmp.path());

        edit_fleet(&config, |registry, _| {
            registry.add(DeviceRecord::new("holo1", "DEV1", "10.0.0.5", 8080)?)
        })
        .unwrap();
        edit_fleet(&config, |registry, _| registry.rename("holo1", "lobby")).unwrap();
        edit_fleet(&config, |_, shortcuts| {
            Ok(shortcuts.upsert(ShortcutRecord::new("Cube", "http://x/cube.glb", "")))
        })
        .unwrap();

        let snapshot = JsonFileStore::new(config.store_path().unwrap()).load().unwrap();
        assert_eq!(snapshot.devices["lobby"].device_id, "DEV1");
        assert!(!snapshot.devices.contains_key("holo1"));
        assert_eq!(snapshot.shortcuts["cube"].target_url, "http://x/cube.glb");
    }

    #[test]
    fn failed_edit_leaves_file_untouched() {
        let tmp = tempfile::tempdir().unwrap();
        let config = config_in(tmp.path());

        let err = edit_fleet(&config, |registry, _| registry.remove("ghost")).unwrap_err();
        assert_eq!(
            err.downcast_ref::<RegistryError>(),
            Some(&RegistryError::NotFound("ghost".into()))
        );
        assert!(!tmp.path().join("fleet.json").exists());
    }

    #[test]
    fn global_config_flag() {
        let args =
            Args::try_parse_from(["holofleet", "list", "--config", "/tmp/h.toml"]).unwrap();
        assert_eq!(args.config, Some(PathBuf::from("/tmp/h.toml")));
    }

    #[test]
    fn cli_is_consistent() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }
}
