use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use fakeroku::config::{ConfigPersister, TomlPersister, file::config_file_path};
use fakeroku::registry::DeviceRegistry;
use fakeroku::{Config, Daemon, store};

/// fakeroku - Roku ECP device emulator
#[derive(Parser)]
#[command(name = "fakeroku", version, about)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, env = "FAKEROKU_CONFIG")]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// List configured devices and exit
    Devices,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,fakeroku=info",
        1 => "info,fakeroku=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load(cli.config.as_deref())?;
    tracing::debug!(?config, "loaded configuration");

    let persister = config
        .source
        .clone()
        .or_else(config_file_path)
        .map(TomlPersister::new);

    if let Some(Command::Devices) = cli.command {
        return list_devices(&mut config, persister.as_ref());
    }

    tracing::info!(
        bind = %config.bind,
        multicast = %config.multicast_ip,
        devices = config.devices().len(),
        "starting fakeroku"
    );

    let store = store::open(&config.store)?;
    let daemon = Daemon::new(
        config,
        store,
        persister.as_ref().map(|p| p as &dyn ConfigPersister),
    )
    .await;

    // Run until interrupted
    daemon.run().await?;

    Ok(())
}

/// Print the configured devices without starting any listener
///
/// Newly generated UUIDs are saved so later runs advertise the same ones.
fn list_devices(config: &mut Config, persister: Option<&TomlPersister>) -> anyhow::Result<()> {
    let mut registry = DeviceRegistry::load(config);
    if registry.is_empty() {
        println!("No devices configured");
        return Ok(());
    }

    println!("{:<20} {:<6} {:<34} LOCATION", "ID", "PORT", "UUID");
    for device in registry.iter() {
        println!(
            "{:<20} {:<6} {:<34} {}",
            device.id,
            device.http_port,
            device.uuid,
            device.location()
        );
    }

    if let Some(persister) = persister {
        registry.persist(config, persister)?;
    }

    Ok(())
}
