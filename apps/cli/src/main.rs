use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use remoteproc_core::{Remoteproc, SimulatorConfig};
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;
use tracing::{error, info};

const DEFAULT_ROOT: &str = "/tmp/fake-root";
const DEFAULT_DEVICE_NAME: &str = "dsp0";

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Linux remoteproc subsystem simulator",
    long_about = "Simulates the Linux remoteproc sysfs interface for testing purposes.

Example usage:
  remoteproc-sim --root /tmp/fake-root --device-index 0 --device-name dsp0

  # In another terminal, control via sysfs:
  touch /tmp/fake-root/lib/firmware/hello_world.elf
  echo 'hello_world.elf' > /tmp/fake-root/class/remoteproc/remoteproc0/firmware
  echo 'start' > /tmp/fake-root/class/remoteproc/remoteproc0/state
  cat /tmp/fake-root/class/remoteproc/remoteproc0/state
  echo 'stop' > /tmp/fake-root/class/remoteproc/remoteproc0/state"
)]
struct Args {
    /// Root path where the simulated sysfs tree is created [default: /tmp/fake-root]
    #[arg(long)]
    root: Option<PathBuf>,

    /// Device index (suffix of the remoteprocN directory) [default: 0]
    #[arg(long)]
    device_index: Option<u32>,

    /// Device name written to the `name` file [default: dsp0]
    #[arg(long)]
    device_name: Option<String>,

    /// Fallback firmware directory [default: <root>/lib/firmware]
    #[arg(long)]
    firmware_dir: Option<PathBuf>,

    /// TOML configuration file; flags override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Remove freshly created directories on exit
    #[arg(long)]
    cleanup: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn into_config(self) -> Result<SimulatorConfig> {
        let mut config = match &self.config {
            Some(path) => SimulatorConfig::load_from_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => SimulatorConfig {
                root_dir: DEFAULT_ROOT.into(),
                device_name: DEFAULT_DEVICE_NAME.to_string(),
                ..Default::default()
            },
        };

        if let Some(root) = self.root {
            config.root_dir = root;
        }
        if let Some(index) = self.device_index {
            config.device_index = index;
        }
        if let Some(name) = self.device_name {
            config.device_name = name;
        }
        if let Some(dir) = self.firmware_dir {
            config.firmware_dir = Some(dir);
        }
        if self.cleanup {
            config.cleanup_on_exit = true;
        }
        Ok(config)
    }
}

fn main() {
    let args = Args::parse();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(if args.verbose {
                    tracing::Level::DEBUG.into()
                } else {
                    tracing::Level::INFO.into()
                })
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    if let Err(e) = run(args) {
        error!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let config = args.into_config()?;
    info!(
        root = %config.root_dir.display(),
        index = config.device_index,
        name = %config.device_name,
        "Starting remoteproc simulator"
    );

    // Register before the device exists so an early signal is not lost.
    let mut signals =
        Signals::new([SIGINT, SIGTERM]).context("failed to install signal handlers")?;

    let mut device = Remoteproc::new(config).context("failed to create remote processor")?;

    if let Some(signal) = signals.forever().next() {
        info!(signal, "Received shutdown signal");
    }

    device.close();
    Ok(())
}
