use clap::Parser;

/// Command-line options; everything else lives in the YAML config.
#[derive(Debug, Parser)]
#[command(name = "mentor-relay", version, about = "Chat relay and booking service")]
pub struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long, env = "CONFIG_PATH", default_value = "config.yaml")]
    pub config: String,

    /// Validate the configuration and exit.
    #[arg(long)]
    pub check_config: bool,
}
