use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod send;
pub mod serve;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Route one host link through a loopback stack until it closes.
    Serve(ServeArgs),
    /// Send a single NPI frame as the host.
    Send(SendArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Serve(args) => serve::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Socket path to bind for the host link.
    pub path: PathBuf,
    /// Router configuration file (JSON).
    #[arg(long, value_name = "FILE", env = "NPIROUTE_CONFIG")]
    pub config: Option<PathBuf>,
    /// Override the synchronous watchdog, in milliseconds.
    #[arg(long, value_name = "MS")]
    pub watchdog_ms: Option<u64>,
    /// Override the capacity of each channel queue.
    #[arg(long, value_name = "N")]
    pub queue_capacity: Option<usize>,
    /// Service MRDY flow-control events.
    #[arg(long)]
    pub flow_control: bool,
    /// Log every host message through an echo reroute hook.
    #[arg(long)]
    pub intercept_log: bool,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Socket path to connect to.
    pub path: PathBuf,
    /// First command byte (type and subsystem), e.g. 0x21.
    #[arg(long, value_parser = send::parse_byte)]
    pub cmd0: u8,
    /// Second command byte (command id).
    #[arg(long, value_parser = send::parse_byte, default_value = "0")]
    pub cmd1: u8,
    /// Data field as hex, e.g. 0a0b0c.
    #[arg(long, conflicts_with = "text")]
    pub hex: Option<String>,
    /// Data field as a UTF-8 string.
    #[arg(long, conflicts_with = "hex")]
    pub text: Option<String>,
    /// Wait for one frame back and print it.
    #[arg(long)]
    pub wait: bool,
    /// Maximum time to wait for the reply when --wait is set (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub wait_timeout: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
