use clap::{Args, Subcommand, ValueEnum};

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod demo;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a feeder/router/consumer loop over a loopback pipe and report stats.
    Demo(DemoArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Demo(args) => demo::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum DropPolicyArg {
    /// Evict the oldest unread image when both slots are occupied.
    Old,
    /// Refuse the incoming image when both slots are occupied.
    New,
}

#[derive(Args, Debug)]
pub struct DemoArgs {
    /// Telemetry messages to feed.
    #[arg(long, default_value_t = 240)]
    pub messages: u32,

    /// Image frames to feed, interleaved with the messages.
    #[arg(long, default_value_t = 10)]
    pub images: u32,

    /// Payload size of each image frame.
    #[arg(long, default_value_t = 24 * 1024)]
    pub image_bytes: usize,

    /// Message slot count / queue depth.
    #[arg(long, default_value_t = 8)]
    pub queue_depth: usize,

    /// Image contention policy.
    #[arg(long, value_enum, default_value_t = DropPolicyArg::Old)]
    pub drop_policy: DropPolicyArg,

    /// Stamp and require CRC-32 checksums.
    #[arg(long)]
    pub checksum: bool,

    /// Corrupt every Nth frame's checksum (0 = never); needs --checksum to matter.
    #[arg(long, default_value_t = 0)]
    pub corrupt_every: u32,

    /// Loopback pipe capacity in bytes; small values fragment frames harder.
    #[arg(long, default_value_t = 8 * 1024)]
    pub pipe_capacity: usize,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
