use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};
use labwire_client::{scan_for, Session, DEFAULT_ANNOUNCE_PORT};
use labwire_transport::Security;
use labwire_wire::ServerDescriptor;

use crate::exit::{client_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod call;
pub mod discover;
pub mod features;
pub mod greet;
pub mod serve;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the example feature server.
    Serve(ServeArgs),
    /// Scan for an announcing server and print it.
    Discover(DiscoverArgs),
    /// List the features a server implements.
    Features(FeaturesArgs),
    /// Invoke a command or read a property.
    Call(CallArgs),
    /// Walk the full client flow: discover, connect, greet, read a property.
    Greet(GreetArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Serve(args) => serve::run(args),
        Command::Discover(args) => discover::run(args, format),
        Command::Features(args) => features::run(args, format),
        Command::Call(args) => call::run(args, format),
        Command::Greet(args) => greet::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Announced server type.
    #[arg(long, default_value = "Hello Labwire Server")]
    pub server_type: String,
    /// Interface to listen on.
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,
    /// Command port. 0 picks a free port.
    #[arg(long, default_value_t = 0)]
    pub port: u16,
    /// Mark the channel as encrypted (cipher provided externally).
    #[arg(long)]
    pub encrypted: bool,
    /// Config file holding the persistent server identity.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
    /// Destination address for discovery announcements.
    #[arg(long, value_name = "ADDR")]
    pub announce_addr: Option<String>,
    /// Interval between announcements (e.g. 500ms, 2s).
    #[arg(long, default_value = "500ms")]
    pub announce_interval: String,
    /// Do not announce this server.
    #[arg(long, conflicts_with_all = ["announce_addr", "announce_interval"])]
    pub no_announce: bool,
}

/// How client commands find their server: direct host and port, or a
/// discovery scan for the server type.
#[derive(Args, Debug)]
pub struct TargetArgs {
    /// Server host. Skips discovery; requires --port.
    #[arg(long, requires = "port")]
    pub host: Option<String>,
    /// Server command port.
    #[arg(long)]
    pub port: Option<u16>,
    /// Server type to discover.
    #[arg(long, default_value = "Hello Labwire Server")]
    pub server_type: String,
    /// UDP port announcements arrive on.
    #[arg(long, default_value_t = DEFAULT_ANNOUNCE_PORT)]
    pub announce_port: u16,
    /// Discovery budget (e.g. 5s, 500ms).
    #[arg(long, default_value = "10s")]
    pub discover_timeout: String,
    /// Expect an encrypted channel.
    #[arg(long)]
    pub encrypted: bool,
}

#[derive(Args, Debug)]
pub struct DiscoverArgs {
    /// Server type to discover.
    #[arg(long, default_value = "Hello Labwire Server")]
    pub server_type: String,
    /// UDP port announcements arrive on.
    #[arg(long, default_value_t = DEFAULT_ANNOUNCE_PORT)]
    pub announce_port: u16,
    /// Scan budget (e.g. 5s, 500ms).
    #[arg(long, default_value = "10s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct FeaturesArgs {
    #[command(flatten)]
    pub target: TargetArgs,
}

#[derive(Args, Debug)]
pub struct CallArgs {
    /// Feature identifier.
    pub feature: String,
    /// Command or property name.
    pub command: String,
    /// Parameter as NAME=VALUE. VALUE is parsed as JSON, falling back to a
    /// plain string. Repeatable.
    #[arg(long = "param", value_name = "NAME=VALUE")]
    pub params: Vec<String>,
    /// Reply timeout (e.g. 10s, 500ms).
    #[arg(long, default_value = "10s")]
    pub timeout: String,
    #[command(flatten)]
    pub target: TargetArgs,
}

#[derive(Args, Debug)]
pub struct GreetArgs {
    /// Name to be greeted with.
    #[arg(default_value = "SiLA")]
    pub name: String,
    #[command(flatten)]
    pub target: TargetArgs,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub fn resolve_target(args: &TargetArgs) -> CliResult<ServerDescriptor> {
    if let (Some(host), Some(port)) = (&args.host, args.port) {
        return Ok(ServerDescriptor {
            server_type: args.server_type.clone(),
            host: host.clone(),
            port,
            uuid: String::new(),
        });
    }

    let budget = parse_duration(&args.discover_timeout)?;
    scan_for(&args.server_type, args.announce_port, budget)
        .map_err(|err| client_error("discovery failed", err))
}

pub fn connect(args: &TargetArgs) -> CliResult<Session> {
    let descriptor = resolve_target(args)?;
    Session::connect(&descriptor, Security::from_flag(args.encrypted))
        .map_err(|err| client_error("connect failed", err))
}

pub fn parse_param(input: &str) -> CliResult<(String, serde_json::Value)> {
    let (name, value) = input
        .split_once('=')
        .ok_or_else(|| CliError::new(USAGE, format!("--param must be NAME=VALUE, got '{input}'")))?;
    if name.is_empty() {
        return Err(CliError::new(USAGE, "--param name must not be empty"));
    }

    let value = serde_json::from_str(value)
        .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
    Ok((name.to_string(), value))
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        _ => Err(CliError::new(
            USAGE,
            format!("unsupported duration unit: {unit}"),
        )),
    }
}
