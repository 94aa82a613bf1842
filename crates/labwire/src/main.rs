mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "labwire", version, about = "Feature-based lab instrument control CLI")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_call_subcommand() {
        let cli = Cli::try_parse_from([
            "labwire",
            "call",
            "org.labwire/examples/v1/GreetingProvider",
            "SayHello",
            "--param",
            "Name=SiLA",
            "--host",
            "127.0.0.1",
            "--port",
            "40100",
        ])
        .expect("call args should parse");

        assert!(matches!(cli.command, Command::Call(_)));
    }

    #[test]
    fn host_without_port_is_rejected() {
        let err = Cli::try_parse_from([
            "labwire",
            "features",
            "--host",
            "127.0.0.1",
        ])
        .expect_err("host without port should fail");

        assert_eq!(
            err.kind(),
            clap::error::ErrorKind::MissingRequiredArgument
        );
    }

    #[test]
    fn parses_serve_subcommand() {
        let cli = Cli::try_parse_from(["labwire", "serve", "--port", "40100", "--no-announce"])
            .expect("serve args should parse");
        assert!(matches!(cli.command, Command::Serve(_)));
    }

    #[test]
    fn no_announce_conflicts_with_announce_addr() {
        let err = Cli::try_parse_from([
            "labwire",
            "serve",
            "--no-announce",
            "--announce-addr",
            "255.255.255.255:50001",
        ])
        .expect_err("conflicting args should fail");

        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }
}
