mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "duplexipc", version, about = "Duplex IPC endpoints CLI")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(
        long,
        value_name = "LEVEL",
        default_value = "info",
        env = "DUPLEXIPC_LOG_LEVEL",
        global = true
    )]
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
            "duplexipc",
            "call",
            "/tmp/calc",
            "--a",
            "5",
            "--b",
            "-7",
            "--op",
            "mul",
        ])
        .expect("call args should parse");

        match cli.command {
            Command::Call(args) => {
                assert_eq!(args.a, 5);
                assert_eq!(args.b, -7);
                assert!(matches!(args.op, cmd::OpArg::Mul));
            }
            other => panic!("expected call, got {other:?}"),
        }
    }

    #[test]
    fn call_requires_operands() {
        let err = Cli::try_parse_from(["duplexipc", "call", "/tmp/calc", "--a", "1"])
            .expect_err("missing --b should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn parses_serve_subcommand() {
        let cli = Cli::try_parse_from([
            "duplexipc",
            "serve",
            "/tmp/calc",
            "--notify-every",
            "250ms",
            "--limit",
            "1024",
        ])
        .expect("serve args should parse");
        match cli.command {
            Command::Serve(args) => {
                assert_eq!(args.notify_every.as_deref(), Some("250ms"));
                assert_eq!(args.limit, Some(1024));
            }
            other => panic!("expected serve, got {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_op() {
        let err = Cli::try_parse_from([
            "duplexipc", "call", "/tmp/calc", "--a", "1", "--b", "2", "--op", "div",
        ])
        .expect_err("unknown op should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::InvalidValue);
    }
}
