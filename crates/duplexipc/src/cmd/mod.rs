use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use clap::{Args, Subcommand, ValueEnum};
use duplexipc::calc::CalcOp;
use duplexipc::endpoint::{ClientEndpoint, FrameConfig};

use crate::exit::{endpoint_error, CliError, CliResult, INTERNAL, TIMEOUT, USAGE};
use crate::output::OutputFormat;

pub mod call;
pub mod ping;
pub mod serve;
pub mod version;
pub mod watch;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the calculator server.
    Serve(ServeArgs),
    /// Send one calculator request and print the result.
    Call(CallArgs),
    /// Check that a server is listening.
    Ping(PingArgs),
    /// Print notifications pushed by a server.
    Watch(WatchArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Serve(args) => serve::run(args, format),
        Command::Call(args) => call::run(args, format),
        Command::Ping(args) => ping::run(args, format),
        Command::Watch(args) => watch::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Channel base path (`.up` and `.down` are derived from it).
    pub path: PathBuf,
    /// Push a tick notification at this interval (e.g. 1s, 250ms).
    #[arg(long, value_name = "DURATION")]
    pub notify_every: Option<String>,
    /// Body size limit in bytes (0 = unlimited).
    #[arg(long)]
    pub limit: Option<usize>,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum OpArg {
    Add,
    Sub,
    Mul,
}

impl From<OpArg> for CalcOp {
    fn from(op: OpArg) -> Self {
        match op {
            OpArg::Add => CalcOp::Add,
            OpArg::Sub => CalcOp::Sub,
            OpArg::Mul => CalcOp::Mul,
        }
    }
}

#[derive(Args, Debug)]
pub struct CallArgs {
    /// Channel base path of the server.
    pub path: PathBuf,
    /// Left operand.
    #[arg(long, allow_negative_numbers = true)]
    pub a: i32,
    /// Right operand.
    #[arg(long, allow_negative_numbers = true)]
    pub b: i32,
    /// Operation.
    #[arg(long, value_enum, default_value = "add")]
    pub op: OpArg,
    /// Give up waiting for the reply after this long (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct PingArgs {
    /// Channel base path of the server.
    pub path: PathBuf,
    /// Give up waiting for the reply after this long (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Channel base path of the server.
    pub path: PathBuf,
    /// Exit after receiving N notifications.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
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
        _ => Ok(Duration::from_secs(value)),
    }
}

pub(crate) fn connect_client(path: &std::path::Path) -> CliResult<Arc<ClientEndpoint>> {
    ClientEndpoint::connect_with_config(path, FrameConfig::default())
        .map(Arc::new)
        .map_err(|err| endpoint_error("connect failed", err))
}

/// Run a blocking client call with a deadline.
///
/// Endpoint calls have no timeout of their own. On expiry the call is left
/// running; the caller is expected to exit.
pub(crate) fn with_deadline<T, F>(
    client: &Arc<ClientEndpoint>,
    timeout: Duration,
    call: F,
) -> CliResult<T>
where
    T: Send + 'static,
    F: FnOnce(&ClientEndpoint) -> CliResult<T> + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    let client = Arc::clone(client);
    thread::Builder::new()
        .name("duplexipc-call".to_string())
        .spawn(move || {
            let _ = tx.send(call(&client));
        })
        .map_err(|err| CliError::new(INTERNAL, format!("call thread failed: {err}")))?;

    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(mpsc::RecvTimeoutError::Timeout) => Err(CliError::new(
            TIMEOUT,
            format!("no reply within {}ms", timeout.as_millis()),
        )),
        Err(mpsc::RecvTimeoutError::Disconnected) => {
            Err(CliError::new(INTERNAL, "call thread ended without a result"))
        }
    }
}

pub(crate) fn install_ctrlc_handler(handler: impl FnMut() + Send + 'static) -> CliResult<()> {
    ctrlc::set_handler(handler).map_err(|err| {
        CliError::new(INTERNAL, format!("signal handler setup failed: {err}"))
    })
}

/// Flag cleared by Ctrl-C.
pub(crate) fn running_flag() -> CliResult<Arc<AtomicBool>> {
    let running = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&running);
    install_ctrlc_handler(move || flag.store(false, Ordering::SeqCst))?;
    Ok(running)
}
