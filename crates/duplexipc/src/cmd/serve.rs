use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use duplexipc::calc::{self, CalcRequest, TICK_HEADER};
use duplexipc::endpoint::{ErrorKind, FrameConfig, Message, Reply, RequestHandler, ServerEndpoint};
use tracing::{debug, info, warn};

use crate::cmd::{install_ctrlc_handler, parse_duration, running_flag, ServeArgs};
use crate::exit::{endpoint_error, CliResult, SUCCESS};
use crate::output::{emit, OutputFormat, ServeSummary};

const STOP_CHECK_INTERVAL: Duration = Duration::from_millis(50);

struct CalcHandler {
    requests: Arc<AtomicU64>,
}

impl RequestHandler for CalcHandler {
    fn received(&self, request: &Message, reply: &mut Reply) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        match CalcRequest::decode(&request.body) {
            Ok(calc) => {
                let result = calc.evaluate();
                debug!(a = calc.a, b = calc.b, op = calc.op.symbol(), result, "request answered");
                calc::encode_result(result, &mut reply.body);
            }
            // An empty body tells the caller the request was not understood.
            Err(err) => warn!(error = %err, "malformed calculator request"),
        }
    }
}

pub fn run(args: ServeArgs, format: OutputFormat) -> CliResult<i32> {
    let interval = args
        .notify_every
        .as_deref()
        .map(parse_duration)
        .transpose()?;
    let config = match args.limit {
        Some(limit) => FrameConfig::with_limit(limit),
        None => FrameConfig::default(),
    };

    let server = Arc::new(ServerEndpoint::with_config(&args.path, config));
    let requests = Arc::new(AtomicU64::new(0));
    server.set_request_handler(CalcHandler {
        requests: Arc::clone(&requests),
    });

    let notifications = match interval {
        None => serve_blocking(&server)?,
        Some(interval) => serve_with_ticks(&server, interval)?,
    };

    emit(
        &ServeSummary {
            path: args.path.display().to_string(),
            requests: requests.load(Ordering::Relaxed),
            notifications,
        },
        format,
    );
    Ok(SUCCESS)
}

/// Dispatch on this thread until Ctrl-C stops the server.
fn serve_blocking(server: &Arc<ServerEndpoint>) -> CliResult<u64> {
    let stopper = Arc::clone(server);
    install_ctrlc_handler(move || stopper.stop())?;

    info!(path = ?server.path(), "serving; Ctrl-C to stop");
    server
        .start(true)
        .map_err(|err| endpoint_error("serve failed", err))?;
    Ok(0)
}

/// Dispatch in the background while this thread pushes ticks.
fn serve_with_ticks(server: &ServerEndpoint, interval: Duration) -> CliResult<u64> {
    let running = running_flag()?;
    server
        .start(false)
        .map_err(|err| endpoint_error("serve failed", err))?;
    info!(path = ?server.path(), ?interval, "serving with ticks; Ctrl-C to stop");

    let mut sent = 0u64;
    let mut seq = 0u64;
    let mut next_tick = Instant::now() + interval;
    while running.load(Ordering::SeqCst) {
        let now = Instant::now();
        if now < next_tick {
            thread::sleep(STOP_CHECK_INTERVAL.min(next_tick - now));
            continue;
        }
        next_tick += interval;

        match server.notify(TICK_HEADER, calc::encode_tick(seq)) {
            Ok(()) => sent += 1,
            Err(err) if err.kind() == ErrorKind::Connection => {
                debug!(seq, "no client bound; tick dropped");
            }
            Err(err) => warn!(seq, error = %err, "tick failed"),
        }
        seq += 1;
    }

    server.stop();
    Ok(sent)
}
