use std::sync::atomic::Ordering;
use std::sync::mpsc;
use std::time::Duration;

use duplexipc::calc;
use duplexipc::endpoint::Message;
use tracing::info;

use crate::cmd::{connect_client, running_flag, WatchArgs};
use crate::exit::{CliResult, SUCCESS};
use crate::output::{emit, NotifyOutput, OutputFormat};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub fn run(args: WatchArgs, format: OutputFormat) -> CliResult<i32> {
    let running = running_flag()?;
    let client = connect_client(&args.path)?;

    // The receiver thread only forwards; printing happens here.
    let (tx, rx) = mpsc::channel::<Message>();
    client.set_notify_receiver(move |message: &Message| {
        let _ = tx.send(message.clone());
    });
    info!(path = ?args.path, "watching for notifications");

    let mut printed = 0usize;
    while running.load(Ordering::SeqCst) {
        let message = match rx.recv_timeout(POLL_INTERVAL) {
            Ok(message) => message,
            Err(mpsc::RecvTimeoutError::Timeout) => continue,
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        };

        let seq = calc::decode_tick(&message.header, &message.body).ok();
        emit(&NotifyOutput::new(seq, &message.header, &message.body), format);
        printed = printed.saturating_add(1);

        if args.count.is_some_and(|count| printed >= count) {
            break;
        }
    }

    client.close();
    Ok(SUCCESS)
}
