use std::time::Instant;

use crate::cmd::{connect_client, parse_duration, with_deadline, PingArgs};
use crate::exit::{endpoint_error, CliResult, SUCCESS};
use crate::output::{emit, OutputFormat, PingOutput};

pub fn run(args: PingArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let client = connect_client(&args.path)?;

    let started = Instant::now();
    with_deadline(&client, timeout, |client| {
        client
            .ping()
            .map_err(|err| endpoint_error("ping failed", err))
    })?;

    emit(
        &PingOutput {
            path: args.path.display().to_string(),
            ok: true,
            elapsed_us: started.elapsed().as_micros(),
        },
        format,
    );
    Ok(SUCCESS)
}
