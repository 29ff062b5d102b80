use std::time::Instant;

use duplexipc::calc::{self, CalcRequest};
use duplexipc::endpoint::Message;

use crate::cmd::{connect_client, parse_duration, with_deadline, CallArgs};
use crate::exit::{calc_error, endpoint_error, CliResult, SUCCESS};
use crate::output::{emit, CallOutput, OutputFormat};

pub fn run(args: CallArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let request = CalcRequest::new(args.a, args.b, args.op.into());
    let client = connect_client(&args.path)?;

    let started = Instant::now();
    let reply = with_deadline(&client, timeout, move |client| {
        client
            .send_receive(Message::from_body(request.encode()))
            .map_err(|err| endpoint_error("call failed", err))
    })?;
    let elapsed_us = started.elapsed().as_micros();

    let result = calc::decode_result(&reply.body).map_err(|err| calc_error("bad reply", err))?;
    emit(
        &CallOutput {
            a: request.a,
            b: request.b,
            op: request.op.symbol(),
            result,
            elapsed_us,
        },
        format,
    );
    Ok(SUCCESS)
}
