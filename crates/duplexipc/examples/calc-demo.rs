//! Calculator server and client in one process.
//!
//! The server pushes a few notifications; the last one tells the client to
//! start sending requests.
//!
//! Run with:
//!   cargo run --example calc-demo
//!
//! Or across processes with the CLI:
//!   cargo run --features cli -- serve /tmp/duplexipc-calc --notify-every 1s
//!   cargo run --features cli -- call /tmp/duplexipc-calc --a 5 --b 7

use std::fs;
use std::sync::mpsc;
use std::time::Duration;

use duplexipc::calc::{self, CalcOp, CalcRequest};
use duplexipc::endpoint::{ClientEndpoint, Message, Reply, ServerEndpoint};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dir = std::env::temp_dir().join(format!("duplexipc-demo-{}", std::process::id()));
    fs::create_dir_all(&dir)?;
    let base = dir.join("calc");

    let server = ServerEndpoint::new(&base);
    server.set_request_handler(|request: &Message, reply: &mut Reply| {
        match CalcRequest::decode(&request.body) {
            Ok(calc) => calc::encode_result(calc.evaluate(), &mut reply.body),
            Err(err) => eprintln!("bad request: {err}"),
        }
    });
    server.start(false)?;
    eprintln!("server listening on {}", base.display());

    let client = ClientEndpoint::connect(&base)?;
    let (go_tx, go_rx) = mpsc::channel();
    client.set_notify_receiver(move |message: &Message| {
        if let Ok(seq) = calc::decode_tick(&message.header, &message.body) {
            eprintln!("tick {seq}");
            if seq == 2 {
                let _ = go_tx.send(());
            }
        }
    });

    for seq in 0..3 {
        server.notify(calc::TICK_HEADER, calc::encode_tick(seq))?;
    }
    go_rx.recv_timeout(Duration::from_secs(5))?;

    for (a, b, op) in [(5, 7, CalcOp::Add), (10, 3, CalcOp::Sub), (6, 7, CalcOp::Mul)] {
        let request = CalcRequest::new(a, b, op);
        let reply = client.send_receive(Message::from_body(request.encode()))?;
        let result = calc::decode_result(&reply.body)?;
        println!("{a} {} {b} = {result}", op.symbol());
    }

    client.ping()?;
    client.close();
    server.stop();
    let _ = fs::remove_dir_all(&dir);
    Ok(())
}
