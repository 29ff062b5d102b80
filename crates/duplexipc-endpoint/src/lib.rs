//! Request/response and push-notify endpoints for duplexipc.
//!
//! A [`ServerEndpoint`] owns one end of a duplex channel and answers requests
//! through a [`RequestHandler`]; it can push notifications at any time. A
//! [`ClientEndpoint`] owns the other end, issues blocking round trips from
//! any thread and hands notifications to a [`NotifyReceiver`].
//!
//! ```no_run
//! use bytes::{Buf, BufMut};
//! use duplexipc_endpoint::{ClientEndpoint, Message, Reply, ServerEndpoint};
//!
//! let server = ServerEndpoint::new("/tmp/calc");
//! server.set_request_handler(|request: &Message, reply: &mut Reply| {
//!     let mut body = request.body.clone();
//!     let (a, b) = (body.get_i32_le(), body.get_i32_le());
//!     reply.body.put_i32_le(a + b);
//! });
//! server.start(false)?;
//!
//! let client = ClientEndpoint::connect("/tmp/calc")?;
//! let mut body = Vec::new();
//! body.put_i32_le(5);
//! body.put_i32_le(7);
//! let mut answer = client.send_receive(Message::from_body(body))?.body;
//! assert_eq!(answer.get_i32_le(), 12);
//! # Ok::<(), duplexipc_endpoint::EndpointError>(())
//! ```

pub mod client;
mod correlation;
pub mod error;
pub mod handler;
pub mod server;

pub use client::ClientEndpoint;
pub use error::{EndpointError, ErrorKind, Result};
pub use handler::{Message, NotifyReceiver, Reply, RequestHandler};
pub use server::{ServerEndpoint, ServerState};

pub use duplexipc_frame::{FrameConfig, SizeLimit, DEFAULT_LIMIT_SIZE};
