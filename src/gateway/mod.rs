//! UI-to-core gateway
//!
//! Newline-delimited JSON requests over stdio, one response line per request.
//! Every failure is reported as a structured response; the loop never stops
//! on a bad request.


pub mod params;
pub mod protocol;
pub mod server;

pub use protocol::{Request, RequestId, Response, ResponseBody};
pub use server::Gateway;
