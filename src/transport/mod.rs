//! The `transport` module is the external face of the bridge.
//!
//! `ingress` validates publish requests and hands them to the bridge; `http`
//! serves that operation over HTTP and maps the outcome to status codes.

pub mod http;
pub mod ingress;


pub use http::{router, serve};
pub use ingress::{Acknowledgement, accept};
