//! Single-threaded, readiness-driven connection handling.
//!
//! One thread owns the poll, the listener, and every connection's state, so
//! there is no locking anywhere. Each connection is processed to completion
//! (read, frame, dispatch, queue replies) before the loop polls again.
//!
//! Known limitation: input accumulators are unbounded and idle clients are
//! never timed out, so a slow or malicious peer holds its socket and buffer
//! indefinitely.

mod connection;
mod event_loop;

pub use connection::{Connection, Mode};
pub use event_loop::run;
