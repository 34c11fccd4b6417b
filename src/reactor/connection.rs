//! Per-connection protocol state.
//!
//! One `Connection` exists per accepted socket and is owned by the reactor
//! thread for the socket's whole lifetime. It carries the two stream buffers
//! (unparsed input, unflushed output) and the SMTP transaction fields. The
//! socket itself lives in the event loop so this state can be driven directly
//! by tests without any I/O.

use crate::protocol::reply;
use bytes::BytesMut;

/// Input interpretation mode, selecting the framing terminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Input is parsed as CRLF-terminated command lines.
    Command,
    /// Input is a message body terminated by CRLF "." CRLF.
    Data,
}

/// State of a single client connection.
#[derive(Debug)]
pub struct Connection {
    /// Client bytes not yet consumed by the framer.
    ///
    /// Grows without bound if a client never completes a unit; see the
    /// reactor module docs for this known limitation.
    pub input: BytesMut,
    /// Reply bytes not yet written to the socket.
    pub output: BytesMut,
    /// Current framing mode.
    pub mode: Mode,
    /// Set once by a valid HELO, never unset.
    pub helo_seen: bool,
    /// Reverse-path from MAIL FROM; empty until one succeeds.
    pub sender: String,
    /// Forward-paths from RCPT TO, in arrival order. Duplicates allowed.
    pub recipients: Vec<String>,
    /// Once set, the reactor closes the socket after the output drains.
    pub close_requested: bool,
}

impl Connection {
    /// Create the state for a freshly accepted client.
    ///
    /// The 220 greeting is queued immediately so the first writable event
    /// pushes it out.
    pub fn new() -> Self {
        let mut conn = Self {
            input: BytesMut::new(),
            output: BytesMut::new(),
            mode: Mode::Command,
            helo_seen: false,
            sender: String::new(),
            recipients: Vec::new(),
            close_requested: false,
        };
        conn.reply(reply::ready());
        conn
    }

    /// Queue reply bytes behind any not yet flushed.
    pub fn reply(&mut self, bytes: &[u8]) {
        self.output.extend_from_slice(bytes);
    }

    /// True while queued reply bytes await transmission.
    pub fn has_pending_output(&self) -> bool {
        !self.output.is_empty()
    }

    /// Mark the connection for closing once the output queue drains.
    pub fn request_close(&mut self) {
        self.close_requested = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_connection_queues_greeting() {
        let conn = Connection::new();
        assert_eq!(&conn.output[..], reply::ready());
        assert_eq!(conn.mode, Mode::Command);
        assert!(!conn.helo_seen);
        assert!(conn.sender.is_empty());
        assert!(conn.recipients.is_empty());
        assert!(!conn.close_requested);
    }

    #[test]
    fn test_replies_append() {
        let mut conn = Connection::new();
        conn.output.clear();

        conn.reply(reply::ok());
        conn.reply(reply::bye());

        let mut expected = reply::ok().to_vec();
        expected.extend_from_slice(reply::bye());
        assert_eq!(&conn.output[..], &expected[..]);
        assert!(conn.has_pending_output());
    }

    #[test]
    fn test_request_close() {
        let mut conn = Connection::new();
        conn.request_close();
        assert!(conn.close_requested);
    }
}
