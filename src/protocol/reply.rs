//! Reply catalogue and encoding.
//!
//! Single-line replies are `"<code> <text>\r\n"`. Multi-line replies use
//! `"<code>-<text>\r\n"` for every line but the last, which reverts to the
//! single-line form. All reply text is ASCII.

/// Connection greeting, queued as soon as a client is accepted.
pub fn ready() -> &'static [u8] {
    b"220 postroom service ready\r\n"
}

/// Command accepted.
pub fn ok() -> &'static [u8] {
    b"250 OK\r\n"
}

/// DATA accepted, client may send the message body.
pub fn ready_for_data() -> &'static [u8] {
    b"354 End data with <CR><LF>.<CR><LF>\r\n"
}

/// QUIT accepted, connection will close.
pub fn bye() -> &'static [u8] {
    b"221 Bye\r\n"
}

/// Supported command summary.
pub fn help() -> Vec<u8> {
    multiline(
        214,
        &[
            "This server supports the following commands:",
            "HELO MAIL RCPT DATA HELP QUIT",
        ],
    )
}

/// Unrecognized or unsupported command.
pub fn unknown_command() -> &'static [u8] {
    b"500 Syntax error, command unrecognized\r\n"
}

/// Missing or malformed command argument.
pub fn invalid_parameters() -> &'static [u8] {
    b"501 Syntax error in parameters or arguments\r\n"
}

/// Command issued out of required order.
pub fn bad_sequence() -> &'static [u8] {
    b"503 Bad sequence of commands\r\n"
}

/// Message could not be persisted.
pub fn transaction_failed() -> &'static [u8] {
    b"554 Transaction failed\r\n"
}

/// Encode a multi-line reply: dash-continued lines, space on the last.
pub fn multiline(code: u16, lines: &[&str]) -> Vec<u8> {
    let mut reply = Vec::new();
    for (i, text) in lines.iter().enumerate() {
        let separator = if i == lines.len() - 1 { ' ' } else { '-' };
        reply.extend_from_slice(format!("{code}{separator}{text}\r\n").as_bytes());
    }
    reply
}
