//! Command dispatch and the per-connection SMTP state machine.
//!
//! The reactor calls [`drain`] after every read; it frames complete units out
//! of the connection's input accumulator and feeds them to the handlers,
//! which validate arguments and ordering, mutate the transaction fields, and
//! queue replies.
//!
//! Framing follows the mode the connection is in when the pass starts:
//! command lines are extracted until the mode leaves `Command`, then data
//! extraction gets one attempt in the same pass (so a pipelined
//! `DATA\r\n<body>\r\n.\r\n` commits without waiting for another read). A
//! pass that starts in `Data` mode never falls back to command parsing;
//! commands pipelined behind a message body sit in the accumulator until the
//! next read wakes the connection up again.

use crate::protocol::command::{self, Command};
use crate::protocol::framer;
use crate::protocol::reply;
use crate::reactor::{Connection, Mode};
use crate::storage::MailStore;
use rand::Rng;
use tracing::{debug, warn};

/// Extract and process every complete unit currently buffered.
pub fn drain(conn: &mut Connection, store: &mut dyn MailStore) {
    while conn.mode == Mode::Command {
        let Some(line) = framer::next_command_line(&mut conn.input) else {
            break;
        };
        let line = String::from_utf8_lossy(&line).into_owned();
        debug!(line = %line, "Received command");
        dispatch(&line, conn);
    }

    while conn.mode == Mode::Data {
        let Some(body) = framer::next_data_block(&mut conn.input) else {
            break;
        };
        debug!(bytes = body.len(), "Received message data");
        commit(&body, conn, store);
    }
}

/// Route one command line to its handler.
fn dispatch(line: &str, conn: &mut Connection) {
    match Command::parse(line) {
        Command::Helo(argument) => handle_helo(argument, conn),
        Command::Help(argument) => handle_help(argument, conn),
        Command::Quit(argument) => handle_quit(argument, conn),
        Command::Data(argument) => handle_data(argument, conn),
        Command::Mail(argument) => handle_mail(argument, conn),
        Command::Rcpt(argument) => handle_rcpt(argument, conn),
        Command::Unknown => conn.reply(reply::unknown_command()),
    }
}

fn handle_helo(argument: &str, conn: &mut Connection) {
    if argument.is_empty() {
        conn.reply(reply::invalid_parameters());
    } else {
        conn.helo_seen = true;
        conn.reply(reply::ok());
    }
}

fn handle_help(argument: &str, conn: &mut Connection) {
    if argument.is_empty() {
        conn.reply(&reply::help());
    } else {
        conn.reply(reply::unknown_command());
    }
}

fn handle_quit(argument: &str, conn: &mut Connection) {
    if argument.is_empty() {
        conn.reply(reply::bye());
        conn.request_close();
    } else {
        conn.reply(reply::unknown_command());
    }
}

fn handle_data(argument: &str, conn: &mut Connection) {
    // DATA takes no argument
    if !argument.is_empty() {
        conn.reply(reply::unknown_command());
        return;
    }

    if conn.sender.is_empty() || conn.recipients.is_empty() || !conn.helo_seen {
        conn.reply(reply::bad_sequence());
        return;
    }

    conn.reply(reply::ready_for_data());
    conn.mode = Mode::Data;
}

fn handle_mail(argument: &str, conn: &mut Connection) {
    if argument.is_empty() {
        conn.reply(reply::invalid_parameters());
        return;
    }

    if !conn.helo_seen {
        conn.reply(reply::bad_sequence());
        return;
    }

    match command::extract_path(argument, "FROM") {
        Some(address) => {
            // MAIL starts a fresh transaction: accumulated recipients are
            // dropped (RFC 5321 section 3.3 reset semantics).
            conn.recipients.clear();
            conn.sender = address.to_string();
            conn.reply(reply::ok());
        }
        None => conn.reply(reply::invalid_parameters()),
    }
}

fn handle_rcpt(argument: &str, conn: &mut Connection) {
    if argument.is_empty() {
        conn.reply(reply::invalid_parameters());
        return;
    }

    if !conn.helo_seen {
        conn.reply(reply::bad_sequence());
        return;
    }

    match command::extract_path(argument, "TO") {
        Some(address) => {
            conn.recipients.push(address.to_string());
            conn.reply(reply::ok());
        }
        None => conn.reply(reply::invalid_parameters()),
    }
}

/// Persist a completed message body for every recipient of the transaction.
///
/// One id is drawn per message, shared by all recipient copies. The first
/// store failure abandons the remaining recipients and fails the whole
/// transaction; either way the connection returns to command mode. The
/// sender and recipients are left in place after a successful commit,
/// matching the historical behavior this server preserves.
fn commit(body: &[u8], conn: &mut Connection, store: &mut dyn MailStore) {
    let id = rand::thread_rng().gen_range(0..9999);

    let mut failed = false;
    for recipient in &conn.recipients {
        if let Err(e) = store.store(&conn.sender, recipient, body, id) {
            warn!(recipient = %recipient, error = %e, "Delivery failed");
            failed = true;
            break;
        }
    }

    conn.mode = Mode::Command;
    if failed {
        conn.reply(reply::transaction_failed());
    } else {
        conn.reply(reply::ok());
    }
}
