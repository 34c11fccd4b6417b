//! mio event loop implementation.
//!
//! Readiness-based model: poll tells us when sockets are ready, then we
//! perform non-blocking read/write syscalls. Uses epoll on Linux, kqueue on
//! macOS. The slab key doubles as the poll token, so every readiness event
//! maps straight to its connection state.

use crate::config::Config;
use crate::reactor::Connection;
use crate::session;
use crate::storage::{FsMailStore, MailStore};
use mio::net::{TcpListener, TcpStream};
use mio::{Events, Interest, Poll, Token};
use slab::Slab;
use std::io::{self, Read, Write};
use std::net::SocketAddr;
use tracing::{debug, error, info, warn};

const LISTENER_TOKEN: Token = Token(usize::MAX);

/// Size of the call-scoped scratch buffer reads go through before the bytes
/// land in the connection's own accumulator.
const READ_CHUNK: usize = 4096;

/// A registered client: the socket plus its protocol state.
struct Client {
    stream: TcpStream,
    conn: Connection,
    /// Whether the current poll registration includes writable interest.
    wants_write: bool,
}

/// Run the server until a fatal listener error.
pub fn run(config: Config) -> io::Result<()> {
    let addr: SocketAddr = config
        .listen
        .parse()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

    let mut poll = Poll::new()?;
    let mut events = Events::with_capacity(1024);

    let listener = create_listener(addr)?;
    let mut listener = TcpListener::from_std(listener);
    poll.registry()
        .register(&mut listener, LISTENER_TOKEN, Interest::READABLE)?;

    let mut store = FsMailStore::new(config.mail_dir.clone());
    let mut clients: Slab<Client> = Slab::with_capacity(config.max_connections);

    info!(addr = %addr, "Listening");

    loop {
        poll.poll(&mut events, None)?;

        for event in events.iter() {
            match event.token() {
                LISTENER_TOKEN => {
                    accept_connections(
                        &listener,
                        &mut poll,
                        &mut clients,
                        config.max_connections,
                    )?;
                }
                Token(conn_id) => {
                    if let Err(e) = handle_connection_event(
                        conn_id,
                        event,
                        &mut poll,
                        &mut clients,
                        &mut store,
                    ) {
                        debug!(conn_id, error = %e, "Connection error");
                        close_connection(&mut poll, &mut clients, conn_id);
                    }
                }
            }
        }
    }
}

fn accept_connections(
    listener: &TcpListener,
    poll: &mut Poll,
    clients: &mut Slab<Client>,
    max_connections: usize,
) -> io::Result<()> {
    loop {
        match listener.accept() {
            Ok((stream, peer_addr)) => {
                if clients.len() >= max_connections {
                    warn!(peer = %peer_addr, "Connection limit reached, rejecting");
                    continue;
                }

                let conn_id = clients.insert(Client {
                    stream,
                    conn: Connection::new(),
                    wants_write: true,
                });

                // Re-borrow after insert. The greeting is already queued, so
                // writable interest is on from the start.
                let client = &mut clients[conn_id];
                poll.registry().register(
                    &mut client.stream,
                    Token(conn_id),
                    Interest::READABLE | Interest::WRITABLE,
                )?;

                debug!(conn_id, peer = %peer_addr, "Accepted connection");
            }
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
            Err(e) => {
                error!(error = %e, "Accept error");
                break;
            }
        }
    }
    Ok(())
}

fn handle_connection_event(
    conn_id: usize,
    event: &mio::event::Event,
    poll: &mut Poll,
    clients: &mut Slab<Client>,
    store: &mut dyn MailStore,
) -> io::Result<()> {
    if !clients.contains(conn_id) {
        return Ok(());
    }

    if event.is_readable() {
        handle_readable(conn_id, clients, store)?;
    }

    if event.is_writable() {
        handle_writable(conn_id, clients)?;
    }

    // Flushed everything a QUIT queued up: close cleanly.
    let client = &clients[conn_id];
    if client.conn.close_requested && !client.conn.has_pending_output() {
        debug!(conn_id, "Closing after final reply");
        close_connection(poll, clients, conn_id);
        return Ok(());
    }

    update_interest(conn_id, poll, clients)
}

/// Drain the socket into the connection's accumulator, then let the
/// dispatcher consume whatever complete units arrived.
fn handle_readable(
    conn_id: usize,
    clients: &mut Slab<Client>,
    store: &mut dyn MailStore,
) -> io::Result<()> {
    let client = clients
        .get_mut(conn_id)
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "connection not found"))?;

    let mut scratch = [0u8; READ_CHUNK];
    loop {
        match client.stream.read(&mut scratch) {
            Ok(0) => {
                // EOF
                return Err(io::Error::new(io::ErrorKind::ConnectionReset, "EOF"));
            }
            Ok(n) => client.conn.input.extend_from_slice(&scratch[..n]),
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }

    session::drain(&mut client.conn, store);
    Ok(())
}

/// Flush as much of the output queue as the socket accepts. Partial writes
/// leave the remainder queued for the next writable notification.
fn handle_writable(conn_id: usize, clients: &mut Slab<Client>) -> io::Result<()> {
    let client = clients
        .get_mut(conn_id)
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "connection not found"))?;

    while client.conn.has_pending_output() {
        match client.stream.write(&client.conn.output) {
            Ok(0) => {
                return Err(io::Error::new(io::ErrorKind::WriteZero, "write returned 0"));
            }
            Ok(n) => {
                let _ = client.conn.output.split_to(n);
            }
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }

    Ok(())
}

/// Keep writable interest registered exactly while output is pending.
fn update_interest(conn_id: usize, poll: &mut Poll, clients: &mut Slab<Client>) -> io::Result<()> {
    let client = clients
        .get_mut(conn_id)
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "connection not found"))?;

    let wants_write = client.conn.has_pending_output();
    if wants_write != client.wants_write {
        let interest = if wants_write {
            Interest::READABLE | Interest::WRITABLE
        } else {
            Interest::READABLE
        };
        poll.registry()
            .reregister(&mut client.stream, Token(conn_id), interest)?;
        client.wants_write = wants_write;
    }

    Ok(())
}

fn close_connection(poll: &mut Poll, clients: &mut Slab<Client>, conn_id: usize) {
    if let Some(mut client) = clients.try_remove(conn_id) {
        let _ = poll.registry().deregister(&mut client.stream);
        debug!(conn_id, "Connection closed");
    }
}

/// Create a non-blocking TCP listener with SO_REUSEADDR.
fn create_listener(addr: SocketAddr) -> io::Result<std::net::TcpListener> {
    let socket = socket2::Socket::new(
        match addr {
            SocketAddr::V4(_) => socket2::Domain::IPV4,
            SocketAddr::V6(_) => socket2::Domain::IPV6,
        },
        socket2::Type::STREAM,
        Some(socket2::Protocol::TCP),
    )?;

    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(1024)?;

    Ok(socket.into())
}
