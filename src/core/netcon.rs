use crate::models::error::SError;
use std::collections::BTreeMap;
use std::io::{ErrorKind, Read, Write};
use std::net::{Ipv4Addr, Shutdown, SocketAddr, TcpStream};
use std::time::Duration;
use tracing::{debug, error, warn};

/// Default port the game's TCP console listens on when ports are not randomised.
pub const DEFAULT_NETCON_PORT: u16 = 22333;

/// Dynamic/private port range used for randomised console ports.
pub const NETCON_PORT_RANGE: std::ops::RangeInclusive<u16> = 49152..=65535;

pub const DEFAULT_READ_SIZE: usize = 1024;

/// Upper bound on a single console read, whatever the script asks for.
pub const MAX_READ_SIZE: usize = 64 * 1024;

const POLL_TIMEOUT: Duration = Duration::from_millis(25);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Result of one non-blocking read from the console.
#[derive(Debug, Clone, PartialEq)]
pub enum ReadOutcome {
    Data(Vec<u8>),
    /// Nothing was pending within the poll window.
    Empty,
    /// The peer hung up or the socket failed.
    Dead,
}

/// One TCP connection to the game's console on loopback.
pub struct NetconConnection {
    stream: TcpStream,
}

impl NetconConnection {
    /// Refusal is expected while the game is still starting; callers retry.
    pub fn connect(port: u16) -> Result<Self, SError> {
        let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
        let stream = TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT)?;
        stream.set_read_timeout(Some(POLL_TIMEOUT))?;
        stream.set_nodelay(true)?;
        Ok(Self { stream })
    }

    /// Writes `command` plus a newline in a single write. Short writes are not retried.
    pub fn send_command(&mut self, command: &str) -> Result<(), SError> {
        let line = format!("{command}\n");
        let written = self.stream.write(line.as_bytes()).map_err(|e| {
            error!("Failed to send command to TCP console server: {e}");
            SError::IOError(e.to_string())
        })?;
        if written < line.len() {
            warn!(written, expected = line.len(), "Partial console write");
        }
        Ok(())
    }

    /// Waits at most the poll window for data and returns up to `max_bytes` of it,
    /// capped at [`MAX_READ_SIZE`].
    pub fn read_console(&mut self, max_bytes: usize) -> ReadOutcome {
        let size = if max_bytes == 0 { DEFAULT_READ_SIZE } else { max_bytes.min(MAX_READ_SIZE) };
        let mut buffer = vec![0u8; size];

        match self.stream.read(&mut buffer) {
            Ok(0) => {
                debug!("Console hung up");
                ReadOutcome::Dead
            }
            Ok(n) => {
                buffer.truncate(n);
                ReadOutcome::Data(buffer)
            }
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                ReadOutcome::Empty
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => ReadOutcome::Empty,
            Err(e) => {
                error!("Failed to receive data from TCP console server: {e}");
                ReadOutcome::Dead
            }
        }
    }

    pub fn disconnect(self) {
        let _ = self.stream.shutdown(Shutdown::Both);
    }
}

/// Numbered console connections handed to scripts.
/// Handles are positive; `-1` stands for a failed connect.
pub struct NetconClient {
    port: u16,
    next_handle: i64,
    connections: BTreeMap<i64, NetconConnection>,
}

impl NetconClient {
    pub fn new(port: u16) -> Self {
        Self {
            port,
            next_handle: 1,
            connections: BTreeMap::new(),
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn connect(&mut self) -> i64 {
        match NetconConnection::connect(self.port) {
            Ok(conn) => {
                let handle = self.next_handle;
                self.next_handle += 1;
                self.connections.insert(handle, conn);
                handle
            }
            Err(e) => {
                debug!(port = self.port, "Console connection attempt failed: {e}");
                -1
            }
        }
    }

    pub fn send(&mut self, handle: i64, command: &str) -> Result<(), SError> {
        self.get(handle, "game.send")?.send_command(command)
    }

    pub fn read(&mut self, handle: i64, max_bytes: usize) -> Result<ReadOutcome, SError> {
        Ok(self.get(handle, "game.read")?.read_console(max_bytes))
    }

    pub fn disconnect(&mut self, handle: i64) -> Result<(), SError> {
        self.connections
            .remove(&handle)
            .map(NetconConnection::disconnect)
            .ok_or_else(|| SError::InvalidHandle(format!("game.disconnect: {handle}")))
    }

    pub fn open_count(&self) -> usize {
        self.connections.len()
    }

    pub fn close_all(&mut self) {
        for (_, conn) in std::mem::take(&mut self.connections) {
            conn.disconnect();
        }
    }

    fn get(&mut self, handle: i64, op: &str) -> Result<&mut NetconConnection, SError> {
        self.connections
            .get_mut(&handle)
            .ok_or_else(|| SError::InvalidHandle(format!("{op}: {handle}")))
    }
}

impl Drop for NetconClient {
    fn drop(&mut self) {
        self.close_all();
    }
}

/// Picks the console port for a session.
pub fn choose_port(randomize: bool) -> u16 {
    if randomize {
        use rand::Rng;
        rand::thread_rng().gen_range(NETCON_PORT_RANGE)
    } else {
        DEFAULT_NETCON_PORT
    }
}
