use crate::models::error::SError;
use std::io::ErrorKind;
use std::net::TcpStream;
use std::time::Duration;
use tracing::{debug, warn};
use tungstenite::stream::MaybeTlsStream;
use tungstenite::{Message, WebSocket};

/// Maximum number of WebSockets a script may hold open at once.
pub const MAX_WEBSOCKETS: usize = 32;

const POLL_TIMEOUT: Duration = Duration::from_millis(25);

/// One outbound WebSocket with a receive buffer, so large frames can be drained in pieces.
pub struct WsConnection {
    socket: WebSocket<MaybeTlsStream<TcpStream>>,
    pending: Vec<u8>,
}

impl WsConnection {
    pub fn connect(url: &str) -> Result<Self, SError> {
        let (socket, _response) = tungstenite::connect(url)?;
        Self::set_poll_timeout(socket.get_ref())?;
        Ok(Self {
            socket,
            pending: Vec::new(),
        })
    }

    fn set_poll_timeout(stream: &MaybeTlsStream<TcpStream>) -> std::io::Result<()> {
        match stream {
            MaybeTlsStream::Plain(s) => s.set_read_timeout(Some(POLL_TIMEOUT)),
            MaybeTlsStream::Rustls(s) => s.sock.set_read_timeout(Some(POLL_TIMEOUT)),
            _ => Ok(()),
        }
    }

    /// Sends a text frame. Failures are logged and reported as `false`.
    pub fn send(&mut self, data: &str) -> bool {
        match self.socket.send(Message::Text(data.to_string())) {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to send message to WebSocket: {e}");
                false
            }
        }
    }

    /// Returns up to `max_bytes` of received payload, or an empty string when nothing is ready.
    pub fn read(&mut self, max_bytes: usize) -> String {
        let max_bytes = if max_bytes == 0 { 1024 } else { max_bytes };

        if self.pending.is_empty() {
            match self.socket.read() {
                Ok(Message::Text(text)) => self.pending.extend_from_slice(text.as_bytes()),
                Ok(Message::Binary(bytes)) => self.pending.extend_from_slice(&bytes),
                Ok(_) => {}
                Err(tungstenite::Error::Io(e))
                    if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {}
                Err(e) => warn!("Failed to receive message from WebSocket: {e}"),
            }
        }

        let take = max_bytes.min(self.pending.len());
        let chunk: Vec<u8> = self.pending.drain(..take).collect();
        String::from_utf8_lossy(&chunk).into_owned()
    }

    pub fn close(mut self) {
        if let Err(e) = self.socket.close(None) {
            debug!("WebSocket close: {e}");
        }
        let _ = self.socket.flush();
    }
}

/// Fixed-capacity slot table. Handles are `slot + 1` so a live handle is never 0.
pub struct WsPool {
    slots: Vec<Option<WsConnection>>,
}

impl Default for WsPool {
    fn default() -> Self {
        Self::new()
    }
}

impl WsPool {
    pub fn new() -> Self {
        Self {
            slots: (0..MAX_WEBSOCKETS).map(|_| None).collect(),
        }
    }

    /// `Ok(None)` when the connection itself failed; `Err` when the pool is full.
    pub fn connect(&mut self, url: &str) -> Result<Option<u32>, SError> {
        let free = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or_else(|| SError::InvalidHandle("ws.connect: too many WebSocket connections".into()))?;

        match WsConnection::connect(url) {
            Ok(conn) => {
                self.slots[free] = Some(conn);
                Ok(Some(free as u32 + 1))
            }
            Err(e) => {
                warn!(url, "Failed to connect WebSocket: {e}");
                Ok(None)
            }
        }
    }

    pub fn send(&mut self, handle: i64, data: &str) -> Result<bool, SError> {
        Ok(self.get(handle, "ws.send")?.send(data))
    }

    pub fn read(&mut self, handle: i64, max_bytes: usize) -> Result<String, SError> {
        Ok(self.get(handle, "ws.read")?.read(max_bytes))
    }

    pub fn disconnect(&mut self, handle: i64) -> Result<(), SError> {
        let index = Self::index(handle, "ws.disconnect")?;
        self.slots[index]
            .take()
            .map(WsConnection::close)
            .ok_or_else(|| SError::InvalidHandle(format!("ws.disconnect: {handle}")))
    }

    pub fn open_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn close_all(&mut self) {
        for conn in self.slots.iter_mut().filter_map(Option::take) {
            conn.close();
        }
    }

    fn index(handle: i64, op: &str) -> Result<usize, SError> {
        if handle < 1 || handle > MAX_WEBSOCKETS as i64 {
            return Err(SError::InvalidHandle(format!("{op}: {handle}")));
        }
        Ok((handle - 1) as usize)
    }

    fn get(&mut self, handle: i64, op: &str) -> Result<&mut WsConnection, SError> {
        let index = Self::index(handle, op)?;
        self.slots[index]
            .as_mut()
            .ok_or_else(|| SError::InvalidHandle(format!("{op}: {handle}")))
    }
}

impl Drop for WsPool {
    fn drop(&mut self) {
        self.close_all();
    }
}
