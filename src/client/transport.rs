use crate::config::WORKFLOW_ID_PLACEHOLDER;
use crate::shared::ids::WorkflowId;
use std::io::ErrorKind;
use std::net::TcpStream;
use tungstenite::stream::MaybeTlsStream;
use tungstenite::{connect, Message, WebSocket};

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to open workflow socket {url}: {reason}")]
    Open { url: String, reason: String },
    #[error("failed to send on workflow socket: {0}")]
    Send(String),
    #[error("failed to configure workflow socket stream: {0}")]
    Configure(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    Text(String),
    Closed { reason: Option<String> },
}

/// Opens persistent connections; one per `open` call.
pub trait Transport {
    type Connection: Connection;

    fn open(&mut self, url: &str) -> Result<Self::Connection, TransportError>;
}

pub trait Connection {
    fn send_text(&mut self, text: &str) -> Result<(), TransportError>;

    /// Never blocks; `None` means nothing is waiting right now.
    fn poll_event(&mut self) -> Option<ConnectionEvent>;

    fn close(&mut self);
}

/// Persistent-connection address for a workflow. The base scheme is
/// upgraded (`http`→`ws`, `https`→`wss`); a bare host gets `ws://`.
pub fn socket_url(base_url: &str, path_template: &str, workflow_id: &WorkflowId) -> String {
    let base = base_url.trim().trim_end_matches('/');
    let upgraded = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{rest}")
    } else if base.starts_with("ws://") || base.starts_with("wss://") {
        base.to_string()
    } else {
        format!("ws://{base}")
    };
    let path = path_template.replace(
        WORKFLOW_ID_PLACEHOLDER,
        &urlencoding::encode(workflow_id.as_str()),
    );
    if path.starts_with('/') {
        format!("{upgraded}{path}")
    } else {
        format!("{upgraded}/{path}")
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TungsteniteTransport;

impl Transport for TungsteniteTransport {
    type Connection = TungsteniteConnection;

    fn open(&mut self, url: &str) -> Result<Self::Connection, TransportError> {
        let (mut socket, _) = connect(url).map_err(|err| TransportError::Open {
            url: url.to_string(),
            reason: err.to_string(),
        })?;
        set_socket_nonblocking(&mut socket)?;
        Ok(TungsteniteConnection {
            socket,
            closed: false,
        })
    }
}

pub struct TungsteniteConnection {
    socket: WebSocket<MaybeTlsStream<TcpStream>>,
    closed: bool,
}

fn is_would_block(err: &tungstenite::Error) -> bool {
    matches!(
        err,
        tungstenite::Error::Io(io) if io.kind() == ErrorKind::WouldBlock || io.kind() == ErrorKind::TimedOut
    )
}

impl Connection for TungsteniteConnection {
    fn send_text(&mut self, text: &str) -> Result<(), TransportError> {
        match self.socket.send(Message::Text(text.to_string())) {
            Ok(()) => Ok(()),
            // Queued in the write buffer; flushed on the next poll.
            Err(err) if is_would_block(&err) => Ok(()),
            Err(err) => Err(TransportError::Send(err.to_string())),
        }
    }

    fn poll_event(&mut self) -> Option<ConnectionEvent> {
        if self.closed {
            return None;
        }
        let _ = self.socket.flush();
        loop {
            match self.socket.read() {
                Ok(Message::Text(text)) => return Some(ConnectionEvent::Text(text)),
                Ok(Message::Ping(payload)) => {
                    let _ = self.socket.send(Message::Pong(payload));
                }
                Ok(Message::Binary(_)) | Ok(Message::Pong(_)) | Ok(Message::Frame(_)) => {}
                Ok(Message::Close(frame)) => {
                    self.closed = true;
                    return Some(ConnectionEvent::Closed {
                        reason: frame.map(|frame| format!("{} {}", frame.code, frame.reason)),
                    });
                }
                Err(err) if is_would_block(&err) => return None,
                Err(tungstenite::Error::ConnectionClosed) | Err(tungstenite::Error::AlreadyClosed) => {
                    self.closed = true;
                    return Some(ConnectionEvent::Closed { reason: None });
                }
                Err(err) => {
                    self.closed = true;
                    return Some(ConnectionEvent::Closed {
                        reason: Some(err.to_string()),
                    });
                }
            }
        }
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            let _ = self.socket.close(None);
            let _ = self.socket.flush();
        }
    }
}

fn set_socket_nonblocking(
    socket: &mut WebSocket<MaybeTlsStream<TcpStream>>,
) -> Result<(), TransportError> {
    match socket.get_mut() {
        MaybeTlsStream::Plain(stream) => stream.set_nonblocking(true),
        MaybeTlsStream::Rustls(stream) => stream.sock.set_nonblocking(true),
        _ => Ok(()),
    }
    .map_err(|err| TransportError::Configure(err.to_string()))
}
