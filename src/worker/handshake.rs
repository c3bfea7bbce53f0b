//! Transport handshake: a local WebSocket listener that waits for the
//! freshly spawned worker to connect back.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::WebSocketStream;

use super::error::{WorkerError, WorkerResult};
use super::spawner::WorkerProcess;

/// WebSocket connection to the worker.
pub type WorkerSocket = WebSocketStream<TcpStream>;

/// Listener bound to an ephemeral loopback port.
#[derive(Debug)]
pub struct Handshake {
    listener: TcpListener,
    addr: SocketAddr,
}

impl Handshake {
    /// Bind `127.0.0.1:0`, letting the OS pick a free port.
    pub async fn bind() -> WorkerResult<Self> {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
            .await
            .map_err(WorkerError::BindFailed)?;
        let addr = listener.local_addr().map_err(WorkerError::BindFailed)?;
        Ok(Self { listener, addr })
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// URL the worker is expected to connect to.
    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Wait for exactly one worker connection.
    ///
    /// Fails if `process` exits first or if nothing connects within
    /// `timeout` (`None` waits indefinitely).
    pub async fn accept(
        &self,
        process: &mut dyn WorkerProcess,
        timeout: Option<Duration>,
    ) -> WorkerResult<WorkerSocket> {
        let race = async {
            tokio::select! {
                socket = self.accept_socket() => socket,
                exited = process.wait() => {
                    let code = exited.ok().flatten();
                    Err(WorkerError::ExitedBeforeConnect { code })
                }
            }
        };

        match timeout {
            Some(limit) => tokio::time::timeout(limit, race)
                .await
                .map_err(|_| WorkerError::ConnectTimeout(limit))?,
            None => race.await,
        }
    }

    async fn accept_socket(&self) -> WorkerResult<WorkerSocket> {
        let (stream, peer) = self
            .listener
            .accept()
            .await
            .map_err(|err| WorkerError::HandshakeFailed(err.to_string()))?;
        tracing::debug!(%peer, "worker connected, upgrading to websocket");

        tokio_tungstenite::accept_async(stream)
            .await
            .map_err(|err| WorkerError::HandshakeFailed(err.to_string()))
    }
}
