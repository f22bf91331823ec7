//! Connection listener: accepts root-node connections and keeps exactly one
//! session alive.
//!
//! A root node that reboots or roams reconnects on a fresh socket while the
//! old one may still look open.  The newest connection always wins:
//!
//! 1. The mesh state's generation is bumped, so the old session sees itself
//!    as stale on its next send.
//! 2. The old session task is told to stop and awaited (bounded by a grace
//!    period), which drops and closes its socket.
//! 3. Only then is the new session spawned.

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{error, info, warn};

use crate::application::{AddressingSession, SessionContext};
use crate::infrastructure::network::mesh_link::MeshLink;

/// How often the accept loop wakes up to check the shutdown flag.
const ACCEPT_POLL: Duration = Duration::from_millis(200);
/// How long a superseded session may take to wind down before it is aborted.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("bind failed on {addr}: {source}")]
    BindFailed {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

struct ActiveSession {
    generation: u64,
    peer: SocketAddr,
    stop_tx: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// Accepts root-node connections and runs one [`AddressingSession`] at a time.
pub struct ConnectionListener {
    listener: TcpListener,
    context: SessionContext,
    read_timeout: Option<Duration>,
    active: Option<ActiveSession>,
}

impl ConnectionListener {
    /// Binds the listening socket.
    ///
    /// # Errors
    ///
    /// Returns [`NetworkError::BindFailed`] if the address is in use or not
    /// available on this host.
    pub async fn bind(
        addr: SocketAddr,
        context: SessionContext,
        read_timeout: Option<Duration>,
    ) -> Result<Self, NetworkError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| NetworkError::BindFailed { addr, source })?;
        Ok(Self {
            listener,
            context,
            read_timeout,
            active: None,
        })
    }

    /// The bound address.  Useful after binding port 0.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Runs the accept loop until `running` is cleared, then stops the
    /// active session.
    pub async fn run(mut self, running: Arc<AtomicBool>) {
        match self.local_addr() {
            Ok(addr) => info!("listening for the mesh root node on {addr}"),
            Err(e) => warn!("listening on an unknown address: {e}"),
        }

        while running.load(Ordering::Relaxed) {
            match timeout(ACCEPT_POLL, self.listener.accept()).await {
                Ok(Ok((stream, peer))) => self.handle_connection(stream, peer).await,
                // Transient (e.g. out of file descriptors); keep serving.
                Ok(Err(e)) => error!("accept error: {e}"),
                Err(_) => {}
            }
        }

        info!("shutdown flag set; stopping accept loop");
        self.terminate_active().await;
    }

    async fn handle_connection(&mut self, stream: TcpStream, peer: SocketAddr) {
        let generation = self.context.state.begin_session();
        info!("session {generation}: root node connected from {peer}");
        self.terminate_active().await;

        let link = MeshLink::new(stream, peer, self.read_timeout);
        let session = AddressingSession::new(generation, link, self.context.clone());
        let (stop_tx, stop_rx) = oneshot::channel();

        let handle = tokio::spawn(async move {
            tokio::select! {
                result = session.run() => match result {
                    Ok(()) => info!("session {generation}: finished"),
                    Err(e) if e.is_expected() => info!("session {generation}: ended: {e}"),
                    Err(e) => error!("session {generation}: failed: {e}"),
                },
                _ = stop_rx => info!("session {generation}: stopped"),
            }
        });

        self.active = Some(ActiveSession {
            generation,
            peer,
            stop_tx,
            handle,
        });
    }

    /// Stops the active session, if any, and waits for its socket to close.
    async fn terminate_active(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };
        if active.handle.is_finished() {
            return;
        }

        info!("closing session {} ({})", active.generation, active.peer);
        // The receiver is gone only if the task already ended.
        let _ = active.stop_tx.send(());

        let mut handle = active.handle;
        if timeout(SHUTDOWN_GRACE, &mut handle).await.is_err() {
            warn!("session {} did not stop in time; aborting", active.generation);
            handle.abort();
        }
    }
}
