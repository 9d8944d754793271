//! Thread-per-connection TCP server.

use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::bridge::Bridge;
use crate::dispatch::Session;
use crate::error::RuntimeError;

const ACCEPT_POLL: Duration = Duration::from_millis(25);

type Connections = Arc<Mutex<Vec<(SocketAddr, TcpStream)>>>;

/// Accepts emulator connections and serves each on its own thread.
///
/// Dropping the server stops it.
#[derive(Debug)]
pub struct BridgeServer {
    local_addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    connections: Connections,
    accept: Option<JoinHandle<()>>,
}

impl BridgeServer {
    /// Binds the configured address and starts accepting.
    pub fn start(bridge: Arc<Bridge>) -> Result<Self, RuntimeError> {
        let listener = TcpListener::bind(bridge.settings().address.as_str())?;
        Self::from_listener(listener, bridge)
    }

    pub fn from_listener(
        listener: TcpListener,
        bridge: Arc<Bridge>,
    ) -> Result<Self, RuntimeError> {
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;
        let shutdown = Arc::new(AtomicBool::new(false));
        let connections = Connections::default();
        let accept = {
            let shutdown = Arc::clone(&shutdown);
            let connections = Arc::clone(&connections);
            thread::Builder::new()
                .name("emubridge-accept".into())
                .spawn(move || accept_loop(&listener, &bridge, &shutdown, &connections))?
        };
        info!("emubridge listening on {local_addr}");
        Ok(Self {
            local_addr,
            shutdown,
            connections,
            accept: Some(accept),
        })
    }

    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections.lock().len()
    }

    /// Stops accepting and closes every open connection. Idempotent.
    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(accept) = self.accept.take() {
            if accept.join().is_err() {
                error!("emubridge accept thread panicked");
            }
            for (peer, stream) in self.connections.lock().drain(..) {
                if let Err(err) = stream.shutdown(Shutdown::Both) {
                    warn!("emubridge: closing {peer} failed: {err}");
                }
            }
            info!("emubridge on {} stopped", self.local_addr);
        }
    }
}

impl Drop for BridgeServer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn accept_loop(
    listener: &TcpListener,
    bridge: &Arc<Bridge>,
    shutdown: &AtomicBool,
    connections: &Connections,
) {
    while !shutdown.load(Ordering::Relaxed) {
        match listener.accept() {
            Ok((stream, peer)) => spawn_handler(stream, peer, bridge, connections),
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                thread::sleep(ACCEPT_POLL);
            }
            Err(err) => {
                warn!("emubridge accept failed: {err}");
                thread::sleep(ACCEPT_POLL);
            }
        }
    }
}

fn spawn_handler(
    stream: TcpStream,
    peer: SocketAddr,
    bridge: &Arc<Bridge>,
    connections: &Connections,
) {
    if let Err(err) = prepare_stream(&stream, bridge.settings().read_timeout) {
        warn!("emubridge: rejecting {peer}: {err}");
        return;
    }
    match stream.try_clone() {
        Ok(tracked) => connections.lock().push((peer, tracked)),
        Err(err) => warn!("emubridge: {peer} cannot be closed on stop: {err}"),
    }
    let bridge = Arc::clone(bridge);
    let connections = Arc::clone(connections);
    let spawned = thread::Builder::new()
        .name(format!("emubridge-{peer}"))
        .spawn(move || {
            serve_connection(stream, peer, &bridge);
            connections.lock().retain(|(tracked, _)| *tracked != peer);
        });
    if let Err(err) = spawned {
        error!("emubridge: no handler thread for {peer}: {err}");
    }
}

fn prepare_stream(stream: &TcpStream, read_timeout: Duration) -> std::io::Result<()> {
    stream.set_nonblocking(false)?;
    stream.set_read_timeout(Some(read_timeout))?;
    stream.set_nodelay(true)
}

fn serve_connection(stream: TcpStream, peer: SocketAddr, bridge: &Bridge) {
    info!("emubridge: {peer} connected");
    let mut session = Session::new(bridge, stream, peer.to_string());
    match session.run() {
        Ok(()) => debug!("emubridge: {peer} POST exchange complete, closing"),
        Err(RuntimeError::ConnectionReset) => info!("emubridge: {peer} disconnected"),
        Err(RuntimeError::Timeout) => {
            warn!("emubridge: {peer} idle past read timeout, closing");
        }
        Err(err) => error!("emubridge: {peer} closed: {err}"),
    }
    // The stop() clone shares this socket, so dropping alone would not send FIN.
    if let Err(err) = session.into_transport().shutdown(Shutdown::Both) {
        debug!("emubridge: {peer} already closed: {err}");
    }
}
