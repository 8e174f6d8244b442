use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::dispatch::{Direction, DispatchMode, Dispatchable, Interest, PendingTask, SubmitError};
use crate::http::connection::Connection;
use crate::server::state::{AppState, ServerConnection};

/// Extra submit attempts after the dispatch queue reports full.
const SUBMIT_RETRIES: usize = 3;
const SUBMIT_BACKOFF: Duration = Duration::from_millis(10);

pub async fn run(state: Arc<AppState>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(&state.config.server.listen_addr).await?;
    info!("Listening on {}", state.config.server.listen_addr);

    loop {
        let (socket, peer) = listener.accept().await?;
        info!("Accepted connection from {}", peer);

        let state = Arc::clone(&state);
        tokio::spawn(async move {
            if let Err(e) = drive(socket, peer, state).await {
                warn!("Connection error from {}: {}", peer, e);
            }
        });
    }
}

/// Readiness loop for one socket: wait for exactly the interest the
/// connection asked for, then hand the connection to a worker.
async fn drive(socket: TcpStream, peer: SocketAddr, state: Arc<AppState>) -> anyhow::Result<()> {
    socket.set_nodelay(true)?;
    let socket = Arc::new(socket);
    let mut conn = Connection::new(
        Arc::clone(&socket),
        Arc::clone(&state.handler),
        Arc::clone(&state.metrics),
        &state.connection,
    );

    let idle = Duration::from_secs(state.config.server.idle_timeout_secs);
    let mode = state.dispatcher.mode();
    let mut interest = Interest::Read;

    loop {
        let direction = match interest {
            Interest::Read => Direction::Readable,
            Interest::Write => Direction::Writable,
            Interest::Close => break,
        };

        let ready = match direction {
            Direction::Readable => tokio::time::timeout(idle, socket.readable()).await,
            Direction::Writable => tokio::time::timeout(idle, socket.writable()).await,
        };
        match ready {
            Err(_) => {
                debug!(peer = %peer, "Idle timeout");
                break;
            }
            Ok(Err(e)) => return Err(e.into()),
            Ok(Ok(())) => {}
        }

        if mode == DispatchMode::SingleStage {
            match direction {
                Direction::Writable => {
                    interest = conn.write();
                    continue;
                }
                Direction::Readable => {
                    if !conn.read_once() {
                        break;
                    }
                }
            }
        }

        match dispatch(&state, conn, direction).await {
            Some((returned, next)) => {
                conn = returned;
                interest = next;
            }
            None => return Ok(()),
        }
    }

    conn.close();
    Ok(())
}

/// Submits `conn` and waits for a worker to hand it back. `None` means the
/// connection was dropped: refused by a full queue or lost to a panic.
async fn dispatch(
    state: &AppState,
    conn: ServerConnection,
    direction: Direction,
) -> Option<(ServerConnection, Interest)> {
    let (tx, rx) = oneshot::channel();
    let mut task = PendingTask::new(conn, direction, move |conn, next| {
        let _ = tx.send((conn, next));
    });

    let mut attempts = 0;
    loop {
        match state.dispatcher.submit(task) {
            Ok(()) => break,
            Err(SubmitError::Full(rejected)) if attempts < SUBMIT_RETRIES => {
                attempts += 1;
                task = rejected;
                tokio::time::sleep(SUBMIT_BACKOFF).await;
            }
            Err(e) => {
                state.metrics.increment_rejected();
                warn!(error = %e, attempts, "Dropping connection");
                return None;
            }
        }
    }

    rx.await.ok()
}
