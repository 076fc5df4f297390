use std::{
    future::Future,
    io,
    net::SocketAddr,
    path::PathBuf,
    sync::Arc,
};

use anyhow::{Context, Result};
use axum::{
    extract::{
        ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade},
        ConnectInfo, State,
    },
    response::{Html, IntoResponse},
    routing::{get, get_service},
    Router,
};
use futures_util::{stream::SplitSink, SinkExt, StreamExt};
use tokio::{
    net::TcpListener,
    select,
    sync::{broadcast, watch},
};
use tower_http::{services::ServeFile, trace::TraceLayer};
use tracing::{debug, info, warn};

use crate::{hub::Hub, message::Event};

/// Page compiled into the binary, served when no `--index` is given.
pub const BUNDLED_INDEX: &str = include_str!("../index.html");

/// Source of the page served on `/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexPage {
    Bundled,
    File(PathBuf),
}

impl IndexPage {
    /// Logs a warning when the page is a file that does not exist.
    pub async fn warn_if_missing(&self) {
        let IndexPage::File(path) = self else {
            return;
        };
        let is_file = tokio::fs::metadata(path)
            .await
            .map(|metadata| metadata.is_file())
            .unwrap_or(false);
        if !is_file {
            warn!(path = %path.display(), "index page not found; GET / will return 404");
        }
    }
}

impl From<Option<PathBuf>> for IndexPage {
    fn from(path: Option<PathBuf>) -> Self {
        path.map_or(IndexPage::Bundled, IndexPage::File)
    }
}

impl From<PathBuf> for IndexPage {
    fn from(path: PathBuf) -> Self {
        IndexPage::File(path)
    }
}

/// HTTP front: serves the index page on `/` and the push channel on `/ws`.
pub struct Server {
    listener: TcpListener,
    hub: Arc<Hub>,
    index: IndexPage,
}

impl Server {
    pub async fn bind(addr: SocketAddr, index: impl Into<IndexPage>) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind {addr}"))?;
        let index = index.into();
        index.warn_if_missing().await;
        Ok(Self::new(listener, index))
    }

    pub fn new(listener: TcpListener, index: impl Into<IndexPage>) -> Self {
        Self::with_hub(listener, index, Arc::new(Hub::new()))
    }

    /// Serves clients from an existing hub, e.g. one built with [`Hub::with_capacity`].
    pub fn with_hub(listener: TcpListener, index: impl Into<IndexPage>, hub: Arc<Hub>) -> Self {
        Self {
            listener,
            hub,
            index: index.into(),
        }
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Handle for feeding events to connected clients.
    pub fn hub(&self) -> Arc<Hub> {
        Arc::clone(&self.hub)
    }

    pub fn router(hub: Arc<Hub>, index: &IndexPage) -> Router {
        let router: Router<Arc<Hub>> = match index {
            IndexPage::Bundled => Router::new().route("/", get(|| async { Html(BUNDLED_INDEX) })),
            IndexPage::File(path) => Router::new().route("/", get_service(ServeFile::new(path))),
        };
        router
            .route("/ws", get(upgrade_handler))
            .layer(TraceLayer::new_for_http())
            .with_state(hub)
    }

    /// Serves until `shutdown` resolves, then closes every live session.
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let Server {
            listener,
            hub,
            index,
        } = self;

        let app = Self::router(Arc::clone(&hub), &index);
        let signal_hub = Arc::clone(&hub);
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            shutdown.await;
            info!("server shutting down");
            signal_hub.shutdown();
        })
        .await
        .context("server terminated unexpectedly")?;

        Ok(())
    }
}

async fn upgrade_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    State(hub): State<Arc<Hub>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| run_session(socket, peer, hub))
}

async fn run_session(socket: WebSocket, peer: SocketAddr, hub: Arc<Hub>) {
    // Subscribe before registering so a counted client never misses an event.
    let mut inbox = hub.subscribe();
    let mut shutdown = hub.shutdown_signal();
    let client_id = hub.register(peer).await;
    info!(%peer, client_id, "client connected");

    let (mut sink, mut stream) = socket.split();

    loop {
        select! {
            incoming = stream.next() => {
                if !handle_incoming(incoming, peer) {
                    break;
                }
            }
            outgoing = inbox.recv() => {
                if !deliver(outgoing, &mut sink, peer).await {
                    break;
                }
            }
            _ = shutdown_requested(&mut shutdown) => {
                send_close(&mut sink, peer).await;
                break;
            }
        }
    }

    hub.remove(client_id).await;
    info!(%peer, client_id, "client disconnected");
}

fn handle_incoming(message: Option<Result<Message, axum::Error>>, peer: SocketAddr) -> bool {
    match message {
        Some(Ok(Message::Close(_))) | None => false,
        Some(Ok(Message::Text(text))) => {
            debug!(%peer, len = text.len(), "ignoring text frame from client");
            true
        }
        Some(Ok(_)) => true,
        Some(Err(err)) => {
            debug!(%peer, ?err, "client stream failed");
            false
        }
    }
}

async fn deliver(
    event: Result<Event, broadcast::error::RecvError>,
    sink: &mut SplitSink<WebSocket, Message>,
    peer: SocketAddr,
) -> bool {
    match event {
        Ok(event) => {
            let frame = match event.to_frame() {
                Ok(frame) => frame,
                Err(err) => {
                    warn!(?err, "failed to encode event");
                    return true;
                }
            };
            if let Err(err) = sink.send(Message::Text(frame)).await {
                debug!(%peer, ?err, "failed to deliver event to client");
                return false;
            }
            true
        }
        Err(broadcast::error::RecvError::Lagged(skipped)) => {
            warn!(%peer, skipped, "client fell behind; events dropped");
            true
        }
        Err(broadcast::error::RecvError::Closed) => false,
    }
}

async fn shutdown_requested(signal: &mut watch::Receiver<bool>) {
    let _ = signal.wait_for(|stopped| *stopped).await;
}

async fn send_close(sink: &mut SplitSink<WebSocket, Message>, peer: SocketAddr) {
    let frame = CloseFrame {
        code: close_code::AWAY,
        reason: "server shutting down".into(),
    };
    if let Err(err) = sink.send(Message::Close(Some(frame))).await {
        debug!(%peer, ?err, "failed to send close frame");
    }
}
