// src/server/mod.rs

//! Development server: static files from the output root plus a live-reload
//! channel.
//!
//! The server is an explicit value. `sitepipe dev` starts it after the
//! initial build and hands its [`ReloadHandle`] to the watch runtime.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::config::model::ServerSection;

pub const LIVERELOAD_PATH: &str = "/__sitepipe/livereload";
pub const LIVERELOAD_SCRIPT_PATH: &str = "/__sitepipe/livereload.js";
pub const RELOAD_PATH: &str = "/__sitepipe/reload";

/// Text frame sent to every connected browser on reload.
pub const RELOAD_MESSAGE: &str = "reload";

const LIVERELOAD_JS: &str = r#"(function () {
  var scheme = location.protocol === "https:" ? "wss://" : "ws://";
  function connect() {
    var socket = new WebSocket(scheme + location.host + "/__sitepipe/livereload");
    socket.onmessage = function (event) {
      if (event.data === "reload") {
        location.reload();
      }
    };
    socket.onclose = function () {
      setTimeout(connect, 1000);
    };
  }
  connect();
})();
"#;

/// Cheap, cloneable sender side of the reload broadcast.
#[derive(Debug, Clone)]
pub struct ReloadHandle {
    tx: broadcast::Sender<()>,
}

impl Default for ReloadHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl ReloadHandle {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(16);
        Self { tx }
    }

    /// Ask every connected browser to reload. Never waits for delivery;
    /// returns how many listeners the signal was queued for.
    pub fn reload(&self) -> usize {
        let receivers = self.tx.send(()).unwrap_or(0);
        debug!(receivers, "reload broadcast");
        receivers
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }
}

#[derive(Debug, Clone)]
pub struct ServerOptions {
    pub host: String,
    pub port: u16,
    pub cors: bool,
}

impl From<&ServerSection> for ServerOptions {
    fn from(section: &ServerSection) -> Self {
        Self {
            host: section.host.clone(),
            port: section.port,
            cors: section.cors,
        }
    }
}

/// A running dev server.
#[derive(Debug)]
pub struct DevServer {
    addr: SocketAddr,
    reload: ReloadHandle,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<std::io::Result<()>>,
}

impl DevServer {
    /// Bind and start serving `root`. Port 0 picks a free port.
    pub async fn start(options: &ServerOptions, root: PathBuf) -> Result<Self> {
        let reload = ReloadHandle::new();
        let app = router(root.clone(), reload.clone(), options.cors);

        let listener = TcpListener::bind((options.host.as_str(), options.port))
            .await
            .with_context(|| format!("binding {}:{}", options.host, options.port))?;
        let addr = listener.local_addr()?;

        let (shutdown, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        info!(%addr, root = %root.display(), "dev server listening on http://{addr}");

        Ok(Self {
            addr,
            reload,
            shutdown,
            task,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn reload_handle(&self) -> ReloadHandle {
        self.reload.clone()
    }

    /// Stop accepting connections and wait for in-flight requests.
    pub async fn stop(self) -> Result<()> {
        let _ = self.shutdown.send(());
        match self.task.await {
            Ok(result) => result.context("dev server")?,
            Err(err) => warn!("dev server task ended abnormally: {err}"),
        }
        info!("dev server stopped");
        Ok(())
    }
}

/// All routes of the dev server.
pub fn router(root: PathBuf, reload: ReloadHandle, cors: bool) -> Router {
    let app = Router::new()
        .route(LIVERELOAD_PATH, get(livereload_ws))
        .route(LIVERELOAD_SCRIPT_PATH, get(livereload_script))
        .route(RELOAD_PATH, post(trigger_reload))
        .fallback_service(ServeDir::new(root).append_index_html_on_directories(true))
        .layer(TraceLayer::new_for_http());

    let app = if cors {
        app.layer(CorsLayer::permissive())
    } else {
        app
    };

    app.with_state(reload)
}

async fn livereload_script() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/javascript; charset=utf-8")],
        LIVERELOAD_JS,
    )
}

async fn trigger_reload(State(reload): State<ReloadHandle>) -> impl IntoResponse {
    let receivers = reload.reload();
    (StatusCode::ACCEPTED, receivers.to_string())
}

async fn livereload_ws(ws: WebSocketUpgrade, State(reload): State<ReloadHandle>) -> impl IntoResponse {
    let rx = reload.subscribe();
    ws.on_upgrade(move |socket| livereload_stream(socket, rx))
}

async fn livereload_stream(mut socket: WebSocket, mut rx: broadcast::Receiver<()>) {
    debug!("live-reload client connected");
    loop {
        tokio::select! {
            signal = rx.recv() => match signal {
                Ok(()) | Err(broadcast::error::RecvError::Lagged(_)) => {
                    if socket.send(Message::Text(RELOAD_MESSAGE.to_string())).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }
    debug!("live-reload client disconnected");
}
