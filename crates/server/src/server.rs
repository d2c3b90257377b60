//! Server supervisor: bind, accept, spawn connection loops, stop.

use std::sync::{
    Arc, Mutex, RwLock,
    atomic::{AtomicBool, AtomicU64, Ordering},
};

use {
    tokio::{
        net::{TcpListener, TcpSocket},
        task::JoinSet,
    },
    tokio_util::sync::CancellationToken,
    tracing::{info, warn},
};

use {
    parlor_config::ServerConfig,
    parlor_events::{Event, EventBus, ServerState},
    parlor_sessions::SessionRegistry,
    parlor_store::Store,
};

use crate::{
    Router,
    connection::{ConnectionShared, handle_connection},
    error::{Error, Result},
};

/// One server instance. Constructed at startup and threaded explicitly —
/// tests build as many independent instances as they like.
pub struct Server {
    config: RwLock<ServerConfig>,
    store: Arc<Store>,
    sessions: Arc<SessionRegistry>,
    events: Arc<EventBus>,
    running: AtomicBool,
    cancel: Mutex<Option<CancellationToken>>,
    next_conn_id: AtomicU64,
}

impl Server {
    #[must_use]
    pub fn new(config: ServerConfig, store: Arc<Store>, events: Arc<EventBus>) -> Self {
        Self {
            config: RwLock::new(config),
            store,
            sessions: Arc::new(SessionRegistry::new()),
            events,
            running: AtomicBool::new(false),
            cancel: Mutex::new(None),
            next_conn_id: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    #[must_use]
    pub fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.sessions
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Snapshot of the current configuration.
    #[must_use]
    pub fn config(&self) -> ServerConfig {
        self.config
            .read()
            .map(|c| c.clone())
            .unwrap_or_default()
    }

    /// Replace the configuration. Only possible while stopped.
    pub fn set_config(&self, config: ServerConfig) -> Result<()> {
        if self.is_running() {
            return Err(Error::AlreadyRunning);
        }
        config.validate()?;
        if let Ok(mut current) = self.config.write() {
            *current = config;
        }
        Ok(())
    }

    /// Ask a running server to stop accepting and wind down connections.
    pub fn stop(&self) {
        if let Ok(guard) = self.cancel.lock()
            && let Some(token) = guard.as_ref()
        {
            token.cancel();
        }
    }

    /// Bind the listener described by the configuration, with the
    /// configured backlog.
    pub async fn bind(&self) -> Result<TcpListener> {
        let config = self.config();
        let address = config.bind_address();

        let addr = tokio::net::lookup_host(&address)
            .await
            .map_err(|source| Error::Bind {
                address: address.clone(),
                source,
            })?
            .next()
            .ok_or_else(|| Error::Resolve {
                address: address.clone(),
            })?;

        let bind = || -> std::io::Result<TcpListener> {
            let socket = if addr.is_ipv4() {
                TcpSocket::new_v4()?
            } else {
                TcpSocket::new_v6()?
            };
            socket.set_reuseaddr(true)?;
            socket.bind(addr)?;
            socket.listen(config.connections)
        };
        bind().map_err(|source| Error::Bind { address, source })
    }

    /// Accept connections on `listener` until [`Server::stop`], then await
    /// every connection task before returning.
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        let local = listener.local_addr()?;

        // The flag and the token flip together under the lock `stop`
        // takes, so anyone who observes a running server can cancel it.
        let cancel = CancellationToken::new();
        {
            let Ok(mut guard) = self.cancel.lock() else {
                return Err(Error::AlreadyRunning);
            };
            if self.running.swap(true, Ordering::AcqRel) {
                return Err(Error::AlreadyRunning);
            }
            *guard = Some(cancel.clone());
        }

        let config = self.config();
        let router = Arc::new(Router::new(&config.modules));
        let shared = Arc::new(ConnectionShared {
            store: Arc::clone(&self.store),
            sessions: Arc::clone(&self.sessions),
            events: Arc::clone(&self.events),
            router,
            buffer_size: config.buffer_size,
        });

        info!(address = %local, "server listening");
        self.events.publish(Event::State(ServerState::Started {
            address: local.to_string(),
        }));
        self.events
            .publish_log(format!("Server started with {local}"));

        let mut tasks = JoinSet::new();
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let conn_id = self.next_conn_id.fetch_add(1, Ordering::Relaxed) + 1;
                        info!(%peer, conn_id, "client connected");
                        self.events
                            .publish_log(format!("Client with address {peer} detected"));
                        tasks.spawn(handle_connection(
                            stream,
                            peer,
                            Arc::clone(&shared),
                            conn_id,
                            cancel.child_token(),
                        ));
                    },
                    Err(e) => warn!(error = %e, "accept failed"),
                },
            }
        }

        // Stop taking connections first, then wait for the loops to wind
        // down; their cancellation tokens are already tripped.
        drop(listener);
        while tasks.join_next().await.is_some() {}

        self.running.store(false, Ordering::Release);
        if let Ok(mut guard) = self.cancel.lock() {
            *guard = None;
        }
        self.events.publish(Event::State(ServerState::Stopped));
        self.events.publish_log("Server closed");
        info!("server stopped");
        Ok(())
    }

    /// Bind and serve in one call.
    pub async fn run(&self) -> Result<()> {
        let listener = self.bind().await?;
        self.serve(listener).await
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    async fn test_server() -> Server {
        let store = Arc::new(Store::in_memory().await.unwrap());
        let config = ServerConfig {
            host: "127.0.0.1".into(),
            port: 0,
            ..Default::default()
        };
        Server::new(config, store, Arc::new(EventBus::new()))
    }

    #[tokio::test]
    async fn config_mutable_only_while_stopped() {
        let server = Arc::new(test_server().await);

        let mut config = server.config();
        config.port = 0;
        server.set_config(config.clone()).unwrap();

        let listener = server.bind().await.unwrap();
        let srv = Arc::clone(&server);
        let handle = tokio::spawn(async move { srv.serve(listener).await });

        // Wait for the accept loop to mark itself running.
        while !server.is_running() {
            tokio::task::yield_now().await;
        }
        assert!(matches!(
            server.set_config(config.clone()),
            Err(Error::AlreadyRunning)
        ));

        server.stop();
        handle.await.unwrap().unwrap();
        assert!(!server.is_running());
        server.set_config(config).unwrap();
    }

    #[tokio::test]
    async fn invalid_config_rejected() {
        let server = test_server().await;
        let mut config = server.config();
        config.encoding = "ebcdic".into();
        assert!(server.set_config(config).is_err());
    }

    #[tokio::test]
    async fn bind_failure_reports_address() {
        let server = test_server().await;
        let first = server.bind().await.unwrap();
        let addr = first.local_addr().unwrap();

        let mut config = server.config();
        config.port = addr.port();
        server.set_config(config).unwrap();

        match server.bind().await {
            Err(Error::Bind { address, .. }) => assert!(address.ends_with(&addr.port().to_string())),
            other => panic!("expected bind failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn stop_without_serve_is_a_noop() {
        let server = test_server().await;
        server.stop();
        assert!(!server.is_running());
    }
}
