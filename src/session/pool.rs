// ABOUTME: Bounded connection pool owned by a server session
// A semaphore caps in-flight requests; idle connections sit behind a mutex until leased again

use crate::transport::{Connector, Transport, TransportError};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;
use url::Url;

pub(crate) enum AcquireError {
    Closed,
    Connect(TransportError),
}

struct Connection {
    id: u64,
    transport: Arc<dyn Transport>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub idle: usize,
    pub in_use: usize,
    pub opened: u64,
    pub discarded: u64,
}

struct PoolShared {
    // std mutex: released connections are returned from Drop, which cannot await
    idle: Mutex<Vec<Connection>>,
    opened: AtomicU64,
    discarded: AtomicU64,
    closed: AtomicBool,
}

impl PoolShared {
    fn idle(&self) -> MutexGuard<'_, Vec<Connection>> {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub struct ConnectionPool {
    server: Url,
    connector: Arc<dyn Connector>,
    limit: Arc<Semaphore>,
    max_connections: usize,
    shared: Arc<PoolShared>,
}

impl ConnectionPool {
    pub fn new(server: Url, connector: Arc<dyn Connector>, max_connections: usize) -> Self {
        let max_connections = max_connections.max(1);
        Self {
            server,
            connector,
            limit: Arc::new(Semaphore::new(max_connections)),
            max_connections,
            shared: Arc::new(PoolShared {
                idle: Mutex::new(Vec::new()),
                opened: AtomicU64::new(0),
                discarded: AtomicU64::new(0),
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub(crate) async fn acquire(&self) -> Result<PooledConnection, AcquireError> {
        let permit = self
            .limit
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| AcquireError::Closed)?;

        if self.is_closed() {
            return Err(AcquireError::Closed);
        }

        let reused = self.shared.idle().pop();
        let connection = match reused {
            Some(connection) => connection,
            None => {
                let transport = self
                    .connector
                    .connect(&self.server)
                    .map_err(AcquireError::Connect)?;
                let id = self.shared.opened.fetch_add(1, Ordering::SeqCst) + 1;
                debug!("Opened connection #{} to {}", id, self.server);
                Connection { id, transport }
            }
        };

        Ok(PooledConnection {
            id: connection.id,
            transport: connection.transport,
            shared: self.shared.clone(),
            reusable: false,
            _permit: permit,
        })
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }

    /// Close the pool: waiting and future leases fail, idle connections are dropped.
    pub fn close(&self) {
        self.shared.closed.store(true, Ordering::SeqCst);
        self.limit.close();
        let dropped = {
            let mut idle = self.shared.idle();
            let count = idle.len();
            idle.clear();
            count
        };
        debug!("Closed connection pool for {} ({} idle dropped)", self.server, dropped);
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            idle: self.shared.idle().len(),
            in_use: self
                .max_connections
                .saturating_sub(self.limit.available_permits()),
            opened: self.shared.opened.load(Ordering::SeqCst),
            discarded: self.shared.discarded.load(Ordering::SeqCst),
        }
    }
}

/// A leased connection. It goes back to the pool only after `release`; a lease
/// dropped mid-request may hold a half-read response and is discarded instead.
pub(crate) struct PooledConnection {
    id: u64,
    transport: Arc<dyn Transport>,
    shared: Arc<PoolShared>,
    reusable: bool,
    _permit: OwnedSemaphorePermit,
}

impl PooledConnection {
    pub fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    /// Return the connection to the idle list after a completed request.
    pub fn release(mut self) {
        self.reusable = true;
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if self.reusable && !self.shared.closed.load(Ordering::SeqCst) {
            self.shared.idle().push(Connection {
                id: self.id,
                transport: self.transport.clone(),
            });
        } else {
            self.shared.discarded.fetch_add(1, Ordering::SeqCst);
            debug!("Discarded connection #{}", self.id);
        }
    }
}
