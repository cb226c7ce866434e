//! Pooled gateway connections and a periodically refreshed device cache.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::control_interface::{GatewaySession, SessionOptions, DEFAULT_PORT};
use crate::device::Device;
use crate::error::Result;
use crate::util::pool::{Pool, PoolConfig, PoolManager, Pooled};

/// Last known devices, keyed by name.
pub type DeviceMap = HashMap<String, Device>;

/// A session checked out of the controller's pool.
pub type PooledSession = Pooled<SessionManager>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    pub host: String,
    pub port: u16,
    /// Period of the background refresh, `None` disables it.
    pub refresh_interval: Option<Duration>,
    pub pool: PoolConfig,
    pub session: SessionOptions,
}

impl ControllerConfig {
    pub fn new(host: &str) -> Self {
        ControllerConfig {
            host: host.to_string(),
            port: DEFAULT_PORT,
            refresh_interval: Some(Duration::from_secs(30)),
            pool: PoolConfig::default(),
            session: SessionOptions::default(),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_refresh_interval(mut self, refresh_interval: Option<Duration>) -> Self {
        self.refresh_interval = refresh_interval;
        self
    }

    pub fn with_pool(mut self, pool: PoolConfig) -> Self {
        self.pool = pool;
        self
    }

    pub fn with_session(mut self, session: SessionOptions) -> Self {
        self.session = session;
        self
    }
}

/// Opens and closes [`GatewaySession`]s for the pool.
pub struct SessionManager {
    host: String,
    port: u16,
    options: SessionOptions,
}

impl PoolManager for SessionManager {
    type Object = GatewaySession;

    async fn create(&self) -> Result<GatewaySession> {
        GatewaySession::connect_with_options(&self.host, self.port, self.options).await
    }

    fn is_reusable(&self, session: &GatewaySession) -> bool {
        session.is_healthy()
    }

    fn destroy(&self, mut session: GatewaySession) {
        session.disconnect();
    }
}

struct Shared {
    pool: Pool<SessionManager>,
    cache: RwLock<Arc<DeviceMap>>,
    /// Serializes refresh cycles.
    refresh_lock: AsyncMutex<()>,
}

impl Shared {
    async fn refresh(&self) -> bool {
        let _guard = self.refresh_lock.lock().await;

        let devices = match self.fetch_devices().await {
            Ok(devices) => devices,
            Err(err) => {
                warn!("Failed to refresh devices, keeping previous snapshot: {}", err);
                return false;
            }
        };

        let snapshot: DeviceMap = devices
            .into_iter()
            .map(|device| (device.name().to_string(), device))
            .collect();
        let count = snapshot.len();

        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        // Shutdown clears the cache after closing the pool.
        if self.pool.is_closed() {
            return false;
        }
        *cache = Arc::new(snapshot);
        debug!("Device cache refreshed with {} device(s)", count);
        true
    }

    async fn fetch_devices(&self) -> Result<Vec<Device>> {
        let mut session = self.pool.acquire().await?;
        let result = session.discover_devices(None).await;
        self.pool.release(session);
        result
    }

    fn snapshot(&self) -> Arc<DeviceMap> {
        Arc::clone(&self.cache.read().unwrap_or_else(PoisonError::into_inner))
    }
}

/**
Brokers access to a gateway and keeps a snapshot of its devices.

Creating a controller starts the background refresh on the current tokio
runtime; the first refresh runs right away. Call [`ConnectionController::shutdown`]
when done, dropping the controller only stops the refresh.
 */
pub struct ConnectionController {
    config: ControllerConfig,
    shared: Arc<Shared>,
    refresh_task: Mutex<Option<JoinHandle<()>>>,
}

impl ConnectionController {
    pub fn new(config: ControllerConfig) -> Self {
        let manager = SessionManager {
            host: config.host.clone(),
            port: config.port,
            options: config.session,
        };
        let shared = Arc::new(Shared {
            pool: Pool::new(manager, config.pool),
            cache: RwLock::new(Arc::new(DeviceMap::new())),
            refresh_lock: AsyncMutex::new(()),
        });

        let refresh_task = config
            .refresh_interval
            .map(|period| spawn_refresh(Arc::clone(&shared), period));

        info!("Controller started for gateway {}:{}", config.host, config.port);
        ConnectionController {
            config,
            shared,
            refresh_task: Mutex::new(refresh_task),
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn host(&self) -> &str {
        &self.config.host
    }

    pub fn port(&self) -> u16 {
        self.config.port
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.config.host, self.config.port)
    }

    /// Checks out a session, connecting a new one if the pool has room.
    pub async fn acquire(&self) -> Result<PooledSession> {
        self.shared.pool.acquire().await
    }

    /// Returns a session. Returns false if it was disconnected instead of pooled.
    pub fn release(&self, session: PooledSession) -> bool {
        self.shared.pool.release(session)
    }

    /**
    Re-reads the device list from the gateway and replaces the cache.

    On failure the previous snapshot is kept and false is returned.
     */
    pub async fn refresh(&self) -> bool {
        self.shared.refresh().await
    }

    /// The current device snapshot. Later refreshes do not alter it.
    pub fn devices(&self) -> Arc<DeviceMap> {
        self.shared.snapshot()
    }

    pub fn device(&self, name: &str) -> Option<Device> {
        self.shared.snapshot().get(name).cloned()
    }

    /// True if the pool holds at least one live session.
    pub fn is_connected(&self) -> bool {
        self.shared.pool.current_size() > 0
    }

    /// Pool limits currently in force, including changes made after creation.
    pub fn pool_config(&self) -> PoolConfig {
        self.shared.pool.config()
    }

    pub fn configure_pool(&self, max_size: usize, max_age: Option<Duration>, max_idle: Option<Duration>) {
        self.shared.pool.configure(max_size, max_age, max_idle);
    }

    pub fn set_gateway_pool_size(&self, max_size: usize) {
        self.shared.pool.set_max_size(max_size);
    }

    pub fn set_gateway_socket_max_age(&self, max_age: Option<Duration>) {
        self.shared.pool.set_max_age(max_age);
    }

    pub fn set_gateway_socket_max_idle(&self, max_idle: Option<Duration>) {
        self.shared.pool.set_max_idle(max_idle);
    }

    /// Stops the refresh, drops the cache and disconnects pooled sessions.
    pub fn shutdown(&self) {
        self.stop_refresh();
        self.shared.pool.shutdown();
        *self.shared.cache.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(DeviceMap::new());
        info!("Controller for gateway {} shut down", self.address());
    }

    fn stop_refresh(&self) {
        let task = self
            .refresh_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            task.abort();
        }
    }
}

impl Drop for ConnectionController {
    fn drop(&mut self) {
        self.stop_refresh();
    }
}

fn spawn_refresh(shared: Arc<Shared>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            shared.refresh().await;
        }
    })
}
