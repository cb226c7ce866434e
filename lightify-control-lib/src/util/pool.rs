//! A small bounded object pool with age and idle eviction.

use std::collections::VecDeque;
use std::future::Future;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use log::{debug, warn};
use tokio::sync::Notify;
use tokio::time::{timeout_at, Instant};

use crate::error::{Error, Result};

/// Creates, vets and destroys the objects held by a [`Pool`].
pub trait PoolManager: Send + Sync + 'static {
    type Object: Send + 'static;

    fn create(&self) -> impl Future<Output = Result<Self::Object>> + Send;

    /// Whether a released object may be handed out again.
    fn is_reusable(&self, _object: &Self::Object) -> bool {
        true
    }

    /// Called exactly once for every object leaving the pool.
    fn destroy(&self, object: Self::Object);
}

/// Limits applied by a [`Pool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// Maximum number of live objects, idle and checked out.
    pub max_size: usize,
    /// Objects older than this are destroyed instead of reused.
    pub max_age: Option<Duration>,
    /// Objects idle for longer than this are destroyed instead of reused.
    pub max_idle: Option<Duration>,
    /// How long [`Pool::acquire`] waits for a free slot.
    pub acquire_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        PoolConfig {
            max_size: 2,
            max_age: Some(Duration::from_secs(10 * 60)),
            max_idle: Some(Duration::from_secs(60)),
            acquire_timeout: Duration::from_secs(30),
        }
    }
}

impl PoolConfig {
    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn with_max_age(mut self, max_age: Option<Duration>) -> Self {
        self.max_age = max_age;
        self
    }

    pub fn with_max_idle(mut self, max_idle: Option<Duration>) -> Self {
        self.max_idle = max_idle;
        self
    }

    pub fn with_acquire_timeout(mut self, acquire_timeout: Duration) -> Self {
        self.acquire_timeout = acquire_timeout;
        self
    }
}

struct Entry<T> {
    object: T,
    created: Instant,
    last_used: Instant,
}

impl<T> Entry<T> {
    fn is_expired(&self, config: &PoolConfig, now: Instant) -> bool {
        let too_old = config
            .max_age
            .is_some_and(|max_age| now.duration_since(self.created) > max_age);
        let too_idle = config
            .max_idle
            .is_some_and(|max_idle| now.duration_since(self.last_used) > max_idle);
        too_old || too_idle
    }
}

struct State<T> {
    config: PoolConfig,
    idle: VecDeque<Entry<T>>,
    /// Idle plus checked out objects.
    live: usize,
    /// Slots reserved for a create still in flight.
    pending: usize,
    closed: bool,
}

struct Inner<M: PoolManager> {
    manager: M,
    state: Mutex<State<M::Object>>,
    available: Notify,
}

impl<M: PoolManager> Inner<M> {
    fn lock(&self) -> MutexGuard<'_, State<M::Object>> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Destroys an object that already left the idle list and frees its slot.
    fn discard(&self, object: M::Object) {
        self.manager.destroy(object);
        {
            let mut state = self.lock();
            state.live = state.live.saturating_sub(1);
        }
        self.available.notify_one();
    }

    fn give_back(&self, object: M::Object, created: Instant) -> bool {
        let reusable = self.manager.is_reusable(&object);
        let now = Instant::now();
        let entry = Entry {
            object,
            created,
            last_used: now,
        };

        let rejected = {
            let mut state = self.lock();
            if reusable
                && !state.closed
                && state.live <= state.config.max_size
                && !entry.is_expired(&state.config, now)
            {
                state.idle.push_back(entry);
                None
            } else {
                Some(entry.object)
            }
        };

        match rejected {
            None => {
                self.available.notify_one();
                true
            }
            Some(object) => {
                debug!("Destroying pooled object on release");
                self.discard(object);
                false
            }
        }
    }
}

/// A slot taken for an object still being created, given back unless fulfilled.
struct Reservation<'a, M: PoolManager> {
    inner: &'a Inner<M>,
}

impl<M: PoolManager> Reservation<'_, M> {
    /// Turns the reserved slot into a live object.
    fn fulfil(self) {
        {
            let mut state = self.inner.lock();
            state.pending = state.pending.saturating_sub(1);
            state.live += 1;
        }
        std::mem::forget(self);
    }
}

impl<M: PoolManager> Drop for Reservation<'_, M> {
    fn drop(&mut self) {
        {
            let mut state = self.inner.lock();
            state.pending = state.pending.saturating_sub(1);
        }
        self.inner.available.notify_one();
    }
}

/**
A bounded pool of objects created on demand by a [`PoolManager`].

Cloning the pool yields another handle to the same objects.
 */
pub struct Pool<M: PoolManager> {
    inner: Arc<Inner<M>>,
}

impl<M: PoolManager> Clone for Pool<M> {
    fn clone(&self) -> Self {
        Pool {
            inner: Arc::clone(&self.inner),
        }
    }
}

enum Slot<T> {
    Reuse(Entry<T>),
    Create,
    Wait,
}

impl<M: PoolManager> Pool<M> {
    pub fn new(manager: M, config: PoolConfig) -> Self {
        Pool {
            inner: Arc::new(Inner {
                manager,
                state: Mutex::new(State {
                    config,
                    idle: VecDeque::new(),
                    live: 0,
                    pending: 0,
                    closed: false,
                }),
                available: Notify::new(),
            }),
        }
    }

    pub fn config(&self) -> PoolConfig {
        self.inner.lock().config
    }

    /**
    Hands out an idle object, or creates one if the pool has room.

    Waits up to the configured acquire timeout for a slot to free up. Fails
    with [`Error::NotConnected`] on timeout, after shutdown, or when the
    manager cannot create an object.
     */
    pub async fn acquire(&self) -> Result<Pooled<M>> {
        let deadline = Instant::now() + self.inner.lock().config.acquire_timeout;

        loop {
            let (slot, expired) = self.next_slot();
            for object in expired {
                debug!("Evicting expired pooled object");
                self.inner.discard(object);
            }

            match slot? {
                Slot::Reuse(entry) => {
                    return Ok(Pooled {
                        object: Some(entry.object),
                        created: entry.created,
                        inner: Arc::clone(&self.inner),
                    });
                }
                Slot::Create => {
                    let reservation = Reservation { inner: &self.inner };
                    return match self.inner.manager.create().await {
                        Ok(object) => {
                            reservation.fulfil();
                            Ok(Pooled {
                                object: Some(object),
                                created: Instant::now(),
                                inner: Arc::clone(&self.inner),
                            })
                        }
                        Err(err) => {
                            drop(reservation);
                            warn!("Failed to create pooled object: {}", err);
                            Err(Error::NotConnected(err.to_string()))
                        }
                    };
                }
                Slot::Wait => {
                    if timeout_at(deadline, self.inner.available.notified())
                        .await
                        .is_err()
                    {
                        return Err(Error::NotConnected(
                            "timed out waiting for a free connection".to_string(),
                        ));
                    }
                }
            }
        }
    }

    /// Picks the next usable slot, collecting expired idle objects to destroy.
    fn next_slot(&self) -> (Result<Slot<M::Object>>, Vec<M::Object>) {
        let mut expired = Vec::new();
        let mut state = self.inner.lock();
        if state.closed {
            return (
                Err(Error::NotConnected("connection pool is shut down".to_string())),
                expired,
            );
        }

        let now = Instant::now();
        while let Some(entry) = state.idle.pop_front() {
            if entry.is_expired(&state.config, now) {
                // The slot is freed by discard() once the lock is released.
                expired.push(entry.object);
            } else {
                return (Ok(Slot::Reuse(entry)), expired);
            }
        }

        // Expired objects still hold a slot until discarded.
        if state.live - expired.len() + state.pending < state.config.max_size {
            state.pending += 1;
            (Ok(Slot::Create), expired)
        } else {
            (Ok(Slot::Wait), expired)
        }
    }

    /// Returns an object to the pool. Returns false if it was destroyed instead.
    pub fn release(&self, mut pooled: Pooled<M>) -> bool {
        match pooled.object.take() {
            Some(object) => self.inner.give_back(object, pooled.created),
            None => false,
        }
    }

    pub fn configure(&self, max_size: usize, max_age: Option<Duration>, max_idle: Option<Duration>) {
        {
            let mut state = self.inner.lock();
            state.config.max_size = max_size;
            state.config.max_age = max_age;
            state.config.max_idle = max_idle;
        }
        self.inner.available.notify_waiters();
    }

    pub fn set_max_size(&self, max_size: usize) {
        self.inner.lock().config.max_size = max_size;
        self.inner.available.notify_waiters();
    }

    pub fn set_max_age(&self, max_age: Option<Duration>) {
        self.inner.lock().config.max_age = max_age;
    }

    pub fn set_max_idle(&self, max_idle: Option<Duration>) {
        self.inner.lock().config.max_idle = max_idle;
    }

    /// Number of live objects, idle or checked out. Creates in flight do not count.
    pub fn current_size(&self) -> usize {
        self.inner.lock().live
    }

    pub fn idle_count(&self) -> usize {
        self.inner.lock().idle.len()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    /**
    Destroys all idle objects and refuses further acquires.

    Objects checked out at this point are destroyed when released.
     */
    pub fn shutdown(&self) {
        let idle: Vec<M::Object> = {
            let mut state = self.inner.lock();
            state.closed = true;
            state.idle.drain(..).map(|entry| entry.object).collect()
        };
        for object in idle {
            self.inner.discard(object);
        }
        self.inner.available.notify_waiters();
    }
}

/**
An object checked out of a [`Pool`].

Give it back with [`Pool::release`]. Dropping it instead destroys the object
and frees its slot.
 */
pub struct Pooled<M: PoolManager> {
    object: Option<M::Object>,
    created: Instant,
    inner: Arc<Inner<M>>,
}

impl<M: PoolManager> Pooled<M> {
    /// When the pool created the object.
    pub fn created(&self) -> Instant {
        self.created
    }

    /// Destroys the object now instead of returning it to the pool.
    pub fn discard(mut self) {
        if let Some(object) = self.object.take() {
            self.inner.discard(object);
        }
    }
}

impl<M: PoolManager> Deref for Pooled<M> {
    type Target = M::Object;

    fn deref(&self) -> &Self::Target {
        self.object
            .as_ref()
            .expect("pooled object is present until released")
    }
}

impl<M: PoolManager> DerefMut for Pooled<M> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.object
            .as_mut()
            .expect("pooled object is present until released")
    }
}

impl<M: PoolManager> Drop for Pooled<M> {
    fn drop(&mut self) {
        if let Some(object) = self.object.take() {
            self.inner.discard(object);
        }
    }
}
