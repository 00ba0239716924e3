use glam::Vec2;

use crate::events::PoolEvent;
use crate::node::NodePool;
use crate::pool::{Handle, Pool, PoolObject};

/// Unordered pair of node identities. `{a, b}` equals `{b, a}`.
///
/// Used purely for lookup in the connection pool's linear scans, never
/// for ownership, so only equality is implemented.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionKey {
    pub a: Handle,
    pub b: Handle,
}

impl ConnectionKey {
    pub fn new(a: Handle, b: Handle) -> Self {
        Self { a, b }
    }

    /// Does the pair include `node`?
    pub fn contains(&self, node: Handle) -> bool {
        self.a == node || self.b == node
    }
}

impl PartialEq for ConnectionKey {
    fn eq(&self, other: &Self) -> bool {
        (self.a == other.a && self.b == other.b) || (self.a == other.b && self.b == other.a)
    }
}

impl Eq for ConnectionKey {}

/// A line between two distinct nodes.
///
/// Endpoint positions are cached for the line renderer. While either
/// endpoint node is being dragged the cache refreshes every tick;
/// otherwise it refreshes once at drag end and stays static.
#[derive(Default)]
pub struct Connection {
    key: Option<ConnectionKey>,
    endpoints: [Vec2; 2],
    tracking: bool,
    enabled: bool,
}

/// Creation parameters: the pair plus its endpoint positions as
/// resolved by the pool. `None` when either endpoint did not resolve.
pub struct ConnectionParams {
    pub key: ConnectionKey,
    pub endpoints: Option<[Vec2; 2]>,
}

impl PoolObject for Connection {
    type Params = ConnectionParams;
    type Key = ConnectionKey;

    fn enable(&mut self, params: ConnectionParams) -> bool {
        // Reject self-links and unresolvable endpoints.
        if params.key.a == params.key.b {
            return false;
        }
        let Some(endpoints) = params.endpoints else {
            return false;
        };
        self.key = Some(params.key);
        self.endpoints = endpoints;
        self.tracking = false;
        self.enabled = true;
        true
    }

    fn disable(&mut self) {
        self.key = None;
        self.tracking = false;
        self.enabled = false;
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn key(&self) -> Option<ConnectionKey> {
        self.key
    }
}

impl Connection {
    /// Cached line endpoints, in key order.
    pub fn endpoints(&self) -> [Vec2; 2] {
        self.endpoints
    }

    pub fn tracking(&self) -> bool {
        self.tracking
    }

    fn refresh(&mut self, nodes: &NodePool) {
        let Some(key) = self.key else { return };
        if let (Some(a), Some(b)) = (nodes.position(key.a), nodes.position(key.b)) {
            self.endpoints = [a, b];
        }
    }
}

/// Pool of node-to-node connections, indexed by unordered pair.
#[derive(Default)]
pub struct ConnectionPool {
    pool: Pool<Connection>,
}

impl ConnectionPool {
    pub fn new() -> Self {
        Self { pool: Pool::new() }
    }

    /// Create (or recycle) the connection for `key`.
    ///
    /// Fails when the endpoints are identical or either node is gone.
    /// Callers are expected to check `exists` first; the pool itself
    /// does not dedupe.
    pub fn instantiate(&mut self, key: ConnectionKey, nodes: &NodePool) -> Option<Handle> {
        let endpoints = match (nodes.position(key.a), nodes.position(key.b)) {
            (Some(a), Some(b)) => Some([a, b]),
            _ => None,
        };
        let handle = self.pool.instantiate(ConnectionParams { key, endpoints });
        match handle {
            Some(h) => log::debug!("connection {h:?} linked {:?} to {:?}", key.a, key.b),
            None => log::debug!("connection {:?} to {:?} rejected", key.a, key.b),
        }
        handle
    }

    /// Symmetric lookup: `{A, B}` finds `{B, A}`.
    pub fn exists(&self, key: ConnectionKey) -> bool {
        self.pool.exists(key)
    }

    pub fn try_get(&self, key: ConnectionKey) -> Option<(Handle, &Connection)> {
        self.pool.try_get(key)
    }

    pub fn disable(&mut self, key: ConnectionKey) -> bool {
        self.pool.disable_by_key(key)
    }

    /// Retire every active connection touching `node`. Returns how
    /// many were retired.
    pub fn retire_for_node(&mut self, node: Handle) -> usize {
        let keys: Vec<ConnectionKey> = self
            .pool
            .iter_active()
            .filter_map(|(_, conn)| conn.key().filter(|k| k.contains(node)))
            .collect();
        for key in &keys {
            self.pool.disable_by_key(*key);
        }
        keys.len()
    }

    /// Flip endpoint tracking on connections touching `node`. When a
    /// drag ends the cached endpoints also refresh once, so static
    /// lines settle at the node's final position.
    pub fn set_tracking(&mut self, node: Handle, on: bool, nodes: &NodePool) {
        self.pool.for_each_active_mut(|_, conn| {
            if conn.key.is_some_and(|k| k.contains(node)) {
                conn.tracking = on;
                if !on {
                    conn.refresh(nodes);
                }
            }
        });
    }

    /// Refresh cached endpoints of connections tracking a drag.
    pub fn tick(&mut self, nodes: &NodePool) {
        self.pool.for_each_active_mut(|_, conn| {
            if conn.tracking {
                conn.refresh(nodes);
            }
        });
    }

    pub fn iter(&self) -> impl Iterator<Item = (Handle, &Connection)> {
        self.pool.iter_active()
    }

    pub fn drain_events(&mut self) -> Vec<PoolEvent> {
        self.pool.drain_events()
    }

    pub fn active_count(&self) -> usize {
        self.pool.active_count()
    }

    pub fn reserve_count(&self) -> usize {
        self.pool.reserve_count()
    }

    pub fn total_created(&self) -> usize {
        self.pool.total_created()
    }
}
