use glam::Vec2;
use instant::Instant;

use crate::events::PoolEvent;
use crate::pool::{Handle, Pool, PoolObject};

/// Node rectangle width in world units.
pub const NODE_W: f32 = 120.0;
/// Node rectangle height in world units.
pub const NODE_H: f32 = 80.0;
/// Seconds after spawn during which an overlap retires the newborn.
pub const SPAWN_GRACE: f32 = 0.1;

/// A rectangular diagram node.
///
/// Visual state (position, color, highlight) lives on the entity and
/// is read by whatever draws it; the setters below are the write half
/// of that boundary.
pub struct Node {
    pos: Vec2,
    /// RGBA packed as u32, randomized on every enable.
    color: u32,
    born_at: Instant,
    /// Spawn order, newer nodes have higher values. Used to decide
    /// which member of an overlapping newborn pair gives way.
    seq: u64,
    /// Remaining spawn-grace seconds, zero once settled.
    grace: f32,
    highlighted: bool,
    dragging: bool,
    /// Position captured at drag begin; restored when the drag ends
    /// while still overlapping a neighbor.
    drag_origin: Vec2,
    /// Overlapping neighbors during the current drag.
    overlaps: u32,
    enabled: bool,
}

impl Default for Node {
    fn default() -> Self {
        Self {
            pos: Vec2::ZERO,
            color: 0,
            born_at: Instant::now(),
            seq: 0,
            grace: 0.0,
            highlighted: false,
            dragging: false,
            drag_origin: Vec2::ZERO,
            overlaps: 0,
            enabled: false,
        }
    }
}

/// Creation parameters for a node spawn.
pub struct NodeParams {
    pub pos: Vec2,
    pub color: u32,
    pub seq: u64,
}

impl PoolObject for Node {
    type Params = NodeParams;
    // Nodes are addressed by identity only; key scans never match.
    type Key = ();

    fn enable(&mut self, params: NodeParams) -> bool {
        self.pos = params.pos;
        self.color = params.color;
        self.born_at = Instant::now();
        self.seq = params.seq;
        self.grace = SPAWN_GRACE;
        self.highlighted = false;
        self.dragging = false;
        self.drag_origin = params.pos;
        self.overlaps = 0;
        self.enabled = true;
        true
    }

    fn disable(&mut self) {
        self.highlighted = false;
        self.dragging = false;
        self.overlaps = 0;
        self.enabled = false;
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn key(&self) -> Option<()> {
        None
    }
}

impl Node {
    pub fn pos(&self) -> Vec2 {
        self.pos
    }

    pub fn set_position(&mut self, pos: Vec2) {
        self.pos = pos;
    }

    pub fn color(&self) -> u32 {
        self.color
    }

    pub fn highlighted(&self) -> bool {
        self.highlighted
    }

    pub fn set_highlight(&mut self, on: bool) {
        self.highlighted = on;
    }

    pub fn dragging(&self) -> bool {
        self.dragging
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Seconds since this incarnation was enabled.
    pub fn age(&self) -> f32 {
        self.born_at.elapsed().as_secs_f32()
    }

    /// Still inside the spawn-collision window?
    pub fn in_grace(&self) -> bool {
        self.grace > 0.0
    }

    pub(crate) fn tick_grace(&mut self, dt: f32) {
        if self.grace > 0.0 {
            self.grace = (self.grace - dt).max(0.0);
        }
    }

    pub(crate) fn begin_drag(&mut self) {
        self.dragging = true;
        self.drag_origin = self.pos;
        self.overlaps = 0;
    }

    /// Finish the drag. Returns true when the node was still
    /// overlapping a neighbor and snapped back to its origin.
    pub(crate) fn end_drag(&mut self) -> bool {
        let blocked = self.overlaps > 0;
        if blocked {
            self.pos = self.drag_origin;
        }
        self.dragging = false;
        self.overlaps = 0;
        blocked
    }

    pub(crate) fn overlap_enter(&mut self) {
        self.overlaps += 1;
    }

    pub(crate) fn overlap_exit(&mut self) {
        self.overlaps = self.overlaps.saturating_sub(1);
    }

    /// Axis-aligned bounds as (min, max) corners.
    pub fn bounds(&self) -> (Vec2, Vec2) {
        let half = Vec2::new(NODE_W, NODE_H) * 0.5;
        (self.pos - half, self.pos + half)
    }

    pub fn contains(&self, point: Vec2) -> bool {
        let (min, max) = self.bounds();
        point.x >= min.x && point.x <= max.x && point.y >= min.y && point.y <= max.y
    }

    pub fn overlaps_node(&self, other: &Node) -> bool {
        let (amin, amax) = self.bounds();
        let (bmin, bmax) = other.bounds();
        amin.x < bmax.x && amax.x > bmin.x && amin.y < bmax.y && amax.y > bmin.y
    }
}

/// Random opaque color for a freshly enabled node.
fn random_node_color(rng: &mut fastrand::Rng) -> u32 {
    (rng.u8(..) as u32) << 24 | (rng.u8(..) as u32) << 16 | (rng.u8(..) as u32) << 8 | 0xFF
}

/// Pool of rectangle nodes. Owns the RNG used for display colors and
/// the spawn-order counter.
pub struct NodePool {
    pool: Pool<Node>,
    rng: fastrand::Rng,
    spawned: u64,
}

impl NodePool {
    pub fn new() -> Self {
        Self {
            pool: Pool::new(),
            rng: fastrand::Rng::new(),
            spawned: 0,
        }
    }

    /// Spawn (or recycle) a node at `pos` with a fresh random color.
    pub fn spawn(&mut self, pos: Vec2) -> Handle {
        let reused = self.pool.reserve_count() > 0;
        let params = NodeParams {
            pos,
            color: random_node_color(&mut self.rng),
            seq: self.spawned,
        };
        self.spawned += 1;
        let handle = self
            .pool
            .instantiate(params)
            .expect("node enable never rejects");
        log::debug!(
            "node {:?} {} at {pos}",
            handle,
            if reused { "recycled" } else { "constructed" },
        );
        handle
    }

    /// Count down spawn-grace timers on active nodes.
    pub fn tick(&mut self, dt: f32) {
        self.pool.for_each_active_mut(|_, node| node.tick_grace(dt));
    }

    pub fn is_active(&self, handle: Handle) -> bool {
        self.pool.get(handle).is_some_and(|n| n.is_enabled())
    }

    /// Endpoint probe for connections: `None` for stale handles or
    /// retired nodes.
    pub fn position(&self, handle: Handle) -> Option<Vec2> {
        self.pool.get(handle).map(Node::pos)
    }

    pub fn get(&self, handle: Handle) -> Option<&Node> {
        self.pool.get(handle)
    }

    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut Node> {
        self.pool.get_mut(handle)
    }

    pub fn disable(&mut self, handle: Handle) -> bool {
        self.pool.disable(handle)
    }

    pub fn set_highlight(&mut self, handle: Handle, on: bool) {
        if let Some(node) = self.pool.get_mut(handle) {
            node.set_highlight(on);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Handle, &Node)> {
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

impl Default for NodePool {
    fn default() -> Self {
        Self::new()
    }
}
