use glam::Vec2;

use crate::connection::{ConnectionKey, ConnectionPool};
use crate::events::PoolEvent;
use crate::node::NodePool;
use crate::pool::Handle;

/// Orchestrates pointer gestures into pool operations.
///
/// Owns both pools plus the connect-selection state machine: at most
/// one node is pending as the first endpoint of a connection. Every
/// mutating gesture drains pool notifications before returning, so
/// retirement cascades are fully settled by the time the caller
/// observes state.
pub struct Diagram {
    nodes: NodePool,
    connections: ConnectionPool,
    /// First endpoint of a pending connection, if any.
    selected: Option<Handle>,
}

impl Diagram {
    pub fn new() -> Self {
        Self {
            nodes: NodePool::new(),
            connections: ConnectionPool::new(),
            selected: None,
        }
    }

    // -----------------------------------------------------------------
    // Gestures (input collaborator, world coordinates pre-resolved)
    // -----------------------------------------------------------------

    /// Primary click on empty canvas: spawn a node there.
    pub fn click_canvas(&mut self, pos: Vec2) -> Handle {
        let handle = self.nodes.spawn(pos);
        self.pump_events();
        handle
    }

    /// Double primary click on a node: retire it. Connections touching
    /// it cascade into reserve before this returns.
    pub fn remove_node(&mut self, handle: Handle) -> bool {
        if let Some(node) = self.nodes.get(handle) {
            log::debug!("node {:?} removed after {:.2}s", handle, node.age());
        }
        let removed = self.nodes.disable(handle);
        self.pump_events();
        removed
    }

    /// Secondary click on a node: selection toggle / link creation.
    ///
    /// First click marks the node pending; clicking it again unmarks
    /// it; clicking a different node builds the pair key and creates
    /// the connection unless one already exists. Either way, resolving
    /// a pending selection clears both highlights and the selection.
    /// Returns false when the click only cancelled a selection or hit
    /// a retired node.
    pub fn select_node(&mut self, handle: Handle) -> bool {
        if !self.nodes.is_active(handle) {
            return false;
        }

        // A cached selection pointing at a retired node is stale.
        if self.selected.is_some_and(|s| !self.nodes.is_active(s)) {
            self.selected = None;
        }

        match self.selected {
            Some(sel) if sel == handle => {
                self.nodes.set_highlight(handle, false);
                self.selected = None;
                false
            }
            Some(first) => {
                let key = ConnectionKey::new(first, handle);
                if self.connections.exists(key) {
                    log::debug!("{:?} and {:?} already linked", first, handle);
                } else {
                    self.connections.instantiate(key, &self.nodes);
                }
                self.nodes.set_highlight(first, false);
                self.nodes.set_highlight(handle, false);
                self.selected = None;
                self.pump_events();
                true
            }
            None => {
                self.selected = Some(handle);
                self.nodes.set_highlight(handle, true);
                true
            }
        }
    }

    pub fn begin_drag(&mut self, handle: Handle) {
        let Some(node) = self.nodes.get_mut(handle) else {
            return;
        };
        node.begin_drag();
        self.connections.set_tracking(handle, true, &self.nodes);
    }

    pub fn drag_to(&mut self, handle: Handle, pos: Vec2) {
        if let Some(node) = self.nodes.get_mut(handle) {
            if node.dragging() {
                node.set_position(pos);
            }
        }
    }

    /// End a drag. A node still overlapping a neighbor snaps back to
    /// where the drag began; its connections settle either way.
    pub fn end_drag(&mut self, handle: Handle) {
        let Some(node) = self.nodes.get_mut(handle) else {
            return;
        };
        if !node.dragging() {
            return;
        }
        if node.end_drag() {
            log::debug!("node {:?} blocked by overlap, snapped back", handle);
        }
        self.connections.set_tracking(handle, false, &self.nodes);
    }

    // -----------------------------------------------------------------
    // Overlap events (physics collaborator)
    // -----------------------------------------------------------------

    /// `handle` started overlapping `other`.
    ///
    /// During a drag this only counts neighbors for the snap-back
    /// check. Outside a drag, a newborn still inside its spawn-grace
    /// window gives way to the older node and retires itself.
    pub fn overlap_enter(&mut self, handle: Handle, other: Handle) {
        let Some(node) = self.nodes.get(handle) else {
            return;
        };
        let (dragging, in_grace, seq) = (node.dragging(), node.in_grace(), node.seq());

        if dragging {
            if let Some(node) = self.nodes.get_mut(handle) {
                node.overlap_enter();
            }
        } else if in_grace
            && self
                .nodes
                .get(other)
                .is_some_and(|o| seq > o.seq())
        {
            log::debug!("node {:?} spawned with no room, retiring", handle);
            self.nodes.disable(handle);
            self.pump_events();
        }
    }

    /// `handle` stopped overlapping `other`.
    pub fn overlap_exit(&mut self, handle: Handle, _other: Handle) {
        if let Some(node) = self.nodes.get_mut(handle) {
            if node.dragging() {
                node.overlap_exit();
            }
        }
    }

    // -----------------------------------------------------------------
    // Frame tick
    // -----------------------------------------------------------------

    /// Advance one frame: spawn-grace timers first, then endpoint
    /// refresh for connections tracking a dragged node.
    pub fn tick(&mut self, dt: f32) {
        self.nodes.tick(dt);
        self.connections.tick(&self.nodes);
    }

    // -----------------------------------------------------------------
    // Accessors (visual / input collaborators)
    // -----------------------------------------------------------------

    pub fn nodes(&self) -> &NodePool {
        &self.nodes
    }

    pub fn connections(&self) -> &ConnectionPool {
        &self.connections
    }

    pub fn selected(&self) -> Option<Handle> {
        self.selected
    }

    /// Hit test for the input collaborator. Later spawns draw on top,
    /// so the newest containing node wins.
    pub fn node_at(&self, pos: Vec2) -> Option<Handle> {
        let mut hit = None;
        for (handle, node) in self.nodes.iter() {
            if node.contains(pos) {
                hit = Some(handle);
            }
        }
        hit
    }

    /// Drain pool notifications and run the retirement cascade until
    /// quiescent. Called inside every mutating gesture so dependents
    /// never observe a half-applied transition.
    fn pump_events(&mut self) {
        loop {
            let events = self.nodes.drain_events();
            if events.is_empty() {
                break;
            }
            for event in events {
                if let PoolEvent::Disabled(node) = event {
                    let retired = self.connections.retire_for_node(node);
                    if retired > 0 {
                        log::debug!("retired {retired} connection(s) linked to {:?}", node);
                    }
                    if self.selected == Some(node) {
                        self.selected = None;
                    }
                }
            }
        }
        // Connection notifications have no dependents of their own.
        self.connections.drain_events();
    }
}

impl Default for Diagram {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{NODE_W, SPAWN_GRACE};

    fn spaced_pair(diagram: &mut Diagram) -> (Handle, Handle) {
        let a = diagram.click_canvas(Vec2::new(0.0, 0.0));
        let b = diagram.click_canvas(Vec2::new(500.0, 500.0));
        diagram.tick(SPAWN_GRACE * 2.0);
        (a, b)
    }

    #[test]
    fn two_selections_create_a_connection() {
        let mut diagram = Diagram::new();
        let (a, b) = spaced_pair(&mut diagram);

        assert!(diagram.select_node(a));
        assert_eq!(diagram.selected(), Some(a));
        assert!(diagram.nodes().get(a).unwrap().highlighted());

        assert!(diagram.select_node(b));
        assert!(diagram.connections().exists(ConnectionKey::new(a, b)));
        assert!(diagram.connections().exists(ConnectionKey::new(b, a)));
        assert_eq!(diagram.connections().active_count(), 1);
        assert_eq!(diagram.selected(), None);
        assert!(!diagram.nodes().get(a).unwrap().highlighted());
        assert!(!diagram.nodes().get(b).unwrap().highlighted());
    }

    #[test]
    fn same_node_twice_toggles_selection_off() {
        let mut diagram = Diagram::new();
        let (a, _) = spaced_pair(&mut diagram);

        assert!(diagram.select_node(a));
        assert!(!diagram.select_node(a));
        assert_eq!(diagram.selected(), None);
        assert!(!diagram.nodes().get(a).unwrap().highlighted());
        assert_eq!(diagram.connections().active_count(), 0);
    }

    #[test]
    fn existing_link_still_resolves_selection() {
        let mut diagram = Diagram::new();
        let (a, b) = spaced_pair(&mut diagram);
        diagram.select_node(a);
        diagram.select_node(b);

        // Second attempt on the same pair, reversed order.
        diagram.select_node(b);
        assert!(diagram.select_node(a));
        assert_eq!(diagram.connections().active_count(), 1);
        assert_eq!(diagram.selected(), None);
        assert!(!diagram.nodes().get(a).unwrap().highlighted());
        assert!(!diagram.nodes().get(b).unwrap().highlighted());
    }

    #[test]
    fn removing_a_node_cascades_its_connections() {
        let mut diagram = Diagram::new();
        let (a, b) = spaced_pair(&mut diagram);
        let c = diagram.click_canvas(Vec2::new(0.0, 500.0));
        diagram.select_node(a);
        diagram.select_node(b);
        diagram.select_node(b);
        diagram.select_node(c);
        assert_eq!(diagram.connections().active_count(), 2);

        assert!(diagram.remove_node(b));
        assert!(!diagram.connections().exists(ConnectionKey::new(a, b)));
        assert!(!diagram.connections().exists(ConnectionKey::new(b, c)));
        assert_eq!(diagram.connections().active_count(), 0);
        assert_eq!(diagram.connections().reserve_count(), 2);
        assert!(!diagram.nodes().is_active(b));

        // Idempotent: the node is already gone.
        assert!(!diagram.remove_node(b));
    }

    #[test]
    fn disabling_the_selected_node_clears_selection() {
        let mut diagram = Diagram::new();
        let (a, b) = spaced_pair(&mut diagram);
        diagram.select_node(a);
        diagram.remove_node(a);
        assert_eq!(diagram.selected(), None);

        // The next selection starts a fresh pair, not a link to the
        // dead node.
        assert!(diagram.select_node(b));
        assert_eq!(diagram.selected(), Some(b));
        assert_eq!(diagram.connections().active_count(), 0);
    }

    #[test]
    fn selecting_a_retired_node_is_a_no_op() {
        let mut diagram = Diagram::new();
        let (a, _) = spaced_pair(&mut diagram);
        diagram.remove_node(a);
        assert!(!diagram.select_node(a));
        assert_eq!(diagram.selected(), None);
    }

    #[test]
    fn newborn_overlap_retires_only_the_newcomer() {
        let mut diagram = Diagram::new();
        let a = diagram.click_canvas(Vec2::new(100.0, 100.0));
        let b = diagram.click_canvas(Vec2::new(110.0, 105.0));

        // Physics reports the overlap to both members of the pair.
        diagram.overlap_enter(a, b);
        diagram.overlap_enter(b, a);
        assert!(diagram.nodes().is_active(a));
        assert!(!diagram.nodes().is_active(b));
    }

    #[test]
    fn overlap_after_grace_window_is_ignored() {
        let mut diagram = Diagram::new();
        let a = diagram.click_canvas(Vec2::new(100.0, 100.0));
        let b = diagram.click_canvas(Vec2::new(110.0, 105.0));
        diagram.tick(SPAWN_GRACE * 2.0);

        diagram.overlap_enter(b, a);
        assert!(diagram.nodes().is_active(a));
        assert!(diagram.nodes().is_active(b));
    }

    #[test]
    fn blocked_drag_snaps_back_and_settles_lines() {
        let mut diagram = Diagram::new();
        let (a, b) = spaced_pair(&mut diagram);
        diagram.select_node(a);
        diagram.select_node(b);
        let key = ConnectionKey::new(a, b);
        let start = diagram.nodes().get(a).unwrap().pos();

        diagram.begin_drag(a);
        diagram.drag_to(a, Vec2::new(480.0, 480.0));
        diagram.tick(1.0 / 60.0);
        let (_, conn) = diagram.connections().try_get(key).unwrap();
        assert!(conn.tracking());
        assert_eq!(conn.endpoints()[0], Vec2::new(480.0, 480.0));

        diagram.overlap_enter(a, b);
        diagram.end_drag(a);
        assert_eq!(diagram.nodes().get(a).unwrap().pos(), start);
        let (_, conn) = diagram.connections().try_get(key).unwrap();
        assert!(!conn.tracking());
        assert_eq!(conn.endpoints()[0], start);
    }

    #[test]
    fn clean_drag_keeps_position_and_updates_lines() {
        let mut diagram = Diagram::new();
        let (a, b) = spaced_pair(&mut diagram);
        diagram.select_node(a);
        diagram.select_node(b);
        let key = ConnectionKey::new(a, b);

        diagram.begin_drag(a);
        diagram.overlap_enter(a, b);
        diagram.overlap_exit(a, b);
        diagram.drag_to(a, Vec2::new(200.0, 0.0));
        diagram.end_drag(a);

        assert_eq!(diagram.nodes().get(a).unwrap().pos(), Vec2::new(200.0, 0.0));
        let (_, conn) = diagram.connections().try_get(key).unwrap();
        assert_eq!(conn.endpoints()[0], Vec2::new(200.0, 0.0));
    }

    #[test]
    fn retired_slots_are_recycled_for_new_links() {
        let mut diagram = Diagram::new();
        let (a, b) = spaced_pair(&mut diagram);
        diagram.select_node(a);
        diagram.select_node(b);
        diagram.remove_node(b);
        assert_eq!(diagram.connections().reserve_count(), 1);

        let c = diagram.click_canvas(Vec2::new(500.0, 0.0));
        diagram.tick(SPAWN_GRACE * 2.0);
        diagram.select_node(a);
        diagram.select_node(c);
        assert!(diagram.connections().exists(ConnectionKey::new(a, c)));
        assert_eq!(diagram.connections().total_created(), 1);
        assert_eq!(diagram.connections().reserve_count(), 0);
    }

    #[test]
    fn node_at_prefers_the_newest_node() {
        let mut diagram = Diagram::new();
        let a = diagram.click_canvas(Vec2::new(100.0, 100.0));
        let b = diagram.click_canvas(Vec2::new(100.0 + NODE_W / 2.0, 100.0));

        // The overlap strip belongs to the later spawn.
        assert_eq!(
            diagram.node_at(Vec2::new(100.0 + NODE_W / 4.0, 100.0)),
            Some(b)
        );
        assert_eq!(diagram.node_at(Vec2::new(60.0, 100.0)), Some(a));
        assert_eq!(diagram.node_at(Vec2::new(2000.0, 2000.0)), None);
    }
}
