use glam::Vec2;

use crate::diagram::Diagram;
use crate::pool::Handle;

/// Simulation tick length for the scripted session (60 Hz).
const TICK: f32 = 1.0 / 60.0;
/// Ticks to run after a spawn burst so grace windows expire.
const SETTLE_TICKS: u32 = 12;

/// Tracks which node pairs currently overlap so enter and exit events
/// fire once per edge, the way a physics engine reports triggers.
/// This is the headless stand-in for the out-of-scope physics
/// collaborator.
struct OverlapSweep {
    pairs: Vec<(Handle, Handle)>,
}

impl OverlapSweep {
    fn new() -> Self {
        Self { pairs: Vec::new() }
    }

    fn sweep(&mut self, diagram: &mut Diagram) {
        let mut current: Vec<(Handle, Handle)> = Vec::new();
        for (ha, na) in diagram.nodes().iter() {
            for (hb, nb) in diagram.nodes().iter() {
                if ha.index() < hb.index() && na.overlaps_node(nb) {
                    current.push((ha, hb));
                }
            }
        }

        for &(a, b) in &current {
            if !self.pairs.contains(&(a, b)) {
                diagram.overlap_enter(a, b);
                diagram.overlap_enter(b, a);
            }
        }
        for &(a, b) in &self.pairs {
            if !current.contains(&(a, b)) {
                diagram.overlap_exit(a, b);
                diagram.overlap_exit(b, a);
            }
        }
        self.pairs = current;
    }
}

fn step(diagram: &mut Diagram, sweep: &mut OverlapSweep, ticks: u32) {
    for _ in 0..ticks {
        diagram.tick(TICK);
        sweep.sweep(diagram);
    }
}

fn log_state(diagram: &Diagram, label: &str) {
    log::info!(
        "{label}: nodes {} active / {} reserve, connections {} active / {} reserve, selection {:?}",
        diagram.nodes().active_count(),
        diagram.nodes().reserve_count(),
        diagram.connections().active_count(),
        diagram.connections().reserve_count(),
        diagram.selected(),
    );
}

/// Drive a scripted session through every gesture path: spawn, a
/// crowded spawn that gives way, linking, dragging with and without
/// room, deletion with its cascade, and slot reuse afterwards.
pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut diagram = Diagram::new();
    let mut sweep = OverlapSweep::new();

    let a = diagram.click_canvas(Vec2::new(100.0, 100.0));
    let b = diagram.click_canvas(Vec2::new(400.0, 150.0));
    let c = diagram.click_canvas(Vec2::new(250.0, 400.0));
    step(&mut diagram, &mut sweep, SETTLE_TICKS);
    log_state(&diagram, "spawned");

    // A click right on top of an existing node spawns a rectangle with
    // no room; the newborn retires itself on the first overlap report.
    let crowded = diagram.click_canvas(Vec2::new(110.0, 105.0));
    sweep.sweep(&mut diagram);
    log::info!(
        "crowded spawn survived: {}",
        diagram.nodes().is_active(crowded)
    );
    step(&mut diagram, &mut sweep, SETTLE_TICKS);

    // Link a-b and b-c with right-click pairs.
    diagram.select_node(a);
    diagram.select_node(b);
    diagram.select_node(b);
    diagram.select_node(c);
    for (_, conn) in diagram.connections().iter() {
        let [from, to] = conn.endpoints();
        log::info!("line {from} -> {to}");
    }
    log_state(&diagram, "linked");

    // Drag b to the right; both of its lines track the move.
    diagram.begin_drag(b);
    for i in 1..=30 {
        diagram.drag_to(b, Vec2::new(400.0 + i as f32 * 5.0, 150.0));
        step(&mut diagram, &mut sweep, 1);
    }
    diagram.end_drag(b);
    if let Some(pos) = diagram.nodes().position(b) {
        log::info!("b settled at {pos}");
    }

    // Drag c onto a; the drop is blocked and c snaps back.
    let c_home = diagram.nodes().position(c).expect("node c is active");
    diagram.begin_drag(c);
    for i in 1..=30 {
        let pos = c_home.lerp(Vec2::new(100.0, 100.0), i as f32 / 30.0);
        diagram.drag_to(c, pos);
        step(&mut diagram, &mut sweep, 1);
    }
    diagram.end_drag(c);
    step(&mut diagram, &mut sweep, 1);
    if let Some(pos) = diagram.nodes().position(c) {
        log::info!("c settled at {pos}");
    }

    // Double primary click at b's position deletes it; its two lines
    // cascade into reserve before the click returns.
    if let Some(hit) = diagram.nodes().position(b).and_then(|pos| diagram.node_at(pos)) {
        diagram.remove_node(hit);
    }
    log_state(&diagram, "deleted b");

    // New work reuses the retired slots instead of allocating.
    let d = diagram.click_canvas(Vec2::new(500.0, 500.0));
    step(&mut diagram, &mut sweep, SETTLE_TICKS);
    diagram.select_node(a);
    diagram.select_node(d);
    log_state(&diagram, "relinked");
    log::info!(
        "lifetime allocations: {} nodes, {} connections",
        diagram.nodes().total_created(),
        diagram.connections().total_created(),
    );

    Ok(())
}
