//! Interactive 2D diagramming toy built around a recycling object
//! pool: click to spawn rectangle nodes, drag to arrange them, and
//! right-click pairs to link them with lines. Entities are allocated
//! at most once and shuttle between an active set and a reserve held
//! for reuse.

pub mod app;
pub mod connection;
pub mod diagram;
pub mod events;
pub mod node;
pub mod pool;
