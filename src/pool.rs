use crate::events::{EventQueue, PoolEvent};

/// Capability implemented by every recyclable entity.
///
/// `enable` receives the creation parameters and reports success. A
/// `false` return means the parameters were rejected and the entity
/// stays retired; the pool does not retry. `key` exposes the lookup
/// key the entity is indexed by while active. Entities addressed
/// purely by identity return `None` and are never found by key scans.
pub trait PoolObject: Default {
    type Params;
    type Key: PartialEq + Copy;

    fn enable(&mut self, params: Self::Params) -> bool;
    fn disable(&mut self);
    fn is_enabled(&self) -> bool;
    fn key(&self) -> Option<Self::Key>;
}

/// Identity of a pooled entity.
///
/// The generation guards against stale handles: a slot's generation
/// bumps every time the entity retires, so handles held across a
/// recycle miss all lookups instead of aliasing the new occupant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle {
    index: u32,
    generation: u32,
}

impl Handle {
    pub fn index(self) -> usize {
        self.index as usize
    }
}

struct Slot<T> {
    obj: T,
    generation: u32,
}

/// Generic object pool: a slot arena split into an ordered active list
/// and a LIFO reserve stack.
///
/// Entities are constructed at most once and never dropped. Disabling
/// moves the slot to reserve; the next `instantiate` reuses the most
/// recently retired slot before constructing anything new. Lookups are
/// linear scans of the active list, which is fine at diagram scale.
pub struct Pool<T: PoolObject> {
    slots: Vec<Slot<T>>,
    active: Vec<u32>,
    reserve: Vec<u32>,
    events: EventQueue<PoolEvent>,
}

impl<T: PoolObject> Pool<T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            active: Vec::new(),
            reserve: Vec::new(),
            events: EventQueue::new(),
        }
    }

    /// Create or recycle an entity and enable it with `params`.
    ///
    /// Returns `None` when the entity rejects the parameters; in that
    /// case the active and reserve sets are left unchanged (a popped
    /// reserve slot goes straight back, a fresh construction is never
    /// registered).
    pub fn instantiate(&mut self, params: T::Params) -> Option<Handle> {
        if let Some(index) = self.reserve.pop() {
            let slot = &mut self.slots[index as usize];
            if !slot.obj.enable(params) {
                self.reserve.push(index);
                return None;
            }
            self.active.push(index);
            let handle = Handle {
                index,
                generation: slot.generation,
            };
            self.events.push(PoolEvent::Enabled(handle));
            Some(handle)
        } else {
            let mut obj = T::default();
            if !obj.enable(params) {
                return None;
            }
            let index = self.slots.len() as u32;
            self.slots.push(Slot { obj, generation: 0 });
            self.active.push(index);
            let handle = Handle {
                index,
                generation: 0,
            };
            self.events.push(PoolEvent::Enabled(handle));
            Some(handle)
        }
    }

    /// Generation-checked access. `None` for retired or stale handles.
    pub fn get(&self, handle: Handle) -> Option<&T> {
        let slot = self.slots.get(handle.index as usize)?;
        (slot.generation == handle.generation).then_some(&slot.obj)
    }

    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut T> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        (slot.generation == handle.generation).then_some(&mut slot.obj)
    }

    /// First active entity whose key matches, in active-set order.
    /// Absence is a normal outcome, not an error.
    pub fn try_get(&self, key: T::Key) -> Option<(Handle, &T)> {
        self.active.iter().find_map(|&index| {
            let slot = &self.slots[index as usize];
            (slot.obj.key() == Some(key)).then(|| {
                let handle = Handle {
                    index,
                    generation: slot.generation,
                };
                (handle, &slot.obj)
            })
        })
    }

    pub fn exists(&self, key: T::Key) -> bool {
        self.try_get(key).is_some()
    }

    /// Disable the entity behind `handle` and move it to reserve.
    /// Silent no-op (returns false) when the handle is stale or the
    /// entity is not active, so duplicate retire requests are safe.
    pub fn disable(&mut self, handle: Handle) -> bool {
        if self.get(handle).is_none() {
            return false;
        }
        let Some(pos) = self.active.iter().position(|&ix| ix == handle.index) else {
            return false;
        };
        self.retire_at(pos);
        true
    }

    /// Key-addressed variant of `disable`.
    pub fn disable_by_key(&mut self, key: T::Key) -> bool {
        let Some(pos) = self
            .active
            .iter()
            .position(|&ix| self.slots[ix as usize].obj.key() == Some(key))
        else {
            return false;
        };
        self.retire_at(pos);
        true
    }

    fn retire_at(&mut self, pos: usize) {
        let index = self.active.remove(pos);
        let slot = &mut self.slots[index as usize];
        let handle = Handle {
            index,
            generation: slot.generation,
        };
        slot.obj.disable();
        slot.generation = slot.generation.wrapping_add(1);
        self.reserve.push(index);
        self.events.push(PoolEvent::Disabled(handle));
    }

    /// Iterate active entities in insertion order.
    pub fn iter_active(&self) -> impl Iterator<Item = (Handle, &T)> {
        self.active.iter().map(|&index| {
            let slot = &self.slots[index as usize];
            let handle = Handle {
                index,
                generation: slot.generation,
            };
            (handle, &slot.obj)
        })
    }

    /// Visit active entities mutably in insertion order.
    pub fn for_each_active_mut(&mut self, mut f: impl FnMut(Handle, &mut T)) {
        for i in 0..self.active.len() {
            let index = self.active[i];
            let slot = &mut self.slots[index as usize];
            let handle = Handle {
                index,
                generation: slot.generation,
            };
            f(handle, &mut slot.obj);
        }
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn reserve_count(&self) -> usize {
        self.reserve.len()
    }

    /// Physical entities ever constructed. Monotonic; the accounting
    /// invariant is `active_count + reserve_count == total_created`.
    pub fn total_created(&self) -> usize {
        self.slots.len()
    }

    /// Take pending state-change notifications, oldest first.
    pub fn drain_events(&mut self) -> Vec<PoolEvent> {
        self.events.take()
    }
}

impl<T: PoolObject> Default for Pool<T> {
    fn default() -> Self {
        Self::new()
    }
}
