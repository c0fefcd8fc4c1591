use std::collections::HashMap;

use super::{Primitive, PrimitiveId};

/// Owner of all primitives of a scene, addressed by [`PrimitiveId`].
#[derive(Debug, Default, Clone)]
pub struct PrimitiveArena {
    primitives: Vec<Primitive>,
    index: HashMap<PrimitiveId, usize>,
}

impl PrimitiveArena {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `primitive`; `None` if its ID is already taken.
    pub fn insert(&mut self, primitive: Primitive) -> Option<PrimitiveId> {
        let id = primitive.id();
        if self.index.contains_key(&id) {
            return None;
        }
        self.index.insert(id, self.primitives.len());
        self.primitives.push(primitive);
        Some(id)
    }

    pub fn remove(&mut self, id: PrimitiveId) -> Option<Primitive> {
        let slot = self.index.remove(&id)?;
        let primitive = self.primitives.swap_remove(slot);
        if let Some(moved) = self.primitives.get(slot) {
            self.index.insert(moved.id(), slot);
        }
        Some(primitive)
    }

    #[must_use]
    pub fn get(&self, id: PrimitiveId) -> Option<&Primitive> {
        self.index.get(&id).map(|&slot| &self.primitives[slot])
    }

    pub fn get_mut(&mut self, id: PrimitiveId) -> Option<&mut Primitive> {
        let slot = *self.index.get(&id)?;
        self.primitives.get_mut(slot)
    }

    #[must_use]
    pub fn contains(&self, id: PrimitiveId) -> bool {
        self.index.contains_key(&id)
    }

    /// All primitives in storage order, which is not insertion order after removals.
    pub fn iter(&self) -> impl Iterator<Item = &Primitive> {
        self.primitives.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Primitive> {
        self.primitives.iter_mut()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.primitives.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.primitives.is_empty()
    }

    pub fn clear(&mut self) {
        self.primitives.clear();
        self.index.clear();
    }
}
