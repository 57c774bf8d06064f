//! Compilation Cache
//!
//! Arena of named types for one compilation. A name is reserved as
//! [`Slot::Pending`] before anything beneath it is compiled; the slot index is
//! the [`TypeId`] every `Named` link points at.

use indexmap::IndexMap;
use serde::Serialize;

use crate::types::{CompiledType, TypeId};

/// State of a named cache entry
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Slot {
    /// Reserved; construction in progress
    Pending,
    Ready(CompiledType),
}

impl Slot {
    pub fn ready(&self) -> Option<&CompiledType> {
        match self {
            Self::Ready(ty) => Some(ty),
            Self::Pending => None,
        }
    }
}

/// Per-request table of named types
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct CompilationCache {
    slots: IndexMap<String, Slot>,
}

impl CompilationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.slots.contains_key(name)
    }

    /// Reserve `name` as pending; an existing entry is left untouched
    pub fn reserve(&mut self, name: &str) -> TypeId {
        if let Some(index) = self.slots.get_index_of(name) {
            return TypeId(index);
        }
        let (index, _) = self.slots.insert_full(name.to_string(), Slot::Pending);
        TypeId(index)
    }

    /// Store a finished type under `name`, replacing its pending slot
    pub fn store(&mut self, name: &str, ty: CompiledType) -> TypeId {
        let (index, _) = self.slots.insert_full(name.to_string(), Slot::Ready(ty));
        TypeId(index)
    }

    pub fn lookup(&self, name: &str) -> Option<(TypeId, &Slot)> {
        self.slots
            .get_full(name)
            .map(|(index, _, slot)| (TypeId(index), slot))
    }

    pub fn id_of(&self, name: &str) -> Option<TypeId> {
        self.slots.get_index_of(name).map(TypeId)
    }

    pub fn name_of(&self, id: TypeId) -> Option<&str> {
        self.slots.get_index(id.0).map(|(name, _)| name.as_str())
    }

    pub fn is_pending(&self, name: &str) -> bool {
        matches!(self.slots.get(name), Some(Slot::Pending))
    }

    pub fn get(&self, name: &str) -> Option<&CompiledType> {
        self.slots.get(name).and_then(Slot::ready)
    }

    pub fn get_by_id(&self, id: TypeId) -> Option<&CompiledType> {
        self.slots.get_index(id.0).and_then(|(_, slot)| slot.ready())
    }

    /// Names still reserved but never stored
    pub fn pending_names(&self) -> impl Iterator<Item = &str> {
        self.slots
            .iter()
            .filter(|(_, slot)| matches!(slot, Slot::Pending))
            .map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (TypeId, &str, &Slot)> {
        self.slots
            .iter()
            .enumerate()
            .map(|(index, (name, slot))| (TypeId(index), name.as_str(), slot))
    }

    pub(crate) fn slots_mut(&mut self) -> impl Iterator<Item = (&str, &mut Slot)> {
        self.slots.iter_mut().map(|(name, slot)| (name.as_str(), slot))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PrimitiveKind;

    #[test]
    fn test_reserve_is_idempotent() {
        let mut cache = CompilationCache::new();
        let a = cache.reserve("Node");
        let b = cache.reserve("Node");
        assert_eq!(a, b);
        assert!(cache.is_pending("Node"));
        assert_eq!(cache.pending_names().collect::<Vec<_>>(), vec!["Node"]);
    }

    #[test]
    fn test_store_keeps_slot_index() {
        let mut cache = CompilationCache::new();
        let first = cache.reserve("A");
        cache.reserve("B");
        let stored = cache.store("A", CompiledType::primitive(PrimitiveKind::Integer));
        assert_eq!(first, stored);
        assert_eq!(cache.name_of(first), Some("A"));
        assert!(cache.get_by_id(first).is_some());
        assert!(cache.get("B").is_none());
    }
}
