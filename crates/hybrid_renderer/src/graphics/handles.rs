//! Generational resource handles and the tables that own what they point to
//!
//! Handles are `slotmap` keys: a stale handle to a destroyed resource is
//! rejected instead of aliasing whatever reused the slot. Destruction is
//! two-phase. [`ResourceTable::retire`] unlinks the handle immediately and
//! parks the resource on the ring slot that was recording; the resource is
//! only dropped by [`ResourceTable::collect`] once that slot's fence has
//! signalled again.

use slotmap::SlotMap;

use super::error::{RenderError, RenderResult};
use super::limits::GraphicsLimits;

slotmap::new_key_type! {
    /// Handle to a texture
    pub struct TextureHandle;
    /// Handle to a mesh
    pub struct MeshHandle;
    /// Handle to a material
    pub struct MaterialHandle;
    /// Handle to a baked environment
    pub struct EnvironmentHandle;
    /// Handle to a viewport and its intermediate images
    pub struct ViewportHandle;
}

/// Owner of one kind of backend resource
pub struct ResourceTable<K: slotmap::Key, T> {
    kind: &'static str,
    live: SlotMap<K, T>,
    retired: [Vec<T>; GraphicsLimits::COMMAND_RING_SIZE],
}

impl<K: slotmap::Key, T> ResourceTable<K, T> {
    /// Create an empty table; `kind` names the resource in errors
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            live: SlotMap::with_key(),
            retired: Default::default(),
        }
    }

    /// Store a resource and hand out its handle
    pub fn insert(&mut self, value: T) -> K {
        self.live.insert(value)
    }

    /// Look up a live resource
    pub fn get(&self, key: K) -> RenderResult<&T> {
        self.live
            .get(key)
            .ok_or(RenderError::ResourceNotFound { kind: self.kind })
    }

    /// Look up a live resource mutably
    pub fn get_mut(&mut self, key: K) -> RenderResult<&mut T> {
        self.live
            .get_mut(key)
            .ok_or(RenderError::ResourceNotFound { kind: self.kind })
    }

    /// Whether `key` still refers to a live resource
    pub fn contains(&self, key: K) -> bool {
        self.live.contains_key(key)
    }

    /// Invalidate `key` and defer the drop to the given ring slot
    pub fn retire(&mut self, key: K, ring_slot: usize) -> RenderResult<()> {
        let value = self
            .live
            .remove(key)
            .ok_or(RenderError::ResourceNotFound { kind: self.kind })?;
        self.retired[ring_slot % GraphicsLimits::COMMAND_RING_SIZE].push(value);
        Ok(())
    }

    /// Drop everything parked on `ring_slot`, returning how many were dropped
    pub fn collect(&mut self, ring_slot: usize) -> usize {
        let parked = std::mem::take(&mut self.retired[ring_slot % GraphicsLimits::COMMAND_RING_SIZE]);
        let count = parked.len();
        if count > 0 {
            log::debug!("Dropping {} retired {}(s)", count, self.kind);
        }
        count
    }

    /// Drop every retired resource, used after a full GPU wait
    pub fn collect_all(&mut self) -> usize {
        (0..GraphicsLimits::COMMAND_RING_SIZE).map(|slot| self.collect(slot)).sum()
    }

    /// Number of live resources
    pub fn len(&self) -> usize {
        self.live.len()
    }

    /// Whether no live resources remain
    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Number of resources waiting for their frame boundary
    pub fn retired_len(&self) -> usize {
        self.retired.iter().map(Vec::len).sum()
    }

    /// Iterate over live resources
    pub fn iter(&self) -> impl Iterator<Item = (K, &T)> {
        self.live.iter()
    }

    /// Drop everything, live and retired
    pub fn clear(&mut self) {
        self.live.clear();
        self.collect_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    struct DropCounter(Rc<Cell<usize>>);

    impl Drop for DropCounter {
        fn drop(&mut self) {
            self.0.set(self.0.get() + 1);
        }
    }

    #[test]
    fn test_retired_handle_is_rejected_immediately() {
        let mut table: ResourceTable<TextureHandle, u32> = ResourceTable::new("texture");
        let handle = table.insert(7);
        table.retire(handle, 0).unwrap();

        assert!(matches!(
            table.get(handle),
            Err(RenderError::ResourceNotFound { kind: "texture" })
        ));
        assert!(table.retire(handle, 0).is_err(), "double destroy must fail");
    }

    #[test]
    fn test_retired_resource_drops_only_at_its_slot_boundary() {
        let drops = Rc::new(Cell::new(0));
        let mut table: ResourceTable<MeshHandle, DropCounter> = ResourceTable::new("mesh");
        let handle = table.insert(DropCounter(drops.clone()));

        table.retire(handle, 1).unwrap();
        assert_eq!(drops.get(), 0, "retire must not drop");
        assert_eq!(table.retired_len(), 1);

        assert_eq!(table.collect(2), 0);
        assert_eq!(drops.get(), 0, "other slots leave it alone");

        assert_eq!(table.collect(1), 1);
        assert_eq!(drops.get(), 1);
        assert_eq!(table.retired_len(), 0);
    }

    #[test]
    fn test_reused_slot_does_not_alias_stale_handle() {
        let mut table: ResourceTable<MaterialHandle, &str> = ResourceTable::new("material");
        let first = table.insert("first");
        table.retire(first, 0).unwrap();
        let second = table.insert("second");

        assert_ne!(first, second);
        assert!(table.get(first).is_err());
        assert_eq!(*table.get(second).unwrap(), "second");
    }
}
