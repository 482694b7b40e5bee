use crate::registry::{HandleRegistry, RegistryId, WrapEntry};
use crate::{BindError, InheritanceLink, NativePtr, TypeIdentity};
use ahash::AHashMap;
use tracing::{debug, trace};
use vm_js::{GcObject, Heap, VmError};

/// Every [`HandleRegistry`] of one runtime, keyed by type.
#[derive(Default)]
pub struct RegistryPool {
  registries: AHashMap<TypeIdentity, HandleRegistry>,
  by_id: AHashMap<RegistryId, TypeIdentity>,
}

impl RegistryPool {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn len(&self) -> usize {
    self.registries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.registries.is_empty()
  }

  pub fn contains(&self, ty: TypeIdentity) -> bool {
    self.registries.contains_key(&ty)
  }

  pub fn get(&self, ty: TypeIdentity) -> Option<&HandleRegistry> {
    self.registries.get(&ty)
  }

  pub fn get_mut(&mut self, ty: TypeIdentity) -> Option<&mut HandleRegistry> {
    self.registries.get_mut(&ty)
  }

  /// Returns the registry of `ty`, creating it (and its host template) on first use.
  pub fn get_or_create(&mut self, heap: &mut Heap, ty: TypeIdentity) -> &mut HandleRegistry {
    let by_id = &mut self.by_id;
    self.registries.entry(ty).or_insert_with(|| {
      let template = heap.alloc_template(ty.name());
      let registry = HandleRegistry::new(ty, template);
      by_id.insert(registry.id(), ty);
      debug!(
        type_name = ty.name(),
        registry = registry.id().get(),
        "created handle registry"
      );
      registry
    })
  }

  /// Maps a registry id read from a wrapper's host slot back to its type.
  pub fn type_for(&self, id: RegistryId) -> Option<TypeIdentity> {
    self.by_id.get(&id).copied()
  }

  pub fn types(&self) -> impl Iterator<Item = TypeIdentity> + '_ {
    self.registries.keys().copied()
  }

  /// Whether `ancestor` appears on the base chain of `ty`.
  pub fn is_derived_from(&self, ty: TypeIdentity, ancestor: TypeIdentity) -> bool {
    let mut current = ty;
    while let Some(link) = self.base_link(current) {
      if link.base == ancestor {
        return true;
      }
      current = link.base;
    }
    false
  }

  pub(crate) fn base_link(&self, ty: TypeIdentity) -> Option<InheritanceLink> {
    self.registries.get(&ty).and_then(|registry| registry.base()).copied()
  }

  pub(crate) fn take(&mut self, ty: TypeIdentity) -> Option<HandleRegistry> {
    let registry = self.registries.remove(&ty)?;
    self.by_id.remove(&registry.id());
    Some(registry)
  }

  pub(crate) fn clear(&mut self) {
    self.registries.clear();
    self.by_id.clear();
  }

  /// Looks `ptr` up in `ty` and then depth-first through the registries derived from it, adjusting
  /// the address along each derived edge.
  pub(crate) fn search_derived(
    &self,
    heap: &Heap,
    ty: TypeIdentity,
    ptr: NativePtr,
  ) -> Result<Option<GcObject>, BindError> {
    let Some(registry) = self.registries.get(&ty) else {
      return Ok(None);
    };
    if let Some(entry) = registry.entry(ptr) {
      return live_handle(heap, entry).map(Some);
    }
    for &derived in registry.derived() {
      let Some(link) = self.base_link(derived) else {
        continue;
      };
      let derived_ptr = link.adjust.to_this(ptr);
      trace!(
        from = ty.name(),
        to = derived.name(),
        %ptr,
        %derived_ptr,
        "searching derived registry"
      );
      if let Some(obj) = self.search_derived(heap, derived, derived_ptr)? {
        return Ok(Some(obj));
      }
    }
    Ok(None)
  }

  /// Walks up the base chain of `ty`, checking only the direct entries of each ancestor.
  pub(crate) fn search_bases(
    &self,
    heap: &Heap,
    ty: TypeIdentity,
    ptr: NativePtr,
  ) -> Result<Option<GcObject>, BindError> {
    let mut current = ty;
    let mut ptr = ptr;
    while let Some(link) = self.base_link(current) {
      ptr = link.adjust.to_base(ptr);
      current = link.base;
      trace!(to = current.name(), %ptr, "searching base registry");
      if let Some(entry) = self.registries.get(&current).and_then(|r| r.entry(ptr)) {
        return live_handle(heap, entry).map(Some);
      }
    }
    Ok(None)
  }

  /// Converts the address of a `stored` object into the address of its `declared` view.
  ///
  /// Returns `None` when neither type is an ancestor of the other.
  pub(crate) fn convert(
    &self,
    stored: TypeIdentity,
    declared: TypeIdentity,
    ptr: NativePtr,
  ) -> Option<NativePtr> {
    if stored == declared {
      return Some(ptr);
    }

    // Upcast.
    let mut current = stored;
    let mut up = ptr;
    while let Some(link) = self.base_link(current) {
      up = link.adjust.to_base(up);
      current = link.base;
      if current == declared {
        return Some(up);
      }
    }

    // Downcast: collect the edges from `declared` up to `stored`, then apply them top-down.
    let mut chain = Vec::new();
    let mut current = declared;
    while let Some(link) = self.base_link(current) {
      chain.push(link);
      current = link.base;
      if current == stored {
        return Some(
          chain
            .iter()
            .rev()
            .fold(ptr, |down, link| link.adjust.to_this(down)),
        );
      }
    }
    None
  }
}

fn live_handle(heap: &Heap, entry: &WrapEntry) -> Result<GcObject, BindError> {
  entry
    .handle
    .upgrade(heap)
    .ok_or(BindError::Vm(VmError::InvalidHandle))
}
