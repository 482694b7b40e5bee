use crate::{BindError, InheritanceLink, NativePtr, Ownership, Runtime, TypeIdentity};
use ahash::AHashMap;
use core::sync::atomic::{AtomicU64, Ordering};
use std::rc::Rc;
use vm_js::{TemplateId, Value, WeakGcObject};

/// Hook that creates a native object from host arguments. It may freely re-enter the runtime.
pub type ConstructorFn = Rc<dyn Fn(&mut Runtime, &[Value]) -> Result<NativePtr, BindError>>;

/// Hook that destroys an exclusively owned native object.
pub type DestructorFn = Rc<dyn Fn(NativePtr)>;

/// Process-unique id of a registry, stored in the second host slot of every wrapper it creates.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct RegistryId(u64);

static NEXT_REGISTRY_ID: AtomicU64 = AtomicU64::new(1);

impl RegistryId {
  fn next() -> Self {
    Self(NEXT_REGISTRY_ID.fetch_add(1, Ordering::Relaxed))
  }

  #[inline]
  pub fn get(self) -> u64 {
    self.0
  }

  pub(crate) fn from_slot(slot: u64) -> Self {
    Self(slot)
  }
}

pub(crate) struct WrapEntry {
  pub(crate) handle: WeakGcObject,
  pub(crate) ownership: Ownership,
  /// Resolved when the entry is created; only exclusive entries carry one.
  pub(crate) destructor: Option<DestructorFn>,
}

/// Per-type wrapper registry: native address to host handle, plus the type's hooks, flags, and
/// inheritance edges.
pub struct HandleRegistry {
  id: RegistryId,
  ty: TypeIdentity,
  template: TemplateId,
  entries: AHashMap<NativePtr, WrapEntry>,
  constructor: Option<ConstructorFn>,
  constructed_destructor: Option<DestructorFn>,
  destructor: Option<DestructorFn>,
  auto_wrap: bool,
  pointer_auto_wrap: bool,
  base: Option<InheritanceLink>,
  derived: Vec<TypeIdentity>,
}

impl HandleRegistry {
  pub(crate) fn new(ty: TypeIdentity, template: TemplateId) -> Self {
    Self {
      id: RegistryId::next(),
      ty,
      template,
      entries: AHashMap::new(),
      constructor: None,
      constructed_destructor: None,
      destructor: None,
      auto_wrap: false,
      pointer_auto_wrap: false,
      base: None,
      derived: Vec::new(),
    }
  }

  #[inline]
  pub fn id(&self) -> RegistryId {
    self.id
  }

  #[inline]
  pub fn type_identity(&self) -> TypeIdentity {
    self.ty
  }

  /// The host template every wrapper of this type is instantiated from.
  #[inline]
  pub fn template(&self) -> TemplateId {
    self.template
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  /// Whether `ptr` is wrapped directly by this registry.
  pub fn contains(&self, ptr: NativePtr) -> bool {
    self.entries.contains_key(&ptr)
  }

  pub fn handle(&self, ptr: NativePtr) -> Option<WeakGcObject> {
    self.entries.get(&ptr).map(|entry| entry.handle)
  }

  pub fn ownership(&self, ptr: NativePtr) -> Option<&Ownership> {
    self.entries.get(&ptr).map(|entry| &entry.ownership)
  }

  pub fn addresses(&self) -> impl Iterator<Item = NativePtr> + '_ {
    self.entries.keys().copied()
  }

  pub fn base(&self) -> Option<&InheritanceLink> {
    self.base.as_ref()
  }

  /// Registries that declared this type as their base, in registration order.
  pub fn derived(&self) -> &[TypeIdentity] {
    &self.derived
  }

  /// Registers a constructor hook. Objects it returns are released with the destructor set by
  /// [`HandleRegistry::set_destructor`], if any.
  pub fn set_constructor(&mut self, constructor: ConstructorFn) {
    self.constructor = Some(constructor);
    self.constructed_destructor = None;
  }

  /// Registers a constructor hook together with the way to free the objects it allocates.
  pub(crate) fn set_owning_constructor(
    &mut self,
    constructor: ConstructorFn,
    destructor: DestructorFn,
  ) {
    self.constructor = Some(constructor);
    self.constructed_destructor = Some(destructor);
  }

  pub(crate) fn constructed_destructor(&self) -> Option<DestructorFn> {
    self.constructed_destructor.clone()
  }

  pub fn constructor(&self) -> Option<ConstructorFn> {
    self.constructor.clone()
  }

  /// Registers the destructor for exclusive entries wrapped from now on. It takes precedence over
  /// the allocator-specific release of [`wrap_object`](crate::wrap_object) and typed constructors.
  pub fn set_destructor(&mut self, destructor: DestructorFn) {
    self.destructor = Some(destructor);
  }

  pub fn destructor(&self) -> Option<DestructorFn> {
    self.destructor.clone()
  }

  /// Allows converting native values of this type to host values by copying them into a new
  /// exclusively owned wrapper.
  pub fn set_auto_wrap(&mut self, enabled: bool) {
    self.auto_wrap = enabled;
  }

  pub fn auto_wrap(&self) -> bool {
    self.auto_wrap
  }

  /// Allows converting unknown native pointers of this type to host values by wrapping them as
  /// borrowed.
  pub fn set_pointer_auto_wrap(&mut self, enabled: bool) {
    self.pointer_auto_wrap = enabled;
  }

  pub fn pointer_auto_wrap(&self) -> bool {
    self.pointer_auto_wrap
  }

  pub(crate) fn entry(&self, ptr: NativePtr) -> Option<&WrapEntry> {
    self.entries.get(&ptr)
  }

  pub(crate) fn entry_mut(&mut self, ptr: NativePtr) -> Option<&mut WrapEntry> {
    self.entries.get_mut(&ptr)
  }

  pub(crate) fn insert(&mut self, ptr: NativePtr, entry: WrapEntry) -> Result<(), BindError> {
    if self.entries.contains_key(&ptr) {
      return Err(BindError::AlreadyWrapped {
        type_name: self.ty.name(),
        ptr,
      });
    }
    self.entries.insert(ptr, entry);
    Ok(())
  }

  pub(crate) fn take(&mut self, ptr: NativePtr) -> Result<WrapEntry, BindError> {
    self.entries.remove(&ptr).ok_or(BindError::NotManaged {
      type_name: self.ty.name(),
      ptr,
    })
  }

  pub(crate) fn drain(&mut self) -> Vec<(NativePtr, WrapEntry)> {
    self.entries.drain().collect()
  }

  pub(crate) fn set_base_link(&mut self, link: InheritanceLink) {
    debug_assert!(self.base.is_none());
    self.base = Some(link);
  }

  pub(crate) fn clear_base_link(&mut self) {
    self.base = None;
  }

  pub(crate) fn push_derived(&mut self, ty: TypeIdentity) {
    if !self.derived.contains(&ty) {
      self.derived.push(ty);
    }
  }

  pub(crate) fn remove_derived(&mut self, ty: TypeIdentity) {
    self.derived.retain(|derived| *derived != ty);
  }
}
