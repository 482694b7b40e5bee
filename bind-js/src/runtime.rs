use crate::policy::same_policy;
use crate::registry::{DestructorFn, HandleRegistry, RegistryId, WrapEntry};
use crate::{
  BindError, InheritanceLink, NativePtr, Ownership, PolicyRef, PtrAdjust, RegistryPool,
  SharedPolicy, TypeIdentity,
};
use ahash::AHashMap;
use core::any::Any;
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, debug_span, trace, warn};
use vm_js::{GcObject, Heap, HeapLimits, HostSlots, Value};

/// Options for creating a [`Runtime`].
#[derive(Debug, Clone)]
pub struct RuntimeOptions {
  pub heap_limits: HeapLimits,
  /// Report the size of every wrapped native object to the heap as external memory.
  pub track_external_memory: bool,
}

impl Default for RuntimeOptions {
  fn default() -> Self {
    Self {
      heap_limits: HeapLimits::default(),
      track_external_memory: true,
    }
  }
}

/// One host runtime plus the wrapper bookkeeping that belongs to it.
///
/// The runtime owns the [`Heap`], the [`RegistryPool`] and one shared ownership policy per type.
/// Collection notifications queued by the heap are delivered at the start of every bridge
/// operation and after [`Runtime::collect_garbage`]; they are never delivered from inside a GC
/// cycle.
///
/// Dropping the runtime tears it down: every remaining wrapper is released exactly as if it had
/// been removed explicitly.
pub struct Runtime {
  heap: Heap,
  pool: RegistryPool,
  policies: AHashMap<TypeIdentity, Rc<dyn Any>>,
  options: RuntimeOptions,
}

impl Runtime {
  pub fn new(options: RuntimeOptions) -> Self {
    Self {
      heap: Heap::new(options.heap_limits),
      pool: RegistryPool::new(),
      policies: AHashMap::new(),
      options,
    }
  }

  pub fn options(&self) -> &RuntimeOptions {
    &self.options
  }

  pub fn heap(&self) -> &Heap {
    &self.heap
  }

  pub fn heap_mut(&mut self) -> &mut Heap {
    &mut self.heap
  }

  pub fn pool(&self) -> &RegistryPool {
    &self.pool
  }

  /// Returns the registry of `ty`, creating it on first use.
  pub fn registry(&mut self, ty: TypeIdentity) -> &mut HandleRegistry {
    self.pool.get_or_create(&mut self.heap, ty)
  }

  /// Returns the shared ownership policy for `T`, creating it on first use.
  pub fn shared_policy<T: 'static>(&mut self) -> Rc<RefCell<SharedPolicy<T>>> {
    let policy = self
      .policies
      .entry(TypeIdentity::of::<T>())
      .or_insert_with(|| Rc::new(RefCell::new(SharedPolicy::<T>::new())) as Rc<dyn Any>);
    match Rc::clone(policy).downcast::<RefCell<SharedPolicy<T>>>() {
      Ok(policy) => policy,
      Err(_) => unreachable!("shared policies are keyed by their object type"),
    }
  }

  /// Wraps the native object at `ptr` in a new host object of type `ty`.
  ///
  /// A null address wraps to [`Value::Null`] without touching any registry. An exclusive entry is
  /// released with the destructor registered through [`HandleRegistry::set_destructor`]; without
  /// one the object is leaked.
  pub fn wrap(
    &mut self,
    ty: TypeIdentity,
    ptr: NativePtr,
    ownership: Ownership,
  ) -> Result<Value, BindError> {
    self.wrap_entry(ty, ptr, ownership, None)
  }

  /// Like [`Runtime::wrap`], with `owned_destructor` releasing an exclusive entry when the registry
  /// has no explicit destructor. Callers pass it only for objects whose allocation they control.
  pub(crate) fn wrap_entry(
    &mut self,
    ty: TypeIdentity,
    ptr: NativePtr,
    ownership: Ownership,
    owned_destructor: Option<DestructorFn>,
  ) -> Result<Value, BindError> {
    self.deliver_weak_notifications();
    if ptr.is_null() {
      return Ok(Value::Null);
    }

    let registry = self.pool.get_or_create(&mut self.heap, ty);
    if registry.contains(ptr) {
      return Err(BindError::AlreadyWrapped {
        type_name: ty.name(),
        ptr,
      });
    }
    let id = registry.id();
    let template = registry.template();
    let destructor = match ownership {
      Ownership::Exclusive => registry.destructor().or(owned_destructor),
      Ownership::Borrowed | Ownership::Policy(_) => None,
    };

    let obj = self.heap.scope().alloc_object_with_template(template)?;
    self.heap.object_set_host_slots(
      obj,
      HostSlots {
        a: ptr.to_slot(),
        b: id.get(),
      },
    )?;
    self.heap.object_set_weak_notification(obj, true)?;

    if let Ownership::Policy(policy) = &ownership {
      policy.borrow_mut().begin_managing(ptr);
    }
    let kind = ownership.kind();
    self.registry(ty).insert(
      ptr,
      WrapEntry {
        handle: obj.into(),
        ownership,
        destructor,
      },
    )?;
    if self.options.track_external_memory {
      self.heap.adjust_external_memory(ty.size() as isize);
    }

    debug!(
      type_name = ty.name(),
      %ptr,
      registry = id.get(),
      ownership = kind,
      "wrapped native object"
    );
    Ok(Value::Object(obj))
  }

  /// Recovers the native address behind a host value, viewed as type `ty`.
  ///
  /// The wrapper may belong to `ty`, to a type derived from it, or to one of its bases; the address
  /// is adjusted along the inheritance edges in between.
  pub fn unwrap(&mut self, ty: TypeIdentity, value: Value) -> Result<NativePtr, BindError> {
    self.deliver_weak_notifications();
    let not_an_object = BindError::NotAnObject {
      type_name: ty.name(),
    };
    let Value::Object(obj) = value else {
      return Err(not_an_object);
    };
    // Dead handles and handles from another heap carry no slots here.
    let Ok(Some(slots)) = self.heap.object_host_slots(obj) else {
      return Err(not_an_object);
    };
    let Some(stored) = self.pool.type_for(RegistryId::from_slot(slots.b)) else {
      return Err(not_an_object);
    };
    let ptr = NativePtr::from_slot(slots.a);
    let registered = self
      .pool
      .get(stored)
      .and_then(|registry| registry.entry(ptr))
      .is_some_and(|entry| entry.handle.points_to(obj));
    if !registered {
      return Err(not_an_object);
    }

    self
      .pool
      .convert(stored, ty, ptr)
      .ok_or(BindError::TypeMismatch {
        expected: ty.name(),
        found: stored.name(),
      })
  }

  /// Finds the live wrapper of the native object at `ptr`.
  ///
  /// Searches the registry of `ty`, then every registry derived from it (depth-first, in
  /// registration order), then the direct entries along its base chain.
  pub fn find(&mut self, ty: TypeIdentity, ptr: NativePtr) -> Result<GcObject, BindError> {
    self.deliver_weak_notifications();
    let not_found = || BindError::NotFound {
      type_name: ty.name(),
      ptr,
    };
    if ptr.is_null() || !self.pool.contains(ty) {
      return Err(not_found());
    }
    if let Some(obj) = self.pool.search_derived(&self.heap, ty, ptr)? {
      return Ok(obj);
    }
    if let Some(obj) = self.pool.search_bases(&self.heap, ty, ptr)? {
      return Ok(obj);
    }
    Err(not_found())
  }

  /// Ends management of the native object at `ptr` and detaches its wrapper.
  ///
  /// Only entries owned directly by the registry of `ty` can be removed.
  pub fn remove(&mut self, ty: TypeIdentity, ptr: NativePtr) -> Result<(), BindError> {
    self.deliver_weak_notifications();
    self.remove_entry(ty, ptr)
  }

  /// Removes every entry of the registry of `ty` and returns how many were removed.
  pub fn remove_all(&mut self, ty: TypeIdentity) -> Result<usize, BindError> {
    self.deliver_weak_notifications();
    if !self.pool.contains(ty) {
      return Err(BindError::RegistryNotFound {
        type_name: ty.name(),
      });
    }
    Ok(self.release_all(ty))
  }

  /// Hands an existing wrapper over to `policy`.
  ///
  /// Attaching the policy that already manages the entry is a no-op; attaching a different one is a
  /// [`BindError::PolicyConflict`].
  pub fn set_ownership_policy(
    &mut self,
    ty: TypeIdentity,
    ptr: NativePtr,
    policy: PolicyRef,
  ) -> Result<(), BindError> {
    self.deliver_weak_notifications();
    let entry = self
      .pool
      .get_mut(ty)
      .and_then(|registry| registry.entry_mut(ptr))
      .ok_or(BindError::NotManaged {
        type_name: ty.name(),
        ptr,
      })?;
    if let Ownership::Policy(current) = &entry.ownership {
      if same_policy(current, &policy) {
        return Ok(());
      }
      return Err(BindError::PolicyConflict {
        type_name: ty.name(),
        ptr,
      });
    }
    let previous = entry.ownership.kind();
    entry.ownership = Ownership::Policy(policy.clone());
    entry.destructor = None;
    policy.borrow_mut().begin_managing(ptr);
    debug!(
      type_name = ty.name(),
      %ptr,
      previous,
      "attached ownership policy"
    );
    Ok(())
  }

  /// Declares `base` as the base type of `ty`.
  ///
  /// Both registries are created on demand. The host template of `ty` inherits the members of the
  /// template of `base`.
  pub fn set_base(
    &mut self,
    ty: TypeIdentity,
    base: TypeIdentity,
    adjust: PtrAdjust,
  ) -> Result<(), BindError> {
    self.deliver_weak_notifications();
    let cycle = BindError::InheritanceCycle {
      type_name: ty.name(),
      base: base.name(),
    };
    if ty == base {
      return Err(cycle);
    }
    let base_template = self.pool.get_or_create(&mut self.heap, base).template();
    let registry = self.pool.get_or_create(&mut self.heap, ty);
    if let Some(link) = registry.base() {
      return Err(BindError::BaseAlreadySet {
        type_name: ty.name(),
        base: link.base.name(),
      });
    }
    let template = registry.template();
    if self.pool.is_derived_from(base, ty) {
      return Err(cycle);
    }

    self.heap.template_inherit(template, base_template)?;
    self.registry(ty).set_base_link(InheritanceLink { base, adjust });
    self.registry(base).push_derived(ty);
    debug!(
      type_name = ty.name(),
      base = base.name(),
      ?adjust,
      "linked base registry"
    );
    Ok(())
  }

  /// Constructs a native `ty` from host arguments through its constructor hook and wraps it
  /// exclusively.
  pub fn construct(&mut self, ty: TypeIdentity, args: &[Value]) -> Result<Value, BindError> {
    self.deliver_weak_notifications();
    let Some(registry) = self.pool.get(ty) else {
      return Err(BindError::NoConstructor {
        type_name: ty.name(),
      });
    };
    let Some(constructor) = registry.constructor() else {
      return Err(BindError::NoConstructor {
        type_name: ty.name(),
      });
    };
    let constructed_destructor = registry.constructed_destructor();

    let ptr = constructor(self, args)?;
    match self.wrap_entry(ty, ptr, Ownership::Exclusive, constructed_destructor.clone()) {
      Ok(value) => Ok(value),
      Err(err @ BindError::Vm(_)) => {
        // The fresh object never reached a registry.
        let destructor = self
          .pool
          .get(ty)
          .and_then(|r| r.destructor())
          .or(constructed_destructor);
        if let Some(destructor) = destructor {
          destructor(ptr);
        }
        Err(err)
      }
      Err(err) => Err(err),
    }
  }

  /// Removes the registry of `ty`: every entry is released, then the registry is unlinked from its
  /// base and from the registries derived from it.
  pub fn remove_registry(&mut self, ty: TypeIdentity) -> Result<(), BindError> {
    self.deliver_weak_notifications();
    if !self.pool.contains(ty) {
      return Err(BindError::RegistryNotFound {
        type_name: ty.name(),
      });
    }
    let released = self.release_all(ty);
    let Some(registry) = self.pool.take(ty) else {
      return Err(BindError::RegistryNotFound {
        type_name: ty.name(),
      });
    };
    if let Some(link) = registry.base() {
      if let Some(base) = self.pool.get_mut(link.base) {
        base.remove_derived(ty);
      }
    }
    for &derived in registry.derived() {
      if let Some(derived) = self.pool.get_mut(derived) {
        derived.clear_base_link();
      }
    }
    debug!(type_name = ty.name(), released, "removed handle registry");
    Ok(())
  }

  /// Releases every entry of every registry and drops all registries.
  pub fn remove_all_registries(&mut self) {
    self.deliver_weak_notifications();
    let types: Vec<TypeIdentity> = self.pool.types().collect();
    for ty in types {
      self.release_all(ty);
    }
    self.pool.clear();
  }

  /// Runs a full GC cycle and delivers the resulting notifications. Returns how many wrappers were
  /// released.
  pub fn collect_garbage(&mut self) -> usize {
    self.heap.collect_garbage();
    self.deliver_weak_notifications()
  }

  /// Releases the entries whose wrappers the heap has collected. Returns how many were released.
  ///
  /// A notification is ignored when the entry at its address has since been removed or re-wrapped
  /// with a different host object.
  pub fn deliver_weak_notifications(&mut self) -> usize {
    let mut delivered = 0;
    for notification in self.heap.take_weak_notifications() {
      let ptr = NativePtr::from_slot(notification.slots.a);
      let Some(ty) = self
        .pool
        .type_for(RegistryId::from_slot(notification.slots.b))
      else {
        trace!(%ptr, "dropping notification for a removed registry");
        continue;
      };
      let current = self
        .pool
        .get(ty)
        .and_then(|registry| registry.entry(ptr))
        .is_some_and(|entry| entry.handle == notification.object);
      if !current {
        trace!(type_name = ty.name(), %ptr, "dropping stale notification");
        continue;
      }
      trace!(type_name = ty.name(), %ptr, "wrapper collected");
      if self.remove_entry(ty, ptr).is_ok() {
        delivered += 1;
      }
    }
    delivered
  }

  /// Releases everything the runtime still manages. Safe to call more than once; dropping the
  /// runtime calls it too.
  pub fn teardown(&mut self) {
    let span = debug_span!("teardown", registries = self.pool.len());
    let _guard = span.enter();
    self.remove_all_registries();
    self.policies.clear();
    debug!("runtime torn down");
  }

  fn remove_entry(&mut self, ty: TypeIdentity, ptr: NativePtr) -> Result<(), BindError> {
    let Some(registry) = self.pool.get_mut(ty) else {
      return Err(BindError::NotManaged {
        type_name: ty.name(),
        ptr,
      });
    };
    let entry = registry.take(ptr)?;
    self.release(ty, ptr, entry);
    Ok(())
  }

  fn release_all(&mut self, ty: TypeIdentity) -> usize {
    let Some(registry) = self.pool.get_mut(ty) else {
      return 0;
    };
    let entries = registry.drain();
    let count = entries.len();
    for (ptr, entry) in entries {
      self.release(ty, ptr, entry);
    }
    count
  }

  fn release(&mut self, ty: TypeIdentity, ptr: NativePtr, entry: WrapEntry) {
    match &entry.ownership {
      Ownership::Borrowed => {}
      Ownership::Exclusive => match &entry.destructor {
        Some(destructor) => destructor(ptr),
        None => warn!(
          type_name = ty.name(),
          %ptr,
          "exclusively owned object has no destructor, leaking it"
        ),
      },
      Ownership::Policy(policy) => policy.borrow_mut().end_managing(ptr),
    }

    if let Some(obj) = entry.handle.upgrade(&self.heap) {
      let detached = self
        .heap
        .object_clear_host_slots(obj)
        .and_then(|_| self.heap.object_set_weak_notification(obj, false));
      debug_assert!(detached.is_ok());
    }
    if self.options.track_external_memory {
      self.heap.adjust_external_memory(-(ty.size() as isize));
    }
    debug!(
      type_name = ty.name(),
      %ptr,
      ownership = entry.ownership.kind(),
      "released native object"
    );
  }
}

impl Default for Runtime {
  fn default() -> Self {
    Self::new(RuntimeOptions::default())
  }
}

impl Drop for Runtime {
  fn drop(&mut self) {
    self.teardown();
  }
}
