use crate::{GcObject, HeapId, RootId, TemplateId, Value, VmError, WeakGcObject};
use core::mem;
use core::sync::atomic::{AtomicU32, Ordering};
use std::collections::BTreeMap;

/// Hard upper bound for template chain traversals.
///
/// `template_inherit` prevents cycles, so this only guards against corrupted chains.
pub const MAX_PROTOTYPE_CHAIN: usize = 10_000;

/// Heap configuration and memory limits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HeapLimits {
  /// Hard memory limit for live heap allocations, in bytes.
  pub max_bytes: usize,
  /// When an allocation would cause `used_bytes + external_bytes` to exceed this threshold, the
  /// heap will trigger a GC cycle before attempting the allocation.
  pub gc_threshold: usize,
}

impl HeapLimits {
  /// Creates a new set of heap limits.
  pub fn new(max_bytes: usize, gc_threshold: usize) -> Self {
    Self {
      max_bytes,
      gc_threshold,
    }
  }
}

impl Default for HeapLimits {
  fn default() -> Self {
    Self::new(64 * 1024 * 1024, 32 * 1024 * 1024)
  }
}

/// Two embedder-owned fields attached to an object.
///
/// The heap never interprets these values; embeddings typically store a native address and a
/// back-reference to whatever bookkeeping structure owns the wrapper.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HostSlots {
  pub a: u64,
  pub b: u64,
}

/// Record produced when an object with an armed weak notification is collected.
///
/// Each armed object produces at most one notification: the object is gone once it is swept.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WeakNotification {
  /// The collected object. Never upgradable.
  pub object: WeakGcObject,
  /// The host slots the object carried when it was swept.
  pub slots: HostSlots,
}

/// A non-moving mark/sweep GC heap.
///
/// The heap stores objects in a `Vec` of slots. GC handles store the slot `index` and a
/// per-slot `generation`, which makes handles stable across `Vec` reallocations and allows
/// detection of stale handles when slots are reused.
pub struct Heap {
  id: u32,
  limits: HeapLimits,

  /// Bytes used by live allocations.
  used_bytes: usize,
  /// Bytes owned outside the heap but kept alive by heap objects (reported by the embedding).
  external_bytes: usize,
  gc_runs: u64,

  // GC-managed allocations.
  slots: Vec<Slot>,
  marks: Vec<u8>,
  free_list: Vec<u32>,

  // Root sets.
  pub(crate) root_stack: Vec<Value>,
  persistent_roots: Vec<Option<Value>>,
  persistent_roots_free: Vec<u32>,

  // Class templates live as long as the heap and act as an additional root set.
  templates: Vec<ClassTemplate>,

  pending_weak: Vec<WeakNotification>,
}

/// RAII wrapper for a persistent GC root created by [`Heap::add_root`].
///
/// While this guard is alive it holds a mutable borrow of the [`Heap`]. For long-lived roots stored
/// in host state, prefer storing the returned [`RootId`] from [`Heap::add_root`] directly.
pub struct PersistentRoot<'a> {
  heap: &'a mut Heap,
  id: RootId,
}

impl<'a> PersistentRoot<'a> {
  /// Adds `value` to the heap's persistent root set and returns a guard that removes it on drop.
  pub fn new(heap: &'a mut Heap, value: Value) -> Self {
    let id = heap.add_root(value);
    Self { heap, id }
  }

  /// The underlying [`RootId`].
  #[inline]
  pub fn id(&self) -> RootId {
    self.id
  }

  /// Returns the current rooted value.
  #[inline]
  pub fn get(&self) -> Option<Value> {
    self.heap.get_root(self.id)
  }

  /// Borrows the underlying heap mutably.
  #[inline]
  pub fn heap_mut(&mut self) -> &mut Heap {
    &mut *self.heap
  }
}

impl Drop for PersistentRoot<'_> {
  fn drop(&mut self) {
    self.heap.remove_root(self.id);
  }
}

static NEXT_HEAP_ID: AtomicU32 = AtomicU32::new(1);

impl Heap {
  /// Creates a new heap with the provided memory limits.
  pub fn new(limits: HeapLimits) -> Self {
    debug_assert!(
      limits.gc_threshold <= limits.max_bytes,
      "gc_threshold should be <= max_bytes"
    );

    Self {
      id: NEXT_HEAP_ID.fetch_add(1, Ordering::Relaxed),
      limits,
      used_bytes: 0,
      external_bytes: 0,
      gc_runs: 0,
      slots: Vec::new(),
      marks: Vec::new(),
      free_list: Vec::new(),
      root_stack: Vec::new(),
      persistent_roots: Vec::new(),
      persistent_roots_free: Vec::new(),
      templates: Vec::new(),
      pending_weak: Vec::new(),
    }
  }

  /// Process-unique id of this heap. Handles allocated by another heap never validate here.
  pub fn id(&self) -> u32 {
    self.id
  }

  /// Enters a stack-rooting scope.
  ///
  /// Stack roots pushed via [`Scope::push_root`] are removed when the returned `Scope` is dropped.
  pub fn scope(&mut self) -> Scope<'_> {
    let root_stack_len_at_entry = self.root_stack.len();
    Scope {
      heap: self,
      root_stack_len_at_entry,
    }
  }

  /// Bytes currently used by live heap allocations.
  pub fn used_bytes(&self) -> usize {
    self.used_bytes
  }

  /// Bytes of external (embedder-owned) memory currently reported to the heap.
  pub fn external_bytes(&self) -> usize {
    self.external_bytes
  }

  /// Adjusts the external memory counter by `delta` bytes and returns the new total.
  ///
  /// External memory counts towards the GC threshold but not towards the hard `max_bytes` limit.
  pub fn adjust_external_memory(&mut self, delta: isize) -> usize {
    if delta >= 0 {
      self.external_bytes = self.external_bytes.saturating_add(delta as usize);
    } else {
      debug_assert!(
        self.external_bytes >= delta.unsigned_abs(),
        "external memory counter underflow"
      );
      self.external_bytes = self.external_bytes.saturating_sub(delta.unsigned_abs());
    }
    self.external_bytes
  }

  #[cfg(debug_assertions)]
  fn debug_recompute_used_bytes(&self) -> usize {
    self
      .slots
      .iter()
      .filter(|slot| slot.value.is_some())
      .fold(0usize, |acc, slot| acc.saturating_add(slot.bytes))
  }

  #[cfg(debug_assertions)]
  fn debug_assert_used_bytes_is_correct(&self) {
    let recomputed = self.debug_recompute_used_bytes();
    debug_assert_eq!(
      self.used_bytes, recomputed,
      "Heap::used_bytes mismatch: used_bytes={}, recomputed={}",
      self.used_bytes, recomputed
    );
  }

  /// Total number of GC cycles that have run.
  pub fn gc_runs(&self) -> u64 {
    self.gc_runs
  }

  /// Explicitly runs a GC cycle.
  ///
  /// Objects with an armed weak notification queue a [`WeakNotification`] when swept; drain them
  /// with [`Heap::take_weak_notifications`].
  pub fn collect_garbage(&mut self) {
    self.gc_runs += 1;

    // Mark.
    {
      debug_assert_eq!(self.slots.len(), self.marks.len());

      let slots = &self.slots;
      let marks = &mut self.marks[..];

      let mut tracer = Tracer::new(self.id, slots, marks);
      for value in &self.root_stack {
        tracer.trace_value(*value);
      }
      for value in self.persistent_roots.iter().flatten() {
        tracer.trace_value(*value);
      }
      for template in &self.templates {
        for value in template.members.values() {
          tracer.trace_value(*value);
        }
      }

      while let Some(id) = tracer.pop_work() {
        let Some(idx) = tracer.validate(id) else {
          continue;
        };
        if tracer.marks[idx] != 0 {
          continue;
        }
        tracer.marks[idx] = 1;

        let Some(obj) = tracer.slots[idx].value.as_ref() else {
          debug_assert!(false, "validated heap id points to a free slot: {id:?}");
          continue;
        };
        obj.trace(&mut tracer);
      }
    }

    // Sweep.
    for (idx, slot) in self.slots.iter_mut().enumerate() {
      let marked = self.marks[idx] != 0;
      // Reset mark bits for next cycle.
      self.marks[idx] = 0;

      if slot.value.is_none() {
        debug_assert!(!marked);
        continue;
      }

      if marked {
        continue;
      }

      // Unreachable: drop the object and free the slot.
      if let Some(obj) = slot.value.take() {
        if let (true, Some(slots)) = (obj.notify_on_collect, obj.host_slots) {
          let id = HeapId::from_parts(self.id, idx as u32, slot.generation);
          self.pending_weak.push(WeakNotification {
            object: WeakGcObject::new(GcObject(id)),
            slots,
          });
        }
      }
      self.used_bytes = self.used_bytes.saturating_sub(slot.bytes);
      slot.bytes = 0;
      slot.generation = slot.generation.wrapping_add(1);
      self.free_list.push(idx as u32);
    }

    #[cfg(debug_assertions)]
    self.debug_assert_used_bytes_is_correct();
  }

  /// Drains the weak notifications queued by previous GC cycles.
  pub fn take_weak_notifications(&mut self) -> Vec<WeakNotification> {
    mem::take(&mut self.pending_weak)
  }

  /// Number of weak notifications waiting to be drained.
  pub fn pending_weak_notifications(&self) -> usize {
    self.pending_weak.len()
  }

  /// Adds a persistent root and returns an RAII guard that removes it on drop.
  #[inline]
  pub fn persistent_root(&mut self, value: Value) -> PersistentRoot<'_> {
    PersistentRoot::new(self, value)
  }

  /// Adds a persistent root, keeping `value` live until the returned [`RootId`] is removed.
  pub fn add_root(&mut self, value: Value) -> RootId {
    // Root sets should not contain stale handles; detect issues early in debug builds.
    debug_assert!(self.debug_value_is_valid_or_primitive(value));

    let idx = match self.persistent_roots_free.pop() {
      Some(idx) => idx as usize,
      None => {
        self.persistent_roots.push(None);
        self.persistent_roots.len() - 1
      }
    };
    debug_assert!(self.persistent_roots[idx].is_none());
    self.persistent_roots[idx] = Some(value);
    RootId(idx as u32)
  }

  /// Returns the current value of a persistent root.
  pub fn get_root(&self, id: RootId) -> Option<Value> {
    self
      .persistent_roots
      .get(id.0 as usize)
      .and_then(|slot| *slot)
  }

  /// Removes a persistent root previously created by [`Heap::add_root`].
  pub fn remove_root(&mut self, id: RootId) {
    let idx = id.0 as usize;
    debug_assert!(idx < self.persistent_roots.len(), "invalid RootId");
    if idx >= self.persistent_roots.len() {
      return;
    }
    debug_assert!(
      self.persistent_roots[idx].is_some(),
      "RootId already removed"
    );
    if self.persistent_roots[idx].take().is_some() {
      self.persistent_roots_free.push(id.0);
    }
  }

  /// Returns `true` if `obj` currently points to a live object allocation.
  pub fn is_valid_object(&self, obj: GcObject) -> bool {
    self.validate(obj.0).is_some()
  }

  /// Returns the host slots of `obj`, if any have been set.
  pub fn object_host_slots(&self, obj: GcObject) -> Result<Option<HostSlots>, VmError> {
    Ok(self.get_object(obj)?.host_slots)
  }

  /// Sets the host slots of `obj`, replacing any previous slots.
  pub fn object_set_host_slots(&mut self, obj: GcObject, slots: HostSlots) -> Result<(), VmError> {
    self.get_object_mut(obj)?.host_slots = Some(slots);
    Ok(())
  }

  /// Clears the host slots of `obj`, returning the previous slots.
  pub fn object_clear_host_slots(&mut self, obj: GcObject) -> Result<Option<HostSlots>, VmError> {
    Ok(self.get_object_mut(obj)?.host_slots.take())
  }

  /// Arms or disarms the weak notification of `obj`.
  ///
  /// An armed object that carries host slots queues a [`WeakNotification`] when it is collected.
  pub fn object_set_weak_notification(
    &mut self,
    obj: GcObject,
    armed: bool,
  ) -> Result<(), VmError> {
    self.get_object_mut(obj)?.notify_on_collect = armed;
    Ok(())
  }

  /// Returns whether the weak notification of `obj` is armed.
  pub fn object_has_weak_notification(&self, obj: GcObject) -> Result<bool, VmError> {
    Ok(self.get_object(obj)?.notify_on_collect)
  }

  /// Returns the class template `obj` was instantiated from.
  pub fn object_template(&self, obj: GcObject) -> Result<Option<TemplateId>, VmError> {
    Ok(self.get_object(obj)?.template)
  }

  /// Returns whether `obj` was instantiated from `template` or from a template inheriting from it.
  pub fn object_instance_of(&self, obj: GcObject, template: TemplateId) -> Result<bool, VmError> {
    match self.object_template(obj)? {
      Some(own) => self.template_is_a(own, template),
      None => Ok(false),
    }
  }

  /// Sets an own property on `obj`.
  pub fn object_set(&mut self, obj: GcObject, key: &str, value: Value) -> Result<(), VmError> {
    debug_assert!(self.debug_value_is_valid_or_primitive(value));

    let idx = self.validate(obj.0).ok_or(VmError::InvalidHandle)?;
    let (existing, old_bytes) = {
      let slot = &self.slots[idx];
      let obj = slot.value.as_ref().ok_or(VmError::InvalidHandle)?;
      (
        obj.properties.iter().position(|entry| &*entry.key == key),
        slot.bytes,
      )
    };

    match existing {
      Some(existing) => {
        // Replace in-place (no change to heap size).
        let obj = self.slots[idx].value.as_mut().ok_or(VmError::InvalidHandle)?;
        obj.properties[existing].value = value;
      }
      None => {
        let new_bytes = old_bytes
          .checked_add(PropertyEntry::heap_size_bytes_for_key(key))
          .ok_or(VmError::OutOfMemory)?;
        // Root the object and value in case the capacity check triggers a GC cycle.
        let mut scope = self.scope();
        scope.push_root(Value::Object(obj));
        scope.push_root(value);
        scope.heap.ensure_can_allocate(new_bytes - old_bytes)?;
        // The slot index is stable: rooted objects are never swept.
        let obj = scope.heap.slots[idx]
          .value
          .as_mut()
          .ok_or(VmError::InvalidHandle)?;
        obj.properties.push(PropertyEntry {
          key: key.into(),
          value,
        });
        scope.heap.update_slot_bytes(idx, new_bytes);
      }
    }

    #[cfg(debug_assertions)]
    self.debug_assert_used_bytes_is_correct();
    Ok(())
  }

  /// Looks up `key` on `obj`, then along its class template chain.
  ///
  /// Returns `Value::Undefined` if no own property or template member matches.
  pub fn object_get(&self, obj: GcObject, key: &str) -> Result<Value, VmError> {
    let data = self.get_object(obj)?;
    if let Some(entry) = data.properties.iter().find(|entry| &*entry.key == key) {
      return Ok(entry.value);
    }

    let mut current = data.template;
    let mut steps = 0usize;
    while let Some(id) = current {
      if steps >= MAX_PROTOTYPE_CHAIN {
        return Err(VmError::PrototypeChainTooDeep);
      }
      steps += 1;

      let template = self.get_template(id)?;
      if let Some(value) = template.members.get(key) {
        return Ok(*value);
      }
      current = template.parent;
    }
    Ok(Value::Undefined)
  }

  /// Creates a new class template.
  pub fn alloc_template(&mut self, name: &str) -> TemplateId {
    let id = TemplateId(self.templates.len() as u32);
    self.templates.push(ClassTemplate {
      name: name.into(),
      parent: None,
      members: BTreeMap::new(),
    });
    id
  }

  /// The display name of `template`.
  pub fn template_name(&self, template: TemplateId) -> Result<&str, VmError> {
    Ok(&self.get_template(template)?.name)
  }

  /// The parent of `template`, if it inherits from another template.
  pub fn template_parent(&self, template: TemplateId) -> Result<Option<TemplateId>, VmError> {
    Ok(self.get_template(template)?.parent)
  }

  /// Makes `child` inherit members from `parent`.
  ///
  /// A template's parent can only be set once, and the chain must stay acyclic.
  pub fn template_inherit(&mut self, child: TemplateId, parent: TemplateId) -> Result<(), VmError> {
    if self.get_template(child)?.parent.is_some() {
      return Err(VmError::TemplateAlreadyInherits);
    }
    if self.template_is_a(parent, child)? {
      return Err(VmError::PrototypeCycle);
    }
    self.get_template_mut(child)?.parent = Some(parent);
    Ok(())
  }

  /// Defines (or replaces) a member on `template`.
  pub fn template_set(
    &mut self,
    template: TemplateId,
    key: &str,
    value: Value,
  ) -> Result<(), VmError> {
    debug_assert!(self.debug_value_is_valid_or_primitive(value));
    self.get_template_mut(template)?.members.insert(key.into(), value);
    Ok(())
  }

  /// Returns whether `template` is `ancestor` or inherits from it.
  pub fn template_is_a(&self, template: TemplateId, ancestor: TemplateId) -> Result<bool, VmError> {
    let mut current = Some(template);
    let mut steps = 0usize;
    while let Some(id) = current {
      if id == ancestor {
        return Ok(true);
      }
      if steps >= MAX_PROTOTYPE_CHAIN {
        return Err(VmError::PrototypeChainTooDeep);
      }
      steps += 1;
      current = self.get_template(id)?.parent;
    }
    Ok(false)
  }

  fn get_template(&self, id: TemplateId) -> Result<&ClassTemplate, VmError> {
    self
      .templates
      .get(id.0 as usize)
      .ok_or(VmError::InvalidHandle)
  }

  fn get_template_mut(&mut self, id: TemplateId) -> Result<&mut ClassTemplate, VmError> {
    self
      .templates
      .get_mut(id.0 as usize)
      .ok_or(VmError::InvalidHandle)
  }

  fn get_object(&self, obj: GcObject) -> Result<&JsObject, VmError> {
    let idx = self.validate(obj.0).ok_or(VmError::InvalidHandle)?;
    self.slots[idx].value.as_ref().ok_or(VmError::InvalidHandle)
  }

  fn get_object_mut(&mut self, obj: GcObject) -> Result<&mut JsObject, VmError> {
    let idx = self.validate(obj.0).ok_or(VmError::InvalidHandle)?;
    self.slots[idx].value.as_mut().ok_or(VmError::InvalidHandle)
  }

  fn validate(&self, id: HeapId) -> Option<usize> {
    if id.heap() != self.id {
      return None;
    }
    let idx = id.index() as usize;
    let slot = self.slots.get(idx)?;
    if slot.generation != id.generation() {
      return None;
    }
    if slot.value.is_none() {
      return None;
    }
    Some(idx)
  }

  fn ensure_can_allocate(&mut self, new_bytes: usize) -> Result<(), VmError> {
    let pressure = self
      .used_bytes
      .saturating_add(self.external_bytes)
      .saturating_add(new_bytes);
    if pressure > self.limits.gc_threshold {
      self.collect_garbage();
    }

    let after = self.used_bytes.saturating_add(new_bytes);
    if after > self.limits.max_bytes {
      return Err(VmError::OutOfMemory);
    }
    Ok(())
  }

  fn update_slot_bytes(&mut self, idx: usize, new_bytes: usize) {
    let slot = &mut self.slots[idx];
    let old_bytes = slot.bytes;

    if new_bytes >= old_bytes {
      self.used_bytes = self.used_bytes.saturating_add(new_bytes - old_bytes);
    } else {
      self.used_bytes = self.used_bytes.saturating_sub(old_bytes - new_bytes);
    }

    slot.bytes = new_bytes;
  }

  fn alloc_unchecked(&mut self, obj: JsObject, new_bytes: usize) -> HeapId {
    let idx = match self.free_list.pop() {
      Some(idx) => idx as usize,
      None => {
        let idx = self.slots.len();
        self.slots.push(Slot::new());
        self.marks.push(0);
        idx
      }
    };

    let slot = &mut self.slots[idx];
    debug_assert!(slot.value.is_none(), "free list returned an occupied slot");

    slot.value = Some(obj);
    slot.bytes = new_bytes;
    self.used_bytes = self.used_bytes.saturating_add(new_bytes);

    let id = HeapId::from_parts(self.id, idx as u32, slot.generation);

    #[cfg(debug_assertions)]
    self.debug_assert_used_bytes_is_correct();

    id
  }

  fn debug_value_is_valid_or_primitive(&self, value: Value) -> bool {
    match value {
      Value::Undefined | Value::Null | Value::Bool(_) | Value::Number(_) => true,
      Value::Object(o) => self.is_valid_object(o),
    }
  }
}

/// A stack-rooting scope.
///
/// All stack roots pushed via [`Scope::push_root`] are removed when the scope is dropped.
pub struct Scope<'a> {
  heap: &'a mut Heap,
  root_stack_len_at_entry: usize,
}

impl Drop for Scope<'_> {
  fn drop(&mut self) {
    self.heap.root_stack.truncate(self.root_stack_len_at_entry);
  }
}

impl<'a> Scope<'a> {
  /// Pushes a stack root.
  ///
  /// The returned `Value` is the same as the input, allowing call sites to write
  /// `let v = scope.push_root(v);` if desired.
  pub fn push_root(&mut self, value: Value) -> Value {
    debug_assert!(self.heap.debug_value_is_valid_or_primitive(value));
    self.heap.root_stack.push(value);
    value
  }

  /// Borrows the underlying heap immutably.
  pub fn heap(&self) -> &Heap {
    &*self.heap
  }

  /// Borrows the underlying heap mutably.
  pub fn heap_mut(&mut self) -> &mut Heap {
    &mut *self.heap
  }

  /// Allocates an empty object with no class template.
  pub fn alloc_object(&mut self) -> Result<GcObject, VmError> {
    self.alloc(None)
  }

  /// Allocates an empty object instantiated from `template`.
  pub fn alloc_object_with_template(&mut self, template: TemplateId) -> Result<GcObject, VmError> {
    self.heap.get_template(template)?;
    self.alloc(Some(template))
  }

  fn alloc(&mut self, template: Option<TemplateId>) -> Result<GcObject, VmError> {
    let new_bytes = JsObject::heap_size_bytes();
    self.heap.ensure_can_allocate(new_bytes)?;

    let obj = JsObject {
      template,
      host_slots: None,
      notify_on_collect: false,
      properties: Vec::new(),
    };
    Ok(GcObject(self.heap.alloc_unchecked(obj, new_bytes)))
  }
}

struct Slot {
  value: Option<JsObject>,
  bytes: usize,
  generation: u32,
}

impl Slot {
  fn new() -> Self {
    Self {
      value: None,
      bytes: 0,
      generation: 0,
    }
  }
}

#[derive(Debug)]
struct JsObject {
  template: Option<TemplateId>,
  host_slots: Option<HostSlots>,
  notify_on_collect: bool,
  properties: Vec<PropertyEntry>,
}

impl JsObject {
  fn heap_size_bytes() -> usize {
    mem::size_of::<Self>()
  }

  fn trace(&self, tracer: &mut Tracer<'_>) {
    for prop in &self.properties {
      tracer.trace_value(prop.value);
    }
  }
}

#[derive(Debug)]
struct PropertyEntry {
  key: Box<str>,
  value: Value,
}

impl PropertyEntry {
  fn heap_size_bytes_for_key(key: &str) -> usize {
    mem::size_of::<Self>().saturating_add(key.len())
  }
}

#[derive(Debug)]
struct ClassTemplate {
  name: Box<str>,
  parent: Option<TemplateId>,
  members: BTreeMap<Box<str>, Value>,
}

struct Tracer<'a> {
  heap: u32,
  slots: &'a [Slot],
  marks: &'a mut [u8],
  worklist: Vec<HeapId>,
}

impl<'a> Tracer<'a> {
  fn new(heap: u32, slots: &'a [Slot], marks: &'a mut [u8]) -> Self {
    Self {
      heap,
      slots,
      marks,
      worklist: Vec::new(),
    }
  }

  fn pop_work(&mut self) -> Option<HeapId> {
    self.worklist.pop()
  }

  fn trace_value(&mut self, value: Value) {
    match value {
      Value::Undefined | Value::Null | Value::Bool(_) | Value::Number(_) => {}
      Value::Object(o) => self.trace_heap_id(o.0),
    }
  }

  fn trace_heap_id(&mut self, id: HeapId) {
    let Some(idx) = self.validate(id) else {
      return;
    };
    if self.marks[idx] != 0 {
      return;
    }
    self.worklist.push(id);
  }

  fn validate(&self, id: HeapId) -> Option<usize> {
    if id.heap() != self.heap {
      debug_assert!(false, "foreign handle during GC: {id:?}");
      return None;
    }
    let idx = id.index() as usize;
    let slot = self.slots.get(idx)?;
    if slot.generation != id.generation() {
      debug_assert!(false, "stale handle during GC: {id:?}");
      return None;
    }
    if slot.value.is_none() {
      debug_assert!(false, "handle points at a free slot during GC: {id:?}");
      return None;
    }
    Some(idx)
  }
}
