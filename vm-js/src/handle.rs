use core::fmt;

use crate::Heap;

/// A stable identifier for an allocation in the [`Heap`](crate::Heap).
///
/// This is a packed `{ index: u32, generation: u32 }` plus the id of the heap that allocated it.
/// - `index` selects a slot in the heap's slot vector.
/// - `generation` is incremented each time that slot is freed.
///
/// A `HeapId` is **only valid** if:
/// - it was allocated by the heap it is used with,
/// - `index` is in-bounds for that heap,
/// - the slot at `index` is occupied, and
/// - the slot's generation matches this handle's generation.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct HeapId {
  packed: u64,
  heap: u32,
}

impl HeapId {
  pub(crate) fn from_parts(heap: u32, index: u32, generation: u32) -> Self {
    Self {
      packed: (index as u64) | ((generation as u64) << 32),
      heap,
    }
  }

  /// The id of the heap that allocated this handle, see [`Heap::id`](crate::Heap::id).
  #[inline]
  pub fn heap(self) -> u32 {
    self.heap
  }

  /// The slot index within the heap.
  #[inline]
  pub fn index(self) -> u32 {
    self.packed as u32
  }

  /// The generation of the slot when this handle was created.
  #[inline]
  pub fn generation(self) -> u32 {
    (self.packed >> 32) as u32
  }
}

impl fmt::Debug for HeapId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("HeapId")
      .field("heap", &self.heap)
      .field("index", &self.index())
      .field("generation", &self.generation())
      .finish()
  }
}

/// A GC-managed object.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[repr(transparent)]
pub struct GcObject(pub(crate) HeapId);

impl GcObject {
  /// The underlying [`HeapId`].
  #[inline]
  pub fn id(self) -> HeapId {
    self.0
  }

  /// The slot index within the heap.
  #[inline]
  pub fn index(self) -> u32 {
    self.0.index()
  }

  /// The slot generation within the heap.
  #[inline]
  pub fn generation(self) -> u32 {
    self.0.generation()
  }
}

/// A weak, generation-checked handle to a GC-managed object.
///
/// This is intended for host-side wrapper identity maps: a host can store `WeakGcObject` values in a
/// map keyed by native address without accidentally keeping wrappers alive. On lookup, call
/// [`WeakGcObject::upgrade`] to check whether the wrapper is still alive.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[repr(transparent)]
pub struct WeakGcObject(HeapId);

impl WeakGcObject {
  /// Creates a weak handle pointing at `obj`.
  #[inline]
  pub fn new(obj: GcObject) -> Self {
    Self(obj.id())
  }

  /// Attempts to upgrade this weak handle to a strong [`GcObject`].
  ///
  /// Returns `Some(GcObject)` only if the handle still points to a currently-live object
  /// allocation.
  #[inline]
  pub fn upgrade(self, heap: &Heap) -> Option<GcObject> {
    let obj = GcObject(self.0);
    heap.is_valid_object(obj).then_some(obj)
  }

  /// Returns `true` if this weak handle was created from `obj`, regardless of liveness.
  #[inline]
  pub fn points_to(self, obj: GcObject) -> bool {
    self.0 == obj.0
  }

  /// The underlying [`HeapId`].
  #[inline]
  pub fn id(self) -> HeapId {
    self.0
  }
}

impl From<GcObject> for WeakGcObject {
  #[inline]
  fn from(obj: GcObject) -> Self {
    Self::new(obj)
  }
}

/// An ID for a persistent root stored in the heap.
///
/// Returned by [`Heap::add_root`](crate::Heap::add_root) and later passed to
/// [`Heap::remove_root`](crate::Heap::remove_root).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[repr(transparent)]
pub struct RootId(pub(crate) u32);

impl RootId {
  /// The underlying index into the heap's persistent root table.
  #[inline]
  pub fn index(self) -> u32 {
    self.0
  }
}

/// An ID for a class template owned by the heap.
///
/// Templates are never freed while the heap is alive, so template IDs carry no generation.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[repr(transparent)]
pub struct TemplateId(pub(crate) u32);

impl TemplateId {
  /// The underlying index into the heap's template table.
  #[inline]
  pub fn index(self) -> u32 {
    self.0
  }
}
