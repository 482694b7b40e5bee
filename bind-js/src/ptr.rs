use core::fmt;

/// A raw address into the native heap.
///
/// The bridge never dereferences a `NativePtr`; it only uses it as an identity key and stores it in
/// host slots. Creating one is safe, turning it back into a reference is up to the embedding.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct NativePtr(usize);

impl NativePtr {
  /// The null address.
  pub const NULL: NativePtr = NativePtr(0);

  #[inline]
  pub const fn from_addr(addr: usize) -> Self {
    Self(addr)
  }

  #[inline]
  pub fn from_ptr<T>(ptr: *const T) -> Self {
    Self(ptr as usize)
  }

  #[inline]
  pub fn from_mut<T>(ptr: *mut T) -> Self {
    Self(ptr as usize)
  }

  #[inline]
  pub fn from_ref<T>(value: &T) -> Self {
    Self::from_ptr(value as *const T)
  }

  #[inline]
  pub const fn addr(self) -> usize {
    self.0
  }

  #[inline]
  pub const fn is_null(self) -> bool {
    self.0 == 0
  }

  /// Reinterprets the address as a typed raw pointer.
  #[inline]
  pub fn as_ptr<T>(self) -> *mut T {
    self.0 as *mut T
  }

  /// Moves the address forward by `offset` bytes. Null stays null.
  #[inline]
  pub fn add(self, offset: usize) -> Self {
    if self.is_null() {
      return self;
    }
    Self(self.0.wrapping_add(offset))
  }

  /// Moves the address backward by `offset` bytes. Null stays null.
  #[inline]
  pub fn sub(self, offset: usize) -> Self {
    if self.is_null() {
      return self;
    }
    Self(self.0.wrapping_sub(offset))
  }

  pub(crate) fn to_slot(self) -> u64 {
    self.0 as u64
  }

  pub(crate) fn from_slot(slot: u64) -> Self {
    Self(slot as usize)
  }
}

impl fmt::Debug for NativePtr {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "NativePtr({:#x})", self.0)
  }
}

impl fmt::Display for NativePtr {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{:#x}", self.0)
  }
}
