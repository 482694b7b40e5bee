use core::any::TypeId;
use core::fmt;
use core::hash::{Hash, Hasher};
use core::mem;

/// Identity of a native type: a stable id, the type's size, and a display name.
///
/// Two identities are equal iff they describe the same Rust type; size and name never take part in
/// comparisons or hashing.
#[derive(Clone, Copy)]
pub struct TypeIdentity {
  id: TypeId,
  size: usize,
  name: &'static str,
}

impl TypeIdentity {
  /// Returns the identity of `T`.
  pub fn of<T: 'static>() -> Self {
    Self {
      id: TypeId::of::<T>(),
      size: mem::size_of::<T>(),
      name: core::any::type_name::<T>(),
    }
  }

  #[inline]
  pub fn id(&self) -> TypeId {
    self.id
  }

  /// Size of one native instance in bytes, reported to the host as external memory.
  #[inline]
  pub fn size(&self) -> usize {
    self.size
  }

  #[inline]
  pub fn name(&self) -> &'static str {
    self.name
  }
}

impl PartialEq for TypeIdentity {
  fn eq(&self, other: &Self) -> bool {
    self.id == other.id
  }
}

impl Eq for TypeIdentity {}

impl Hash for TypeIdentity {
  fn hash<H: Hasher>(&self, state: &mut H) {
    self.id.hash(state);
  }
}

impl fmt::Debug for TypeIdentity {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("TypeIdentity")
      .field("name", &self.name)
      .field("size", &self.size)
      .finish()
  }
}

impl fmt::Display for TypeIdentity {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name)
  }
}
