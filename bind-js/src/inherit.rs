use crate::{NativePtr, TypeIdentity};

/// How an address changes when the same object is viewed as its base type or as the derived type.
///
/// Null addresses are never adjusted.
#[derive(Clone, Copy, Debug)]
pub enum PtrAdjust {
  /// The base subobject starts at the same address as the derived object.
  Identity,
  /// The base subobject starts `offset` bytes into the derived object, e.g.
  /// `core::mem::offset_of!(Derived, base)` for a `#[repr(C)]` struct.
  Offset(usize),
  /// Arbitrary conversions.
  Custom {
    to_base: fn(NativePtr) -> NativePtr,
    to_this: fn(NativePtr) -> NativePtr,
  },
}

impl PtrAdjust {
  /// Converts a derived-type address into the address of its base subobject.
  pub fn to_base(self, ptr: NativePtr) -> NativePtr {
    if ptr.is_null() {
      return ptr;
    }
    match self {
      PtrAdjust::Identity => ptr,
      PtrAdjust::Offset(offset) => ptr.add(offset),
      PtrAdjust::Custom { to_base, .. } => to_base(ptr),
    }
  }

  /// Converts a base-subobject address back into the address of the derived object.
  pub fn to_this(self, ptr: NativePtr) -> NativePtr {
    if ptr.is_null() {
      return ptr;
    }
    match self {
      PtrAdjust::Identity => ptr,
      PtrAdjust::Offset(offset) => ptr.sub(offset),
      PtrAdjust::Custom { to_this, .. } => to_this(ptr),
    }
  }
}

/// Edge from a registry to the registry of its base type.
#[derive(Clone, Copy, Debug)]
pub struct InheritanceLink {
  pub base: TypeIdentity,
  pub adjust: PtrAdjust,
}

#[cfg(test)]
mod tests {
  use super::PtrAdjust;
  use crate::NativePtr;

  fn plus_four(ptr: NativePtr) -> NativePtr {
    ptr.add(4)
  }

  fn minus_four(ptr: NativePtr) -> NativePtr {
    ptr.sub(4)
  }

  #[test]
  fn adjustments_are_inverse() {
    let ptr = NativePtr::from_addr(0x2000);
    for adjust in [
      PtrAdjust::Identity,
      PtrAdjust::Offset(24),
      PtrAdjust::Custom {
        to_base: plus_four,
        to_this: minus_four,
      },
    ] {
      assert_eq!(adjust.to_this(adjust.to_base(ptr)), ptr);
      assert!(adjust.to_base(NativePtr::NULL).is_null());
    }
    assert_eq!(PtrAdjust::Offset(24).to_base(ptr).addr(), 0x2018);
  }
}
