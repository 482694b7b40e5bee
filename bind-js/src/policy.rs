use crate::NativePtr;
use core::fmt;
use std::cell::RefCell;
use std::rc::Rc;

/// Decides what happens to a native object once the host stops referencing it.
///
/// `begin_managing` runs when the policy is attached to a wrapper; `end_managing` runs when the
/// wrapper is collected, explicitly removed, or its registry is torn down.
pub trait OwnershipPolicy {
  fn begin_managing(&mut self, ptr: NativePtr);
  fn end_managing(&mut self, ptr: NativePtr);
}

/// Shared handle to a policy object. Policies are compared by identity.
pub type PolicyRef = Rc<RefCell<dyn OwnershipPolicy>>;

/// Ownership of a wrapped native object.
#[derive(Clone)]
pub enum Ownership {
  /// The bridge never frees the object.
  Borrowed,
  /// The registry owns the object and runs its destructor hook when the wrapper goes away.
  Exclusive,
  /// An attached policy decides.
  Policy(PolicyRef),
}

impl Ownership {
  pub fn policy(&self) -> Option<&PolicyRef> {
    match self {
      Ownership::Policy(policy) => Some(policy),
      Ownership::Borrowed | Ownership::Exclusive => None,
    }
  }

  pub fn kind(&self) -> &'static str {
    match self {
      Ownership::Borrowed => "borrowed",
      Ownership::Exclusive => "exclusive",
      Ownership::Policy(_) => "policy",
    }
  }
}

impl fmt::Debug for Ownership {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Ownership::Borrowed => f.write_str("Borrowed"),
      Ownership::Exclusive => f.write_str("Exclusive"),
      Ownership::Policy(policy) => write!(f, "Policy({:p})", Rc::as_ptr(policy) as *const ()),
    }
  }
}

pub(crate) fn same_policy(a: &PolicyRef, b: &PolicyRef) -> bool {
  Rc::as_ptr(a) as *const () == Rc::as_ptr(b) as *const ()
}
