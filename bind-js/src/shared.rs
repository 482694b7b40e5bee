use crate::{BindError, NativePtr, Ownership, OwnershipPolicy, PolicyRef, Runtime, TypeIdentity};
use ahash::AHashMap;
use std::cell::RefCell;
use std::rc::Rc;
use tracing::trace;
use vm_js::Value;

/// Ownership policy for reference-counted native objects.
///
/// While the host references an object, the policy keeps one strong reference to it; ending
/// management drops that reference. Each [`Runtime`] holds one policy per type, see
/// [`Runtime::shared_policy`].
pub struct SharedPolicy<T: 'static> {
  objects: AHashMap<NativePtr, Rc<T>>,
}

impl<T: 'static> SharedPolicy<T> {
  pub fn new() -> Self {
    Self {
      objects: AHashMap::new(),
    }
  }

  /// Number of objects currently kept alive for the host.
  pub fn len(&self) -> usize {
    self.objects.len()
  }

  pub fn is_empty(&self) -> bool {
    self.objects.is_empty()
  }

  pub fn contains(&self, ptr: NativePtr) -> bool {
    self.objects.contains_key(&ptr)
  }

  pub fn get(&self, ptr: NativePtr) -> Option<Rc<T>> {
    self.objects.get(&ptr).cloned()
  }

  /// Records `object`. Returns `false` when its address was already recorded.
  fn adopt(&mut self, object: Rc<T>) -> bool {
    let ptr = NativePtr::from_ptr(Rc::as_ptr(&object));
    if self.objects.contains_key(&ptr) {
      return false;
    }
    self.objects.insert(ptr, object);
    true
  }

  fn forget(&mut self, ptr: NativePtr) -> Option<Rc<T>> {
    self.objects.remove(&ptr)
  }
}

impl<T: 'static> Default for SharedPolicy<T> {
  fn default() -> Self {
    Self::new()
  }
}

impl<T: 'static> OwnershipPolicy for SharedPolicy<T> {
  /// Strong references are recorded by [`wrap_shared`] and [`find_shared`]. Attaching the policy
  /// any other way keeps nothing alive.
  fn begin_managing(&mut self, ptr: NativePtr) {
    trace!(%ptr, recorded = self.objects.contains_key(&ptr), "shared object managed");
  }

  fn end_managing(&mut self, ptr: NativePtr) {
    let released = self.objects.remove(&ptr);
    trace!(
      %ptr,
      strong = released.as_ref().map_or(0, Rc::strong_count),
      "shared object released"
    );
  }
}

/// Wraps a reference-counted object, keeping it alive while the host references it.
///
/// If the object is already wrapped, its existing wrapper is returned and the shared policy is
/// attached to it.
pub fn wrap_shared<T: 'static>(rt: &mut Runtime, object: Rc<T>) -> Result<Value, BindError> {
  let ty = TypeIdentity::of::<T>();
  let ptr = NativePtr::from_ptr(Rc::as_ptr(&object));
  match rt.find(ty, ptr) {
    Ok(obj) => {
      attach(rt, ty, object)?;
      Ok(Value::Object(obj))
    }
    Err(BindError::NotFound { .. }) => {
      let policy = rt.shared_policy::<T>();
      let adopted = policy.borrow_mut().adopt(object);
      let policy_ref: PolicyRef = policy.clone();
      match rt.wrap(ty, ptr, Ownership::Policy(policy_ref)) {
        Ok(value) => Ok(value),
        Err(err) => {
          if adopted {
            let dropped = policy.borrow_mut().forget(ptr);
            drop(dropped);
          }
          Err(err)
        }
      }
    }
    Err(err) => Err(err),
  }
}

/// Finds the wrapper of a reference-counted object and attaches the shared policy to it.
pub fn find_shared<T: 'static>(rt: &mut Runtime, object: &Rc<T>) -> Result<Value, BindError> {
  let ty = TypeIdentity::of::<T>();
  let obj = rt.find(ty, NativePtr::from_ptr(Rc::as_ptr(object)))?;
  attach(rt, ty, Rc::clone(object))?;
  Ok(Value::Object(obj))
}

/// Returns a new strong reference to the object behind a shared wrapper.
pub fn unwrap_shared<T: 'static>(rt: &mut Runtime, value: Value) -> Result<Rc<T>, BindError> {
  let ty = TypeIdentity::of::<T>();
  let ptr = rt.unwrap(ty, value)?;
  let policy = rt.shared_policy::<T>();
  let object = policy.borrow().get(ptr);
  object.ok_or(BindError::NotManaged {
    type_name: ty.name(),
    ptr,
  })
}

fn attach<T: 'static>(rt: &mut Runtime, ty: TypeIdentity, object: Rc<T>) -> Result<(), BindError> {
  let ptr = NativePtr::from_ptr(Rc::as_ptr(&object));
  let policy = rt.shared_policy::<T>();
  let adopted = policy.borrow_mut().adopt(object);
  let policy_ref: PolicyRef = policy.clone();
  if let Err(err) = rt.set_ownership_policy(ty, ptr, policy_ref) {
    if adopted {
      let dropped = policy.borrow_mut().forget(ptr);
      drop(dropped);
    }
    return Err(err);
  }
  Ok(())
}
