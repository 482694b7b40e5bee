//! Typed registration and conversion helpers on top of the untyped [`Runtime`] operations.
//!
//! Objects allocated here ([`wrap_object`], [`to_host_value`] and typed constructors) live in a
//! `Box<T>` that their entry reclaims with `Box::from_raw`, unless the registry has an explicit
//! destructor. Addresses wrapped through [`Runtime::wrap`] never get the `Box` release.

use crate::registry::{ConstructorFn, DestructorFn};
use crate::{BindError, NativePtr, Ownership, PtrAdjust, Runtime, TypeIdentity};
use core::marker::PhantomData;
use core::ptr::NonNull;
use std::rc::Rc;
use vm_js::{GcObject, TemplateId, Value};

/// Builder for the registry of native type `T`.
pub struct Class<'rt, T: 'static> {
  rt: &'rt mut Runtime,
  ty: TypeIdentity,
  _marker: PhantomData<fn() -> T>,
}

impl<'rt, T: 'static> Class<'rt, T> {
  /// Creates (or reopens) the registry of `T`.
  pub fn new(rt: &'rt mut Runtime) -> Self {
    let ty = TypeIdentity::of::<T>();
    rt.registry(ty);
    Self {
      rt,
      ty,
      _marker: PhantomData,
    }
  }

  pub fn type_identity(&self) -> TypeIdentity {
    self.ty
  }

  pub fn template(&mut self) -> TemplateId {
    self.rt.registry(self.ty).template()
  }

  /// Registers the host-facing constructor of `T`.
  pub fn constructor<F>(self, constructor: F) -> Self
  where
    F: Fn(&mut Runtime, &[Value]) -> Result<T, BindError> + 'static,
  {
    let hook: ConstructorFn = Rc::new(
      move |rt: &mut Runtime, args: &[Value]| -> Result<NativePtr, BindError> {
        let object = constructor(rt, args)?;
        Ok(NativePtr::from_mut(Box::into_raw(Box::new(object))))
      },
    );
    self
      .rt
      .registry(self.ty)
      .set_owning_constructor(hook, box_destructor::<T>());
    self
  }

  /// Registers an explicit destructor for every exclusive `T` wrapped afterwards, replacing the
  /// `Box<T>` release.
  pub fn destructor<F>(self, destructor: F) -> Self
  where
    F: Fn(NativePtr) + 'static,
  {
    let hook: DestructorFn = Rc::new(destructor);
    self.rt.registry(self.ty).set_destructor(hook);
    self
  }

  /// Declares `B` as the base type of `T`.
  pub fn inherit<B: 'static>(self, adjust: PtrAdjust) -> Result<Self, BindError> {
    self.rt.set_base(self.ty, TypeIdentity::of::<B>(), adjust)?;
    Ok(self)
  }

  pub fn auto_wrap(self, enabled: bool) -> Self {
    self.rt.registry(self.ty).set_auto_wrap(enabled);
    self
  }

  pub fn pointer_auto_wrap(self, enabled: bool) -> Self {
    self.rt.registry(self.ty).set_pointer_auto_wrap(enabled);
    self
  }

  /// Defines a member shared by every wrapper of `T` (and of types derived from it).
  pub fn member(mut self, name: &str, value: Value) -> Result<Self, BindError> {
    let template = self.template();
    self.rt.heap_mut().template_set(template, name, value)?;
    Ok(self)
  }
}

fn box_destructor<T: 'static>() -> DestructorFn {
  Rc::new(drop_box::<T>)
}

fn drop_box<T: 'static>(ptr: NativePtr) {
  // SAFETY: only entries whose address came from `Box::<T>::into_raw` in this module carry this
  // destructor, and each entry is released exactly once.
  drop(unsafe { Box::from_raw(ptr.as_ptr::<T>()) });
}

/// Moves `object` to the native heap and wraps it exclusively.
pub fn wrap_object<T: 'static>(rt: &mut Runtime, object: Box<T>) -> Result<Value, BindError> {
  let ptr = NativePtr::from_mut(Box::into_raw(object));
  match rt.wrap_entry(
    TypeIdentity::of::<T>(),
    ptr,
    Ownership::Exclusive,
    Some(box_destructor::<T>()),
  ) {
    Ok(value) => Ok(value),
    Err(err) => {
      // SAFETY: `ptr` comes from `Box::into_raw` above and was not registered.
      drop(unsafe { Box::from_raw(ptr.as_ptr::<T>()) });
      Err(err)
    }
  }
}

/// Wraps an object the host must never free.
pub fn wrap_borrowed<T: 'static>(rt: &mut Runtime, ptr: *mut T) -> Result<Value, BindError> {
  rt.wrap(
    TypeIdentity::of::<T>(),
    NativePtr::from_mut(ptr),
    Ownership::Borrowed,
  )
}

pub fn find_object<T: 'static>(rt: &mut Runtime, ptr: *const T) -> Result<GcObject, BindError> {
  rt.find(TypeIdentity::of::<T>(), NativePtr::from_ptr(ptr))
}

pub fn unwrap_object<T: 'static>(rt: &mut Runtime, value: Value) -> Result<NonNull<T>, BindError> {
  let ty = TypeIdentity::of::<T>();
  let ptr = rt.unwrap(ty, value)?;
  NonNull::new(ptr.as_ptr::<T>()).ok_or(BindError::NotAnObject {
    type_name: ty.name(),
  })
}

/// Converts a native value to a host value.
///
/// Returns the existing wrapper when `value` is already wrapped. Otherwise, if `T` allows
/// auto-wrapping, wraps an exclusively owned copy.
pub fn to_host_value<T: Clone + 'static>(rt: &mut Runtime, value: &T) -> Result<Value, BindError> {
  let ty = TypeIdentity::of::<T>();
  match rt.find(ty, NativePtr::from_ref(value)) {
    Ok(obj) => Ok(Value::Object(obj)),
    Err(BindError::NotFound { .. }) if auto_wraps(rt, ty) => {
      wrap_object(rt, Box::new(value.clone()))
    }
    Err(err) => Err(err),
  }
}

/// Converts a native pointer to a host value.
///
/// Null converts to [`Value::Null`]. Unknown pointers are wrapped as borrowed if `T` allows
/// pointer auto-wrapping.
pub fn to_host_ptr<T: 'static>(rt: &mut Runtime, ptr: *mut T) -> Result<Value, BindError> {
  if ptr.is_null() {
    return Ok(Value::Null);
  }
  let ty = TypeIdentity::of::<T>();
  match rt.find(ty, NativePtr::from_mut(ptr)) {
    Ok(obj) => Ok(Value::Object(obj)),
    Err(BindError::NotFound { .. }) if pointer_auto_wraps(rt, ty) => wrap_borrowed(rt, ptr),
    Err(err) => Err(err),
  }
}

fn auto_wraps(rt: &Runtime, ty: TypeIdentity) -> bool {
  rt.pool().get(ty).is_some_and(|registry| registry.auto_wrap())
}

fn pointer_auto_wraps(rt: &Runtime, ty: TypeIdentity) -> bool {
  rt
    .pool()
    .get(ty)
    .is_some_and(|registry| registry.pointer_auto_wrap())
}
