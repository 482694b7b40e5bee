use bind_js::{
  wrap_object, BindError, Class, NativePtr, Ownership, PtrAdjust, Runtime, RuntimeOptions,
  TypeIdentity,
};
use core::mem::offset_of;
use vm_js::Value;

#[repr(C)]
struct Base {
  tag: u32,
}

#[repr(C)]
struct Derived {
  #[allow(dead_code)]
  header: u64,
  base: Base,
}

struct MoreDerived;
struct Unrelated;

fn base_ty() -> TypeIdentity {
  TypeIdentity::of::<Base>()
}

fn derived_ty() -> TypeIdentity {
  TypeIdentity::of::<Derived>()
}

fn linked_runtime() -> Result<Runtime, BindError> {
  let mut rt = Runtime::new(RuntimeOptions::default());
  rt.set_base(
    derived_ty(),
    base_ty(),
    PtrAdjust::Offset(offset_of!(Derived, base)),
  )?;
  Ok(rt)
}

#[test]
fn derived_wrapper_is_found_through_base_registry() -> Result<(), BindError> {
  let mut rt = linked_runtime()?;
  let mut object = Derived {
    header: 7,
    base: Base { tag: 3 },
  };
  let p = NativePtr::from_mut(&mut object);
  let base_ptr = NativePtr::from_ref(&object.base);
  assert_eq!(base_ptr, PtrAdjust::Offset(8).to_base(p));

  let wrapped = rt.wrap(derived_ty(), p, Ownership::Borrowed)?;
  let through_base = rt.find(base_ty(), base_ptr)?;
  let through_derived = rt.find(derived_ty(), p)?;
  assert_eq!(Value::Object(through_base), wrapped);
  assert_eq!(through_base, through_derived);

  // The entry stays owned by the derived registry.
  assert!(matches!(
    rt.remove(base_ty(), base_ptr),
    Err(BindError::NotManaged { .. })
  ));
  rt.remove(derived_ty(), p)?;
  assert!(matches!(
    rt.find(base_ty(), base_ptr),
    Err(BindError::NotFound { .. })
  ));
  Ok(())
}

#[test]
fn base_wrapper_is_found_through_derived_registry() -> Result<(), BindError> {
  let mut rt = linked_runtime()?;
  let p = NativePtr::from_addr(0x1000);
  let base_ptr = NativePtr::from_addr(0x1008);

  let wrapped = rt.wrap(base_ty(), base_ptr, Ownership::Borrowed)?;
  assert_eq!(Value::Object(rt.find(derived_ty(), p)?), wrapped);
  Ok(())
}

#[test]
fn unwrap_adjusts_between_views() -> Result<(), BindError> {
  let mut rt = linked_runtime()?;
  let mut object = Derived {
    header: 1,
    base: Base { tag: 42 },
  };
  let p = NativePtr::from_mut(&mut object);

  let wrapped = rt.wrap(derived_ty(), p, Ownership::Borrowed)?;
  let as_base = rt.unwrap(base_ty(), wrapped)?;
  // SAFETY: `object` outlives the borrowed wrapper and `as_base` points at its base field.
  let tag = unsafe { (*as_base.as_ptr::<Base>()).tag };
  assert_eq!(tag, 42);
  assert_eq!(rt.unwrap(derived_ty(), wrapped)?, p);

  let other = rt.wrap(base_ty(), NativePtr::from_addr(0x2008), Ownership::Borrowed)?;
  assert_eq!(rt.unwrap(derived_ty(), other)?, NativePtr::from_addr(0x2000));

  assert!(matches!(
    rt.unwrap(TypeIdentity::of::<Unrelated>(), wrapped),
    Err(BindError::TypeMismatch { .. })
  ));
  Ok(())
}

fn plus_16(ptr: NativePtr) -> NativePtr {
  ptr.add(16)
}

fn minus_16(ptr: NativePtr) -> NativePtr {
  ptr.sub(16)
}

#[test]
fn search_spans_multiple_levels() -> Result<(), BindError> {
  let mut rt = linked_runtime()?;
  let more = TypeIdentity::of::<MoreDerived>();
  rt.set_base(
    more,
    derived_ty(),
    PtrAdjust::Custom {
      to_base: plus_16,
      to_this: minus_16,
    },
  )?;

  let p = NativePtr::from_addr(0x4000);
  let wrapped = rt.wrap(more, p, Ownership::Borrowed)?;

  // MoreDerived 0x4000 -> Derived 0x4010 -> Base 0x4018.
  assert_eq!(Value::Object(rt.find(base_ty(), NativePtr::from_addr(0x4018))?), wrapped);
  assert_eq!(Value::Object(rt.find(derived_ty(), NativePtr::from_addr(0x4010))?), wrapped);
  assert_eq!(rt.unwrap(base_ty(), wrapped)?, NativePtr::from_addr(0x4018));

  let base_wrapped = rt.wrap(base_ty(), NativePtr::from_addr(0x5018), Ownership::Borrowed)?;
  assert_eq!(Value::Object(rt.find(more, NativePtr::from_addr(0x5000))?), base_wrapped);
  assert_eq!(rt.unwrap(more, base_wrapped)?, NativePtr::from_addr(0x5000));
  Ok(())
}

struct Left;
struct Right;

#[test]
fn derived_registries_are_searched_in_registration_order() -> Result<(), BindError> {
  let mut rt = Runtime::new(RuntimeOptions::default());
  let left = TypeIdentity::of::<Left>();
  let right = TypeIdentity::of::<Right>();
  rt.set_base(left, base_ty(), PtrAdjust::Offset(8))?;
  rt.set_base(right, base_ty(), PtrAdjust::Identity)?;
  assert_eq!(
    rt.pool().get(base_ty()).map(|r| r.derived().to_vec()),
    Some(vec![left, right])
  );

  let base_ptr = NativePtr::from_addr(0x3008);
  let from_right = rt.wrap(right, base_ptr, Ownership::Borrowed)?;
  assert_eq!(Value::Object(rt.find(base_ty(), base_ptr)?), from_right);

  let from_left = rt.wrap(left, NativePtr::from_addr(0x3000), Ownership::Borrowed)?;
  assert_eq!(Value::Object(rt.find(base_ty(), base_ptr)?), from_left);
  Ok(())
}

#[test]
fn invalid_inheritance_is_rejected() -> Result<(), BindError> {
  let mut rt = linked_runtime()?;

  assert_eq!(
    rt.set_base(derived_ty(), TypeIdentity::of::<Unrelated>(), PtrAdjust::Identity),
    Err(BindError::BaseAlreadySet {
      type_name: derived_ty().name(),
      base: base_ty().name(),
    })
  );
  assert!(matches!(
    rt.set_base(base_ty(), base_ty(), PtrAdjust::Identity),
    Err(BindError::InheritanceCycle { .. })
  ));
  assert!(matches!(
    rt.set_base(base_ty(), derived_ty(), PtrAdjust::Identity),
    Err(BindError::InheritanceCycle { .. })
  ));
  assert!(rt.pool().get(base_ty()).is_some_and(|r| r.base().is_none()));
  Ok(())
}

#[test]
fn derived_wrappers_see_base_members() -> Result<(), BindError> {
  let mut rt = Runtime::new(RuntimeOptions::default());
  let base_template = Class::<Base>::new(&mut rt)
    .member("kind", Value::Number(1.0))?
    .template();
  Class::<Derived>::new(&mut rt)
    .inherit::<Base>(PtrAdjust::Offset(offset_of!(Derived, base)))?
    .member("depth", Value::Number(2.0))?;

  let wrapped = wrap_object(
    &mut rt,
    Box::new(Derived {
      header: 0,
      base: Base { tag: 0 },
    }),
  )?;
  let obj = wrapped.as_object().expect("wrapped value is an object");
  assert_eq!(rt.heap().object_get(obj, "kind")?, Value::Number(1.0));
  assert_eq!(rt.heap().object_get(obj, "depth")?, Value::Number(2.0));
  assert!(rt.heap().object_instance_of(obj, base_template)?);
  Ok(())
}
