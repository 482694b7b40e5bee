use bind_js::{BindError, NativePtr, Ownership, Runtime, RuntimeOptions, TypeIdentity};
use std::cell::Cell;
use std::rc::Rc;
use vm_js::Value;

struct Widget {
  #[allow(dead_code)]
  payload: [u64; 4],
}

struct Gadget;

fn counting_destructor(rt: &mut Runtime, ty: TypeIdentity) -> Rc<Cell<usize>> {
  let calls = Rc::new(Cell::new(0));
  let counter = calls.clone();
  rt.registry(ty)
    .set_destructor(Rc::new(move |_ptr: NativePtr| counter.set(counter.get() + 1)));
  calls
}

#[test]
fn wrap_then_unwrap_returns_the_address() -> Result<(), BindError> {
  let mut rt = Runtime::new(RuntimeOptions::default());
  let ty = TypeIdentity::of::<Widget>();
  let ptr = NativePtr::from_addr(0x1000);

  let value = rt.wrap(ty, ptr, Ownership::Borrowed)?;
  assert!(matches!(value, Value::Object(_)));
  assert_eq!(rt.unwrap(ty, value)?, ptr);
  assert_eq!(Value::Object(rt.find(ty, ptr)?), value);

  let registry = rt.pool().get(ty).expect("registry created on first wrap");
  assert_eq!(registry.len(), 1);
  assert!(registry.contains(ptr));
  assert_eq!(registry.ownership(ptr).map(Ownership::kind), Some("borrowed"));
  Ok(())
}

#[test]
fn wrapping_twice_fails_without_changing_state() -> Result<(), BindError> {
  let mut rt = Runtime::new(RuntimeOptions::default());
  let ty = TypeIdentity::of::<Widget>();
  let destroyed = counting_destructor(&mut rt, ty);
  let p1 = NativePtr::from_addr(0x2000);

  let first = rt.wrap(ty, p1, Ownership::Exclusive)?;
  let err = rt.wrap(ty, p1, Ownership::Exclusive).unwrap_err();
  assert_eq!(
    err,
    BindError::AlreadyWrapped {
      type_name: ty.name(),
      ptr: p1,
    }
  );
  assert_eq!(Value::Object(rt.find(ty, p1)?), first);
  assert_eq!(rt.pool().get(ty).map(|r| r.len()), Some(1));
  assert_eq!(destroyed.get(), 0);

  rt.remove(ty, p1)?;
  assert_eq!(destroyed.get(), 1);
  assert!(matches!(
    rt.find(ty, p1),
    Err(BindError::NotFound { .. })
  ));
  assert!(matches!(
    rt.remove(ty, p1),
    Err(BindError::NotManaged { .. })
  ));
  assert_eq!(destroyed.get(), 1);
  Ok(())
}

#[test]
fn null_wraps_to_null_without_an_entry() -> Result<(), BindError> {
  let mut rt = Runtime::new(RuntimeOptions::default());
  let ty = TypeIdentity::of::<Widget>();

  assert_eq!(rt.wrap(ty, NativePtr::NULL, Ownership::Exclusive)?, Value::Null);
  assert!(!rt.pool().contains(ty));
  assert!(matches!(
    rt.find(ty, NativePtr::NULL),
    Err(BindError::NotFound { .. })
  ));
  Ok(())
}

#[test]
fn unwrap_rejects_foreign_values() -> Result<(), BindError> {
  let mut rt = Runtime::new(RuntimeOptions::default());
  let widget = TypeIdentity::of::<Widget>();
  let gadget = TypeIdentity::of::<Gadget>();

  assert!(matches!(
    rt.unwrap(widget, Value::Number(1.0)),
    Err(BindError::NotAnObject { .. })
  ));

  let plain = rt.heap_mut().scope().alloc_object()?;
  assert!(matches!(
    rt.unwrap(widget, Value::Object(plain)),
    Err(BindError::NotAnObject { .. })
  ));

  let value = rt.wrap(gadget, NativePtr::from_addr(0x3000), Ownership::Borrowed)?;
  assert_eq!(
    rt.unwrap(widget, value),
    Err(BindError::TypeMismatch {
      expected: widget.name(),
      found: gadget.name(),
    })
  );
  Ok(())
}

#[test]
fn removed_wrappers_no_longer_unwrap() -> Result<(), BindError> {
  let mut rt = Runtime::new(RuntimeOptions::default());
  let ty = TypeIdentity::of::<Widget>();
  let ptr = NativePtr::from_addr(0x4000);

  let value = rt.wrap(ty, ptr, Ownership::Borrowed)?;
  let obj = value.as_object().expect("wrapped value is an object");
  rt.remove(ty, ptr)?;

  assert!(matches!(
    rt.unwrap(ty, value),
    Err(BindError::NotAnObject { .. })
  ));
  assert_eq!(rt.heap().object_host_slots(obj)?, None);
  assert!(!rt.heap().object_has_weak_notification(obj)?);

  // The address can be wrapped again afterwards.
  let rewrapped = rt.wrap(ty, ptr, Ownership::Borrowed)?;
  assert_ne!(rewrapped, value);
  assert_eq!(rt.unwrap(ty, rewrapped)?, ptr);
  Ok(())
}

#[test]
fn wrapped_objects_count_as_external_memory() -> Result<(), BindError> {
  let mut rt = Runtime::new(RuntimeOptions::default());
  let ty = TypeIdentity::of::<Widget>();
  assert_eq!(ty.size(), 32);

  rt.wrap(ty, NativePtr::from_addr(0x5000), Ownership::Borrowed)?;
  rt.wrap(ty, NativePtr::from_addr(0x6000), Ownership::Borrowed)?;
  assert_eq!(rt.heap().external_bytes(), 64);

  assert_eq!(rt.remove_all(ty)?, 2);
  assert_eq!(rt.heap().external_bytes(), 0);
  Ok(())
}

#[test]
fn external_memory_tracking_can_be_disabled() -> Result<(), BindError> {
  let mut rt = Runtime::new(RuntimeOptions {
    track_external_memory: false,
    ..RuntimeOptions::default()
  });
  let ty = TypeIdentity::of::<Widget>();

  rt.wrap(ty, NativePtr::from_addr(0x5000), Ownership::Borrowed)?;
  assert_eq!(rt.heap().external_bytes(), 0);
  rt.remove(ty, NativePtr::from_addr(0x5000))?;
  assert_eq!(rt.heap().external_bytes(), 0);
  Ok(())
}
