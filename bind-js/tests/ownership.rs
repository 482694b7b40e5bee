use bind_js::{
  BindError, NativePtr, Ownership, OwnershipPolicy, PolicyRef, Runtime, RuntimeOptions,
  TypeIdentity,
};
use std::cell::RefCell;
use std::rc::Rc;

struct Resource;

#[derive(Default)]
struct RecordingPolicy {
  begun: Vec<NativePtr>,
  ended: Vec<NativePtr>,
}

impl OwnershipPolicy for RecordingPolicy {
  fn begin_managing(&mut self, ptr: NativePtr) {
    self.begun.push(ptr);
  }

  fn end_managing(&mut self, ptr: NativePtr) {
    self.ended.push(ptr);
  }
}

fn recording_policy() -> (Rc<RefCell<RecordingPolicy>>, PolicyRef) {
  let policy = Rc::new(RefCell::new(RecordingPolicy::default()));
  let policy_ref: PolicyRef = policy.clone();
  (policy, policy_ref)
}

#[test]
fn policy_sees_begin_and_end_once() -> Result<(), BindError> {
  let mut rt = Runtime::new(RuntimeOptions::default());
  let ty = TypeIdentity::of::<Resource>();
  let ptr = NativePtr::from_addr(0x1000);
  let (policy, policy_ref) = recording_policy();

  rt.wrap(ty, ptr, Ownership::Policy(policy_ref))?;
  assert_eq!(policy.borrow().begun, vec![ptr]);
  assert!(policy.borrow().ended.is_empty());

  rt.remove(ty, ptr)?;
  assert_eq!(policy.borrow().begun, vec![ptr]);
  assert_eq!(policy.borrow().ended, vec![ptr]);
  Ok(())
}

#[test]
fn attaching_a_policy_to_an_existing_wrapper() -> Result<(), BindError> {
  let mut rt = Runtime::new(RuntimeOptions::default());
  let ty = TypeIdentity::of::<Resource>();
  let ptr = NativePtr::from_addr(0x2000);
  let (policy, policy_ref) = recording_policy();
  let (other, other_ref) = recording_policy();

  rt.wrap(ty, ptr, Ownership::Borrowed)?;
  rt.set_ownership_policy(ty, ptr, policy_ref.clone())?;
  assert_eq!(policy.borrow().begun, vec![ptr]);

  // Same policy again is a no-op.
  rt.set_ownership_policy(ty, ptr, policy_ref)?;
  assert_eq!(policy.borrow().begun.len(), 1);

  assert_eq!(
    rt.set_ownership_policy(ty, ptr, other_ref.clone()),
    Err(BindError::PolicyConflict {
      type_name: ty.name(),
      ptr,
    })
  );
  assert!(other.borrow().begun.is_empty());

  assert!(matches!(
    rt.set_ownership_policy(ty, NativePtr::from_addr(0x3000), other_ref),
    Err(BindError::NotManaged { .. })
  ));

  rt.remove(ty, ptr)?;
  assert_eq!(policy.borrow().ended, vec![ptr]);
  assert!(other.borrow().ended.is_empty());
  Ok(())
}

#[test]
fn policy_replaces_exclusive_ownership() -> Result<(), BindError> {
  let mut rt = Runtime::new(RuntimeOptions::default());
  let ty = TypeIdentity::of::<Resource>();
  let ptr = NativePtr::from_addr(0x4000);
  let destroyed = Rc::new(RefCell::new(Vec::new()));
  let log = destroyed.clone();
  rt.registry(ty)
    .set_destructor(Rc::new(move |ptr: NativePtr| log.borrow_mut().push(ptr)));
  let (policy, policy_ref) = recording_policy();

  rt.wrap(ty, ptr, Ownership::Exclusive)?;
  rt.set_ownership_policy(ty, ptr, policy_ref)?;
  rt.remove(ty, ptr)?;

  assert!(destroyed.borrow().is_empty());
  assert_eq!(policy.borrow().ended, vec![ptr]);
  Ok(())
}

#[test]
fn borrowed_objects_are_never_destroyed() -> Result<(), BindError> {
  let mut rt = Runtime::new(RuntimeOptions::default());
  let ty = TypeIdentity::of::<Resource>();
  let destroyed = Rc::new(RefCell::new(Vec::new()));
  let log = destroyed.clone();
  rt.registry(ty)
    .set_destructor(Rc::new(move |ptr: NativePtr| log.borrow_mut().push(ptr)));

  rt.wrap(ty, NativePtr::from_addr(0x5000), Ownership::Borrowed)?;
  rt.wrap(ty, NativePtr::from_addr(0x6000), Ownership::Exclusive)?;
  rt.remove_all(ty)?;

  assert_eq!(*destroyed.borrow(), vec![NativePtr::from_addr(0x6000)]);
  Ok(())
}

#[test]
fn exclusive_without_destructor_is_released() -> Result<(), BindError> {
  let mut rt = Runtime::new(RuntimeOptions::default());
  let ty = TypeIdentity::of::<Resource>();
  let ptr = NativePtr::from_addr(0x7000);

  rt.wrap(ty, ptr, Ownership::Exclusive)?;
  rt.remove(ty, ptr)?;
  assert!(rt.pool().get(ty).is_some_and(|r| r.is_empty()));
  Ok(())
}
