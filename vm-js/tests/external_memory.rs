use vm_js::{Heap, HeapLimits, Value, VmError};

#[test]
fn external_memory_counter_tracks_adjustments() {
  let mut heap = Heap::new(HeapLimits::new(1024 * 1024, 1024 * 1024));
  assert_eq!(heap.external_bytes(), 0);
  assert_eq!(heap.adjust_external_memory(128), 128);
  assert_eq!(heap.adjust_external_memory(64), 192);
  assert_eq!(heap.adjust_external_memory(-192), 0);
  assert_eq!(heap.external_bytes(), 0);
}

#[test]
fn external_memory_pressure_triggers_gc() -> Result<(), VmError> {
  let mut heap = Heap::new(HeapLimits::new(1024 * 1024, 64 * 1024));

  let runs_before = heap.gc_runs();
  heap.scope().alloc_object()?;
  assert_eq!(heap.gc_runs(), runs_before, "no pressure yet");

  // External memory counts towards the threshold, so the next allocation collects first.
  heap.adjust_external_memory(64 * 1024);
  heap.scope().alloc_object()?;
  assert!(heap.gc_runs() > runs_before);
  Ok(())
}

#[test]
fn external_memory_does_not_count_towards_max_bytes() -> Result<(), VmError> {
  let max_bytes = 16 * 1024;
  let mut heap = Heap::new(HeapLimits::new(max_bytes, max_bytes / 2));
  heap.adjust_external_memory(10 * max_bytes as isize);

  let mut scope = heap.scope();
  let obj = scope.alloc_object()?;
  scope.push_root(Value::Object(obj));
  assert!(scope.heap().is_valid_object(obj));
  Ok(())
}
