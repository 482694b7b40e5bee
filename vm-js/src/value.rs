use crate::GcObject;

/// A host runtime value.
///
/// Heap-allocated values are represented using GC-managed handles (e.g. [`GcObject`]).
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Value {
  /// The `undefined` value.
  Undefined,
  /// The `null` value. Also used as the empty handle.
  Null,
  /// A boolean.
  Bool(bool),
  /// A number (IEEE-754 double).
  Number(f64),
  /// A GC-managed object.
  Object(GcObject),
}

impl Value {
  /// Returns the object handle if this value is an object.
  #[inline]
  pub fn as_object(self) -> Option<GcObject> {
    match self {
      Value::Object(obj) => Some(obj),
      _ => None,
    }
  }

  #[inline]
  pub fn is_null(self) -> bool {
    matches!(self, Value::Null)
  }
}

impl From<GcObject> for Value {
  #[inline]
  fn from(obj: GcObject) -> Self {
    Value::Object(obj)
  }
}
