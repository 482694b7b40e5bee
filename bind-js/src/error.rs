use crate::NativePtr;
use vm_js::VmError;

/// Errors produced by the object bridge.
///
/// All variants are local, recoverable conditions. Host-initiated calls should surface them as host
/// exceptions via [`BindError::to_vm_error`] rather than aborting.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BindError {
  /// The address is already wrapped in this registry.
  #[error("{type_name} object at {ptr} is already wrapped")]
  AlreadyWrapped {
    type_name: &'static str,
    ptr: NativePtr,
  },

  /// The address is unknown to the registry, its derived registries, and its base chain.
  #[error("no wrapped {type_name} object at {ptr}")]
  NotFound {
    type_name: &'static str,
    ptr: NativePtr,
  },

  /// The address has no entry owned directly by this registry.
  #[error("{type_name} object at {ptr} is not managed by this registry")]
  NotManaged {
    type_name: &'static str,
    ptr: NativePtr,
  },

  /// The host value is not a wrapper created by this bridge.
  #[error("value is not a wrapped {type_name} object")]
  NotAnObject { type_name: &'static str },

  /// The wrapper belongs to a type that is neither a base nor a derived type of the requested one.
  #[error("expected a {expected} object, found {found}")]
  TypeMismatch {
    expected: &'static str,
    found: &'static str,
  },

  /// A different ownership policy already manages the address.
  #[error("{type_name} object at {ptr} is already managed by another ownership policy")]
  PolicyConflict {
    type_name: &'static str,
    ptr: NativePtr,
  },

  /// Construction was requested for a type without a constructor hook.
  #[error("{type_name} has no registered constructor")]
  NoConstructor { type_name: &'static str },

  /// The runtime has no registry for the type.
  #[error("no registry for {type_name}")]
  RegistryNotFound { type_name: &'static str },

  /// The type already has a base type.
  #[error("{type_name} already inherits from {base}")]
  BaseAlreadySet {
    type_name: &'static str,
    base: &'static str,
  },

  /// The requested base edge would make the inheritance graph cyclic.
  #[error("{type_name} cannot inherit from {base}: inheritance cycle")]
  InheritanceCycle {
    type_name: &'static str,
    base: &'static str,
  },

  /// A host runtime primitive failed.
  #[error(transparent)]
  Vm(#[from] VmError),
}

impl BindError {
  /// Translates the error into the host's exception equivalent.
  pub fn to_vm_error(&self) -> VmError {
    match self {
      BindError::Vm(err) => err.clone(),
      BindError::AlreadyWrapped { .. } => VmError::TypeError("object is already wrapped"),
      BindError::NotFound { .. } => VmError::TypeError("object is not wrapped"),
      BindError::NotManaged { .. } => VmError::TypeError("object is not managed"),
      BindError::NotAnObject { .. } => VmError::TypeError("value is not a wrapped object"),
      BindError::TypeMismatch { .. } => VmError::TypeError("wrapped object has an unrelated type"),
      BindError::PolicyConflict { .. } => {
        VmError::TypeError("object is managed by another ownership policy")
      }
      BindError::NoConstructor { .. } => VmError::TypeError("class has no constructor"),
      BindError::RegistryNotFound { .. } => VmError::TypeError("class is not registered"),
      BindError::BaseAlreadySet { .. } | BindError::InheritanceCycle { .. } => {
        VmError::TypeError("invalid class inheritance")
      }
    }
  }
}

impl From<BindError> for VmError {
  fn from(err: BindError) -> Self {
    err.to_vm_error()
  }
}
