/// Errors produced by the heap and host runtime primitives.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum VmError {
  /// The heap has exceeded its configured memory limit.
  #[error("out of memory")]
  OutOfMemory,

  /// A GC handle was used after the underlying allocation was freed (or the handle is otherwise
  /// malformed).
  #[error("invalid handle")]
  InvalidHandle,

  /// An attempted template inheritance would introduce a cycle in the template chain.
  #[error("template inheritance cycle")]
  PrototypeCycle,

  /// A template chain traversal exceeded a hard upper bound.
  #[error("template chain too deep")]
  PrototypeChainTooDeep,

  /// A template's parent can only be set once.
  #[error("template already inherits from another template")]
  TemplateAlreadyInherits,

  #[error("type error: {0}")]
  TypeError(&'static str),
}
