//! Minimal GC host runtime for `ecma-rs` native bindings.
//!
//! This crate provides the host-side primitives a native object bridge needs:
//! - A non-moving mark/sweep GC heap ([`Heap`])
//! - Stable, generation-checked handles ([`GcObject`], [`WeakGcObject`])
//! - Stack rooting via RAII scopes ([`Scope`]) + persistent roots ([`RootId`])
//! - Two embedder-owned fields per object ([`HostSlots`])
//! - One-shot collection notifications ([`WeakNotification`])
//! - An external memory counter that feeds the GC threshold heuristic
//! - Class templates with single inheritance ([`TemplateId`])
//!
//! # Rooting and handle validity
//!
//! Objects are referenced using stable handles. A handle contains `{ index, generation }`; the
//! `index` points into the heap slot vector and the `generation` is incremented every time that slot
//! is freed.
//!
//! This means:
//! - Handles are stable across `Vec` reallocations because objects are stored in index-addressed
//!   slots.
//! - A handle becomes invalid once the object is collected; future allocations may reuse the same
//!   slot index with a newer generation.
//! - Public APIs that dereference handles validate `{index,generation}` and return
//!   [`VmError::InvalidHandle`] for stale handles.
//!
//! The GC traces from three root sets:
//! - **Stack roots**: stored in `Heap::root_stack` and managed by [`Scope`].
//! - **Persistent roots**: managed by [`Heap::add_root`] / [`Heap::remove_root`].
//! - **Template members**: templates live as long as the heap.
//!
//! # Weak notifications
//!
//! An object whose weak notification is armed ([`Heap::object_set_weak_notification`]) and which
//! carries [`HostSlots`] queues exactly one [`WeakNotification`] when it is swept. The heap never
//! calls back into the embedding during a GC cycle; the embedding drains the queue with
//! [`Heap::take_weak_notifications`] once it is safe to re-enter its own bookkeeping.

mod error;
mod handle;
mod heap;
mod value;

pub use crate::error::VmError;
pub use crate::handle::GcObject;
pub use crate::handle::HeapId;
pub use crate::handle::RootId;
pub use crate::handle::TemplateId;
pub use crate::handle::WeakGcObject;
pub use crate::heap::Heap;
pub use crate::heap::HeapLimits;
pub use crate::heap::HostSlots;
pub use crate::heap::PersistentRoot;
pub use crate::heap::Scope;
pub use crate::heap::WeakNotification;
pub use crate::heap::MAX_PROTOTYPE_CHAIN;
pub use crate::value::Value;
