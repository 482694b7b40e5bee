//! Bridge between native objects and `vm-js` host objects.
//!
//! Native objects are identified by address ([`NativePtr`]) and type ([`TypeIdentity`]). Wrapping
//! one allocates a host object from the type's class template and records it in the type's
//! [`HandleRegistry`]:
//! - Every native address has at most one wrapper per registry.
//! - A wrapper carries its native address and its registry id in two host slots, so it can be
//!   unwrapped without a lookup by handle.
//! - Registries only hold weak references. When the heap collects a wrapper, the next bridge
//!   operation releases its entry according to its [`Ownership`].
//!
//! # Ownership
//!
//! - [`Ownership::Borrowed`]: the native object outlives the wrapper; nothing is freed.
//! - [`Ownership::Exclusive`]: the registry's destructor hook runs when the wrapper goes away.
//! - [`Ownership::Policy`]: an [`OwnershipPolicy`] decides. [`SharedPolicy`] keeps one `Rc` per
//!   wrapped object alive while the host references it.
//!
//! # Inheritance
//!
//! A registry may declare a base type ([`Runtime::set_base`]) together with a [`PtrAdjust`]
//! describing where the base subobject lives. [`Runtime::find`] then resolves an address through
//! derived and base registries, and [`Runtime::unwrap`] converts between base and derived views.
//!
//! All state lives in a [`Runtime`]; there is no global registry.

mod class;
mod error;
mod inherit;
mod policy;
mod pool;
mod ptr;
mod registry;
mod runtime;
mod shared;
mod type_info;

pub use crate::class::find_object;
pub use crate::class::to_host_ptr;
pub use crate::class::to_host_value;
pub use crate::class::unwrap_object;
pub use crate::class::wrap_borrowed;
pub use crate::class::wrap_object;
pub use crate::class::Class;
pub use crate::error::BindError;
pub use crate::inherit::InheritanceLink;
pub use crate::inherit::PtrAdjust;
pub use crate::policy::Ownership;
pub use crate::policy::OwnershipPolicy;
pub use crate::policy::PolicyRef;
pub use crate::pool::RegistryPool;
pub use crate::ptr::NativePtr;
pub use crate::registry::ConstructorFn;
pub use crate::registry::DestructorFn;
pub use crate::registry::HandleRegistry;
pub use crate::registry::RegistryId;
pub use crate::runtime::Runtime;
pub use crate::runtime::RuntimeOptions;
pub use crate::shared::find_shared;
pub use crate::shared::unwrap_shared;
pub use crate::shared::wrap_shared;
pub use crate::shared::SharedPolicy;
pub use crate::type_info::TypeIdentity;
