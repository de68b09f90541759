//! # URA Kernel
//!
//! Typed, chainable resolution of content along navigation chains.
//!
//! A caller describes a path as a [`NavigationChain`] of `(operator,
//! argument)` steps. A [`ResolutionContext`] walks the chain, asking at
//! every step which [`Resolver`] handles the operator for the current
//! value. With [`ContentStore`] as the value, a resolver probes the store
//! for typed payloads and synthesizes the next store.
//!
//! ## Architecture
//!
//! ```text
//! Outcome<S, F>         ← Success or failure, chainable on both channels
//!     │
//! MediaType             ← top/[tree.]sub[+suffix]; k=v, with wildcards
//!     │
//! TypedMediaType        ← MediaType + TypeTag, the store's dispatch key
//!     │
//! ContentStore<P>       ← Lazy producers, exact / subtype / unification lookup
//!     │
//! NavigationChain       ← (op, argument) steps
//!     │
//! ResolutionContext<V>  ← Operator lookup + sequential resolve loop
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod media_type;
pub mod nav;
pub mod outcome;
pub mod payload;
pub mod store;
pub mod type_tag;
pub mod typed;
pub mod uri;

pub use config::{DuplicatePolicy, KernelConfig, ResolutionConfig, StoreConfig};
pub use context::{DefaultContext, ResolutionContext, Resolver, SharedResolver};
pub use error::{ConfigError, OperationScope, Problem};
pub use media_type::MediaType;
pub use nav::{NavigationChain, Step};
pub use outcome::{Failure, Outcome, Success, first_success};
pub use payload::{FromPayload, Payload, Value};
pub use store::{ContentStore, ContentStoreBuilder, Item, Producer};
pub use type_tag::{TypeHierarchy, TypeHierarchyBuilder, TypeTag};
pub use typed::TypedMediaType;
pub use uri::Uri;
