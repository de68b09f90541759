//! # URA Formal
//!
//! Declarative resolution contexts over content stores.
//!
//! Root operators are backed by [`FormalProvider`]s that turn a URI into a
//! store. Nested operators are backed by sets of [`FormalHandler`]s, each
//! mapping one typed entry of the current store to a typed entry of the
//! next. A [`FormalContext`] picks the root table while the store is empty
//! and the nested table afterwards.
//!
//! ```text
//! FormalContextBuilder
//!     ├── root(ops, config, FormalProvider)   → FormalRootResolver
//!     └── nested(ops, config, HandlerSet)     → FormalNestedResolver
//!             │
//!         FormalContext: ResolutionContext<ContentStore<P>>
//! ```

pub mod context;
pub mod handler;
pub mod resolver;

pub use context::{FormalContext, FormalContextBuilder};
pub use handler::{FormalHandler, HandlerSet};
pub use resolver::{FormalNestedResolver, FormalProvider, FormalRootResolver};
