//! Typed description of what to allocate and where the facts live.
//!
//! Nothing in this module touches storage. Schema and table names are
//! validated on construction, so anything holding a `TableRef` holds a name
//! that is safe to hand to a store.

pub mod filter;
pub mod ident;
pub mod request;
pub mod tables;

pub use filter::{AllocationFilter, FilterSet};
pub use ident::{Identifier, IdentifierError, MAX_IDENTIFIER_LEN};
pub use request::AllocationRequest;
pub use tables::{SourceTables, TableKind, TableRef, DEFAULT_SCHEMA};
