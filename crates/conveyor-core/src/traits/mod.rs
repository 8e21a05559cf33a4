//! Component contracts
//!
//! The engine consumes collaborators through three capability traits (a
//! [`Source`] polls batches in, a [`Stage`] transforms one record into zero
//! or more, a [`Sink`] delivers batches out) plus the optional
//! [`TransactionalResource`] a connector may expose for per-batch commit
//! coordination. Connector implementations live outside this crate; the
//! engine depends only on these contracts.

pub mod resource;
pub mod sink;
pub mod source;
pub mod stage;

pub use resource::{ResourceSet, TransactionalResource};
pub use sink::{DeliverResult, Sink};
pub use source::Source;
pub use stage::{Stage, StageOutput};
