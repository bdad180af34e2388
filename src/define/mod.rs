//! Live class definition and redefinition.
//!
//! A [`ClassTable`] holds every currently defined class as an
//! [`Arc<DefinedClass>`]. Redefinition swaps the image *inside* the
//! handle, so callers holding a class across a reload keep a valid
//! handle and observe the new behavior on their next call - identity is
//! stable, behavior is late-bound.
//!
//! [`redefine_batch`] is all-or-nothing: every image in the batch is
//! validated against the live shape first, and only a fully valid
//! batch commits. A single structural mismatch rejects the whole batch
//! with nothing applied.
//!
//! [`invoke`] is the execution surface: it resolves the receiver by
//! name at call time and walks the live superclass chain, which is
//! what makes a swapped method body visible immediately.

mod invoke;
mod redefine;
mod table;

pub use invoke::{ClassLookup, InvokeError, MAX_CALL_DEPTH, invoke};
pub use redefine::{RedefineError, Redefinition, redefine_batch};
pub use table::{ClassTable, DefinedClass};
