// src/reflect/mod.rs
//! Compile-time struct layout reflection
//!
//! This module lets generic code walk the fields of operand structs without
//! knowing their shape:
//!
//! - **Layout**: per-field ordinal, offset, size and alignment in a `const`
//!   table, verified against the real layout during compilation
//! - **Walks**: forward (declaration order) and reverse (teardown order)
//!   visits with a caller-supplied visitor and context
//! - **Oneof**: tagged-union fields dispatch only the live case
//!
//! # Architecture
//!
//! ```text
//! reflect_struct! { T { a: A, b: B, oneof c: C } }
//!        │
//!        ├─ const T::LAYOUT ──► [a@0, b@8, c@16] ──► const assert (build error on mismatch)
//!        │
//!        └─ T::walk_fields::<V, Ctx>()          V::visit(ctx, a) → V::visit(ctx, b) → C::dispatch
//!           T::reverse_walk_fields::<V, Ctx>()  C::dispatch → V::visit(ctx, b) → V::visit(ctx, a)
//!                                                    │
//!                                                    └─ live case only: V::visit(ctx, c.<case>)
//! ```

pub mod layout;
mod macros;
pub mod oneof;
pub mod walk;

pub use layout::{FieldDescriptor, LayoutCheck, LayoutViolation, StructLayout};
pub use oneof::{OneofCase, OneofField};
pub use walk::{field_order, teardown_order, Field, FieldValue, FieldVisitor, Reflect};
