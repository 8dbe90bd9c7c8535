// src/reflect/walk.rs
//! Generic field walking
//!
//! A visitor is a type with a generic associated function; it carries no
//! state of its own. State lives in the context object the caller threads
//! through the walk, so one visitor can serve many walks.

use crate::reflect::layout::StructLayout;
use std::any::Any;
use std::fmt;

/// Bound every reflected field type satisfies
pub trait FieldValue: Any + fmt::Debug {}

impl<T: Any + fmt::Debug> FieldValue for T {}

/// One field handed to a visitor
#[derive(Debug)]
pub struct Field<'a, F: ?Sized> {
    /// Ordinal of the declared field
    pub index: usize,

    /// Declared field name, or the case name when reached through a oneof
    pub name: &'static str,

    pub value: &'a mut F,
}

impl<'a, F: ?Sized> Field<'a, F> {
    pub fn new(index: usize, name: &'static str, value: &'a mut F) -> Self {
        Self { index, name, value }
    }
}

impl<'a, F: FieldValue> Field<'a, F> {
    /// Typed access to the field when the visitor expects `T`
    pub fn downcast_mut<T: Any>(&mut self) -> Option<&mut T> {
        (&mut *self.value as &mut dyn Any).downcast_mut::<T>()
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        (&*self.value as &dyn Any).downcast_ref::<T>()
    }
}

/// Polymorphic per-field operation
pub trait FieldVisitor<C: ?Sized> {
    fn visit<F: FieldValue>(ctx: &mut C, field: Field<'_, F>);
}

/// Implemented by [`reflect_struct!`](crate::reflect_struct)
pub trait Reflect: Sized + 'static {
    /// Verified layout
    const LAYOUT: StructLayout;

    /// Number of declared fields
    const FIELD_COUNT: usize = Self::LAYOUT.fields.len();

    /// Visit every field, first declared first
    fn walk_fields<V, C>(&mut self, ctx: &mut C)
    where
        V: FieldVisitor<C>,
        C: ?Sized;

    /// Visit every field, last declared first (teardown order)
    fn reverse_walk_fields<V, C>(&mut self, ctx: &mut C)
    where
        V: FieldVisitor<C>,
        C: ?Sized;

    /// Byte offset of the field at ordinal `index`
    fn field_offset(index: usize) -> Option<usize> {
        Self::LAYOUT.offset(index)
    }
}

/// Collects `(index, name)` pairs in visiting order
#[derive(Debug, Default)]
pub struct VisitLog {
    pub visited: Vec<(usize, &'static str)>,
}

/// Visitor that records into a [`VisitLog`]
pub struct RecordVisit;

impl FieldVisitor<VisitLog> for RecordVisit {
    fn visit<F: FieldValue>(ctx: &mut VisitLog, field: Field<'_, F>) {
        ctx.visited.push((field.index, field.name));
    }
}

/// Names of `value`'s fields in forward walk order
pub fn field_order<T: Reflect>(value: &mut T) -> Vec<(usize, &'static str)> {
    let mut log = VisitLog::default();
    value.walk_fields::<RecordVisit, _>(&mut log);
    log.visited
}

/// Names of `value`'s fields in reverse walk order
pub fn teardown_order<T: Reflect>(value: &mut T) -> Vec<(usize, &'static str)> {
    let mut log = VisitLog::default();
    value.reverse_walk_fields::<RecordVisit, _>(&mut log);
    log.visited
}
