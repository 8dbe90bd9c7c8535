// src/reflect/oneof.rs
//! Discriminated-union ("oneof") dispatch
//!
//! A oneof is a tagged enum whose variants each wrap one operand type and
//! carry a wire case value. Dispatch forwards only the live variant's payload
//! to the visitor, under the case's field name. The match is exhaustive, so an
//! unrecognized case cannot reach a walk; unknown case names are rejected
//! where raw input is decoded.

use crate::reflect::walk::FieldVisitor;

/// One declared `(field name, case value)` pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OneofCase {
    pub value: i32,
    pub name: &'static str,
}

/// Implemented by [`reflect_oneof!`](crate::reflect_oneof)
pub trait OneofField: 'static {
    /// Type name of the oneof
    const ONEOF_NAME: &'static str;

    /// Declared cases in declaration order
    const CASES: &'static [OneofCase];

    /// Case value of the live variant
    fn case(&self) -> i32;

    /// Field name of the live variant
    fn case_name(&self) -> &'static str;

    /// Visit the live variant's payload as field `index` of the enclosing struct
    fn dispatch<V, C>(&mut self, ctx: &mut C, index: usize)
    where
        V: FieldVisitor<C>,
        C: ?Sized;

    /// Look up a declared case by value
    fn case_by_value(value: i32) -> Option<OneofCase> {
        Self::CASES.iter().copied().find(|c| c.value == value)
    }

    /// Look up a declared case by field name
    fn case_by_name(name: &str) -> Option<OneofCase> {
        Self::CASES.iter().copied().find(|c| c.name == name)
    }
}

/// Case values must be non-zero and unique
pub const fn cases_are_valid(cases: &[OneofCase]) -> bool {
    let mut i = 0;
    while i < cases.len() {
        if cases[i].value == 0 {
            return false;
        }
        let mut j = i + 1;
        while j < cases.len() {
            if cases[i].value == cases[j].value {
                return false;
            }
            j += 1;
        }
        i += 1;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_validation() {
        let ok = [
            OneofCase { value: 1, name: "a" },
            OneofCase { value: 2, name: "b" },
        ];
        assert!(cases_are_valid(&ok));

        let dup = [
            OneofCase { value: 3, name: "a" },
            OneofCase { value: 3, name: "b" },
        ];
        assert!(!cases_are_valid(&dup));

        let zero = [OneofCase { value: 0, name: "a" }];
        assert!(!cases_are_valid(&zero));

        assert!(cases_are_valid(&[]));
    }
}
