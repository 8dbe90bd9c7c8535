// src/reflect/layout.rs
//! Field descriptors and layout verification
//!
//! A [`StructLayout`] is produced in `const` context by
//! [`reflect_struct!`](crate::reflect_struct). Verification walks the declared
//! fields in order and recomputes where each one must start if the struct
//! contains exactly those fields, in that order, with natural alignment:
//!
//! ```text
//! acc(0)   = 0
//! acc(i)   = round_up(acc(i-1) + size(i-1), align(i))      must equal offset(i)
//! total    = round_up(acc(last) + size(last), align(struct)) must equal size(struct)
//! ```
//!
//! Any difference means an undeclared member, unexpected padding, or fields
//! declared out of physical order. The macro turns that into a build error.

use thiserror::Error;

/// Compile-time metadata for one declared field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Ordinal in declaration order
    pub index: usize,

    /// Field name as declared
    pub name: &'static str,

    /// Byte offset inside the struct
    pub offset: usize,

    /// `size_of` the field type
    pub size: usize,

    /// `align_of` the field type
    pub align: usize,
}

impl FieldDescriptor {
    /// Descriptor with explicit size and alignment; `index` is assigned by [`index_fields`]
    pub const fn new(name: &'static str, offset: usize, size: usize, align: usize) -> Self {
        Self {
            index: 0,
            name,
            offset,
            size,
            align,
        }
    }

    /// Descriptor for a field of type `T` at `offset`
    pub const fn of<T>(name: &'static str, offset: usize) -> Self {
        Self::new(
            name,
            offset,
            core::mem::size_of::<T>(),
            core::mem::align_of::<T>(),
        )
    }
}

/// Ordered field metadata of one struct type
#[derive(Debug, Clone, Copy)]
pub struct StructLayout {
    pub type_name: &'static str,

    /// Declaration site
    pub file: &'static str,
    pub line: u32,

    /// True in-memory size and alignment
    pub size: usize,
    pub align: usize,

    pub fields: &'static [FieldDescriptor],
}

/// Outcome of the const layout check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutCheck {
    Valid,
    /// First field whose offset differs from the accumulated size
    FieldOffset(usize),
    /// Declared fields do not add up to the struct size
    StructSize,
}

/// Layout check failure, with enough detail to locate the declaration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutViolation {
    #[error("{type_name} ({file}:{line}): field `{field}` (#{index}) is at offset {actual}, expected {expected}")]
    FieldOffset {
        type_name: &'static str,
        field: &'static str,
        index: usize,
        expected: usize,
        actual: usize,
        file: &'static str,
        line: u32,
    },

    #[error("{type_name} ({file}:{line}): declared fields account for {expected} bytes, struct is {actual}")]
    StructSize {
        type_name: &'static str,
        expected: usize,
        actual: usize,
        file: &'static str,
        line: u32,
    },
}

/// Round `value` up to a multiple of `align`
pub const fn round_up(value: usize, align: usize) -> usize {
    (value + align - 1) / align * align
}

/// Assign declaration-order ordinals
pub const fn index_fields<const N: usize>(mut fields: [FieldDescriptor; N]) -> [FieldDescriptor; N] {
    let mut i = 0;
    while i < N {
        fields[i].index = i;
        i += 1;
    }
    fields
}

const fn str_eq(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    let mut i = 0;
    while i < a.len() {
        if a[i] != b[i] {
            return false;
        }
        i += 1;
    }
    true
}

impl StructLayout {
    pub const fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Offset field `index` must have if the layout is exactly the declared fields
    pub const fn expected_offset(&self, index: usize) -> usize {
        let mut acc = 0;
        let mut i = 1;
        while i <= index {
            acc = round_up(acc + self.fields[i - 1].size, self.fields[i].align);
            i += 1;
        }
        acc
    }

    /// Struct size implied by the declared fields
    pub const fn accumulated_size(&self) -> usize {
        let n = self.fields.len();
        if n == 0 {
            return 0;
        }
        let last = &self.fields[n - 1];
        round_up(self.expected_offset(n - 1) + last.size, self.align)
    }

    pub const fn check(&self) -> LayoutCheck {
        let mut i = 0;
        while i < self.fields.len() {
            if self.expected_offset(i) != self.fields[i].offset {
                return LayoutCheck::FieldOffset(i);
            }
            i += 1;
        }

        let acc = self.accumulated_size();
        // Fieldless structs are zero-sized in Rust and one byte in C-like layouts
        let size_ok = if acc == 0 {
            self.size == 0 || self.size == 1
        } else {
            acc == self.size
        };

        if size_ok {
            LayoutCheck::Valid
        } else {
            LayoutCheck::StructSize
        }
    }

    /// Ordinal of the field called `name`
    pub const fn position(&self, name: &str) -> Option<usize> {
        let mut i = 0;
        while i < self.fields.len() {
            if str_eq(self.fields[i].name, name) {
                return Some(i);
            }
            i += 1;
        }
        None
    }

    /// True if `name` is the first field that breaks the layout
    pub const fn is_first_violation(&self, name: &str) -> bool {
        match (self.check(), self.position(name)) {
            (LayoutCheck::FieldOffset(bad), Some(pos)) => bad == pos,
            _ => false,
        }
    }

    /// Same rule as [`check`](Self::check), with a descriptive error
    pub fn verify(&self) -> Result<(), LayoutViolation> {
        match self.check() {
            LayoutCheck::Valid => Ok(()),
            LayoutCheck::FieldOffset(index) => {
                let field = &self.fields[index];
                Err(LayoutViolation::FieldOffset {
                    type_name: self.type_name,
                    field: field.name,
                    index,
                    expected: self.expected_offset(index),
                    actual: field.offset,
                    file: self.file,
                    line: self.line,
                })
            }
            LayoutCheck::StructSize => Err(LayoutViolation::StructSize {
                type_name: self.type_name,
                expected: self.accumulated_size(),
                actual: self.size,
                file: self.file,
                line: self.line,
            }),
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.position(name).map(|i| &self.fields[i])
    }

    /// Verified byte offset of the field at ordinal `index`
    pub fn offset(&self, index: usize) -> Option<usize> {
        self.fields.get(index).map(|f| f.offset)
    }

    /// Verified byte offset of the field called `name`
    pub fn offset_of(&self, name: &str) -> Option<usize> {
        self.field(name).map(|f| f.offset)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().map(|f| f.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const fn layout(size: usize, align: usize, fields: &'static [FieldDescriptor]) -> StructLayout {
        StructLayout {
            type_name: "Sample",
            file: file!(),
            line: line!(),
            size,
            align,
            fields,
        }
    }

    #[test]
    fn test_round_up() {
        assert_eq!(round_up(0, 8), 0);
        assert_eq!(round_up(1, 8), 8);
        assert_eq!(round_up(8, 8), 8);
        assert_eq!(round_up(9, 4), 12);
        assert_eq!(round_up(5, 1), 5);
    }

    #[test]
    fn test_index_fields_assigns_ordinals() {
        let fields = index_fields([
            FieldDescriptor::of::<u8>("a", 0),
            FieldDescriptor::of::<u32>("b", 4),
            FieldDescriptor::of::<u64>("c", 8),
        ]);
        let indices: Vec<usize> = fields.iter().map(|f| f.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_padded_layout_is_valid() {
        // { u8, u32, u16 } in C order: 0, 4, 8 -> size 12
        static FIELDS: [FieldDescriptor; 3] = index_fields([
            FieldDescriptor::new("a", 0, 1, 1),
            FieldDescriptor::new("b", 4, 4, 4),
            FieldDescriptor::new("c", 8, 2, 2),
        ]);
        let l = layout(12, 4, &FIELDS);
        assert_eq!(l.check(), LayoutCheck::Valid);
        assert!(l.verify().is_ok());
        assert_eq!(l.expected_offset(2), 8);
        assert_eq!(l.accumulated_size(), 12);
    }

    #[test]
    fn test_undeclared_member_detected() {
        // a hidden u32 sits between `a` and `b`
        static FIELDS: [FieldDescriptor; 2] = index_fields([
            FieldDescriptor::new("a", 0, 4, 4),
            FieldDescriptor::new("b", 8, 4, 4),
        ]);
        let l = layout(12, 4, &FIELDS);
        assert_eq!(l.check(), LayoutCheck::FieldOffset(1));
        assert!(l.is_first_violation("b"));
        assert!(!l.is_first_violation("a"));

        match l.verify() {
            Err(LayoutViolation::FieldOffset {
                field,
                expected,
                actual,
                ..
            }) => {
                assert_eq!(field, "b");
                assert_eq!(expected, 4);
                assert_eq!(actual, 8);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_out_of_order_declaration_detected() {
        static FIELDS: [FieldDescriptor; 2] = index_fields([
            FieldDescriptor::new("second", 4, 4, 4),
            FieldDescriptor::new("first", 0, 4, 4),
        ]);
        let l = layout(8, 4, &FIELDS);
        assert_eq!(l.check(), LayoutCheck::FieldOffset(0));
    }

    #[test]
    fn test_trailing_member_detected() {
        static FIELDS: [FieldDescriptor; 1] = index_fields([FieldDescriptor::new("a", 0, 4, 4)]);
        let l = layout(8, 4, &FIELDS);
        assert_eq!(l.check(), LayoutCheck::StructSize);
        assert!(matches!(
            l.verify(),
            Err(LayoutViolation::StructSize {
                expected: 4,
                actual: 8,
                ..
            })
        ));
    }

    #[test]
    fn test_fieldless_struct_special_case() {
        assert_eq!(layout(0, 1, &[]).check(), LayoutCheck::Valid);
        assert_eq!(layout(1, 1, &[]).check(), LayoutCheck::Valid);
        assert_eq!(layout(4, 4, &[]).check(), LayoutCheck::StructSize);
    }

    #[test]
    fn test_lookup() {
        static FIELDS: [FieldDescriptor; 2] = index_fields([
            FieldDescriptor::new("id", 0, 8, 8),
            FieldDescriptor::new("flag", 8, 1, 1),
        ]);
        let l = layout(16, 8, &FIELDS);
        assert_eq!(l.field_count(), 2);
        assert_eq!(l.position("flag"), Some(1));
        assert_eq!(l.offset_of("flag"), Some(8));
        assert_eq!(l.offset(0), Some(0));
        assert_eq!(l.offset(2), None);
        assert!(l.field("missing").is_none());
        assert_eq!(l.field_names().collect::<Vec<_>>(), vec!["id", "flag"]);
    }
}
