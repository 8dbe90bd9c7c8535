// src/reflect/macros.rs
//! Declaration macros for reflected structs and oneofs

/// Declare the fields of an existing struct, in physical order
///
/// Generates a [`Reflect`](crate::reflect::Reflect) impl with a `const`
/// layout table plus forward and reverse walks, and checks at compile time
/// that the declared fields are exactly the struct's members, in order, with
/// only natural-alignment padding. Use `#[repr(C)]` on the struct; the default
/// Rust representation may reorder fields.
///
/// Fields of a oneof type are marked with `oneof` and are dispatched through
/// [`OneofField`](crate::reflect::OneofField) instead of being visited as a
/// whole.
///
/// ```ignore
/// #[repr(C)]
/// struct Header { opcode: u32, flags: u16, operand: InstructionOperand }
///
/// reflect_struct! {
///     Header {
///         opcode: u32,
///         flags: u16,
///         oneof operand: InstructionOperand,
///     }
/// }
/// ```
#[macro_export]
macro_rules! reflect_struct {
    ($ty:ident { $($body:tt)* }) => {
        $crate::reflect_struct!(@munch $ty [] $($body)*);
    };

    (@munch $ty:ident [$($acc:tt)*] oneof $field:ident : $fty:ty , $($rest:tt)*) => {
        $crate::reflect_struct!(@munch $ty [$($acc)* (oneof $field $fty)] $($rest)*);
    };
    (@munch $ty:ident [$($acc:tt)*] oneof $field:ident : $fty:ty) => {
        $crate::reflect_struct!(@munch $ty [$($acc)* (oneof $field $fty)]);
    };
    (@munch $ty:ident [$($acc:tt)*] $field:ident : $fty:ty , $($rest:tt)*) => {
        $crate::reflect_struct!(@munch $ty [$($acc)* (plain $field $fty)] $($rest)*);
    };
    (@munch $ty:ident [$($acc:tt)*] $field:ident : $fty:ty) => {
        $crate::reflect_struct!(@munch $ty [$($acc)* (plain $field $fty)]);
    };

    (@munch $ty:ident [$(($kind:ident $field:ident $fty:ty))*]) => {
        impl $crate::reflect::Reflect for $ty {
            const LAYOUT: $crate::reflect::StructLayout = $crate::reflect::StructLayout {
                type_name: stringify!($ty),
                file: file!(),
                line: line!(),
                size: ::core::mem::size_of::<$ty>(),
                align: ::core::mem::align_of::<$ty>(),
                fields: &$crate::reflect::layout::index_fields([
                    $(
                        $crate::reflect::FieldDescriptor::of::<$fty>(
                            stringify!($field),
                            ::core::mem::offset_of!($ty, $field),
                        ),
                    )*
                ]),
            };

            #[allow(unused_mut, unused_variables, unused_assignments)]
            fn walk_fields<V, C>(&mut self, ctx: &mut C)
            where
                V: $crate::reflect::FieldVisitor<C>,
                C: ?Sized,
            {
                let mut index = 0usize;
                $(
                    $crate::__reflect_visit!($kind, V, self, ctx, index, $field, $fty);
                    index += 1;
                )*
            }

            #[allow(unused_mut, unused_variables, unused_assignments)]
            fn reverse_walk_fields<V, C>(&mut self, ctx: &mut C)
            where
                V: $crate::reflect::FieldVisitor<C>,
                C: ?Sized,
            {
                let mut index = <Self as $crate::reflect::Reflect>::FIELD_COUNT;
                $crate::__reflect_reverse!(V, self, ctx, index, [$(($kind $field $fty))*] []);
            }
        }

        const _: () = {
            let layout = &<$ty as $crate::reflect::Reflect>::LAYOUT;
            $(
                assert!(
                    !layout.is_first_violation(stringify!($field)),
                    concat!(
                        "layout of `", stringify!($ty), "` declared at ", file!(), ":", line!(),
                        ": field `", stringify!($field),
                        "` is not where the declared fields put it (undeclared member, padding, or out-of-order declaration before it)"
                    )
                );
            )*
            assert!(
                !matches!(layout.check(), $crate::reflect::LayoutCheck::StructSize),
                concat!(
                    "layout of `", stringify!($ty), "` declared at ", file!(), ":", line!(),
                    ": declared fields do not cover the whole struct (undeclared member after the last declared field)"
                )
            );
        };
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __reflect_visit {
    (plain, $V:ident, $this:ident, $ctx:ident, $index:expr, $field:ident, $fty:ty) => {
        $V::visit::<$fty>(
            $ctx,
            $crate::reflect::Field::new($index, stringify!($field), &mut $this.$field),
        );
    };
    (oneof, $V:ident, $this:ident, $ctx:ident, $index:expr, $field:ident, $fty:ty) => {
        <$fty as $crate::reflect::OneofField>::dispatch::<$V, _>(&mut $this.$field, $ctx, $index);
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __reflect_reverse {
    ($V:ident, $this:ident, $ctx:ident, $index:ident, [] [$(($kind:ident $field:ident $fty:ty))*]) => {
        $(
            $index -= 1;
            $crate::__reflect_visit!($kind, $V, $this, $ctx, $index, $field, $fty);
        )*
    };
    ($V:ident, $this:ident, $ctx:ident, $index:ident, [$head:tt $($rest:tt)*] [$($acc:tt)*]) => {
        $crate::__reflect_reverse!($V, $this, $ctx, $index, [$($rest)*] [$head $($acc)*]);
    };
}

/// Declare the cases of a oneof enum
///
/// Every variant wraps exactly one operand type and names its field and
/// non-zero case value. Omitting a variant is a compile error (non-exhaustive
/// match); duplicate or zero case values fail const evaluation.
///
/// ```ignore
/// reflect_oneof! {
///     InstructionOperand {
///         Int64Operand(i64) => int64_operand = 8,
///         BoolOperand(bool) => bool_operand = 10,
///     }
/// }
/// ```
#[macro_export]
macro_rules! reflect_oneof {
    ($ty:ident { $($variant:ident ( $payload:ty ) => $name:ident = $case:literal),* $(,)? }) => {
        impl $crate::reflect::OneofField for $ty {
            const ONEOF_NAME: &'static str = stringify!($ty);

            const CASES: &'static [$crate::reflect::OneofCase] = &[
                $($crate::reflect::OneofCase { value: $case, name: stringify!($name) },)*
            ];

            fn case(&self) -> i32 {
                match self {
                    $($ty::$variant(_) => $case,)*
                }
            }

            fn case_name(&self) -> &'static str {
                match self {
                    $($ty::$variant(_) => stringify!($name),)*
                }
            }

            fn dispatch<V, C>(&mut self, ctx: &mut C, index: usize)
            where
                V: $crate::reflect::FieldVisitor<C>,
                C: ?Sized,
            {
                match self {
                    $(
                        $ty::$variant(value) => V::visit::<$payload>(
                            ctx,
                            $crate::reflect::Field::new(index, stringify!($name), value),
                        ),
                    )*
                }
            }
        }

        const _: () = assert!(
            $crate::reflect::oneof::cases_are_valid(<$ty as $crate::reflect::OneofField>::CASES),
            concat!("oneof `", stringify!($ty), "` declares a zero or duplicate case value")
        );
    };
}
