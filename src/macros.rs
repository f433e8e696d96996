//! The `field_tag!` macro: declares a zero-sized tag type together with its
//! per-type backing storage (the `Op` cell and the `IoMode` cell).
//!
//! A ZST tag implementing per-tag state, in the spirit of a compile-time
//! modulus parameter generalized to a *runtime* one: each invocation fixes
//! a concrete `LIMBS` for its tag, which sidesteps the fact that a `static`
//! generic over a `const LIMBS: usize` parameter has no expressible type in
//! stable Rust.

/// Declare a field tag type `$name` with `$limbs` 64-bit limbs of storage.
///
/// ```ignore
/// field_tag!(pub Fp1009, 1);
/// type Fp = Field<Fp1009, 1>;
/// Fp::init("1009", Mode::Auto)?;
/// ```
#[macro_export]
macro_rules! field_tag {
    ($(#[$attr:meta])* $vis:vis $name:ident, $limbs:expr) => {
        $(#[$attr])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
        $vis struct $name;

        impl $crate::field::FieldTag<{ $limbs }> for $name {
            fn op_lock() -> &'static ::std::sync::RwLock<::std::option::Option<$crate::backend::Op<{ $limbs }>>> {
                static OP: ::std::sync::RwLock<::std::option::Option<$crate::backend::Op<{ $limbs }>>> =
                    ::std::sync::RwLock::new(::std::option::Option::None);
                &OP
            }

            fn io_mode_cell() -> &'static ::std::sync::atomic::AtomicU32 {
                static IO_MODE: ::std::sync::atomic::AtomicU32 =
                    ::std::sync::atomic::AtomicU32::new(0);
                &IO_MODE
            }
        }
    };
}
