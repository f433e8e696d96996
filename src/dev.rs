//! Reusable test-macro helpers for a concrete `Field<Tag, LIMBS>` instance.
//!
//! Generates `#[test]` fns the way a compile-time `PrimeField` impl's test
//! macros would, but against a runtime-initialized tag. These variants take the
//! modulus and [`crate::backend::Mode`] as macro arguments and call `init`
//! at the top of every generated test; `init` is idempotent for a fixed
//! modulus, so re-running it across parallel test threads is harmless.

/// Run the identity-element tests for `$fe`, initialized with `$modulus`
/// under `$mode`.
#[macro_export]
macro_rules! test_field_identity {
    ($fe:ty, $modulus:expr, $mode:expr) => {
        #[test]
        fn zero_is_additive_identity() {
            $fe::init($modulus, $mode).unwrap();
            let zero = $fe::zero();
            let one = $fe::one();
            assert_eq!(zero.add(&zero), zero);
            assert_eq!(one.add(&zero), one);
        }

        #[test]
        fn one_is_multiplicative_identity() {
            $fe::init($modulus, $mode).unwrap();
            let one = $fe::one();
            assert_eq!(one.multiply(&one), one);
            assert!(one.is_one());
        }

        #[test]
        fn negation_is_involutive() {
            $fe::init($modulus, $mode).unwrap();
            let three = $fe::from_i64(3);
            assert_eq!(three.negate().negate(), three);
            assert!(three.add(&three.negate()).is_zero());
        }
    };
}

/// Ring-axiom property tests for `$fe` over values built from small `i64`
/// literals.
#[macro_export]
macro_rules! test_field_ring_axioms {
    ($fe:ty, $modulus:expr, $mode:expr) => {
        proptest::proptest! {
            #[test]
            fn addition_is_commutative(a in -1000i64..1000, b in -1000i64..1000) {
                $fe::init($modulus, $mode).unwrap();
                let (a, b) = ($fe::from_i64(a), $fe::from_i64(b));
                proptest::prop_assert_eq!(a.add(&b), b.add(&a));
            }

            #[test]
            fn multiplication_distributes_over_addition(a in -1000i64..1000, b in -1000i64..1000, c in -1000i64..1000) {
                $fe::init($modulus, $mode).unwrap();
                let (a, b, c) = ($fe::from_i64(a), $fe::from_i64(b), $fe::from_i64(c));
                proptest::prop_assert_eq!(a.multiply(&b.add(&c)), a.multiply(&b).add(&a.multiply(&c)));
            }

            #[test]
            fn invert_then_multiply_is_one_for_nonzero(a in 1i64..1000) {
                $fe::init($modulus, $mode).unwrap();
                let a = $fe::from_i64(a);
                if !a.is_zero() {
                    proptest::prop_assert!(a.multiply(&a.invert()).is_one());
                }
            }
        }
    };
}

/// Text- and byte-I/O round-trip tests for `$fe`.
#[macro_export]
macro_rules! test_field_io_roundtrip {
    ($fe:ty, $modulus:expr, $mode:expr) => {
        #[test]
        fn decimal_round_trip() {
            $fe::init($modulus, $mode).unwrap();
            for v in 0i64..17 {
                let x = $fe::from_i64(v);
                let s = x.to_string_radix($crate::io::IoMode::DEC).unwrap();
                let back = $fe::from_str_radix(&s, $crate::io::IoMode::DEC).unwrap();
                assert_eq!(x, back);
            }
        }

        #[test]
        fn hex_round_trip() {
            $fe::init($modulus, $mode).unwrap();
            let x = $fe::from_i64(11);
            let s = x.to_string_radix($crate::io::IoMode::HEX_PREFIX).unwrap();
            assert!(s.starts_with("0x"));
            let back = $fe::from_str_radix(&s, $crate::io::IoMode::AUTO).unwrap();
            assert_eq!(x, back);
        }

        #[test]
        fn array_byte_round_trip() {
            $fe::init($modulus, $mode).unwrap();
            let x = $fe::from_i64(9);
            let bytes = x.to_bytes().unwrap();
            let back = $fe::from_bytes(&bytes).unwrap();
            assert_eq!(x, back);
        }
    };
}

/// Square-root tests for `$fe`.
#[macro_export]
macro_rules! test_field_sqrt {
    ($fe:ty, $modulus:expr, $mode:expr) => {
        #[test]
        fn sqrt_of_perfect_squares() {
            $fe::init($modulus, $mode).unwrap();
            for &n in &[1u64, 4, 9, 16, 25, 36, 49, 64] {
                let fe = $fe::from_i64(n as i64);
                let root = fe.sqrt().unwrap();
                assert_eq!(root.square(), fe);
            }
        }
    };
}
