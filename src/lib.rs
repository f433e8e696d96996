#![cfg_attr(docsrs, feature(doc_auto_cfg))]
#![doc(
    html_logo_url = "https://raw.githubusercontent.com/RustCrypto/meta/master/logo.svg",
    html_favicon_url = "https://raw.githubusercontent.com/RustCrypto/meta/master/logo.svg"
)]
#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

//! Generic prime-field arithmetic (`F_p`) with a modulus resolved at
//! runtime, Montgomery-form representation, and a choice of arithmetic
//! backend.
//!
//! A field type is declared with [`field_tag!`] and initialized once with
//! [`Field::init`] before use:
//!
//! ```
//! use fp::{field_tag, Field, backend::Mode};
//!
//! field_tag!(pub Fp1009, 1);
//! type Fp = Field<Fp1009, 1>;
//!
//! Fp::init("1009", Mode::Auto).unwrap();
//! let a = Fp::from_i64(3);
//! let b = Fp::from_i64(9);
//! let product = a * b;
//! assert_eq!(product, Fp::from_i64(27));
//! assert!((product * product.invert()).is_one());
//! ```

pub mod backend;
mod dev;
pub mod error;
pub mod field;
pub mod io;
mod macros;
pub mod sqrt;
pub mod word;

pub use crate::backend::{Backend, Mode, Op};
pub use crate::error::{Error, Result};
pub use crate::field::{Field, FieldTag};
pub use crate::io::IoMode;
pub use bigint;
pub use rand_core;
pub use subtle;
pub use zeroize;
