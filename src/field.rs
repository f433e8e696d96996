//! The public field value type `Field<Tag, LIMBS>` and the `FieldTag` trait
//! that names a type's per-tag global state.
//!
//! Method names and shapes follow a `ConstMontyForm`-style API
//! (`add`/`sub`/`multiply`/`neg`/`square`/`invert`/`pow_vartime`/
//! `to_canonical`/`is_odd`/`to_bytes`/`from_bytes`), reworked from a
//! compile-time modulus parameter into a runtime one backed by the `Op`
//! each tag resolves from its `field_tag!`-generated storage.

use crate::backend::{Backend, Mode, Op};
use crate::error::{Error, Result};
use crate::io::IoMode;
use crate::word;
use core::cmp::Ordering;
use core::fmt;
use core::marker::PhantomData;
use core::str::FromStr;
use rand_core::RngCore;
use std::sync::atomic::{AtomicU32, Ordering as AtomicOrdering};
use std::sync::RwLock;
use subtle::{Choice, ConditionallySelectable, ConstantTimeEq};
use zeroize::Zeroize;

/// Names a field type's per-tag global state: the `Op` descriptor and the
/// default `IoMode`. Implemented by the
/// [`crate::field_tag!`] macro, never by hand.
pub trait FieldTag<const LIMBS: usize>: 'static + Copy + Clone + Sized {
    /// The lock guarding this tag's `Op`. `None` before `init`.
    fn op_lock() -> &'static RwLock<Option<Op<LIMBS>>>;

    /// This tag's default `IoMode`, stored as a plain `u32` for atomic
    /// access, since I/O-mode setters are racy and meant to be treated as
    /// startup configuration rather than mutated concurrently.
    fn io_mode_cell() -> &'static AtomicU32;
}

/// A value of a prime field `F_p`, parameterized by a tag naming which
/// modulus it was initialized with and the number of 64-bit limbs reserved
/// for it.
///
/// Storage is always exactly `LIMBS` words and always satisfies
/// `0 <= value < p` once `init` has
/// run; whether those words are the canonical value or its Montgomery form
/// is an implementation detail of the installed [`Backend`] and is never
/// observable except through the explicit raw-array entry points
/// ([`Field::to_bytes_raw`], [`Field::compare_raw`]).
#[derive(Clone, Copy)]
pub struct Field<Tag: FieldTag<LIMBS>, const LIMBS: usize> {
    v: [u64; LIMBS],
    _tag: PhantomData<Tag>,
}

impl<Tag: FieldTag<LIMBS>, const LIMBS: usize> Zeroize for Field<Tag, LIMBS> {
    fn zeroize(&mut self) {
        self.v.zeroize();
    }
}

impl<Tag: FieldTag<LIMBS>, const LIMBS: usize> PartialEq for Field<Tag, LIMBS> {
    fn eq(&self, other: &Self) -> bool {
        self.v == other.v
    }
}
impl<Tag: FieldTag<LIMBS>, const LIMBS: usize> Eq for Field<Tag, LIMBS> {}

impl<Tag: FieldTag<LIMBS>, const LIMBS: usize> Default for Field<Tag, LIMBS> {
    /// Zero-initialized: an uninitialized value defaults to the all-zero
    /// word array rather than an unspecified bit pattern.
    fn default() -> Self {
        Self::zero()
    }
}

impl<Tag: FieldTag<LIMBS>, const LIMBS: usize> Field<Tag, LIMBS> {
    fn from_domain(v: [u64; LIMBS]) -> Self {
        Field { v, _tag: PhantomData }
    }

    fn op() -> Result<Op<LIMBS>> {
        Tag::op_lock()
            .read()
            .expect("field op lock poisoned")
            .clone()
            .ok_or(Error::Uninitialized)
    }

    fn op_or_panic() -> Op<LIMBS> {
        Self::op().expect("field type used before init()")
    }

    // ---- per-type lifecycle --------------------------------------

    /// Initialize this tag's modulus and backend. `modulus` is parsed with
    /// the same rules as [`Field::from_str_radix`] under [`IoMode::AUTO`]
    /// (decimal, or `0x`/`0b` prefixed). Re-initializing replaces the
    /// descriptor; values constructed under the previous modulus become
    /// semantically meaningless but remain memory-safe to hold
    /// and drop.
    pub fn init(modulus: &str, mode: Mode) -> Result<()> {
        let (words, negative): ([u64; LIMBS], bool) = crate::io::parse_words(modulus, IoMode::AUTO)?;
        if negative {
            return Err(Error::BadModulus);
        }
        let op = Op::init(&words, mode)?;
        *Tag::op_lock().write().expect("field op lock poisoned") = Some(op);
        Ok(())
    }

    /// The resolved backend actually installed by `init`.
    pub fn resolved_mode() -> Result<Backend> {
        Ok(Self::op()?.backend)
    }

    /// The modulus, as its canonical decimal string (`getModulo`).
    pub fn get_modulo() -> Result<String> {
        let op = Self::op()?;
        crate::io::format_words(&op.p, IoMode::DEC)
    }

    /// The modulus words, little-endian (`getP`).
    pub fn get_p() -> Result<[u64; LIMBS]> {
        Ok(Self::op()?.p)
    }

    /// A clone of the full `Op` descriptor (`getOp`).
    pub fn get_op() -> Result<Op<LIMBS>> {
        Self::op()
    }

    /// Exact bit length of the modulus (`getBitSize` / `getModBitLen`).
    pub fn get_bit_size() -> Result<u32> {
        Ok(Self::op()?.bit_size)
    }

    /// Number of words occupied by the modulus (`getUnitSize`).
    pub fn get_unit_size() -> Result<usize> {
        Ok(Self::op()?.n)
    }

    /// Whether the modulus's bit length is a multiple of 64.
    pub fn is_full_bit() -> Result<bool> {
        Ok(Self::op()?.is_full_bit)
    }

    /// Whether this tag's backend uses Montgomery representation.
    pub fn is_mont() -> Result<bool> {
        Ok(Self::op()?.is_mont())
    }

    // ---- construction -------------------------------------------

    /// The all-zero value (always valid: `0 < p` for every supported `p`).
    pub fn zero() -> Self {
        Self::from_domain([0u64; LIMBS])
    }

    /// Alias of [`Field::zero`].
    pub fn new() -> Self {
        Self::zero()
    }

    /// The multiplicative identity.
    pub fn one() -> Self {
        Self::from_domain(Self::op_or_panic().one_rep)
    }

    /// Build from a signed integer, reducing its magnitude mod `p` and
    /// negating if `i` is negative.
    pub fn from_i64(i: i64) -> Self {
        let op = Self::op_or_panic();
        if i == 1 {
            return Self::from_domain(op.one_rep);
        }
        let domain = op.to_domain_u64(i.unsigned_abs());
        Self::from_domain(if i < 0 { op.neg(&domain) } else { domain })
    }

    /// Parse a field element in the base named by `mode`, honoring the
    /// "prefix wins over base hint" rule and failing [`Error::BadValue`] if
    /// the parsed magnitude is `>= p`.
    pub fn from_str_radix(s: &str, mode: IoMode) -> Result<Self> {
        let op = Self::op()?;
        let (magnitude, negative): ([u64; LIMBS], bool) = crate::io::parse_words(s, mode)?;
        if !word::is_less(&magnitude, &op.p) {
            return Err(Error::BadValue);
        }
        let domain = op.to_mont(&magnitude);
        Ok(Self::from_domain(if negative { op.neg(&domain) } else { domain }))
    }

    /// Render in the base named by `mode`; always exports the
    /// canonical (non-Montgomery) value.
    pub fn to_string_radix(&self, mode: IoMode) -> Result<String> {
        let op = Self::op()?;
        crate::io::format_words(&op.from_mont(&self.v), mode)
    }

    /// Load from a little-endian byte buffer, failing [`Error::BadValue`] if
    /// the encoded magnitude is `>= p`.
    pub fn set_array(buf: &[u8]) -> Result<Self> {
        let op = Self::op()?;
        Self::finish_set_array(&op, pack_le_bytes::<LIMBS>(buf)?, false)
    }

    /// Like [`Field::set_array`], but masks bits at or above `bitSize - 1`
    /// instead of failing on an out-of-range value.
    pub fn set_array_mask(buf: &[u8]) -> Result<Self> {
        let op = Self::op()?;
        Self::finish_set_array(&op, pack_le_bytes::<LIMBS>(buf)?, true)
    }

    /// [`Field::set_array`] over little-endian 32-bit words instead of
    /// bytes over little-endian `u32` words instead of bytes.
    pub fn set_array_u32(buf: &[u32]) -> Result<Self> {
        let op = Self::op()?;
        Self::finish_set_array(&op, pack_le_u32::<LIMBS>(buf)?, false)
    }

    /// [`Field::set_array_mask`] over little-endian 32-bit words.
    pub fn set_array_mask_u32(buf: &[u32]) -> Result<Self> {
        let op = Self::op()?;
        Self::finish_set_array(&op, pack_le_u32::<LIMBS>(buf)?, true)
    }

    fn finish_set_array(op: &Op<LIMBS>, mut raw: [u64; LIMBS], mask: bool) -> Result<Self> {
        if mask {
            word::mask_above_bit(&mut raw, op.bit_size - 1);
        } else if !word::is_less(&raw, &op.p) {
            return Err(Error::BadValue);
        }
        Ok(Self::from_domain(op.to_mont(&raw)))
    }

    /// The canonical value as an owned little-endian word array,
    /// demontgomerizing only when the installed backend needs it (an
    /// owned substitute for a borrowed-or-copied temporary view).
    pub fn canonical(&self) -> Result<[u64; LIMBS]> {
        Ok(Self::op()?.from_mont(&self.v))
    }

    /// Copy the canonical value into a little-endian `LIMBS`-word buffer,
    /// zero-padded beyond the modulus's own word count.
    pub fn get_array(&self) -> Result<[u64; LIMBS]> {
        self.canonical()
    }

    /// The canonical fixed-length little-endian byte encoding.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let op = Self::op()?;
        Ok(crate::io::words_to_bytes(&op.from_mont(&self.v), op.bit_size))
    }

    /// Inverse of [`Field::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let op = Self::op()?;
        let words: [u64; LIMBS] = crate::io::bytes_to_words(bytes, op.bit_size)?;
        if !word::is_less(&words, &op.p) {
            return Err(Error::BadValue);
        }
        Ok(Self::from_domain(op.to_mont(&words)))
    }

    /// The raw internal storage as fixed-length little-endian bytes;
    /// Montgomery form if the installed backend uses one. This is the one
    /// entry point that deliberately exposes the representation otherwise
    /// kept private.
    pub fn to_bytes_raw(&self) -> Result<Vec<u8>> {
        let op = Self::op()?;
        Ok(crate::io::words_to_bytes(&self.v, op.bit_size))
    }

    /// Inverse of [`Field::to_bytes_raw`].
    pub fn from_bytes_raw(bytes: &[u8]) -> Result<Self> {
        let op = Self::op()?;
        let words: [u64; LIMBS] = crate::io::bytes_to_words(bytes, op.bit_size)?;
        if !word::is_less(&words, &op.p) {
            return Err(Error::BadValue);
        }
        Ok(Self::from_domain(words))
    }

    /// Fill with a uniformly-distributed value in `[0, p)`, via rejection
    /// sampling against a masked random buffer.
    pub fn set_rand(rng: &mut impl RngCore) -> Result<Self> {
        let op = Self::op()?;
        let byte_len = crate::io::byte_len(op.bit_size);
        loop {
            let mut buf = vec![0u8; byte_len];
            rng.fill_bytes(&mut buf);
            let mut words = pack_le_bytes::<LIMBS>(&buf)?;
            word::mask_above_bit(&mut words, op.bit_size - 1);
            if word::is_less(&words, &op.p) {
                return Ok(Self::from_domain(op.to_mont(&words)));
            }
        }
    }

    // ---- arithmetic ---------------------------------------------

    /// `self + rhs`.
    pub fn add(&self, rhs: &Self) -> Self {
        Self::from_domain(Self::op_or_panic().add(&self.v, &rhs.v))
    }

    /// `self - rhs`.
    pub fn sub(&self, rhs: &Self) -> Self {
        Self::from_domain(Self::op_or_panic().sub(&self.v, &rhs.v))
    }

    /// Unchecked add: valid only when `!is_full_bit()`
    /// and the caller has proved no wraparound occurs. Skips the final
    /// conditional subtraction.
    pub fn add_nc(&self, rhs: &Self) -> Self {
        Self::from_domain(Self::op_or_panic().add_nc(&self.v, &rhs.v))
    }

    /// Unchecked sub; see [`Field::add_nc`].
    pub fn sub_nc(&self, rhs: &Self) -> Self {
        Self::from_domain(Self::op_or_panic().sub_nc(&self.v, &rhs.v))
    }

    /// `-self`; `neg(0) == 0`.
    pub fn negate(&self) -> Self {
        Self::from_domain(Self::op_or_panic().neg(&self.v))
    }

    /// `self * rhs`.
    pub fn multiply(&self, rhs: &Self) -> Self {
        Self::from_domain(Self::op_or_panic().mul(&self.v, &rhs.v))
    }

    /// `self^2`.
    pub fn square(&self) -> Self {
        Self::from_domain(Self::op_or_panic().sqr(&self.v))
    }

    /// `self * u` for a machine-word `u`.
    pub fn mul_unit(&self, u: u64) -> Self {
        Self::from_domain(Self::op_or_panic().mul_unit(&self.v, u))
    }

    /// `self^-1`, or `0` if `self` is zero (preserved deliberately; see
    /// DESIGN.md).
    pub fn invert(&self) -> Self {
        Self::from_domain(Self::op_or_panic().invert(&self.v))
    }

    /// `self / 2`.
    pub fn div_by_2(&self) -> Self {
        Self::from_domain(Self::op_or_panic().div_by_2(&self.v))
    }

    /// `self^e`, honoring a negative exponent by inverting `self` first
    /// `self^e`.
    pub fn pow(&self, e: i64) -> Self {
        let op = Self::op_or_panic();
        let mut magnitude = [0u64; LIMBS];
        magnitude[0] = e.unsigned_abs();
        let base = if e < 0 { op.invert(&self.v) } else { self.v };
        Self::from_domain(op.pow(&base, &magnitude))
    }

    /// `self^e` for a nonnegative bignum exponent given as little-endian
    /// words (bignum-exponent overload).
    pub fn pow_words(&self, e: &[u64]) -> Self {
        let op = Self::op_or_panic();
        let mut exp = [0u64; LIMBS];
        let n = e.len().min(LIMBS);
        exp[..n].copy_from_slice(&e[..n]);
        Self::from_domain(op.pow(&self.v, &exp))
    }

    /// `self^(canonical value of e)` (`F`-exponent overload).
    pub fn pow_field(&self, e: &Self) -> Self {
        let op = Self::op_or_panic();
        Self::from_domain(op.pow(&self.v, &op.from_mont(&e.v)))
    }

    /// A square root of `self`, if one exists.
    pub fn sqrt(&self) -> Option<Self> {
        Self::op_or_panic().sqrt(&self.v).map(Self::from_domain)
    }

    // ---- queries ----------------------------------------------------------

    /// All words zero.
    pub fn is_zero(&self) -> bool {
        word::is_zero(&self.v)
    }

    /// Exact comparison against the precomputed Montgomery one (cheap).
    pub fn is_one(&self) -> bool {
        self.v == Self::op_or_panic().one_rep
    }

    /// Stored words `< p`.
    pub fn is_valid(&self) -> bool {
        word::is_less(&self.v, &Self::op_or_panic().p)
    }

    /// Parity of the canonical value.
    pub fn is_odd(&self) -> bool {
        let op = Self::op_or_panic();
        op.from_mont(&self.v)[0] & 1 == 1
    }

    /// `true` iff the canonical value is `> floor((p-1)/2)`, the sign
    /// convention under which exactly half of the nonzero residues are negative.
    pub fn is_negative(&self) -> bool {
        let op = Self::op_or_panic();
        word::is_greater(&op.from_mont(&self.v), &op.half)
    }

    /// The canonical value, if it fits in a `u64` (rendered as `Option`
    /// instead of an out-parameter plus a thrown exception; see DESIGN.md).
    pub fn get_uint64(&self) -> Option<u64> {
        let op = Self::op_or_panic();
        let canon = op.from_mont(&self.v);
        if word::get_nonzero_array_size(&canon) <= 1 {
            Some(canon[0])
        } else {
            None
        }
    }

    /// The signed interpretation of the canonical value under the sign
    /// convention in [`Field::is_negative`], if it fits in an `i64`.
    pub fn get_int64(&self) -> Option<i64> {
        let op = Self::op_or_panic();
        let canon = op.from_mont(&self.v);
        if !word::is_greater(&canon, &op.half) {
            i64::try_from(canon[0]).ok().filter(|_| word::get_nonzero_array_size(&canon) <= 1)
        } else {
            let mut mag = [0u64; LIMBS];
            word::sub_with_borrow(&mut mag, &op.p, &canon);
            if word::get_nonzero_array_size(&mag) <= 1 {
                i64::try_from(mag[0]).ok().map(|m| -m)
            } else {
                None
            }
        }
    }

    /// The canonical value as a [`crypto_bigint`] big integer.
    pub fn to_uint(&self) -> Result<bigint::Uint<LIMBS>> {
        let op = Self::op()?;
        Ok(bigint::Uint::from_words(op.from_mont(&self.v)))
    }

    /// Build from a big integer, failing [`Error::BadValue`] if it is `>= p`
    /// (no negative-value overload since [`bigint::Uint`] is already unsigned).
    pub fn from_uint(uint: &bigint::Uint<LIMBS>) -> Result<Self> {
        let op = Self::op()?;
        let words = uint.to_words();
        if !word::is_less(&words, &op.p) {
            return Err(Error::BadValue);
        }
        Ok(Self::from_domain(op.to_mont(&words)))
    }

    /// Raw internal words (Montgomery form if `is_mont()`); exposed for
    /// diagnostics and the `Array`/`ArrayRaw` codecs, never used as an
    /// ordering or equality key by this type itself, since Montgomery
    /// representation stays an implementation detail.
    pub fn raw_words(&self) -> &[u64; LIMBS] {
        &self.v
    }

    /// Debug helper rendering the raw internal words, most-significant word
    /// first, as space-separated 16-digit hex groups.
    pub fn dump(&self) -> String {
        self.v
            .iter()
            .rev()
            .map(|w| format!("{w:016x}"))
            .collect::<Vec<_>>()
            .join(" ")
    }

    // ---- comparisons --------------------------------------------------

    /// Canonical-order comparison: demontgomerizes both operands first.
    pub fn compare(&self, other: &Self) -> Ordering {
        Self::op_or_panic().compare(&self.v, &other.v)
    }

    /// Raw stored-word comparison: meaningful only when `!is_mont()`;
    /// otherwise the order is unspecified but still total.
    pub fn compare_raw(&self, other: &Self) -> Ordering {
        word::compare(&self.v, &other.v)
    }

    // ---- I/O mode (per-type static configuration) -------

    /// Set this tag's default `IoMode`, used by [`fmt::Display`] and
    /// [`FromStr`]. Racy across threads by design: treat it as configuration
    /// set once at startup rather than mutated concurrently.
    pub fn set_io_mode(mode: IoMode) {
        Tag::io_mode_cell().store(mode.0, AtomicOrdering::Relaxed);
    }

    /// This tag's current default `IoMode`.
    pub fn get_io_mode() -> IoMode {
        IoMode(Tag::io_mode_cell().load(AtomicOrdering::Relaxed))
    }

    /// The separator composite types built on this field would use to join
    /// component values.
    pub fn get_io_separator() -> &'static str {
        crate::io::separator(Self::get_io_mode())
    }
}

fn pack_le_bytes<const L: usize>(buf: &[u8]) -> Result<[u64; L]> {
    if buf.len() > L * 8 {
        return Err(Error::BadValue);
    }
    let mut words = [0u64; L];
    for (i, &b) in buf.iter().enumerate() {
        words[i / 8] |= (b as u64) << ((i % 8) * 8);
    }
    Ok(words)
}

fn pack_le_u32<const L: usize>(buf: &[u32]) -> Result<[u64; L]> {
    if buf.len() * 4 > L * 8 {
        return Err(Error::BadValue);
    }
    let mut words = [0u64; L];
    for (i, &x) in buf.iter().enumerate() {
        words[i / 2] |= (x as u64) << ((i % 2) * 32);
    }
    Ok(words)
}

// ---- core::ops -----------------------------------------------------------

impl<Tag: FieldTag<LIMBS>, const LIMBS: usize> core::ops::Add for Field<Tag, LIMBS> {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Field::add(&self, &rhs)
    }
}
impl<Tag: FieldTag<LIMBS>, const LIMBS: usize> core::ops::Add<&Field<Tag, LIMBS>> for Field<Tag, LIMBS> {
    type Output = Self;
    fn add(self, rhs: &Self) -> Self {
        Field::add(&self, rhs)
    }
}
impl<Tag: FieldTag<LIMBS>, const LIMBS: usize> core::ops::AddAssign for Field<Tag, LIMBS> {
    fn add_assign(&mut self, rhs: Self) {
        *self = Field::add(self, &rhs);
    }
}

impl<Tag: FieldTag<LIMBS>, const LIMBS: usize> core::ops::Sub for Field<Tag, LIMBS> {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Field::sub(&self, &rhs)
    }
}
impl<Tag: FieldTag<LIMBS>, const LIMBS: usize> core::ops::Sub<&Field<Tag, LIMBS>> for Field<Tag, LIMBS> {
    type Output = Self;
    fn sub(self, rhs: &Self) -> Self {
        Field::sub(&self, rhs)
    }
}
impl<Tag: FieldTag<LIMBS>, const LIMBS: usize> core::ops::SubAssign for Field<Tag, LIMBS> {
    fn sub_assign(&mut self, rhs: Self) {
        *self = Field::sub(self, &rhs);
    }
}

impl<Tag: FieldTag<LIMBS>, const LIMBS: usize> core::ops::Mul for Field<Tag, LIMBS> {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self {
        Field::multiply(&self, &rhs)
    }
}
impl<Tag: FieldTag<LIMBS>, const LIMBS: usize> core::ops::Mul<&Field<Tag, LIMBS>> for Field<Tag, LIMBS> {
    type Output = Self;
    fn mul(self, rhs: &Self) -> Self {
        Field::multiply(&self, rhs)
    }
}
impl<Tag: FieldTag<LIMBS>, const LIMBS: usize> core::ops::MulAssign for Field<Tag, LIMBS> {
    fn mul_assign(&mut self, rhs: Self) {
        *self = Field::multiply(self, &rhs);
    }
}

impl<Tag: FieldTag<LIMBS>, const LIMBS: usize> core::ops::Neg for Field<Tag, LIMBS> {
    type Output = Self;
    fn neg(self) -> Self {
        Field::negate(&self)
    }
}

// ---- ordering --------------------------------------------------------

impl<Tag: FieldTag<LIMBS>, const LIMBS: usize> PartialOrd for Field<Tag, LIMBS> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.compare(other))
    }
}
impl<Tag: FieldTag<LIMBS>, const LIMBS: usize> Ord for Field<Tag, LIMBS> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare(other)
    }
}

// ---- formatting --------------------------------------------------------

impl<Tag: FieldTag<LIMBS>, const LIMBS: usize> fmt::Display for Field<Tag, LIMBS> {
    /// Formats using this tag's current [`IoMode`] (`Auto` renders as
    /// decimal), mirroring the original's stream-insertion operator.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = Self::get_io_mode();
        match self.to_string_radix(mode) {
            Ok(s) => f.write_str(&s),
            Err(_) => Err(fmt::Error),
        }
    }
}

impl<Tag: FieldTag<LIMBS>, const LIMBS: usize> fmt::Debug for Field<Tag, LIMBS> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Field").field(&self.dump()).finish()
    }
}

impl<Tag: FieldTag<LIMBS>, const LIMBS: usize> fmt::LowerHex for Field<Tag, LIMBS> {
    /// Unconditional hex rendering of the canonical value, independent of
    /// the tag's global [`IoMode`]; `{:#x}` adds the `0x` prefix via Rust's
    /// own alternate-flag convention.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = Self::op_or_panic();
        let s = crate::io::format_words(&op.from_mont(&self.v), IoMode::HEX).map_err(|_| fmt::Error)?;
        if f.alternate() {
            f.write_str("0x")?;
        }
        f.write_str(&s)
    }
}

impl<Tag: FieldTag<LIMBS>, const LIMBS: usize> fmt::UpperHex for Field<Tag, LIMBS> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = Self::op_or_panic();
        let s = crate::io::format_words(&op.from_mont(&self.v), IoMode::HEX).map_err(|_| fmt::Error)?;
        if f.alternate() {
            f.write_str("0x")?;
        }
        f.write_str(&s.to_uppercase())
    }
}

impl<Tag: FieldTag<LIMBS>, const LIMBS: usize> fmt::Binary for Field<Tag, LIMBS> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = Self::op_or_panic();
        let s = crate::io::format_words(&op.from_mont(&self.v), IoMode::BIN).map_err(|_| fmt::Error)?;
        if f.alternate() {
            f.write_str("0b")?;
        }
        f.write_str(&s)
    }
}

impl<Tag: FieldTag<LIMBS>, const LIMBS: usize> FromStr for Field<Tag, LIMBS> {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        Self::from_str_radix(s, Self::get_io_mode())
    }
}

// ---- subtle ------------------------------------------------------------
//
// Word-wise constant-time equality and selection over the raw storage
// array; these two operations need no modulus-dependent reduction, so they
// stay constant-time independent of which backend a tag resolved to
// (unlike the arithmetic operators above, which make no such guarantee).

impl<Tag: FieldTag<LIMBS>, const LIMBS: usize> ConstantTimeEq for Field<Tag, LIMBS> {
    fn ct_eq(&self, other: &Self) -> Choice {
        let mut acc = Choice::from(1u8);
        for i in 0..LIMBS {
            acc &= self.v[i].ct_eq(&other.v[i]);
        }
        acc
    }
}

impl<Tag: FieldTag<LIMBS>, const LIMBS: usize> ConditionallySelectable for Field<Tag, LIMBS> {
    fn conditional_select(a: &Self, b: &Self, choice: Choice) -> Self {
        let mut v = [0u64; LIMBS];
        for i in 0..LIMBS {
            v[i] = u64::conditional_select(&a.v[i], &b.v[i], choice);
        }
        Field { v, _tag: PhantomData }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field_tag;

    field_tag!(F13, 1);
    type Fp13 = Field<F13, 1>;

    field_tag!(F1009, 1);
    type Fp1009 = Field<F1009, 1>;

    fn fp13() -> Fp13 {
        Fp13::init("13", Mode::Montgomery).unwrap();
        Fp13::zero()
    }

    fn fp1009() -> Fp1009 {
        Fp1009::init("1009", Mode::Auto).unwrap();
        Fp1009::zero()
    }

    #[test]
    fn zero_and_one_are_distinct_and_valid() {
        fp13();
        assert!(Fp13::zero().is_zero());
        assert!(Fp13::one().is_one());
        assert_ne!(Fp13::zero(), Fp13::one());
        assert!(Fp13::zero().is_valid());
        assert!(Fp13::one().is_valid());
    }

    #[test]
    fn addition_and_subtraction_wrap_mod_13() {
        fp13();
        let eleven = Fp13::from_i64(11);
        let five = Fp13::from_i64(5);
        assert_eq!(eleven.add(&five), Fp13::from_i64(3));
        assert_eq!(eleven.sub(&five), Fp13::from_i64(6));
        assert_eq!(five.sub(&eleven), Fp13::from_i64(-6));
    }

    #[test]
    fn three_times_nine_mod_13_is_one() {
        fp13();
        let three = Fp13::from_i64(3);
        let nine = Fp13::from_i64(9);
        assert!(three.multiply(&nine).is_one());
        assert_eq!(three * nine, Fp13::one());
    }

    #[test]
    fn negate_and_invert_round_trip() {
        fp13();
        for v in 1i64..13 {
            let x = Fp13::from_i64(v);
            assert_eq!(x.negate().negate(), x);
            assert!(x.multiply(&x.invert()).is_one());
        }
        assert!(Fp13::zero().invert().is_zero());
    }

    #[test]
    fn pow_matches_repeated_multiplication() {
        fp1009();
        let x = Fp1009::from_i64(7);
        let mut expect = Fp1009::one();
        for _ in 0..5 {
            expect = expect.multiply(&x);
        }
        assert_eq!(x.pow(5), expect);
        assert_eq!(x.pow(-1), x.invert());
    }

    #[test]
    fn decimal_round_trip() {
        fp1009();
        for v in [0i64, 1, 7, 1008] {
            let x = Fp1009::from_i64(v);
            let s = x.to_string_radix(IoMode::DEC).unwrap();
            assert_eq!(Fp1009::from_str_radix(&s, IoMode::DEC).unwrap(), x);
        }
    }

    #[test]
    fn hex_prefix_round_trip_via_auto() {
        fp1009();
        let x = Fp1009::from_i64(255);
        let s = x.to_string_radix(IoMode::HEX_PREFIX).unwrap();
        assert!(s.starts_with("0x"));
        assert_eq!(Fp1009::from_str_radix(&s, IoMode::AUTO).unwrap(), x);
    }

    #[test]
    fn set_array_rejects_value_at_or_above_modulus() {
        fp13();
        assert!(Fp13::set_array(&[13]).is_err());
        assert_eq!(Fp13::set_array(&[12]).unwrap(), Fp13::from_i64(12));
    }

    #[test]
    fn set_array_mask_clamps_instead_of_failing() {
        fp13();
        // bit_size(13) == 4, so masking keeps only the low 3 bits of 0xFF.
        let masked = Fp13::set_array_mask(&[0xFF]).unwrap();
        assert_eq!(masked.get_array().unwrap()[0], 0x07);
    }

    #[test]
    fn byte_round_trip_canonical_and_raw() {
        fp1009();
        let x = Fp1009::from_i64(42);
        assert_eq!(Fp1009::from_bytes(&x.to_bytes().unwrap()).unwrap(), x);
        assert_eq!(Fp1009::from_bytes_raw(&x.to_bytes_raw().unwrap()).unwrap(), x);
    }

    #[test]
    fn sqrt_of_perfect_square_squares_back() {
        fp1009();
        let x = Fp1009::from_i64(25);
        let root = x.sqrt().unwrap();
        assert_eq!(root.square(), x);
    }

    #[test]
    fn is_negative_splits_nonzero_residues_in_half() {
        fp13();
        let small = Fp13::from_i64(1);
        let large = Fp13::from_i64(12);
        assert!(!small.is_negative());
        assert!(large.is_negative());
    }

    #[test]
    fn get_uint64_and_get_int64_agree_with_canonical_value() {
        fp13();
        assert_eq!(Fp13::from_i64(5).get_uint64(), Some(5));
        assert_eq!(Fp13::from_i64(-1).get_int64(), Some(-1));
    }

    #[test]
    fn to_uint_from_uint_round_trip() {
        fp1009();
        let x = Fp1009::from_i64(77);
        let uint = x.to_uint().unwrap();
        assert_eq!(Fp1009::from_uint(&uint).unwrap(), x);
    }

    #[test]
    fn constant_time_eq_and_select_match_value_equality() {
        fp13();
        let a = Fp13::from_i64(4);
        let b = Fp13::from_i64(4);
        let c = Fp13::from_i64(5);
        assert!(bool::from(a.ct_eq(&b)));
        assert!(!bool::from(a.ct_eq(&c)));
        assert_eq!(Fp13::conditional_select(&a, &c, Choice::from(0)), a);
        assert_eq!(Fp13::conditional_select(&a, &c, Choice::from(1)), c);
    }

    #[test]
    fn ordering_is_total_and_canonical() {
        fp13();
        let mut values: Vec<Fp13> = (0i64..13).map(Fp13::from_i64).collect();
        values.reverse();
        values.sort();
        let expect: Vec<Fp13> = (0i64..13).map(Fp13::from_i64).collect();
        assert_eq!(values, expect);
    }

    #[test]
    fn display_uses_tag_io_mode() {
        fp1009();
        Fp1009::set_io_mode(IoMode::HEX_PREFIX);
        let x = Fp1009::from_i64(255);
        assert_eq!(format!("{x}"), "0xff");
        Fp1009::set_io_mode(IoMode::AUTO);
    }
}
