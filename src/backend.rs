//! The modulus descriptor (`Op`) and its backend dispatch table.
//!
//! `Op<LIMBS>` is a vtable-style struct: rather than giving `Field` a
//! function-pointer table or lowering each
//! operation to a method on the value type, every algebraic primitive is a
//! method on `Op` and `Field` simply forwards to whichever `Op` its tag
//! currently holds. This keeps the value type itself a plain array with no
//! behavior of its own.

use crate::error::{Error, Result};
use crate::word;
use core::cmp::Ordering;

/// Upper bound on the number of 64-bit limbs this crate supports, chosen to
/// cover a 576-bit `MaxBits` worked example (9 words) with
/// room to spare. Raise it if a wider field is genuinely needed; it only
/// affects the size of on-stack scratch buffers used for reference-backend
/// wide multiplication, never the layout of `Field` itself (which is always
/// exactly `[u64; LIMBS]`).
pub const MAX_LIMBS: usize = 9;

/// Backend selection requested at `init` time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Let `init` pick the best available backend.
    Auto,
    /// Force the portable non-Montgomery reference backend.
    Reference,
    /// Force the Montgomery backend.
    Montgomery,
}

/// The backend actually installed after `init` resolves `Mode`. Of the
/// source implementation's historical cascade (Xbyak > LLVM-Mont > GMP-Mont
/// > GMP) only the two portable ends survive here; JIT/assembly backends
/// are explicitly out of scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Schoolbook wide multiply + binary-long-division reduction. Stored
    /// words are the canonical value.
    Reference,
    /// REDC (Montgomery) multiplication. Stored words are `v * R mod p`.
    Montgomery,
}

/// The modulus descriptor shared by every `Field<Tag, LIMBS>` value of a
/// given tag.
#[derive(Debug, Clone)]
pub struct Op<const LIMBS: usize> {
    /// Modulus words, little-endian.
    pub p: [u64; LIMBS],
    /// Number of words actually occupied by `p` (≤ `LIMBS`).
    pub n: usize,
    /// Exact bit length of `p`.
    pub bit_size: u32,
    /// True iff `bit_size` is a multiple of 64 (top word uses its high bit).
    pub is_full_bit: bool,
    /// The installed backend.
    pub backend: Backend,
    /// `-p^-1 mod 2^64`, meaningful only when `backend == Montgomery`.
    pub rp: u64,
    /// Montgomery form of 1 (`R mod p`); equals `[1, 0, ...]` otherwise.
    pub one_rep: [u64; LIMBS],
    /// `R^2 mod p`, used to lift canonical values into Montgomery form.
    pub r2_mod_p: [u64; LIMBS],
    /// `floor((p - 1) / 2)`.
    pub half: [u64; LIMBS],
    /// Cached representation of `2^-1` in the active domain.
    pub inv2: [u64; LIMBS],
    /// `p - 1 = 2^s * t` with `t` odd; used by the square-root operator.
    pub s: u32,
    /// The odd part of `p - 1`.
    pub t: [u64; LIMBS],
    /// A generator of the 2-Sylow subgroup (`nonresidue^t`), in domain form.
    pub root_of_unity: [u64; LIMBS],
    /// A quadratic nonresidue mod `p`, in domain form.
    pub nonresidue: [u64; LIMBS],
    /// Set when `init` recognizes a modulus with a dedicated fast reducer in
    /// the source implementation (e.g. NIST P-521's prime); this crate does
    /// not implement the specialized reducer itself, it only records the
    /// recognition point as documented future work.
    pub recognized_prime: Option<&'static str>,
}

impl<const LIMBS: usize> Op<LIMBS> {
    /// `true` iff values of this type are stored in Montgomery form.
    pub fn is_mont(&self) -> bool {
        matches!(self.backend, Backend::Montgomery)
    }

    /// Build the descriptor for modulus `p` (little-endian words, only the
    /// first `get_nonzero_array_size(p)` of which may be nonzero).
    pub fn init(p_in: &[u64], mode: Mode) -> Result<Self> {
        if LIMBS == 0 || LIMBS > MAX_LIMBS {
            return Err(Error::BadModulus);
        }
        let mut p = [0u64; LIMBS];
        let given_words = word::get_nonzero_array_size(p_in);
        if given_words > LIMBS {
            return Err(Error::BadModulus);
        }
        p[..given_words].copy_from_slice(&p_in[..given_words]);

        if word::is_zero(&p) || p[0] & 1 == 0 {
            return Err(Error::BadModulus);
        }
        // p == 1 is not a valid modulus for a field.
        let mut one = [0u64; LIMBS];
        one[0] = 1;
        if word::is_equal(&p, &one) {
            return Err(Error::BadModulus);
        }

        let bit_size = word::bit_length(&p);
        if bit_size == 0 || bit_size as usize > LIMBS * 64 {
            return Err(Error::BadModulus);
        }
        let is_full_bit = bit_size % 64 == 0;
        let n = word::get_nonzero_array_size(&p);

        let backend = match mode {
            Mode::Reference => Backend::Reference,
            Mode::Montgomery | Mode::Auto => Backend::Montgomery,
        };

        let rp = if backend == Backend::Montgomery {
            neg_inv_word(p[0])
        } else {
            0
        };

        let (one_rep, r2_mod_p) = compute_montgomery_constants(&p, backend == Backend::Montgomery);

        let mut half = [0u64; LIMBS];
        word::sub_with_borrow(&mut half, &p, &one);
        word::shr1(&mut half);

        let recognized_prime = recognize_prime(&p);

        let mut op = Op {
            p,
            n,
            bit_size,
            is_full_bit,
            backend,
            rp,
            one_rep,
            r2_mod_p,
            half,
            inv2: one_rep, // placeholder, overwritten below
            s: 0,
            t: [0u64; LIMBS],
            root_of_unity: one_rep,
            nonresidue: one_rep,
            recognized_prime,
        };

        let two = op.to_domain_u64(2);
        op.inv2 = op.invert(&two);

        crate::sqrt::precompute(&mut op);

        Ok(op)
    }

    /// Lift a canonical value into the active domain representation.
    pub fn to_mont(&self, x: &[u64; LIMBS]) -> [u64; LIMBS] {
        if self.is_mont() {
            mont_mul(x, &self.r2_mod_p, &self.p, self.rp)
        } else {
            *x
        }
    }

    /// Bring a domain representation back to the canonical value.
    pub fn from_mont(&self, x: &[u64; LIMBS]) -> [u64; LIMBS] {
        if self.is_mont() {
            let mut one = [0u64; LIMBS];
            one[0] = 1;
            mont_mul(x, &one, &self.p, self.rp)
        } else {
            *x
        }
    }

    /// Domain representation of the nonnegative integer `u`, reduced mod `p`.
    pub fn to_domain_u64(&self, u: u64) -> [u64; LIMBS] {
        self.to_mont(&reduce_small(u, &self.p))
    }

    /// `z = (x + y) mod p`.
    pub fn add(&self, x: &[u64; LIMBS], y: &[u64; LIMBS]) -> [u64; LIMBS] {
        let mut z = [0u64; LIMBS];
        let carry = word::add_with_carry(&mut z, x, y);
        if carry != 0 || !word::is_less(&z, &self.p) {
            let mut r = [0u64; LIMBS];
            word::sub_with_borrow(&mut r, &z, &self.p);
            z = r;
        }
        z
    }

    /// `z = (x - y) mod p`.
    pub fn sub(&self, x: &[u64; LIMBS], y: &[u64; LIMBS]) -> [u64; LIMBS] {
        let mut z = [0u64; LIMBS];
        let borrow = word::sub_with_borrow(&mut z, x, y);
        if borrow != 0 {
            let mut r = [0u64; LIMBS];
            word::add_with_carry(&mut r, &z, &self.p);
            z = r;
        }
        z
    }

    /// Unchecked add: valid only when the caller has proved no reduction is
    /// needed (`addNC`). Performs the raw word addition and
    /// nothing else.
    pub fn add_nc(&self, x: &[u64; LIMBS], y: &[u64; LIMBS]) -> [u64; LIMBS] {
        let mut z = [0u64; LIMBS];
        word::add_with_carry(&mut z, x, y);
        z
    }

    /// Unchecked sub; see [`Op::add_nc`].
    pub fn sub_nc(&self, x: &[u64; LIMBS], y: &[u64; LIMBS]) -> [u64; LIMBS] {
        let mut z = [0u64; LIMBS];
        word::sub_with_borrow(&mut z, x, y);
        z
    }

    /// `z = -x mod p`; `neg(0) = 0`.
    pub fn neg(&self, x: &[u64; LIMBS]) -> [u64; LIMBS] {
        if word::is_zero(x) {
            return [0u64; LIMBS];
        }
        let mut z = [0u64; LIMBS];
        word::sub_with_borrow(&mut z, &self.p, x);
        z
    }

    /// `z = (x * y) mod p`, in whatever representation `x`/`y` share.
    pub fn mul(&self, x: &[u64; LIMBS], y: &[u64; LIMBS]) -> [u64; LIMBS] {
        match self.backend {
            Backend::Montgomery => mont_mul(x, y, &self.p, self.rp),
            Backend::Reference => reference_mulmod(x, y, &self.p),
        }
    }

    /// `z = x^2 mod p`.
    pub fn sqr(&self, x: &[u64; LIMBS]) -> [u64; LIMBS] {
        self.mul(x, x)
    }

    /// `z = (x * u) mod p` for a single machine-word `u` (already in the
    /// canonical domain, i.e. not yet lifted to Montgomery form).
    pub fn mul_unit(&self, x: &[u64; LIMBS], u: u64) -> [u64; LIMBS] {
        self.mul(x, &self.to_domain_u64(u))
    }

    /// `z = x^-1 mod p` for `x != 0`; `inv(0) = 0` (preserved
    /// verbatim as an Open Question resolution; see DESIGN.md). Computed
    /// via Fermat's little theorem (`x^(p-2)`), which yields exactly `0` for
    /// `x = 0` with no special case since `p - 2 >= 1` for every supported
    /// prime.
    pub fn invert(&self, x: &[u64; LIMBS]) -> [u64; LIMBS] {
        let mut exp = [0u64; LIMBS];
        let mut two = [0u64; LIMBS];
        two[0] = 2;
        word::sub_with_borrow(&mut exp, &self.p, &two);
        self.pow(x, &exp)
    }

    /// `z = x * 2^-1 mod p`.
    pub fn div_by_2(&self, x: &[u64; LIMBS]) -> [u64; LIMBS] {
        self.mul(x, &self.inv2)
    }

    /// `z = x^e mod p` via left-to-right square-and-multiply, operating
    /// entirely in whatever domain `x` is represented in (Montgomery
    /// multiplication composes correctly across repeated products, so no
    /// intermediate domain conversion is needed).
    pub fn pow(&self, x: &[u64; LIMBS], e: &[u64; LIMBS]) -> [u64; LIMBS] {
        let bits = word::bit_length(e);
        if bits == 0 {
            return self.one_rep;
        }
        let mut result = self.one_rep;
        for i in (0..bits).rev() {
            result = self.sqr(&result);
            if (e[(i / 64) as usize] >> (i % 64)) & 1 == 1 {
                result = self.mul(&result, x);
            }
        }
        result
    }

    /// `y` such that `y^2 = x`, if `x` is a quadratic residue.
    pub fn sqrt(&self, x: &[u64; LIMBS]) -> Option<[u64; LIMBS]> {
        crate::sqrt::sqrt(self, x)
    }

    /// Canonical-order comparison (demontgomerizes both operands first).
    pub fn compare(&self, x: &[u64; LIMBS], y: &[u64; LIMBS]) -> Ordering {
        word::compare(&self.from_mont(x), &self.from_mont(y))
    }
}

/// Reduce a single machine word `u` modulo `p`, via bit-serial
/// doubling-and-reduce (64 steps regardless of how `p` compares to `u`).
/// Used to lift small integer literals into a field's domain representation.
pub fn reduce_small<const L: usize>(u: u64, p: &[u64; L]) -> [u64; L] {
    let mut rem = [0u64; L];
    for bit_idx in (0..64).rev() {
        let mut carry = (u >> bit_idx) & 1;
        for w in rem.iter_mut() {
            let new_carry = *w >> 63;
            *w = (*w << 1) | carry;
            carry = new_carry;
        }
        if !word::is_less(&rem, p) {
            let mut sub = [0u64; L];
            word::sub_with_borrow(&mut sub, &rem, p);
            rem = sub;
        }
    }
    rem
}

/// Compute `-m^-1 mod 2^64` for odd `m` via Newton-Raphson iteration
/// (quadratic convergence: 3 correct bits to start, doubling each round, so
/// 5 rounds comfortably exceed 64 bits). Grounded in the same "Hensel
/// lifting" technique used by `sylvestre-num-modular`'s `neginv`, generalized
/// here to a closed-form iteration instead of a lookup table.
pub fn neg_inv_word(m: u64) -> u64 {
    debug_assert!(m & 1 == 1, "modulus must be odd");
    let mut inv = m;
    for _ in 0..5 {
        inv = inv.wrapping_mul(2u64.wrapping_sub(m.wrapping_mul(inv)));
    }
    inv.wrapping_neg()
}

/// CIOS Montgomery multiplication: `z = x * y * R^-1 mod p`.
pub fn mont_mul<const L: usize>(x: &[u64; L], y: &[u64; L], p: &[u64; L], n0inv: u64) -> [u64; L] {
    let mut t = [0u64; MAX_LIMBS + 2];
    for i in 0..L {
        let mut carry = 0u128;
        for j in 0..L {
            let prod = t[j] as u128 + x[j] as u128 * y[i] as u128 + carry;
            t[j] = prod as u64;
            carry = prod >> 64;
        }
        let sum = t[L] as u128 + carry;
        t[L] = sum as u64;
        t[L + 1] = t[L + 1].wrapping_add((sum >> 64) as u64);

        let m = t[0].wrapping_mul(n0inv);

        let mut carry2 = 0u128;
        for j in 0..L {
            let prod = t[j] as u128 + m as u128 * p[j] as u128 + carry2;
            t[j] = prod as u64;
            carry2 = prod >> 64;
        }
        let sum2 = t[L] as u128 + carry2;
        t[L] = sum2 as u64;
        t[L + 1] = t[L + 1].wrapping_add((sum2 >> 64) as u64);

        for k in 0..=L {
            t[k] = t[k + 1];
        }
        t[L + 1] = 0;
    }

    let mut result = [0u64; L];
    result.copy_from_slice(&t[..L]);
    if t[L] != 0 || !word::is_less(&result, p) {
        let mut sub = [0u64; L];
        word::sub_with_borrow(&mut sub, &result, p);
        result = sub;
    }
    result
}

/// Schoolbook wide multiply followed by binary-long-division reduction; the
/// non-Montgomery reference backend's `mul`.
fn reference_mulmod<const L: usize>(x: &[u64; L], y: &[u64; L], p: &[u64; L]) -> [u64; L] {
    let mut wide = [0u64; 2 * MAX_LIMBS];
    for i in 0..L {
        let mut carry = 0u128;
        for j in 0..L {
            let prod = wide[i + j] as u128 + x[i] as u128 * y[j] as u128 + carry;
            wide[i + j] = prod as u64;
            carry = prod >> 64;
        }
        let mut k = i + L;
        while carry != 0 {
            let sum = wide[k] as u128 + carry;
            wide[k] = sum as u64;
            carry = sum >> 64;
            k += 1;
        }
    }
    wide_mod(&wide[..2 * L], p)
}

/// Reduce a `2*L`-word value modulo `p` via bit-serial binary long division
/// (stack-only; this is not on a performance-critical path, it exists so the
/// `Reference` backend needs no external bignum dependency).
fn wide_mod<const L: usize>(wide: &[u64], p: &[u64; L]) -> [u64; L] {
    let mut rem = [0u64; L];
    let mut extra = 0u64;
    let total_bits = wide.len() as u32 * 64;
    for bit_idx in (0..total_bits).rev() {
        extra = (extra << 1) | (rem[L - 1] >> 63);
        for i in (1..L).rev() {
            rem[i] = (rem[i] << 1) | (rem[i - 1] >> 63);
        }
        let word_idx = (bit_idx / 64) as usize;
        let bit = (wide[word_idx] >> (bit_idx % 64)) & 1;
        rem[0] = (rem[0] << 1) | bit;

        if extra != 0 || !word::is_less(&rem, p) {
            let mut sub = [0u64; L];
            word::sub_with_borrow(&mut sub, &rem, p);
            rem = sub;
            extra = 0;
        }
    }
    rem
}

/// Compute `(oneRep, R^2 mod p)` by repeated doubling-with-reduction, i.e.
/// `2^(64*L) mod p` and `2^(128*L) mod p`. This avoids needing any
/// wide-integer shift primitive beyond the word-array ones already defined.
fn compute_montgomery_constants<const L: usize>(p: &[u64; L], is_mont: bool) -> ([u64; L], [u64; L]) {
    let mut one = [0u64; L];
    one[0] = 1;
    if !is_mont {
        return (one, one);
    }

    let mut r = one; // 2^0 mod p
    let double_and_reduce = |r: &mut [u64; L]| {
        let mut doubled = [0u64; L];
        let carry = word::add_with_carry(&mut doubled, r, r);
        if carry != 0 || !word::is_less(&doubled, p) {
            let mut sub = [0u64; L];
            word::sub_with_borrow(&mut sub, &doubled, p);
            *r = sub;
        } else {
            *r = doubled;
        }
    };
    let bits = L as u32 * 64;
    for _ in 0..bits {
        double_and_reduce(&mut r);
    }
    let one_rep = r; // 2^(64L) mod p == R mod p
    for _ in 0..bits {
        double_and_reduce(&mut r);
    }
    let r2_mod_p = r; // 2^(128L) mod p == R^2 mod p
    (one_rep, r2_mod_p)
}

/// Best-effort recognition of moduli with a dedicated fast reducer in the
/// source implementation. Only NIST P-521's prime is recognized;
/// recognition does not change the installed backend (see DESIGN.md).
fn recognize_prime<const L: usize>(p: &[u64; L]) -> Option<&'static str> {
    // 2^521 - 1
    if word::bit_length(p) == 521 {
        let mut candidate = [0u64; L];
        let words = 521 / 64;
        let bit = 521 % 64;
        for w in candidate.iter_mut().take(words as usize) {
            *w = u64::MAX;
        }
        if (words as usize) < L {
            candidate[words as usize] = (1u64 << bit) - 1;
        }
        if word::is_equal(p, &candidate) {
            return Some("NIST P-521");
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn op13() -> Op<1> {
        Op::<1>::init(&[13], Mode::Montgomery).unwrap()
    }

    #[test]
    fn neg_inv_word_matches_definition() {
        for &m in &[3u64, 5, 7, 0xFFFF_FFFF_FFFF_FFFFu64 - 4] {
            let inv = neg_inv_word(m);
            // m * inv == -1 (mod 2^64)
            assert_eq!(m.wrapping_mul(inv), 1u64.wrapping_neg());
        }
    }

    #[test]
    fn montgomery_roundtrips_small_prime() {
        let op = op13();
        for v in 0u64..13 {
            let canon = { let mut a = [0u64; 1]; a[0] = v; a };
            let mont = op.to_mont(&canon);
            let back = op.from_mont(&mont);
            assert_eq!(back, canon);
        }
    }

    #[test]
    fn mul_matches_reference_backend() {
        let mont = Op::<1>::init(&[13], Mode::Montgomery).unwrap();
        let refr = Op::<1>::init(&[13], Mode::Reference).unwrap();
        for a in 0u64..13 {
            for b in 0u64..13 {
                let ca = { let mut x = [0u64; 1]; x[0] = a; x };
                let cb = { let mut x = [0u64; 1]; x[0] = b; x };
                let m = mont.from_mont(&mont.mul(&mont.to_mont(&ca), &mont.to_mont(&cb)));
                let r = refr.mul(&ca, &cb);
                assert_eq!(m, r, "{a} * {b} mod 13 mismatch");
                assert_eq!(r[0], (a * b) % 13);
            }
        }
    }

    #[test]
    fn three_times_nine_mod_13_is_one() {
        let op = op13();
        let a = op.to_domain_u64(3);
        let nine = op.to_domain_u64(9);
        let product = op.mul(&a, &nine);
        assert_eq!(op.from_mont(&product), op.from_mont(&op.one_rep));
    }

    #[test]
    fn inverse_of_zero_is_zero() {
        let op = op13();
        let zero = [0u64; 1];
        assert_eq!(op.invert(&zero), [0u64; 1]);
    }

    #[test]
    fn inverse_round_trips() {
        let op = op13();
        for v in 1u64..13 {
            let x = op.to_domain_u64(v);
            let inv = op.invert(&x);
            let prod = op.from_mont(&op.mul(&x, &inv));
            assert_eq!(prod, [1u64]);
        }
    }

    #[test]
    fn div_by_2_times_2_is_identity() {
        let op = op13();
        for v in 0u64..13 {
            let x = op.to_domain_u64(v);
            let halved = op.div_by_2(&x);
            let doubled = op.add(&halved, &halved);
            assert_eq!(op.from_mont(&doubled), op.from_mont(&x));
        }
    }

    #[test]
    fn edge_montgomery_values_multiply_correctly() {
        let op = op13();
        let zero = [0u64; 1];
        let one = op.one_rep;
        let p_minus_1 = op.to_domain_u64(12);
        let p_minus_r = op.sub(&zero, &one);
        let edges = [zero, one, p_minus_1, p_minus_r];
        for &x in &edges {
            for &y in &edges {
                let canon_x = op.from_mont(&x)[0];
                let canon_y = op.from_mont(&y)[0];
                let expect = (canon_x * canon_y) % 13;
                assert_eq!(op.from_mont(&op.mul(&x, &y))[0], expect);
            }
        }
    }
}
