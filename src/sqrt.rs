//! Square-root operator: generator/root-of-unity precomputation plus the
//! Tonelli-Shanks algorithm (with a Shanks fast path for `p ≡ 3 (mod 4)`).
//!
//! Picks between Shanks and general Tonelli-Shanks the way a compile-time
//! `Algorithm` selection would, but computed from a runtime modulus. Keeps
//! the Shanks fast path (the common case for curve-sized primes) and falls
//! back to general Tonelli-Shanks for everything else, computing `S`, `T`,
//! the generator and `ROOT_OF_UNITY` at `init()` time instead of via
//! compile-time constants. The Atkins `p ≡ 5 (mod 8)` specialization is
//! dropped; Tonelli-Shanks already handles that case correctly, just
//! without the constant-factor speedup; see DESIGN.md.

use crate::backend::Op;
use crate::word;

/// Compute and install `s`, `t`, `nonresidue`, and `root_of_unity` on a
/// freshly constructed `Op`. Called once from [`Op::init`].
pub fn precompute<const L: usize>(op: &mut Op<L>) {
    let mut one = [0u64; L];
    one[0] = 1;

    let mut p_minus_1 = [0u64; L];
    word::sub_with_borrow(&mut p_minus_1, &op.p, &one);

    let mut t = p_minus_1;
    let mut s = 0u32;
    while t[0] & 1 == 0 {
        word::shr1(&mut t);
        s += 1;
    }
    op.s = s;
    op.t = t;

    let mut half_p_minus_1 = p_minus_1;
    word::shr1(&mut half_p_minus_1);

    let neg_one_domain = op.to_mont(&p_minus_1);

    let mut candidate = 2u64;
    let nonresidue_domain = loop {
        let g = op.to_domain_u64(candidate);
        if op.pow(&g, &half_p_minus_1) == neg_one_domain {
            break g;
        }
        candidate += 1;
    };
    op.nonresidue = nonresidue_domain;
    op.root_of_unity = op.pow(&nonresidue_domain, &op.t);
}

/// `(t + 1) / 2` for the odd word array `t`.
fn half_of_plus_one<const L: usize>(t: &[u64; L]) -> [u64; L] {
    let mut one = [0u64; L];
    one[0] = 1;
    let mut sum = [0u64; L];
    word::add_with_carry(&mut sum, t, &one);
    word::shr1(&mut sum);
    sum
}

/// `y` with `y^2 = x`, if one exists.
pub fn sqrt<const L: usize>(op: &Op<L>, x: &[u64; L]) -> Option<[u64; L]> {
    if word::is_zero(&op.from_mont(x)) {
        return Some([0u64; L]);
    }

    let mut one = [0u64; L];
    one[0] = 1;
    let mut p_minus_1 = [0u64; L];
    word::sub_with_borrow(&mut p_minus_1, &op.p, &one);
    let mut half_p_minus_1 = p_minus_1;
    word::shr1(&mut half_p_minus_1);

    // Euler's criterion: x is a QR iff x^((p-1)/2) == 1.
    if op.pow(x, &half_p_minus_1) != op.one_rep {
        return None;
    }

    if op.s == 1 {
        // p ≡ 3 (mod 4): sqrt(x) = x^((p+1)/4) = x^((t+1)/2).
        let exp = half_of_plus_one(&op.t);
        return Some(op.pow(x, &exp));
    }

    let mut m = op.s;
    let mut c = op.root_of_unity;
    let mut t_val = op.pow(x, &op.t);
    let mut r = op.pow(x, &half_of_plus_one(&op.t));

    loop {
        if t_val == op.one_rep {
            return Some(r);
        }

        let mut i = 0u32;
        let mut temp = t_val;
        while temp != op.one_rep {
            temp = op.sqr(&temp);
            i += 1;
            if i >= m {
                // Euler's criterion already guaranteed a root exists; this
                // would indicate an inconsistent `Op` (e.g. bad generator).
                return None;
            }
        }

        let mut b = c;
        for _ in 0..(m - i - 1) {
            b = op.sqr(&b);
        }
        m = i;
        c = op.sqr(&b);
        t_val = op.mul(&t_val, &c);
        r = op.mul(&r, &b);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Mode;

    #[test]
    fn sqrt_of_squares_round_trips_mod_13() {
        let op = Op::<1>::init(&[13], Mode::Montgomery).unwrap();
        for v in 0u64..13 {
            let x = op.to_domain_u64(v);
            let sq = op.sqr(&x);
            let root = sqrt(&op, &sq).expect("square must have a root");
            let check = op.sqr(&root);
            assert_eq!(op.from_mont(&check), op.from_mont(&sq));
        }
    }

    #[test]
    fn sqrt_of_nonresidue_is_none() {
        // mod 7 (≡ 3 mod 4): quadratic residues are {0,1,2,4}; 3,5,6 are not.
        let op = Op::<1>::init(&[7], Mode::Montgomery).unwrap();
        for &nr in &[3u64, 5, 6] {
            let x = op.to_domain_u64(nr);
            assert!(sqrt(&op, &x).is_none());
        }
        for &qr in &[0u64, 1, 2, 4] {
            let x = op.to_domain_u64(qr);
            assert!(sqrt(&op, &x).is_some());
        }
    }

    #[test]
    fn general_tonelli_shanks_path_mod_17() {
        // 17 ≡ 1 (mod 4), s = 4, t = 1: exercises the general loop.
        let op = Op::<1>::init(&[17], Mode::Montgomery).unwrap();
        assert!(op.s > 1);
        for v in 0u64..17 {
            let x = op.to_domain_u64(v);
            let sq = op.sqr(&x);
            let root = sqrt(&op, &sq).unwrap();
            assert_eq!(op.from_mont(&op.sqr(&root)), op.from_mont(&sq));
        }
    }
}
