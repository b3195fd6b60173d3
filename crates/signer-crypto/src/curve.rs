//! Curve parameters and Jacobian point arithmetic for secp256k1 and P-256.
//!
//! Point multiplication uses the co-Z Montgomery ladder from the firmware's
//! `EccPoint_mult`: two running points sharing a Z-coordinate are advanced
//! together bit by bit, so every iteration does the same sequence of field
//! operations regardless of the scalar's bits.

use crate::bignum::U256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurveKind {
    Secp256k1,
    P256,
}

pub struct CurveParams {
    pub kind: CurveKind,
    pub p: U256,
    pub n: U256,
    pub b: U256,
    pub gx: U256,
    pub gy: U256,
    /// `true` for curves with `a = -3` (P-256); `false` for `a = 0` (secp256k1).
    pub a_is_minus3: bool,
}

impl CurveParams {
    pub fn secp256k1() -> Self {
        CurveParams {
            kind: CurveKind::Secp256k1,
            p: U256::from_be_bytes(&hex32(
                "FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFEFFFFFC2F",
            )),
            n: U256::from_be_bytes(&hex32(
                "FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFEBAAEDCE6AF48A03BBFD25E8CD0364141",
            )),
            b: U256::from_be_bytes(&hex32(
                "0000000000000000000000000000000000000000000000000000000000000007",
            )),
            gx: U256::from_be_bytes(&hex32(
                "79BE667EF9DCBBAC55A06295CE870B07029BFCDB2DCE28D959F2815B16F81798",
            )),
            gy: U256::from_be_bytes(&hex32(
                "483ADA7726A3C4655DA4FBFC0E1108A8FD17B448A68554199C47D08FFB10D4B8",
            )),
            a_is_minus3: false,
        }
    }

    pub fn p256() -> Self {
        CurveParams {
            kind: CurveKind::P256,
            p: U256::from_be_bytes(&hex32(
                "FFFFFFFF00000001000000000000000000000000FFFFFFFFFFFFFFFFFFFFFFFF",
            )),
            n: U256::from_be_bytes(&hex32(
                "FFFFFFFF00000000FFFFFFFFFFFFFFFFBCE6FAADA7179E84F3B9CAC2FC632551",
            )),
            b: U256::from_be_bytes(&hex32(
                "5AC635D8AA3A93E7B3EBBD55769886BC651D06B0CC53B0F63BCE3C3E27D2604B",
            )),
            gx: U256::from_be_bytes(&hex32(
                "6B17D1F2E12C4247F8BCE6E563A440F277037D812DEB33A0F4A13945D898C296",
            )),
            gy: U256::from_be_bytes(&hex32(
                "4FE342E2FE1A7F9B8EE7EB4A7C0F9E162BCE33576B315ECECBB6406837BF51F5",
            )),
            a_is_minus3: true,
        }
    }

    pub fn for_kind(kind: CurveKind) -> Self {
        match kind {
            CurveKind::Secp256k1 => Self::secp256k1(),
            CurveKind::P256 => Self::p256(),
        }
    }

    pub fn generator(&self) -> AffinePoint {
        AffinePoint {
            x: self.gx,
            y: self.gy,
        }
    }

    /// `x^3 + a*x + b` with `a` folded into the per-curve formula.
    pub fn x_side(&self, x: &U256) -> U256 {
        let x2 = x.square_mod(&self.p);
        let x3 = x2.mul_mod(x, &self.p);
        if self.a_is_minus3 {
            let three_x = {
                let two_x = x.add_mod(x, &self.p);
                two_x.add_mod(x, &self.p)
            };
            x3.sub_mod(&three_x, &self.p).add_mod(&self.b, &self.p)
        } else {
            x3.add_mod(&self.b, &self.p)
        }
    }

    /// `sqrt(a) mod p` for primes with `p = 3 (mod 4)`, true for both curves
    /// used here, via `a^((p+1)/4) mod p`.
    pub fn mod_sqrt(&self, a: &U256) -> U256 {
        let mut exponent = self.p;
        exponent.add_assign(&U256::from_u32(1));
        exponent.shr1();
        exponent.shr1();

        let mut result = U256::from_u32(1);
        for bit in (0..exponent.bit_length()).rev() {
            result = result.square_mod(&self.p);
            if exponent.test_bit(bit) {
                result = result.mul_mod(a, &self.p);
            }
        }
        result
    }

    pub fn is_valid_point(&self, point: &AffinePoint) -> bool {
        if point.x.is_zero() && point.y.is_zero() {
            return false;
        }
        if point.x.cmp_unsigned(&self.p) != std::cmp::Ordering::Less
            || point.y.cmp_unsigned(&self.p) != std::cmp::Ordering::Less
        {
            return false;
        }
        point.y.square_mod(&self.p) == self.x_side(&point.x)
    }
}

fn hex32(hex: &str) -> [u8; 32] {
    let mut out = [0u8; 32];
    for i in 0..32 {
        out[i] = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).expect("static curve constant");
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AffinePoint {
    pub x: U256,
    pub y: U256,
}

#[derive(Debug, Clone, Copy)]
struct JacobianCoords {
    x: U256,
    y: U256,
    z: U256,
}

fn double_jacobian_minus3(p: &mut JacobianCoords, curve: &CurveParams) {
    if p.z.is_zero() {
        return;
    }
    let modulus = &curve.p;
    let t4 = p.y.square_mod(modulus);
    let t5 = p.x.mul_mod(&t4, modulus);
    let t4 = t4.square_mod(modulus);
    p.y = p.y.mul_mod(&p.z, modulus);
    p.z = p.z.square_mod(modulus);

    let mut t1 = p.x.add_mod(&p.z, modulus);
    let t3 = p.z.add_mod(&p.z, modulus);
    p.z = t1.sub_mod(&t3, modulus);
    t1 = t1.mul_mod(&p.z, modulus);

    let t3 = t1.add_mod(&t1, modulus);
    t1 = t1.add_mod(&t3, modulus);
    if t1.test_bit(0) {
        let carry = t1.add_assign(modulus);
        t1.shr1();
        if carry != 0 {
            t1.0[crate::bignum::WORDS - 1] |= 1 << 31;
        }
    } else {
        t1.shr1();
    }

    p.z = t1.square_mod(modulus);
    p.z = p.z.sub_mod(&t5, modulus);
    p.z = p.z.sub_mod(&t5, modulus);
    let t5b = t5.sub_mod(&p.z, modulus);
    t1 = t1.mul_mod(&t5b, modulus);
    let t4b = t1.sub_mod(&t4, modulus);

    p.x = p.z;
    p.z = p.y;
    p.y = t4b;
}

fn double_jacobian_secp256k1(p: &mut JacobianCoords, curve: &CurveParams) {
    if p.z.is_zero() {
        return;
    }
    let modulus = &curve.p;
    let mut t5 = p.y.square_mod(modulus);
    let mut t4 = p.x.mul_mod(&t5, modulus);
    p.x = p.x.square_mod(modulus);
    t5 = t5.square_mod(modulus);
    p.z = p.y.mul_mod(&p.z, modulus);

    let mut t2 = p.x.add_mod(&p.x, modulus);
    t2 = t2.add_mod(&p.x, modulus);
    if t2.test_bit(0) {
        let carry = t2.add_assign(modulus);
        t2.shr1();
        if carry != 0 {
            t2.0[crate::bignum::WORDS - 1] |= 1 << 31;
        }
    } else {
        t2.shr1();
    }

    p.x = t2.square_mod(modulus);
    p.x = p.x.sub_mod(&t4, modulus);
    p.x = p.x.sub_mod(&t4, modulus);

    t4 = t4.sub_mod(&p.x, modulus);
    p.y = t2.mul_mod(&t4, modulus);
    p.y = p.y.sub_mod(&t5, modulus);
}

fn double_jacobian(p: &mut JacobianCoords, curve: &CurveParams) {
    if curve.a_is_minus3 {
        double_jacobian_minus3(p, curve);
    } else {
        double_jacobian_secp256k1(p, curve);
    }
}

fn apply_z(point: &mut AffinePoint, z: &U256, curve: &CurveParams) {
    let modulus = &curve.p;
    let z2 = z.square_mod(modulus);
    point.x = point.x.mul_mod(&z2, modulus);
    let z3 = z2.mul_mod(z, modulus);
    point.y = point.y.mul_mod(&z3, modulus);
}

/// `P = (x1,y1) => 2P`, `Q = (x2,y2) => P'` sharing Z.
fn xycz_initial_double(
    p1: &mut AffinePoint,
    p2: &mut AffinePoint,
    initial_z: Option<&U256>,
    curve: &CurveParams,
) -> U256 {
    let mut z = initial_z.copied().unwrap_or(U256::from_u32(1));
    *p2 = *p1;

    apply_z(p1, &z, curve);
    let mut jp = JacobianCoords {
        x: p1.x,
        y: p1.y,
        z,
    };
    double_jacobian(&mut jp, curve);
    p1.x = jp.x;
    p1.y = jp.y;
    z = jp.z;
    apply_z(p2, &z, curve);
    z
}

/// `P=(x1,y1,Z)`, `Q=(x2,y2,Z)` -> `P'=(x1',y1',Z3)`, `P+Q=(x3,y3,Z3)`.
fn xycz_add(p1: &mut AffinePoint, p2: &mut AffinePoint, curve: &CurveParams) {
    let modulus = &curve.p;
    let mut t5 = p2.x.sub_mod(&p1.x, modulus);
    t5 = t5.square_mod(modulus);
    p1.x = p1.x.mul_mod(&t5, modulus);
    p2.x = p2.x.mul_mod(&t5, modulus);
    p2.y = p2.y.sub_mod(&p1.y, modulus);
    t5 = p2.y.square_mod(modulus);

    t5 = t5.sub_mod(&p1.x, modulus);
    t5 = t5.sub_mod(&p2.x, modulus);
    let c = p2.x.sub_mod(&p1.x, modulus);
    p1.y = p1.y.mul_mod(&c, modulus);
    let b_minus_x3 = p1.x.sub_mod(&t5, modulus);
    p2.y = p2.y.mul_mod(&b_minus_x3, modulus);
    p2.y = p2.y.sub_mod(&p1.y, modulus);

    p2.x = t5;
}

/// `P=(x1,y1,Z)`, `Q=(x2,y2,Z)` -> `P+Q=(x3,y3,Z3)`, `P-Q=(x3',y3',Z3)`.
fn xycz_add_conjugate(p1: &mut AffinePoint, p2: &mut AffinePoint, curve: &CurveParams) {
    let modulus = &curve.p;
    let mut t5 = p2.x.sub_mod(&p1.x, modulus);
    t5 = t5.square_mod(modulus);
    p1.x = p1.x.mul_mod(&t5, modulus);
    p2.x = p2.x.mul_mod(&t5, modulus);
    let sum_y = p2.y.add_mod(&p1.y, modulus);
    p2.y = p2.y.sub_mod(&p1.y, modulus);

    let c_minus_b = p2.x.sub_mod(&p1.x, modulus);
    let e = p1.y.mul_mod(&c_minus_b, modulus);
    let b_plus_c = p1.x.add_mod(&p2.x, modulus);
    let d = p2.y.square_mod(modulus);
    let x3 = d.sub_mod(&b_plus_c, modulus);

    let b_minus_x3 = p1.x.sub_mod(&x3, modulus);
    let mut y3 = p2.y.mul_mod(&b_minus_x3, modulus);
    y3 = y3.sub_mod(&e, modulus);

    let f = sum_y.square_mod(modulus);
    let x3p = f.sub_mod(&b_plus_c, modulus);
    let x3p_minus_b = x3p.sub_mod(&p1.x, modulus);
    let mut y3p = x3p_minus_b.mul_mod(&sum_y, modulus);
    y3p = y3p.sub_mod(&e, modulus);

    p1.x = x3p;
    p1.y = y3p;
    p2.x = x3;
    p2.y = y3;
}

/// Scalar multiplication via the co-Z Montgomery ladder. `scalar` must
/// already be regularized (see [`regularize_scalar`]) so the loop always
/// runs `num_bits` iterations regardless of its true bit length.
pub fn point_mul(
    point: &AffinePoint,
    scalar: &U256,
    initial_z: Option<&U256>,
    num_bits: usize,
    curve: &CurveParams,
) -> AffinePoint {
    let mut r1 = *point;
    let mut r0 = AffinePoint {
        x: U256::ZERO,
        y: U256::ZERO,
    };

    let z = xycz_initial_double(&mut r1, &mut r0, initial_z, curve);
    let mut rs = [r0, r1];

    for i in (1..num_bits - 1).rev() {
        let nb = if scalar.test_bit(i) { 0 } else { 1 };
        let (a, b) = two_mut(&mut rs, 1 - nb, nb);
        xycz_add_conjugate(a, b, curve);
        let (a, b) = two_mut(&mut rs, nb, 1 - nb);
        xycz_add(a, b, curve);
    }

    let nb = if scalar.test_bit(0) { 0 } else { 1 };
    {
        let (a, b) = two_mut(&mut rs, 1 - nb, nb);
        xycz_add_conjugate(a, b, curve);
    }

    let modulus = &curve.p;
    let mut zf = rs[1].x.sub_mod(&rs[0].x, modulus);
    zf = zf.mul_mod(&rs[1 - nb].y, modulus);
    zf = zf.mul_mod(&point.x, modulus);
    zf = zf.inv_mod(modulus);
    zf = zf.mul_mod(&point.y, modulus);
    zf = zf.mul_mod(&rs[1 - nb].x, modulus);

    {
        let (a, b) = two_mut(&mut rs, nb, 1 - nb);
        xycz_add(a, b, curve);
    }

    let mut result = rs[0];
    apply_z(&mut result, &zf, curve);
    let _ = z;
    result
}

fn two_mut<T>(arr: &mut [T; 2], i: usize, j: usize) -> (&mut T, &mut T) {
    assert_ne!(i, j);
    if i < j {
        let (left, right) = arr.split_at_mut(j);
        (&mut left[i], &mut right[0])
    } else {
        let (left, right) = arr.split_at_mut(i);
        (&mut right[0], &mut left[j])
    }
}

/// Adds `n` to `k` (and again to the result) so that both `k0` and `k1` have
/// the same fixed bit length, hiding the true bit length of `k` from a
/// timing side channel in the ladder above.
pub fn regularize_scalar(k: &U256, curve: &CurveParams) -> (U256, U256, bool) {
    let mut k0 = *k;
    let add_carry = k0.add_assign(&curve.n);
    let num_n_bits = curve.n.bit_length();
    let carry = add_carry != 0 || k0.test_bit(num_n_bits);
    let mut k1 = k0;
    k1.add_assign(&curve.n);
    (k0, k1, carry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generator_is_on_curve_secp256k1() {
        let curve = CurveParams::secp256k1();
        assert!(curve.is_valid_point(&curve.generator()));
    }

    #[test]
    fn generator_is_on_curve_p256() {
        let curve = CurveParams::p256();
        assert!(curve.is_valid_point(&curve.generator()));
    }

    #[test]
    fn scalar_one_returns_generator() {
        let curve = CurveParams::secp256k1();
        let (k0, k1, carry) = regularize_scalar(&U256::from_u32(1), &curve);
        let k = if carry { k1 } else { k0 };
        let result = point_mul(&curve.generator(), &k, None, curve.n.bit_length() + 1, &curve);
        assert_eq!(result, curve.generator());
    }
}
