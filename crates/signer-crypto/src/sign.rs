//! ECDSA signing with canonical low-S normalization and recovery id, ported
//! from `uECC_sign_with_k`'s "<RicMoo>" additions on top of upstream
//! micro-ecc: a blinded modular inverse of `k` to avoid leaking it through
//! timing, and flipping the recovery id whenever `s` gets negated to its
//! canonical low half.

use rand::RngCore;

use crate::bignum::U256;
use crate::curve::{self, CurveParams};
use crate::error::{CryptoError, CryptoResult};
use crate::rfc6979::DeterministicNonces;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    pub r: U256,
    pub s: U256,
    pub recovery_id: u8,
}

impl Signature {
    pub fn to_bytes(&self) -> [u8; 65] {
        let mut out = [0u8; 65];
        out[0..32].copy_from_slice(&self.r.to_be_bytes());
        out[32..64].copy_from_slice(&self.s.to_be_bytes());
        out[64] = self.recovery_id;
        out
    }
}

/// Attempts a signature for one candidate `k`; returns `None` when `k`
/// produces a degenerate `r` or `s` and the caller should try the next
/// candidate, matching `uECC_sign_with_k`'s retry contract.
fn sign_with_k(
    private_key: &U256,
    message_hash: &U256,
    k: &U256,
    curve: &CurveParams,
) -> Option<Signature> {
    if k.is_zero() || k.cmp_unsigned(&curve.n) != std::cmp::Ordering::Less {
        return None;
    }

    let (k0, k1, carry) = curve::regularize_scalar(k, curve);
    let k_regularized = if carry { k1 } else { k0 };
    let num_bits = curve.n.bit_length() + 1;
    let p = curve::point_mul(&curve.generator(), &k_regularized, None, num_bits, curve);

    let r = p.x.modulo(&curve.n);
    if r.is_zero() {
        return None;
    }

    // Blind the inverse of k with a random multiplier so neither the
    // multiplication nor the inversion alone reveal k through timing.
    let mut rng = rand::rng();
    let mut blind_bytes = [0u8; 32];
    loop {
        rng.fill_bytes(&mut blind_bytes);
        let candidate = U256::from_be_bytes(&blind_bytes);
        if !candidate.is_zero() && candidate.cmp_unsigned(&curve.n) == std::cmp::Ordering::Less {
            break;
        }
    }
    let blind = U256::from_be_bytes(&blind_bytes);

    let blinded_k = k.mul_mod(&blind, &curve.n);
    let k_inv = blinded_k.inv_mod(&curve.n);
    let k_inv = k_inv.mul_mod(&blind, &curve.n);

    let h = message_hash.modulo(&curve.n);
    let mut s = r.mul_mod(private_key, &curve.n);
    s = h.add_mod(&s, &curve.n);
    s = s.mul_mod(&k_inv, &curve.n);
    if s.is_zero() {
        return None;
    }

    let mut recovery_id = (p.y.test_bit(0) as u8) | ((p.x.cmp_unsigned(&curve.n) != std::cmp::Ordering::Less) as u8) << 1;

    let half_n = {
        let mut h = curve.n;
        h.shr1();
        h
    };
    let s = if s.cmp_unsigned(&half_n) == std::cmp::Ordering::Greater {
        recovery_id ^= 1;
        let mut neg = curve.n;
        neg.sub_assign(&s);
        neg
    } else {
        s
    };

    Some(Signature {
        r,
        s,
        recovery_id: recovery_id & 0x01,
    })
}

/// Signs `message_hash` deterministically per RFC 6979, trying successive
/// candidate nonces until one yields a non-degenerate signature.
pub fn sign_deterministic(
    private_key: &U256,
    message_hash: &U256,
    curve: &CurveParams,
) -> CryptoResult<Signature> {
    if private_key.is_zero() || private_key.cmp_unsigned(&curve.n) != std::cmp::Ordering::Less {
        return Err(CryptoError::InvalidPrivateKey);
    }

    let mut nonces = DeterministicNonces::new(private_key, message_hash, curve);
    while let Some(k) = nonces.next() {
        if let Some(signature) = sign_with_k(private_key, message_hash, &k, curve) {
            return Ok(signature);
        }
    }
    Err(CryptoError::SigningFailed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::CurveParams;

    #[test]
    fn signature_is_reproducible_for_same_inputs() {
        let curve = CurveParams::secp256k1();
        let key = U256::from_u32(0xABCDEF);
        let hash = U256::from_u32(0x1234);

        let a = sign_deterministic(&key, &hash, &curve).unwrap();
        let b = sign_deterministic(&key, &hash, &curve).unwrap();
        assert_eq!(a.r, b.r);
        assert_eq!(a.s, b.s);
        assert_eq!(a.recovery_id, b.recovery_id);
    }

    #[test]
    fn s_is_always_canonical_low_half() {
        let curve = CurveParams::secp256k1();
        let key = U256::from_u32(99);
        let hash = U256::from_u32(777);
        let sig = sign_deterministic(&key, &hash, &curve).unwrap();

        let mut half_n = curve.n;
        half_n.shr1();
        assert_ne!(sig.s.cmp_unsigned(&half_n), std::cmp::Ordering::Greater);
    }

    #[test]
    fn rejects_out_of_range_private_key() {
        let curve = CurveParams::secp256k1();
        let result = sign_deterministic(&curve.n, &U256::from_u32(1), &curve);
        assert_eq!(result, Err(CryptoError::InvalidPrivateKey));
    }
}
