//! Deterministic nonce generation, ported from `uECC_sign_deterministic`.
//!
//! This follows RFC 6979 with the firmware's two documented deviations from
//! the strict text (search its source for "#51"): the message hash is
//! reduced mod `n` once up front instead of being passed through
//! `bits2octets` on every HMAC round, and each candidate `k` is taken
//! directly from the V bytes rather than through `bits2int`. Both curves
//! used here have a byte-aligned order, so neither deviation changes the
//! candidate set it produces.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::bignum::U256;
use crate::curve::CurveParams;

type HmacSha256 = Hmac<Sha256>;

const MAX_TRIES: usize = 64;

/// Yields deterministic `k` candidates for a private key and message hash,
/// per RFC 6979 §3.2 steps a-g, until the caller finds one that produces a
/// valid signature.
pub struct DeterministicNonces {
    k: [u8; 32],
    v: [u8; 32],
    curve_order_bits: usize,
}

impl DeterministicNonces {
    pub fn new(private_key: &U256, message_hash: &U256, curve: &CurveParams) -> Self {
        let h1 = message_hash.modulo(&curve.n).to_be_bytes();
        let x = private_key.to_be_bytes();

        let mut v = [0x01u8; 32];
        let mut k = [0x00u8; 32];

        let mut mac = HmacSha256::new_from_slice(&k).expect("hmac accepts any key length");
        mac.update(&v);
        mac.update(&[0x00]);
        mac.update(&x);
        mac.update(&h1);
        k = mac.finalize().into_bytes().into();

        v = hmac_once(&k, &v);

        let mut mac = HmacSha256::new_from_slice(&k).expect("hmac accepts any key length");
        mac.update(&v);
        mac.update(&[0x01]);
        mac.update(&x);
        mac.update(&h1);
        k = mac.finalize().into_bytes().into();

        v = hmac_once(&k, &v);

        DeterministicNonces {
            k,
            v,
            curve_order_bits: curve.n.bit_length(),
        }
    }

    pub fn next(&mut self) -> Option<U256> {
        for _ in 0..MAX_TRIES {
            self.v = hmac_once(&self.k, &self.v);
            let candidate = U256::from_be_bytes(&self.v);

            let mut mac = HmacSha256::new_from_slice(&self.k).expect("hmac accepts any key length");
            mac.update(&self.v);
            mac.update(&[0x00]);
            self.k = mac.finalize().into_bytes().into();
            self.v = hmac_once(&self.k, &self.v);

            if !candidate.is_zero() && candidate.bit_length() <= self.curve_order_bits {
                return Some(candidate);
            }
        }
        tracing::warn!(tries = MAX_TRIES, "exhausted deterministic nonce candidates");
        None
    }
}

fn hmac_once(key: &[u8; 32], data: &[u8; 32]) -> [u8; 32] {
    let mut mac = HmacSha256::new_from_slice(key).expect("hmac accepts any key length");
    mac.update(data);
    mac.finalize().into_bytes().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_inputs_yield_same_first_candidate() {
        let curve = CurveParams::secp256k1();
        let key = U256::from_u32(42);
        let hash = U256::from_u32(1234);

        let mut a = DeterministicNonces::new(&key, &hash, &curve);
        let mut b = DeterministicNonces::new(&key, &hash, &curve);
        assert_eq!(a.next(), b.next());
    }

    #[test]
    fn different_hash_yields_different_candidate() {
        let curve = CurveParams::secp256k1();
        let key = U256::from_u32(42);

        let mut a = DeterministicNonces::new(&key, &U256::from_u32(1), &curve);
        let mut b = DeterministicNonces::new(&key, &U256::from_u32(2), &curve);
        assert_ne!(a.next(), b.next());
    }
}
