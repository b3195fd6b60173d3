//! Key derivation, point compression, and ECDH, ported from
//! `EccPoint_compute_public_key`, `uECC_compress`/`uECC_decompress`, and
//! `uECC_shared_secret`.

use rand::RngCore;

use crate::bignum::U256;
use crate::curve::{self, AffinePoint, CurveParams};
use crate::error::{CryptoError, CryptoResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublicKey(pub AffinePoint);

impl PublicKey {
    /// 33-byte SEC1 compressed form: a parity prefix (`0x02`/`0x03`) over the
    /// x-coordinate, following `uECC_compress`.
    pub fn compress(&self) -> [u8; 33] {
        let mut out = [0u8; 33];
        out[0] = if self.0.y.test_bit(0) { 0x03 } else { 0x02 };
        out[1..].copy_from_slice(&self.0.x.to_be_bytes());
        out
    }

    /// Recovers the full point from its compressed form via
    /// `mod_sqrt(x_side(x))`, following `uECC_decompress`.
    pub fn decompress(bytes: &[u8; 33], curve: &CurveParams) -> CryptoResult<Self> {
        let parity_odd = match bytes[0] {
            0x02 => false,
            0x03 => true,
            _ => return Err(CryptoError::InvalidPublicKey),
        };
        let mut x_bytes = [0u8; 32];
        x_bytes.copy_from_slice(&bytes[1..]);
        let x = U256::from_be_bytes(&x_bytes);

        let y = curve.mod_sqrt(&curve.x_side(&x));
        let y = if y.test_bit(0) != parity_odd {
            let mut neg = curve.p;
            neg.sub_assign(&y);
            neg
        } else {
            y
        };

        let point = AffinePoint { x, y };
        if !curve.is_valid_point(&point) {
            return Err(CryptoError::InvalidPublicKey);
        }
        Ok(PublicKey(point))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Keypair {
    pub private_key: U256,
    pub public_key: PublicKey,
}

impl Keypair {
    pub fn from_private_key(private_key: U256, curve: &CurveParams) -> CryptoResult<Self> {
        if private_key.is_zero() || private_key.cmp_unsigned(&curve.n) != std::cmp::Ordering::Less {
            return Err(CryptoError::InvalidPrivateKey);
        }
        let (k0, k1, carry) = curve::regularize_scalar(&private_key, curve);
        let k = if carry { k1 } else { k0 };
        let num_bits = curve.n.bit_length() + 1;
        let point = curve::point_mul(&curve.generator(), &k, None, num_bits, curve);
        if !curve.is_valid_point(&point) {
            return Err(CryptoError::InvalidPrivateKey);
        }
        Ok(Keypair {
            private_key,
            public_key: PublicKey(point),
        })
    }

    pub fn generate(curve: &CurveParams) -> CryptoResult<Self> {
        let mut rng = rand::rng();
        loop {
            let mut bytes = [0u8; 32];
            rng.fill_bytes(&mut bytes);
            let candidate = U256::from_be_bytes(&bytes);
            if candidate.is_zero() || candidate.cmp_unsigned(&curve.n) != std::cmp::Ordering::Less {
                continue;
            }
            if let Ok(pair) = Self::from_private_key(candidate, curve) {
                return Ok(pair);
            }
        }
    }

    /// Diffie-Hellman shared secret, the x-coordinate of `private_key * peer`,
    /// following `uECC_shared_secret`.
    pub fn ecdh(&self, peer: &PublicKey, curve: &CurveParams) -> CryptoResult<U256> {
        if !curve.is_valid_point(&peer.0) {
            return Err(CryptoError::InvalidPublicKey);
        }
        let (k0, k1, carry) = curve::regularize_scalar(&self.private_key, curve);
        let k = if carry { k1 } else { k0 };
        let num_bits = curve.n.bit_length() + 1;
        let shared = curve::point_mul(&peer.0, &k, None, num_bits, curve);
        if shared.x.is_zero() && shared.y.is_zero() {
            return Err(CryptoError::InvalidPublicKey);
        }
        Ok(shared.x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compression_round_trips() {
        let curve = CurveParams::secp256k1();
        let pair = Keypair::from_private_key(U256::from_u32(12345), &curve).unwrap();
        let compressed = pair.public_key.compress();
        let recovered = PublicKey::decompress(&compressed, &curve).unwrap();
        assert_eq!(recovered, pair.public_key);
    }

    #[test]
    fn ecdh_is_symmetric() {
        let curve = CurveParams::secp256k1();
        let alice = Keypair::from_private_key(U256::from_u32(111), &curve).unwrap();
        let bob = Keypair::from_private_key(U256::from_u32(222), &curve).unwrap();

        let shared_a = alice.ecdh(&bob.public_key, &curve).unwrap();
        let shared_b = bob.ecdh(&alice.public_key, &curve).unwrap();
        assert_eq!(shared_a, shared_b);
    }

    #[test]
    fn rejects_private_key_at_or_above_order() {
        let curve = CurveParams::secp256k1();
        assert!(matches!(
            Keypair::from_private_key(curve.n, &curve),
            Err(CryptoError::InvalidPrivateKey)
        ));
    }
}
