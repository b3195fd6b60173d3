//! Signing pipeline: 256-bit bignum arithmetic, Jacobian point operations on
//! secp256k1 and P-256, RFC 6979 deterministic nonces, and EIP-1559
//! transaction construction.
//!
//! The field arithmetic and point multiplication are bespoke rather than
//! delegating to an existing curve crate, mirroring the firmware's own
//! micro-ecc fork rather than a general-purpose library: both curves share
//! one code path, scalar multiplication always takes a fixed number of
//! ladder steps, and the co-Z formulas avoid ever computing a pure
//! affine-to-affine inversion mid-ladder.

pub mod bignum;
pub mod curve;
pub mod error;
pub mod keys;
pub mod rfc6979;
pub mod sign;
pub mod tx;

pub use bignum::U256;
pub use curve::{CurveKind, CurveParams};
pub use error::{CryptoError, CryptoResult};
pub use keys::{Keypair, PublicKey};
pub use sign::Signature;
pub use tx::{Transaction, TxAddress};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn end_to_end_sign_and_verify_point_membership() {
        let curve = CurveParams::secp256k1();
        let pair = Keypair::from_private_key(U256::from_u32(777), &curve).unwrap();
        assert!(curve.is_valid_point(&pair.public_key.0));

        let tx = Transaction {
            chain_id: 1,
            nonce: 0,
            max_priority_fee_per_gas: 1,
            max_fee_per_gas: 2,
            gas_limit: 21_000,
            to: TxAddress::None,
            value: U256::ZERO,
            data: Vec::new(),
        };
        let signed = tx.sign(&pair.private_key, &curve).unwrap();
        assert_eq!(signed[0], 0x02);
    }
}
