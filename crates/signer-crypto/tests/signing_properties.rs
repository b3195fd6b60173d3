//! Property-based tests for deterministic signing and modular arithmetic.

use proptest::prelude::*;
use signer_crypto::curve::CurveParams;
use signer_crypto::sign::sign_deterministic;
use signer_crypto::U256;

fn nonzero_u32() -> impl Strategy<Value = u32> {
    1u32..u32::MAX
}

proptest! {
    // Every deterministic signature over secp256k1 has a canonical,
    // low-half `s` and non-zero `r`/`s` components, independent of which
    // private key or message hash produced it.
    #[test]
    fn secp256k1_signatures_are_canonical(key in nonzero_u32(), hash in nonzero_u32()) {
        let curve = CurveParams::secp256k1();
        let private_key = U256::from_u32(key);
        let message_hash = U256::from_u32(hash);

        let signature = sign_deterministic(&private_key, &message_hash, &curve).unwrap();
        prop_assert!(!signature.r.is_zero());
        prop_assert!(!signature.s.is_zero());

        let mut half = curve.n;
        half.shr1();
        prop_assert_ne!(signature.s.cmp_unsigned(&half), std::cmp::Ordering::Greater);
        prop_assert!(signature.recovery_id <= 1);
    }

    // Signing the same key and hash twice is fully deterministic.
    #[test]
    fn signing_is_reproducible(key in nonzero_u32(), hash in nonzero_u32()) {
        let curve = CurveParams::secp256k1();
        let private_key = U256::from_u32(key);
        let message_hash = U256::from_u32(hash);

        let first = sign_deterministic(&private_key, &message_hash, &curve).unwrap();
        let second = sign_deterministic(&private_key, &message_hash, &curve).unwrap();
        prop_assert_eq!(first, second);
    }

    // Modular addition never produces a value outside the modulus.
    #[test]
    fn add_mod_stays_below_modulus(a in nonzero_u32(), b in nonzero_u32(), m in 2u32..u32::MAX) {
        let modulus = U256::from_u32(m);
        let sum = U256::from_u32(a).add_mod(&U256::from_u32(b), &modulus);
        prop_assert_eq!(sum.cmp_unsigned(&modulus), std::cmp::Ordering::Less);
    }
}
