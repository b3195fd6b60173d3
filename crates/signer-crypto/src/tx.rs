//! EIP-1559 transaction envelope construction and signing, ported from
//! `transaction.c`'s field table: a typed envelope (`0x02`) wrapping a
//! 9-item RLP list, each field minimally encoded per its declared format.

use sha3::{Digest, Keccak256};

use crate::bignum::U256;
use crate::curve::CurveParams;
use crate::error::{CryptoError, CryptoResult};
use crate::sign::{self, Signature};

const ENVELOPE_TYPE: u8 = 0x02;

/// Mirrors `transaction.c`'s per-field `Format`: `Number` strips leading
/// zero bytes before encoding, `Address` is either exactly 20 bytes or
/// (when nullable) empty.
#[derive(Debug, Clone)]
pub enum TxAddress {
    Present([u8; 20]),
    None,
}

#[derive(Debug, Clone)]
pub struct Transaction {
    pub chain_id: u64,
    pub nonce: u64,
    pub max_priority_fee_per_gas: u64,
    pub max_fee_per_gas: u64,
    pub gas_limit: u64,
    pub to: TxAddress,
    pub value: U256,
    pub data: Vec<u8>,
}

fn trim_leading_zeros(bytes: &[u8]) -> &[u8] {
    let first_nonzero = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    &bytes[first_nonzero..]
}

fn encode_number(builder: &mut signer_rlp::Builder<'_>, value: u64) -> signer_rlp::RlpResult<()> {
    let bytes = value.to_be_bytes();
    builder.append_data(trim_leading_zeros(&bytes))
}

impl Transaction {
    /// Builds the unsigned RLP payload (the 9-item field list, no envelope
    /// byte) used both as the signing preimage and, with `v`/`r`/`s`
    /// appended, the 12-item signed payload.
    fn encode_fields(&self, buf: &mut [u8], signature: Option<&Signature>) -> CryptoResult<usize> {
        let mut builder = signer_rlp::Builder::new(buf);
        let item_count = if signature.is_some() { 12 } else { 9 };
        let mut list = builder
            .begin_array(item_count)
            .map_err(|_| CryptoError::FieldOverflow)?;

        builder
            .array_item(&mut list, |b| encode_number(b, self.chain_id))
            .map_err(|_| CryptoError::FieldOverflow)?;
        builder
            .array_item(&mut list, |b| encode_number(b, self.nonce))
            .map_err(|_| CryptoError::FieldOverflow)?;
        builder
            .array_item(&mut list, |b| encode_number(b, self.max_priority_fee_per_gas))
            .map_err(|_| CryptoError::FieldOverflow)?;
        builder
            .array_item(&mut list, |b| encode_number(b, self.max_fee_per_gas))
            .map_err(|_| CryptoError::FieldOverflow)?;
        builder
            .array_item(&mut list, |b| encode_number(b, self.gas_limit))
            .map_err(|_| CryptoError::FieldOverflow)?;
        builder
            .array_item(&mut list, |b| match &self.to {
                TxAddress::Present(addr) => b.append_data(addr),
                TxAddress::None => b.append_data(&[]),
            })
            .map_err(|_| CryptoError::FieldOverflow)?;
        builder
            .array_item(&mut list, |b| {
                b.append_data(trim_leading_zeros(&self.value.to_be_bytes()))
            })
            .map_err(|_| CryptoError::FieldOverflow)?;
        builder
            .array_item(&mut list, |b| b.append_data(&self.data))
            .map_err(|_| CryptoError::FieldOverflow)?;
        builder
            .array_item(&mut list, |b| {
                let access_list = b.begin_array(0)?;
                b.end_array(access_list)
            })
            .map_err(|_| CryptoError::FieldOverflow)?;

        if let Some(sig) = signature {
            builder
                .array_item(&mut list, |b| encode_number(b, sig.recovery_id as u64))
                .map_err(|_| CryptoError::FieldOverflow)?;
            builder
                .array_item(&mut list, |b| b.append_data(trim_leading_zeros(&sig.r.to_be_bytes())))
                .map_err(|_| CryptoError::FieldOverflow)?;
            builder
                .array_item(&mut list, |b| b.append_data(trim_leading_zeros(&sig.s.to_be_bytes())))
                .map_err(|_| CryptoError::FieldOverflow)?;
        }

        builder.end_array(list).map_err(|_| CryptoError::FieldOverflow)?;
        let encoded = builder.finish().map_err(|_| CryptoError::FieldOverflow)?;
        Ok(encoded.len())
    }

    /// Keccak256 over the envelope byte plus the unsigned field list, the
    /// exact preimage `uECC_sign_deterministic` is called on.
    pub fn signing_hash(&self) -> CryptoResult<U256> {
        let mut buf = [0u8; 4096];
        let len = self.encode_fields(&mut buf, None)?;

        let mut hasher = Keccak256::new();
        hasher.update([ENVELOPE_TYPE]);
        hasher.update(&buf[..len]);
        let digest = hasher.finalize();

        let mut hash_bytes = [0u8; 32];
        hash_bytes.copy_from_slice(&digest);
        Ok(U256::from_be_bytes(&hash_bytes))
    }

    /// Signs the transaction and returns the full envelope: type byte
    /// followed by the 12-item signed field list.
    pub fn sign(&self, private_key: &U256, curve: &CurveParams) -> CryptoResult<Vec<u8>> {
        let hash = self.signing_hash()?;
        let signature = sign::sign_deterministic(private_key, &hash, curve)?;

        let mut buf = [0u8; 4096];
        let len = self.encode_fields(&mut buf, Some(&signature))?;

        let mut out = Vec::with_capacity(1 + len);
        out.push(ENVELOPE_TYPE);
        out.extend_from_slice(&buf[..len]);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tx() -> Transaction {
        Transaction {
            chain_id: 1,
            nonce: 7,
            max_priority_fee_per_gas: 1_500_000_000,
            max_fee_per_gas: 30_000_000_000,
            gas_limit: 21_000,
            to: TxAddress::Present([0x11; 20]),
            value: U256::from_u32(1_000_000),
            data: Vec::new(),
        }
    }

    #[test]
    fn nullable_address_encodes_as_empty_string() {
        let mut tx = sample_tx();
        tx.to = TxAddress::None;
        assert!(tx.signing_hash().is_ok());
    }

    #[test]
    fn signing_is_deterministic() {
        let curve = CurveParams::secp256k1();
        let tx = sample_tx();
        let key = U256::from_u32(0xDEAD);

        let first = tx.sign(&key, &curve).unwrap();
        let second = tx.sign(&key, &curve).unwrap();
        assert_eq!(first, second);
        assert_eq!(first[0], ENVELOPE_TYPE);
    }

    #[test]
    fn different_nonce_changes_the_signing_hash() {
        let mut tx = sample_tx();
        let hash_a = tx.signing_hash().unwrap();
        tx.nonce += 1;
        let hash_b = tx.signing_hash().unwrap();
        assert_ne!(hash_a, hash_b);
    }
}
