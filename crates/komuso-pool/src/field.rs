//! field codec for the bn254 scalar field
//!
//! the relayer speaks decimal field-element strings, the circuit wants
//! little-endian limbs, and the wire format wants big-endian 32-byte words.
//! everything converts through here.

use ark_bn254::Fr;
use ark_ff::{BigInteger, PrimeField};
use num_bigint::BigUint;

use crate::error::{PoolError, Result};

/// bn254 scalar modulus as a big integer
pub fn field_modulus() -> BigUint {
    BigUint::from_bytes_be(&Fr::MODULUS.to_bytes_be())
}

/// big-endian 32-byte encoding of a field element
pub fn fr_to_be_bytes(v: &Fr) -> [u8; 32] {
    let bytes = v.into_bigint().to_bytes_be();
    let mut out = [0u8; 32];
    out[32 - bytes.len()..].copy_from_slice(&bytes);
    out
}

/// little-endian 32-byte encoding of a field element
pub fn fr_to_le_bytes(v: &Fr) -> [u8; 32] {
    let mut out = fr_to_be_bytes(v);
    out.reverse();
    out
}

/// interpret big-endian bytes as an integer, reduced into the field
pub fn fr_from_be_mod_order(bytes: &[u8]) -> Fr {
    Fr::from_be_bytes_mod_order(bytes)
}

/// decimal string of a field element (relayer wire representation)
pub fn fr_to_decimal(v: &Fr) -> String {
    BigUint::from_bytes_be(&fr_to_be_bytes(v)).to_str_radix(10)
}

/// parse a decimal field-element string; values >= the modulus are rejected
pub fn fr_from_decimal(s: &str) -> Result<Fr> {
    let value = BigUint::parse_bytes(s.as_bytes(), 10)
        .ok_or_else(|| PoolError::InvalidFieldElement(s.to_string()))?;
    if value >= field_modulus() {
        return Err(PoolError::InvalidFieldElement(format!(
            "{} exceeds the field modulus",
            s
        )));
    }
    Ok(fr_from_be_mod_order(&value.to_bytes_be()))
}

/// parse a hex field-element string, with or without 0x prefix
pub fn fr_from_hex(s: &str) -> Result<Fr> {
    let stripped = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(stripped)
        .map_err(|_| PoolError::InvalidFieldElement(s.to_string()))?;
    if bytes.len() > 32 {
        return Err(PoolError::InvalidFieldElement(s.to_string()));
    }
    Ok(fr_from_be_mod_order(&bytes))
}

/// signed ext-amount as 8 little-endian bytes
///
/// negative values map through two's complement to unsigned 64-bit,
/// i.e. `-x` serializes as `2^64 - x`
pub fn ext_amount_bytes(v: i64) -> [u8; 8] {
    (v as u64).to_le_bytes()
}

/// reduce a 32-byte big-endian integer modulo the field
pub fn reduce_be_mod_field(bytes: &[u8; 32]) -> BigUint {
    BigUint::from_bytes_be(bytes) % field_modulus()
}
