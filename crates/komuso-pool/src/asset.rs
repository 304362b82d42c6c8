//! asset tags
//!
//! every note carries one 32-byte asset identifier. the native asset has a
//! fixed literal; fungible tokens use their mint identifier. inside the
//! circuit an asset is the big-endian integer of its bytes reduced into the
//! field.

use ark_bn254::Fr;

use crate::error::{PoolError, Result};
use crate::field;

/// base58 form of the native asset tag
pub const NATIVE_ASSET_B58: &str = "11111111111111111111111111111112";

/// 32-byte asset identifier
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AssetTag([u8; 32]);

impl AssetTag {
    /// the native asset (base58 `11111111111111111111111111111112`)
    pub const NATIVE: AssetTag = AssetTag({
        let mut bytes = [0u8; 32];
        bytes[31] = 1;
        bytes
    });

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// parse a base58 asset identifier (a token mint)
    pub fn from_base58(s: &str) -> Result<Self> {
        let decoded = bs58::decode(s)
            .into_vec()
            .map_err(|_| PoolError::InvalidAssetTag(s.to_string()))?;
        let bytes: [u8; 32] = decoded
            .try_into()
            .map_err(|_| PoolError::InvalidAssetTag(s.to_string()))?;
        Ok(Self(bytes))
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.0
    }

    pub fn to_base58(&self) -> String {
        bs58::encode(&self.0).into_string()
    }

    pub fn is_native(&self) -> bool {
        *self == Self::NATIVE
    }

    /// circuit representation: big-endian integer reduced into the field
    pub fn field_element(&self) -> Fr {
        field::fr_from_be_mod_order(&self.0)
    }

    /// canonical string used inside note plaintexts
    ///
    /// the native asset keeps its base58 literal; every other asset is the
    /// decimal string of its field element
    pub fn canonical_string(&self) -> String {
        if self.is_native() {
            NATIVE_ASSET_B58.to_string()
        } else {
            field::fr_to_decimal(&self.field_element())
        }
    }
}
