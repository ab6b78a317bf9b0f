// Copyright (c) 2022 Octavian Oncescu
// Copyright (c) 2022-2023 The Purplecoin Core developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

use std::borrow::Cow;
use std::fmt;
use std::hash::Hash as HashTrait;
use std::str::FromStr;

pub const HASH256_BYTES: usize = 32;

#[derive(PartialEq, Eq, Clone, HashTrait, PartialOrd, Ord, Default, Copy)]
pub struct Hash256(pub [u8; HASH256_BYTES]);

impl Hash256 {
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[must_use]
    pub fn zero() -> Self {
        Self([0; HASH256_BYTES])
    }

    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(hex_str: &str) -> Result<Self, &'static str> {
        let bytes = hex::decode(hex_str).map_err(|_| "invalid hex string")?;

        if bytes.len() != HASH256_BYTES {
            return Err("invalid hash length");
        }

        let mut out = Self::zero();
        out.0.copy_from_slice(&bytes);
        Ok(out)
    }
}

impl FromStr for Hash256 {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl AsRef<[u8]> for Hash256 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Hash256").field(&self.to_hex()).finish()
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Opaque output script bytes.
#[derive(PartialEq, Eq, Clone, HashTrait, Default)]
pub struct Script(pub Vec<u8>);

impl Script {
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    pub fn from_hex(hex_str: &str) -> Result<Self, &'static str> {
        hex::decode(hex_str)
            .map(Self)
            .map_err(|_| "invalid hex string")
    }
}

impl From<Vec<u8>> for Script {
    fn from(v: Vec<u8>) -> Self {
        Self(v)
    }
}

impl From<&[u8]> for Script {
    fn from(v: &[u8]) -> Self {
        Self(v.to_vec())
    }
}

impl fmt::Debug for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Script").field(&self.to_hex()).finish()
    }
}

/// Anything that can name a transaction in the infraction index.
///
/// Records are keyed by the textual transaction id found in the record file,
/// binary ids are looked up by their lowercase hex form.
pub trait TxIdRef {
    fn tx_id(&self) -> Cow<'_, str>;
}

impl TxIdRef for str {
    fn tx_id(&self) -> Cow<'_, str> {
        Cow::Borrowed(self)
    }
}

impl TxIdRef for String {
    fn tx_id(&self) -> Cow<'_, str> {
        Cow::Borrowed(self.as_str())
    }
}

impl TxIdRef for Hash256 {
    fn tx_id(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_hex())
    }
}

impl<T: TxIdRef + ?Sized> TxIdRef for &T {
    fn tx_id(&self) -> Cow<'_, str> {
        (**self).tx_id()
    }
}
