//! Serde adapters storing field elements and curve points in their
//! canonical compressed byte form.

use bls12_381::{G1Affine, G2Affine, Scalar};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub(crate) fn scalar_from_slice(bytes: &[u8]) -> Option<Scalar> {
    let arr: [u8; 32] = bytes.try_into().ok()?;
    Option::from(Scalar::from_bytes(&arr))
}

pub(crate) fn g1_from_slice(bytes: &[u8]) -> Option<G1Affine> {
    let arr: [u8; 48] = bytes.try_into().ok()?;
    Option::from(G1Affine::from_compressed(&arr))
}

pub(crate) fn g2_from_slice(bytes: &[u8]) -> Option<G2Affine> {
    let arr: [u8; 96] = bytes.try_into().ok()?;
    Option::from(G2Affine::from_compressed(&arr))
}

pub mod scalar {
    use super::*;

    pub fn serialize<S: Serializer>(value: &Scalar, s: S) -> Result<S::Ok, S::Error> {
        value.to_bytes().to_vec().serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Scalar, D::Error> {
        let bytes = Vec::<u8>::deserialize(d)?;
        scalar_from_slice(&bytes).ok_or_else(|| D::Error::custom("invalid scalar"))
    }
}

pub mod scalar_vec {
    use super::*;

    pub fn serialize<S: Serializer>(values: &[Scalar], s: S) -> Result<S::Ok, S::Error> {
        let raw: Vec<Vec<u8>> = values.iter().map(|v| v.to_bytes().to_vec()).collect();
        raw.serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Scalar>, D::Error> {
        Vec::<Vec<u8>>::deserialize(d)?
            .iter()
            .map(|b| scalar_from_slice(b).ok_or_else(|| D::Error::custom("invalid scalar")))
            .collect()
    }
}

pub mod scalar_map {
    use std::collections::BTreeMap;

    use super::*;

    pub fn serialize<S: Serializer>(values: &BTreeMap<u64, Scalar>, s: S) -> Result<S::Ok, S::Error> {
        let raw: BTreeMap<u64, Vec<u8>> = values
            .iter()
            .map(|(k, v)| (*k, v.to_bytes().to_vec()))
            .collect();
        raw.serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<BTreeMap<u64, Scalar>, D::Error> {
        BTreeMap::<u64, Vec<u8>>::deserialize(d)?
            .into_iter()
            .map(|(k, b)| {
                scalar_from_slice(&b)
                    .map(|v| (k, v))
                    .ok_or_else(|| D::Error::custom("invalid scalar"))
            })
            .collect()
    }
}

pub mod g1 {
    use super::*;

    pub fn serialize<S: Serializer>(value: &G1Affine, s: S) -> Result<S::Ok, S::Error> {
        value.to_compressed().to_vec().serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<G1Affine, D::Error> {
        let bytes = Vec::<u8>::deserialize(d)?;
        g1_from_slice(&bytes).ok_or_else(|| D::Error::custom("invalid G1 point"))
    }
}

pub mod g2 {
    use super::*;

    pub fn serialize<S: Serializer>(value: &G2Affine, s: S) -> Result<S::Ok, S::Error> {
        value.to_compressed().to_vec().serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<G2Affine, D::Error> {
        let bytes = Vec::<u8>::deserialize(d)?;
        g2_from_slice(&bytes).ok_or_else(|| D::Error::custom("invalid G2 point"))
    }
}

pub mod g2_vec {
    use super::*;

    pub fn serialize<S: Serializer>(values: &[G2Affine], s: S) -> Result<S::Ok, S::Error> {
        let raw: Vec<Vec<u8>> = values.iter().map(|v| v.to_compressed().to_vec()).collect();
        raw.serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<G2Affine>, D::Error> {
        Vec::<Vec<u8>>::deserialize(d)?
            .iter()
            .map(|b| g2_from_slice(b).ok_or_else(|| D::Error::custom("invalid G2 point")))
            .collect()
    }
}
