//! Request and response bodies.

use serde::{Deserialize, Serialize};
use shared_types::BlockNumber;

/// One entry of `GET /v1/eons`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EonInfo {
    pub index: u64,
    pub activation_block_number: BlockNumber,
    /// Hex of the eon public key, empty until the DKG succeeded.
    pub eon_key: String,
    pub finished: bool,
    pub successful: bool,
}

/// Body of `POST /v1/decryption-trigger`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerBody {
    pub epoch_id: String,
    pub block_number: BlockNumber,
}
