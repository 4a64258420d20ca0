//! Client-side node identifiers.

use rand::TryRngCore;
use rand::rngs::OsRng;

use crate::error::NodeIdError;

/// Generate a new node id: 16 bytes from the OS RNG, hex encoded.
pub fn generate_node_id() -> Result<String, NodeIdError> {
    let mut bytes = [0u8; 16];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| NodeIdError(e.to_string()))?;
    Ok(hex::encode(bytes))
}
