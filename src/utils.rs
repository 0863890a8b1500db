//! Utility functions for identifier generation

use bech32::Bech32m;
use uuid7::uuid7;

// construct a unique id then encode using bech32 with a human-readable prefix
pub fn new_uuid_to_bech32(hrp: &str) -> anyhow::Result<String> {
    let hrp = bech32::Hrp::parse(hrp)?;
    let encode = bech32::encode::<Bech32m>(hrp, uuid7().as_bytes())?;
    Ok(encode)
}

/// Fresh job identifier (`job_...`).
pub fn new_job_id() -> anyhow::Result<String> {
    new_uuid_to_bech32("job_")
}

/// Fresh blob object identifier (`blob_...`).
pub fn new_object_id() -> anyhow::Result<String> {
    new_uuid_to_bech32("blob_")
}
