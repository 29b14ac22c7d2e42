//! Deterministic job identifiers.
//!
//! The identifier is the MD5 digest of the ordered criteria, concatenated without a
//! separator. `None` criteria are skipped, empty ones contribute nothing but are still
//! accepted. Inputs are never trimmed or normalized here.

use md5::{Digest, Md5};

use super::models::ArtifactType;

/// Hex-encoded MD5 of the concatenated non-null criteria.
pub fn generate_identifier(criteria: &[Option<&str>]) -> String {
    let mut hasher = Md5::new();
    for criterion in criteria.iter().flatten() {
        hasher.update(criterion.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

/// Identifier of the job producing `artifact_type` for `(source_id, sub_id)`.
pub fn download_identifier(artifact_type: ArtifactType, source_id: &str, sub_id: &str) -> String {
    generate_identifier(&[
        Some(artifact_type.as_str()),
        Some(source_id),
        Some(sub_id),
    ])
}
