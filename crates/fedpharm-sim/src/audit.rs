//! Audit records for confirmed contributions.
//!
//! The transaction id stands in for a ledger reference; it only has to look
//! collision-resistant, so it is derived from a SHA-256 over the
//! contribution plus a random nonce.

use chrono::{DateTime, Utc};
use fedpharm_common::{ModelArtifact, ParticipantId};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::rng::RandomSource;

const BLOCK_BASE: usize = 200_000;
const BLOCK_SPAN: usize = 100_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContributionAudit {
    pub id: Uuid,
    pub participant: ParticipantId,
    pub artifact_name: String,
    pub version: String,
    pub artifact_digest: String,
    pub tx_id: String,
    pub recorded_at: DateTime<Utc>,
}

impl ContributionAudit {
    pub fn new(
        participant: ParticipantId,
        artifact: &ModelArtifact,
        version: &str,
        rng: &mut dyn RandomSource,
    ) -> Self {
        let nonce = rng.next_unit().to_bits();
        let mut hasher = Sha256::new();
        hasher.update(participant.as_str().as_bytes());
        hasher.update(artifact.name.as_bytes());
        hasher.update(artifact.size_bytes.to_le_bytes());
        hasher.update(version.as_bytes());
        hasher.update(nonce.to_le_bytes());
        let artifact_digest = format!("{:x}", hasher.finalize());

        let block = BLOCK_BASE + rng.index(BLOCK_SPAN);
        let tx_id = format!("0x{}...#{}", &artifact_digest[..12], block);

        Self {
            id: Uuid::new_v4(),
            participant,
            artifact_name: artifact.name.clone(),
            version: version.to_string(),
            artifact_digest,
            tx_id,
            recorded_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::{SequenceSource, StdRandom};

    #[test]
    fn test_tx_id_shape() {
        let mut rng = SequenceSource::constant(0.25);
        let a = ContributionAudit::new(
            ParticipantId::Lab,
            &ModelArtifact::new("Client2.bin", 1024),
            "v1.0.0",
            &mut rng,
        );
        assert!(a.tx_id.starts_with("0x"));
        let (hex, block) = a.tx_id[2..].split_once("...#").unwrap();
        assert_eq!(hex.len(), 12);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(block, "225000");
        assert_eq!(a.artifact_digest.len(), 64);
    }

    #[test]
    fn test_distinct_nonces_give_distinct_ids() {
        let mut rng = StdRandom::seeded(11);
        let artifact = ModelArtifact::new("Client1.bin", 10);
        let a = ContributionAudit::new(ParticipantId::Hospital, &artifact, "v1.0.0", &mut rng);
        let b = ContributionAudit::new(ParticipantId::Hospital, &artifact, "v1.0.0", &mut rng);
        assert_ne!(a.tx_id, b.tx_id);
    }
}
