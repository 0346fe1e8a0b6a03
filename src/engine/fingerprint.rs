//! Settlement fingerprint: SHA-256 over the canonical settled state.
//!
//! Stored on the quest at settlement; replaying settlement with the same
//! seed must reproduce the hash, which is what audit disputes compare.

use crate::domain::{LeaderboardEntry, PriceSnapshot};
use serde::Serialize;
use sha2::{Digest, Sha256};

#[derive(Serialize)]
struct FingerprintInput<'a> {
    leaderboard: &'a [LeaderboardEntry],
    prices: Vec<(&'a str, Option<String>, Option<String>)>,
}

/// Compute the hex fingerprint of a settled leaderboard plus its price map.
///
/// Snapshots are sorted by token before hashing so row order in the store
/// cannot change the result.
pub fn settlement_fingerprint(
    leaderboard: &[LeaderboardEntry],
    snapshots: &[PriceSnapshot],
) -> String {
    let mut sorted: Vec<&PriceSnapshot> = snapshots.iter().collect();
    sorted.sort_by(|a, b| a.token_id.cmp(&b.token_id));

    let input = FingerprintInput {
        leaderboard,
        prices: sorted
            .iter()
            .map(|s| {
                (
                    s.token_id.as_str(),
                    s.start_price.map(|p| p.to_canonical_string()),
                    s.end_price.map(|p| p.to_canonical_string()),
                )
            })
            .collect(),
    };

    let json = serde_json::to_vec(&input).expect("fingerprint input serializes");
    let mut hasher = Sha256::new();
    hasher.update(&json);
    hex::encode(hasher.finalize())
}
