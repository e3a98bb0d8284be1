//! Run fingerprints — content-addressed identity for an evaluation.
//!
//! Two evaluations with the same strategy, parameters, and engine
//! configuration hash to the same id, which makes ranked tables joinable
//! across sweeps and runs de-duplicatable.

use tradelab_core::engine::EngineConfig;

use crate::params::ParamSet;

/// Deterministic hex id over (strategy key, params, engine config).
///
/// Parameter sets iterate in key order (BTreeMap), so serialization — and
/// therefore the hash — is stable.
pub fn run_id(strategy_key: &str, params: &ParamSet, config: &EngineConfig) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(strategy_key.as_bytes());
    hasher.update(b"\0");
    // Serialization of these types cannot fail; fall back to an empty slug
    // rather than poisoning a sweep over a fingerprint.
    if let Ok(params_json) = serde_json::to_vec(params) {
        hasher.update(&params_json);
    }
    hasher.update(b"\0");
    if let Ok(config_json) = serde_json::to_vec(config) {
        hasher.update(&config_json);
    }
    hasher.finalize().to_hex().to_string()
}
