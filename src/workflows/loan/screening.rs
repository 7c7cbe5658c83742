use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::domain::ApplicantId;

const MANUAL_REVIEW_STATUS: &str = "potential match found - manual review required";
const PARTIAL_MATCH_STATUS: &str = "potential partial match - manual review required";
const CLEAR_STATUS: &str = "sanctions screening passed";

/// Screening policy knobs.
///
/// `simulation_match_probability` exists to exercise the halt path when no
/// real sanctions feed is wired in; set it to zero when one is.
#[derive(Debug, Clone, PartialEq)]
pub struct ScreeningPolicy {
    pub denylist: Vec<String>,
    pub cache_ttl: Duration,
    pub simulation_match_probability: f64,
}

impl Default for ScreeningPolicy {
    fn default() -> Self {
        Self {
            denylist: vec![
                "Stephanie Martin".to_string(),
                "Sanctioned Person".to_string(),
            ],
            cache_ttl: Duration::from_secs(3600),
            simulation_match_probability: 0.05,
        }
    }
}

/// Verdict for one screened name. `clear == false` permanently halts the
/// applicant's workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreeningVerdict {
    pub clear: bool,
    pub status: String,
}

impl ScreeningVerdict {
    fn manual_review() -> Self {
        Self {
            clear: false,
            status: MANUAL_REVIEW_STATUS.to_string(),
        }
    }
}

struct CachedVerdict {
    verdict: ScreeningVerdict,
    refreshed_at: Instant,
}

/// Sanctions screener with a TTL-bound verdict cache keyed by normalized name.
///
/// Failure mode is closed: if the screener cannot complete a check it reports
/// "not clear" rather than passing the applicant through.
pub struct SanctionsScreener {
    denylist: Vec<String>,
    cache_ttl: Duration,
    simulation_match_probability: f64,
    cache: Mutex<HashMap<String, CachedVerdict>>,
}

/// Trim, case-fold, and collapse internal whitespace so spelling variants
/// share one cache entry and one verdict.
pub fn normalize_name(raw: &str) -> String {
    raw.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

impl SanctionsScreener {
    pub fn new(policy: ScreeningPolicy) -> Self {
        Self {
            denylist: policy
                .denylist
                .iter()
                .map(|entry| normalize_name(entry))
                .collect(),
            cache_ttl: policy.cache_ttl,
            simulation_match_probability: policy.simulation_match_probability,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn screen(&self, name: &str, requester_id: &ApplicantId) -> ScreeningVerdict {
        self.screen_at(name, requester_id, Instant::now())
    }

    fn screen_at(&self, name: &str, requester_id: &ApplicantId, now: Instant) -> ScreeningVerdict {
        let key = normalize_name(name);

        let mut cache = match self.cache.lock() {
            Ok(guard) => guard,
            Err(_) => {
                // Cache corruption counts as an incomplete check.
                warn!(applicant = %requester_id, "screening cache unavailable, failing closed");
                return ScreeningVerdict::manual_review();
            }
        };

        if let Some(hit) = cache.get(&key) {
            if now.duration_since(hit.refreshed_at) < self.cache_ttl {
                return hit.verdict.clone();
            }
        }

        let verdict = self.evaluate(&key);
        info!(
            applicant = %requester_id,
            clear = verdict.clear,
            status = %verdict.status,
            "sanctions screening completed"
        );

        cache.insert(
            key,
            CachedVerdict {
                verdict: verdict.clone(),
                refreshed_at: now,
            },
        );

        verdict
    }

    fn evaluate(&self, normalized: &str) -> ScreeningVerdict {
        if let Some(entry) = self.denylist.iter().find(|entry| entry.as_str() == normalized) {
            return ScreeningVerdict {
                clear: false,
                status: format!("name matches sanctions entry '{entry}'"),
            };
        }

        let tokens: HashSet<&str> = normalized.split(' ').collect();
        for entry in &self.denylist {
            let shared = entry
                .split(' ')
                .filter(|token| tokens.contains(token))
                .count();
            if shared >= 2 {
                return ScreeningVerdict {
                    clear: false,
                    status: PARTIAL_MATCH_STATUS.to_string(),
                };
            }
        }

        if self.simulation_match_probability > 0.0
            && rand::thread_rng().gen::<f64>() < self.simulation_match_probability
        {
            return ScreeningVerdict::manual_review();
        }

        ScreeningVerdict {
            clear: true,
            status: CLEAR_STATUS.to_string(),
        }
    }

    #[cfg(test)]
    fn cached_verdict(&self, name: &str, now: Instant) -> Option<ScreeningVerdict> {
        let cache = self.cache.lock().ok()?;
        cache.get(&normalize_name(name)).and_then(|hit| {
            (now.duration_since(hit.refreshed_at) < self.cache_ttl).then(|| hit.verdict.clone())
        })
    }
}
