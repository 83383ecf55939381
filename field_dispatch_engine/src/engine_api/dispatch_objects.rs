use serde::{Deserialize, Serialize};

/// The result of a dispatch attempt. "No eligible provider" is a normal outcome, not an error, so
/// failures carry `success: false` and a reason rather than bubbling up as an `Err`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchOutcome {
    pub success: bool,
    pub provider_id: Option<i64>,
    pub distance_miles: Option<f64>,
    pub expanded_search: bool,
    pub reason: String,
}

impl DispatchOutcome {
    pub fn assigned(provider_id: i64, distance_miles: f64, expanded_search: bool, reason: String) -> Self {
        Self { success: true, provider_id: Some(provider_id), distance_miles: Some(distance_miles), expanded_search, reason }
    }

    pub fn unassigned<S: Into<String>>(expanded_search: bool, reason: S) -> Self {
        Self { success: false, provider_id: None, distance_miles: None, expanded_search, reason: reason.into() }
    }
}

/// Matching radii, in miles. Candidates beyond the default radius are only considered once the
/// default search comes up empty.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DispatchConfig {
    pub default_radius_miles: f64,
    pub expanded_radius_miles: f64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self { default_radius_miles: 10.0, expanded_radius_miles: 25.0 }
    }
}
