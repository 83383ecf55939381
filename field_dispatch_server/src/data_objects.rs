use serde::{Deserialize, Serialize};

/// Optional body for dispatch requests. Providers listed in `exclude` are never considered for
/// the assignment, typically because they have already rejected the job.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DispatchParams {
    #[serde(default)]
    pub exclude: Vec<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettleParams {
    pub payout_ids: Vec<i64>,
    pub requested_by: String,
}
