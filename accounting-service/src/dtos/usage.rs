use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// One usage record as submitted. Resource and user are addressed by name.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct UsageRecordRequest {
    #[validate(length(min = 1, message = "Resource is required"))]
    #[schema(example = "batch-scheduler")]
    pub resource: String,

    #[validate(length(min = 1, message = "User is required"))]
    #[schema(example = "jane.doe@example.org")]
    pub user: String,

    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,

    #[serde(default)]
    #[schema(value_type = Object)]
    pub metrics: BTreeMap<String, f64>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UsageBatchRequest {
    #[validate(length(min = 1, max = 10000, message = "Batch must hold 1-10000 records"))]
    #[validate(nested)]
    pub records: Vec<UsageRecordRequest>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UsageBatchResponse {
    pub inserted: usize,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UsageQuery {
    /// Resource name.
    pub resource: String,
    /// `dom_name` of the user; defaults to the caller for non-admins.
    pub user: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(resource: &str) -> UsageRecordRequest {
        UsageRecordRequest {
            resource: resource.to_string(),
            user: "jane.doe@example.org".to_string(),
            start: None,
            end: None,
            metrics: BTreeMap::new(),
        }
    }

    #[test]
    fn batches_validate_their_size_and_records() {
        let empty = UsageBatchRequest { records: vec![] };
        assert!(empty.validate().is_err());

        let nameless = UsageBatchRequest {
            records: vec![record("")],
        };
        assert!(nameless.validate().is_err());

        let ok = UsageBatchRequest {
            records: vec![record("slurm")],
        };
        assert!(ok.validate().is_ok());

        // length rules serialize the value they reject
        let echoed = serde_json::to_value(&ok.records[0]).unwrap();
        assert_eq!(echoed["resource"], "slurm");
    }
}
