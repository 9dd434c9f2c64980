use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A POSIX id: the store serial plus the configured offset.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct NumericIdResponse {
    #[schema(example = "physics")]
    pub name: String,
    #[schema(example = 10001)]
    pub id: i64,
}
