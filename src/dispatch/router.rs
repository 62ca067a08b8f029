//! 路由：意图 → 应答器，纯函数

use serde::Serialize;

use crate::dispatch::Intent;

/// 应答器标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponderId {
    Therapist,
    Logical,
    DataQuery,
}

impl std::fmt::Display for ResponderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ResponderId::Therapist => "therapist",
            ResponderId::Logical => "logical",
            ResponderId::DataQuery => "data_query",
        })
    }
}

/// emotional → therapist，data_query → data_query，其余（含缺失）→ logical
pub fn route(intent: Option<Intent>) -> ResponderId {
    match intent {
        Some(Intent::Emotional) => ResponderId::Therapist,
        Some(Intent::DataQuery) => ResponderId::DataQuery,
        _ => ResponderId::Logical,
    }
}
