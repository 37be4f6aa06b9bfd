//! The static `/v1/models` listing.
//!
//! Two descriptors are synthesized per request: the alias that OpenAI-only
//! clients ask for and the DeepSeek chat model every request is served by.

use crate::config::ProxyConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub owned_by: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelList {
    pub object: String,
    pub data: Vec<ModelDescriptor>,
}

/// Build the listing with `created` set to `now` (Unix seconds).
#[must_use]
pub fn list_models(config: &ProxyConfig, now: i64) -> ModelList {
    let descriptor = |id: &str| ModelDescriptor {
        id: id.to_string(),
        object: "model".to_string(),
        created: now,
        owned_by: config.models.owned_by.clone(),
    };

    ModelList {
        object: "list".to_string(),
        data: vec![
            descriptor(&config.models.alias),
            descriptor(&config.upstream.chat_model),
        ],
    }
}
