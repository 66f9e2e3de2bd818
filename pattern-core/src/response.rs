//! JSON answer to a pattern request.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ErrorCategory, PatternError, Result};
use crate::mesh::MeshSource;
use crate::pipeline::{PatternRequest, generate_pattern};
use crate::store::{PatternStore, PatternToken};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PatternResponse {
    Inline { svg: String },
    Stored { token: PatternToken },
    Failed { error: String, category: ErrorCategory },
}

impl PatternResponse {
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }
}

impl From<PatternError> for PatternResponse {
    fn from(e: PatternError) -> Self {
        Self::Failed {
            category: e.category(),
            error: e.to_string(),
        }
    }
}

fn produce(
    request: &PatternRequest,
    source: &dyn MeshSource,
    store: Option<&PatternStore>,
) -> Result<PatternResponse> {
    let svg = generate_pattern(request, source)?.to_svg();
    if request.inline.unwrap_or(true) {
        return Ok(PatternResponse::Inline { svg });
    }
    let store = store.ok_or_else(|| {
        PatternError::InvalidRequest("stored output requested but no store is configured".into())
    })?;
    Ok(PatternResponse::Stored {
        token: store.persist(&svg)?,
    })
}

/// Run a request end to end. Never fails: errors become `Failed`.
pub fn respond(
    request: &PatternRequest,
    source: &dyn MeshSource,
    store: Option<&PatternStore>,
) -> PatternResponse {
    produce(request, source, store).unwrap_or_else(|e| {
        warn!(category = ?e.category(), "request failed: {e}");
        e.into()
    })
}
