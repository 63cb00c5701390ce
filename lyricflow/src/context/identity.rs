//! Run identity for tracking pipeline executions.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Identifies a pipeline run with its correlation IDs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunIdentity {
    /// The unique ID for this pipeline run.
    pub run_id: Uuid,

    /// The caller's request ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<Uuid>,

    /// The session the run belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<Uuid>,

    /// The user who started the run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
}

impl Default for RunIdentity {
    fn default() -> Self {
        Self::new()
    }
}

impl RunIdentity {
    /// Creates a new run identity with a generated run ID.
    #[must_use]
    pub fn new() -> Self {
        Self::with_run_id(Uuid::new_v4())
    }

    /// Creates a run identity with a specific run ID.
    #[must_use]
    pub fn with_run_id(run_id: Uuid) -> Self {
        Self {
            run_id,
            request_id: None,
            session_id: None,
            user_id: None,
        }
    }

    /// Sets the request ID.
    #[must_use]
    pub fn with_request_id(mut self, request_id: Uuid) -> Self {
        self.request_id = Some(request_id);
        self
    }

    /// Sets the session ID.
    #[must_use]
    pub fn with_session_id(mut self, session_id: Uuid) -> Self {
        self.session_id = Some(session_id);
        self
    }

    /// Sets the user ID.
    #[must_use]
    pub fn with_user_id(mut self, user_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self
    }

    /// Converts to a dictionary with string values (or null).
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let as_json = |id: Option<Uuid>| {
            id.map_or(serde_json::Value::Null, |id| serde_json::json!(id.to_string()))
        };

        let mut map = HashMap::new();
        map.insert("run_id".to_string(), serde_json::json!(self.run_id.to_string()));
        map.insert("request_id".to_string(), as_json(self.request_id));
        map.insert("session_id".to_string(), as_json(self.session_id));
        map.insert("user_id".to_string(), as_json(self.user_id));
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_generates_distinct_run_ids() {
        assert_ne!(RunIdentity::new().run_id, RunIdentity::new().run_id);
    }

    #[test]
    fn test_to_dict() {
        let session = Uuid::new_v4();
        let identity = RunIdentity::new().with_session_id(session);
        let dict = identity.to_dict();

        assert_eq!(dict["session_id"], serde_json::json!(session.to_string()));
        assert_eq!(dict["user_id"], serde_json::Value::Null);
        assert_eq!(dict["run_id"], serde_json::json!(identity.run_id.to_string()));
    }
}
