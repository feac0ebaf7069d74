use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// A registered satellite agent, keyed globally by the certificate CN in `uid`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Registration {
    #[serde(skip)]
    pub id: Uuid,
    pub uid: String,
    pub display_name: String,
    pub org_id: String,
    pub username: String,
    pub created_at: DateTime<Utc>,
    pub extra: Value,
}

/// Input for a new registration. `id` and `created_at` are assigned by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRegistration {
    pub org_id: String,
    pub username: String,
    pub uid: String,
    pub display_name: String,
    pub extra: Value,
}

impl NewRegistration {
    pub fn into_registration(self, id: Uuid, created_at: DateTime<Utc>) -> Registration {
        Registration {
            id,
            uid: self.uid,
            display_name: self.display_name,
            org_id: self.org_id,
            username: self.username,
            created_at,
            extra: self.extra,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegistrationUpdate {
    pub extra: Value,
}

#[derive(Debug, Deserialize)]
pub struct CreateRegistrationRequest {
    pub uid: Option<String>,
    pub display_name: Option<String>,
    pub extra: Option<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRegistrationRequest {
    #[serde(default)]
    pub extra: Option<Map<String, Value>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegistrationListResponse {
    pub registrations: Vec<Registration>,
    pub meta: ListMeta,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListMeta {
    pub count: i64,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Deserialize, Default)]
pub struct PaginationQuery {
    pub limit: Option<String>,
    pub offset: Option<String>,
}

/// Empty object used when a registration is created without `extra`.
pub fn empty_extra() -> Value {
    Value::Object(Map::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extra_must_be_an_object() {
        let ok: CreateRegistrationRequest =
            serde_json::from_str(r#"{"uid":"a","display_name":"b","extra":{"k":1}}"#).unwrap();
        assert_eq!(ok.extra.unwrap().get("k"), Some(&Value::from(1)));

        assert!(serde_json::from_str::<CreateRegistrationRequest>(
            r#"{"uid":"a","display_name":"b","extra":"just a string"}"#
        )
        .is_err());
        assert!(serde_json::from_str::<UpdateRegistrationRequest>(r#"{"extra":[1,2,3]}"#).is_err());
    }

    #[test]
    fn test_null_extra_is_absent() {
        let request: UpdateRegistrationRequest = serde_json::from_str(r#"{"extra":null}"#).unwrap();
        assert!(request.extra.is_none());
    }
}
