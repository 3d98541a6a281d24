//! Extension and SIP domain models

use crate::domain::shared::result::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What a numeric identifier provisions: a SIP user, a call queue entry
/// point, an IVR menu, or a conference room. Only `user` extensions may
/// register and authenticate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtensionType {
    User,
    Queue,
    Ivr,
    Conference,
}

impl ExtensionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtensionType::User => "user",
            ExtensionType::Queue => "queue",
            ExtensionType::Ivr => "ivr",
            ExtensionType::Conference => "conference",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(ExtensionType::User),
            "queue" => Some(ExtensionType::Queue),
            "ivr" => Some(ExtensionType::Ivr),
            "conference" => Some(ExtensionType::Conference),
            _ => None,
        }
    }
}

/// A provisionable SIP endpoint.
///
/// `sip_ha1` / `sip_ha1b` are maintained by a database trigger from the
/// plaintext password; this service only ever reads them. None of the
/// credential fields are serialized in API responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Extension {
    pub id: i64,
    pub domain_id: i64,
    pub extension: String,
    #[serde(rename = "type")]
    pub ext_type: ExtensionType,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing)]
    pub sip_password: String,
    #[serde(skip_serializing)]
    pub sip_ha1: String,
    #[serde(skip_serializing)]
    pub sip_ha1b: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vm_password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vm_email: Option<String>,
    pub active: bool,
    pub max_concurrent: i32,
    pub call_timeout: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    /// Joined from `voip.domains`.
    pub domain: String,
}

impl Extension {
    /// Whether the softswitch may hand this extension credentials or route
    /// a call to it directly.
    pub fn is_routable_user(&self) -> bool {
        self.active && self.ext_type == ExtensionType::User
    }
}

/// A SIP realm extensions belong to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SipDomain {
    pub id: i64,
    pub domain: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Data for creating an extension. HA1 digests are derived by the database.
#[derive(Debug, Clone)]
pub struct NewExtension {
    pub domain_id: i64,
    pub extension: String,
    pub ext_type: ExtensionType,
    pub display_name: String,
    pub email: Option<String>,
    pub sip_password: String,
    pub vm_password: Option<String>,
    pub vm_email: Option<String>,
    pub active: bool,
    pub max_concurrent: i32,
    pub call_timeout: i32,
}

/// Partial update; `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct ExtensionUpdate {
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub vm_password: Option<String>,
    pub vm_email: Option<String>,
    pub active: Option<bool>,
    pub max_concurrent: Option<i32>,
    pub call_timeout: Option<i32>,
}

/// List filters for the admin API.
#[derive(Debug, Clone, Default)]
pub struct ExtensionFilter {
    pub domain_id: Option<i64>,
    pub ext_type: Option<ExtensionType>,
    pub active: Option<bool>,
}

/// Extension repository contract
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ExtensionRepository: Send + Sync {
    /// Look up an extension by number and domain name.
    async fn get(&self, extension: &str, domain: &str) -> Result<Option<Extension>>;

    /// Look up an extension by primary key.
    async fn get_by_id(&self, id: i64) -> Result<Option<Extension>>;

    /// List extensions; returns the page plus the unpaginated total.
    async fn list(
        &self,
        filter: ExtensionFilter,
        page: i64,
        per_page: i64,
    ) -> Result<(Vec<Extension>, i64)>;

    async fn create(&self, data: NewExtension) -> Result<Extension>;

    async fn update(&self, id: i64, data: ExtensionUpdate) -> Result<Extension>;

    /// Replace the SIP password; the digest trigger fires on write.
    async fn update_password(&self, id: i64, password: &str) -> Result<()>;

    /// Soft delete (`active = false`).
    async fn deactivate(&self, id: i64) -> Result<()>;

    async fn get_domain(&self, id: i64) -> Result<Option<SipDomain>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(ext_type: ExtensionType, active: bool) -> Extension {
        let now = Utc::now();
        Extension {
            id: 1,
            domain_id: 1,
            extension: "1001".to_string(),
            ext_type,
            display_name: "Alice".to_string(),
            email: None,
            sip_password: "supersecret1".to_string(),
            sip_ha1: "aaaa".to_string(),
            sip_ha1b: "bbbb".to_string(),
            vm_password: None,
            vm_email: None,
            active,
            max_concurrent: 3,
            call_timeout: 30,
            created_at: now,
            updated_at: now,
            domain: "pbx.local".to_string(),
        }
    }

    #[test]
    fn test_extension_type_roundtrip() {
        for t in [
            ExtensionType::User,
            ExtensionType::Queue,
            ExtensionType::Ivr,
            ExtensionType::Conference,
        ] {
            assert_eq!(ExtensionType::parse(t.as_str()), Some(t));
        }
        assert_eq!(ExtensionType::parse("gateway"), None);
    }

    #[test]
    fn test_only_active_users_are_routable() {
        assert!(sample(ExtensionType::User, true).is_routable_user());
        assert!(!sample(ExtensionType::User, false).is_routable_user());
        assert!(!sample(ExtensionType::Queue, true).is_routable_user());
        assert!(!sample(ExtensionType::Ivr, true).is_routable_user());
    }

    #[test]
    fn test_credentials_never_serialized() {
        let json = serde_json::to_string(&sample(ExtensionType::User, true)).unwrap();
        assert!(!json.contains("supersecret1"));
        assert!(!json.contains("sip_ha1"));
        assert!(!json.contains("sip_password"));
    }
}
