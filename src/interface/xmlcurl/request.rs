//! Softswitch request decoding
//!
//! Requests arrive as `application/x-www-form-urlencoded` POSTs with
//! section-specific field names. Missing fields decode to empty strings;
//! validation decides what is required.

use crate::domain::shared::error::DomainError;
use crate::domain::shared::result::Result;
use serde::Deserialize;

fn strip_port(domain: &str) -> &str {
    match domain.find(':') {
        Some(idx) => &domain[..idx],
        None => domain,
    }
}

/// A directory (user/credential) lookup.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DirectoryRequest {
    pub section: String,
    pub tag_name: String,
    pub key_name: String,
    pub key_value: String,
    pub user: String,
    pub domain: String,
    pub action: String,
    pub sip_auth: String,
    pub purpose: String,
}

impl DirectoryRequest {
    /// Strip any `:port` suffix off the domain.
    pub fn normalize(&mut self) {
        self.domain = strip_port(&self.domain).to_string();
    }

    pub fn validate(&self) -> Result<()> {
        if self.section != "directory" {
            return Err(DomainError::Validation(format!(
                "invalid section: {}",
                self.section
            )));
        }
        if self.user.is_empty() {
            return Err(DomainError::Validation("user is required".to_string()));
        }
        if self.domain.is_empty() {
            return Err(DomainError::Validation("domain is required".to_string()));
        }
        Ok(())
    }
}

/// A dialplan (call routing) lookup.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DialplanRequest {
    pub section: String,
    #[serde(rename = "Caller-Context")]
    pub context: String,
    #[serde(rename = "Caller-Caller-ID-Number")]
    pub caller_id_number: String,
    #[serde(rename = "Caller-Caller-ID-Name")]
    pub caller_id_name: String,
    #[serde(rename = "Caller-Destination-Number")]
    pub destination_number: String,
    #[serde(rename = "variable_domain_name")]
    pub domain: String,
    #[serde(rename = "Hunt-Destination-Domain")]
    pub hunt_domain: String,
    #[serde(rename = "Caller-Network-Addr")]
    pub network_addr: String,
    #[serde(rename = "Caller-Channel-Name")]
    pub channel_name: String,
    #[serde(rename = "Caller-Unique-ID")]
    pub uuid: String,
}

impl DialplanRequest {
    /// Fall back to the hunt domain, strip `:port`, default the context.
    pub fn normalize(&mut self) {
        if self.domain.is_empty() {
            self.domain = self.hunt_domain.clone();
        }
        self.domain = strip_port(&self.domain).to_string();
        if self.context.is_empty() {
            self.context = "default".to_string();
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.section != "dialplan" {
            return Err(DomainError::Validation(format!(
                "invalid section: {}",
                self.section
            )));
        }
        if self.destination_number.is_empty() {
            return Err(DomainError::Validation(
                "destination number is required".to_string(),
            ));
        }
        Ok(())
    }
}

/// A module-configuration lookup.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConfigurationRequest {
    pub section: String,
    pub key_name: String,
    pub key_value: String,
}

impl ConfigurationRequest {
    pub fn validate(&self) -> Result<()> {
        if self.section != "configuration" {
            return Err(DomainError::Validation(format!(
                "invalid section: {}",
                self.section
            )));
        }
        if self.key_value.is_empty() {
            return Err(DomainError::Validation("key value is required".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_normalize_strips_port() {
        let mut req = DirectoryRequest {
            section: "directory".to_string(),
            user: "1001".to_string(),
            domain: "example.com:5060".to_string(),
            ..Default::default()
        };
        req.normalize();
        assert_eq!(req.domain, "example.com");
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_directory_validation() {
        let mut req = DirectoryRequest {
            section: "dialplan".to_string(),
            user: "1001".to_string(),
            domain: "pbx.local".to_string(),
            ..Default::default()
        };
        assert!(req.validate().is_err());

        req.section = "directory".to_string();
        req.user.clear();
        assert!(req.validate().is_err());

        req.user = "1001".to_string();
        req.domain.clear();
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_dialplan_normalize_defaults() {
        let mut req = DialplanRequest {
            section: "dialplan".to_string(),
            destination_number: "8000".to_string(),
            hunt_domain: "pbx.local:5080".to_string(),
            ..Default::default()
        };
        req.normalize();
        assert_eq!(req.domain, "pbx.local");
        assert_eq!(req.context, "default");
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_dialplan_requires_destination() {
        let req = DialplanRequest {
            section: "dialplan".to_string(),
            ..Default::default()
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_configuration_requires_key_value() {
        let req = ConfigurationRequest {
            section: "configuration".to_string(),
            key_name: "name".to_string(),
            key_value: String::new(),
        };
        assert!(req.validate().is_err());

        let req = ConfigurationRequest {
            section: "configuration".to_string(),
            key_name: "name".to_string(),
            key_value: "callcenter.conf".to_string(),
        };
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_form_decoding_with_renamed_fields() {
        let body = "section=dialplan&Caller-Context=public&Caller-Caller-ID-Number=1001\
                    &Caller-Destination-Number=8000&variable_domain_name=pbx.local:5060";
        let mut req: DialplanRequest = serde_urlencoded::from_str(body).unwrap();
        req.normalize();
        assert_eq!(req.context, "public");
        assert_eq!(req.caller_id_number, "1001");
        assert_eq!(req.destination_number, "8000");
        assert_eq!(req.domain, "pbx.local");
    }
}
