//! Applications and the user-facing document shape.
//!
//! Users author applications with compact `component[service]` references;
//! the API stores them structurally. Both shapes live here with lossless
//! conversion between them.

use crate::error::{Result, StormError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A `component[service]` reference
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ServiceRef {
    pub component: String,
    pub service: String,
}

impl ServiceRef {
    pub fn new(component: &str, service: &str) -> Self {
        Self {
            component: component.to_string(),
            service: service.to_string(),
        }
    }

    /// Parse the `component[service]` form
    pub fn parse(text: &str) -> Result<Self> {
        let (component, rest) = text
            .split_once('[')
            .ok_or_else(|| StormError::ServiceRef(text.to_string()))?;
        let service = rest
            .strip_suffix(']')
            .ok_or_else(|| StormError::ServiceRef(text.to_string()))?;
        if component.is_empty() || service.is_empty() || service.contains('[') {
            return Err(StormError::ServiceRef(text.to_string()));
        }
        Ok(Self::new(component, service))
    }
}

impl fmt::Display for ServiceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.component, self.service)
    }
}

/// A link from a source component to a destination service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub src: String,
    pub dest: ServiceRef,
}

/// A named logical system, as stored by the API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub identifier: String,

    #[serde(default)]
    pub components: Vec<String>,

    #[serde(default)]
    pub links: Vec<Link>,

    #[serde(default)]
    pub expose: Vec<ServiceRef>,
}

/// The document shape users author
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserApplication {
    pub identifier: String,

    #[serde(default)]
    pub components: Vec<String>,

    /// `src -> "dest[service]"`
    #[serde(default)]
    pub links: BTreeMap<String, String>,

    /// `["component[service]", ...]`
    #[serde(default)]
    pub expose: Vec<String>,
}

impl UserApplication {
    pub fn to_api_model(&self) -> Result<Application> {
        let links = self
            .links
            .iter()
            .map(|(src, dest)| {
                Ok(Link {
                    src: src.clone(),
                    dest: ServiceRef::parse(dest)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let expose = self
            .expose
            .iter()
            .map(|entry| ServiceRef::parse(entry))
            .collect::<Result<Vec<_>>>()?;
        Ok(Application {
            identifier: self.identifier.clone(),
            components: self.components.clone(),
            links,
            expose,
        })
    }
}

impl Application {
    pub fn to_user_model(&self) -> UserApplication {
        UserApplication {
            identifier: self.identifier.clone(),
            components: self.components.clone(),
            links: self
                .links
                .iter()
                .map(|link| (link.src.clone(), link.dest.to_string()))
                .collect(),
            expose: self.expose.iter().map(ServiceRef::to_string).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_ref_parse() {
        let service_ref = ServiceRef::parse("frontend[http]").unwrap();
        assert_eq!(service_ref.component, "frontend");
        assert_eq!(service_ref.service, "http");
        assert_eq!(service_ref.to_string(), "frontend[http]");
    }

    #[test]
    fn test_service_ref_rejects_malformed() {
        assert!(ServiceRef::parse("frontend").is_err());
        assert!(ServiceRef::parse("frontend[]").is_err());
        assert!(ServiceRef::parse("[http]").is_err());
        assert!(ServiceRef::parse("a[b[c]]").is_err());
    }

    #[test]
    fn test_user_model_round_trip() {
        let user = UserApplication {
            identifier: "a1".to_string(),
            components: vec!["frontend".to_string(), "backend".to_string()],
            links: BTreeMap::from([("frontend".to_string(), "backend[db]".to_string())]),
            expose: vec!["frontend[http]".to_string()],
        };
        let api = user.to_api_model().unwrap();
        assert_eq!(api.expose, vec![ServiceRef::new("frontend", "http")]);
        assert_eq!(api.to_user_model(), user);
    }
}
