//! Domain types for provisioning.
//!
//! This module defines:
//! - [`ObjectType`] - The configuration object kinds that can be bulk-created
//! - [`ObjectDefinition`] - One object to create, as an opaque JSON mapping
//! - [`CreateOutcome`] - The terminal result for one definition
//! - [`FailureReason`] - Why a definition could not be created

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Configuration object kinds exposed by the config API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ObjectType {
    Tags,
    UrlCategories,
    UrlAccessProfiles,
    VulnerabilityProtectionProfiles,
    AntiSpywareProfiles,
    WildfireAntiVirusProfiles,
    ProfileGroups,
    Addresses,
    AddressGroups,
    Services,
    ServiceGroups,
    ExternalDynamicLists,
    ApplicationFilters,
    ApplicationGroups,
    SecurityRules,
    NatRules,
}

impl ObjectType {
    /// Every supported object type, in a dependency-friendly creation order.
    pub const ALL: [ObjectType; 16] = [
        ObjectType::Tags,
        ObjectType::UrlCategories,
        ObjectType::UrlAccessProfiles,
        ObjectType::VulnerabilityProtectionProfiles,
        ObjectType::AntiSpywareProfiles,
        ObjectType::WildfireAntiVirusProfiles,
        ObjectType::ProfileGroups,
        ObjectType::Addresses,
        ObjectType::AddressGroups,
        ObjectType::Services,
        ObjectType::ServiceGroups,
        ObjectType::ExternalDynamicLists,
        ObjectType::ApplicationFilters,
        ObjectType::ApplicationGroups,
        ObjectType::SecurityRules,
        ObjectType::NatRules,
    ];

    /// Path segment under the config API root.
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectType::Tags => "tags",
            ObjectType::UrlCategories => "url-categories",
            ObjectType::UrlAccessProfiles => "url-access-profiles",
            ObjectType::VulnerabilityProtectionProfiles => "vulnerability-protection-profiles",
            ObjectType::AntiSpywareProfiles => "anti-spyware-profiles",
            ObjectType::WildfireAntiVirusProfiles => "wildfire-anti-virus-profiles",
            ObjectType::ProfileGroups => "profile-groups",
            ObjectType::Addresses => "addresses",
            ObjectType::AddressGroups => "address-groups",
            ObjectType::Services => "services",
            ObjectType::ServiceGroups => "service-groups",
            ObjectType::ExternalDynamicLists => "external-dynamic-lists",
            ObjectType::ApplicationFilters => "application-filters",
            ObjectType::ApplicationGroups => "application-groups",
            ObjectType::SecurityRules => "security-rules",
            ObjectType::NatRules => "nat-rules",
        }
    }

    /// Whether objects of this type live in a pre/post rulebase.
    pub fn is_rulebase(&self) -> bool {
        matches!(self, ObjectType::SecurityRules | ObjectType::NatRules)
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error returned when parsing an unknown object type.
#[derive(Debug, Error)]
#[error("unknown object type: {0}")]
pub struct UnknownObjectType(pub String);

impl FromStr for ObjectType {
    type Err = UnknownObjectType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ObjectType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownObjectType(s.to_string()))
    }
}

/// Error for definitions that cannot be submitted.
#[derive(Debug, Error)]
pub enum DefinitionError {
    /// The definition is not a JSON object.
    #[error("object definition must be a JSON object, got {kind}")]
    NotAnObject { kind: &'static str },

    /// A definition file did not hold a JSON array.
    #[error("object definitions must be a JSON array, got {kind}")]
    NotAList { kind: &'static str },

    /// The definition has no string `name` field. `index` is set when the
    /// definition came from a list.
    #[error("object definition{} has no string `name` field", at_index(.index))]
    MissingName { index: Option<usize> },
}

fn at_index(index: &Option<usize>) -> String {
    match index {
        Some(index) => format!(" at index {}", index),
        None => String::new(),
    }
}

/// One object to create.
///
/// The payload is sent as-is. The `name` field is required and is used to
/// correlate outcomes.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectDefinition {
    name: String,
    fields: Map<String, Value>,
}

impl ObjectDefinition {
    /// Validate and wrap a JSON object.
    pub fn new(value: Value) -> Result<Self, DefinitionError> {
        Self::from_value(value, None)
    }

    /// Parse a JSON array of definitions, as read from an export file.
    pub fn parse_list(value: Value) -> Result<Vec<Self>, DefinitionError> {
        match value {
            Value::Array(items) => items
                .into_iter()
                .enumerate()
                .map(|(index, item)| Self::from_value(item, Some(index)))
                .collect(),
            other => Err(DefinitionError::NotAList {
                kind: json_kind(&other),
            }),
        }
    }

    fn from_value(value: Value, index: Option<usize>) -> Result<Self, DefinitionError> {
        let fields = match value {
            Value::Object(fields) => fields,
            other => {
                return Err(DefinitionError::NotAnObject {
                    kind: json_kind(&other),
                });
            }
        };

        let name = fields
            .get("name")
            .and_then(Value::as_str)
            .ok_or(DefinitionError::MissingName { index })?
            .to_string();

        Ok(Self { name, fields })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The request payload.
    pub fn to_payload(&self) -> Value {
        Value::Object(self.fields.clone())
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Why a definition could not be created.
#[derive(Debug, Clone, PartialEq)]
pub enum FailureReason {
    /// The API rejected the object with a non-retryable response.
    CreationFailed { status: u16, body: String },

    /// The request never completed and no attempts were left.
    Exception { message: String },

    /// Every attempt ended in a retryable condition.
    RetriesExhausted { attempts: u32, last_error: String },
}

impl FailureReason {
    /// Short, stable description suitable for reports.
    pub fn summary(&self) -> &'static str {
        match self {
            FailureReason::CreationFailed { .. } => "object creation failed",
            FailureReason::Exception { .. } => "exception occurred",
            FailureReason::RetriesExhausted { .. } => "failed after retries",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::CreationFailed { status, body } => {
                write!(f, "{} (HTTP {}): {}", self.summary(), status, body)
            }
            FailureReason::Exception { message } => write!(f, "{}: {}", self.summary(), message),
            FailureReason::RetriesExhausted {
                attempts,
                last_error,
            } => write!(
                f,
                "{} ({} attempts): {}",
                self.summary(),
                attempts,
                last_error
            ),
        }
    }
}

/// Terminal result for one object definition.
#[derive(Debug, Clone, PartialEq)]
pub enum CreateOutcome {
    Created(String),
    AlreadyExists(String),
    Failed { name: String, reason: FailureReason },
}

impl CreateOutcome {
    /// Name of the object this outcome is for.
    pub fn name(&self) -> &str {
        match self {
            CreateOutcome::Created(name) | CreateOutcome::AlreadyExists(name) => name,
            CreateOutcome::Failed { name, .. } => name,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, CreateOutcome::Failed { .. })
    }
}

impl fmt::Display for CreateOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CreateOutcome::Created(name) => write!(f, "created: {}", name),
            CreateOutcome::AlreadyExists(name) => write!(f, "already exists: {}", name),
            CreateOutcome::Failed { name, reason } => write!(f, "failed: {} ({})", name, reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_object_type_round_trips_through_str() {
        for object_type in ObjectType::ALL {
            assert_eq!(object_type.as_str().parse::<ObjectType>().unwrap(), object_type);
        }
        assert!("firewalls".parse::<ObjectType>().is_err());
    }

    #[test]
    fn test_rulebase_types() {
        assert!(ObjectType::SecurityRules.is_rulebase());
        assert!(ObjectType::NatRules.is_rulebase());
        assert!(!ObjectType::Tags.is_rulebase());
    }

    #[test]
    fn test_definition_requires_name() {
        let definition = ObjectDefinition::new(json!({"name": "web-01", "ip_netmask": "10.0.0.1/32"}))
            .unwrap();
        assert_eq!(definition.name(), "web-01");
        assert_eq!(definition.to_payload()["ip_netmask"], "10.0.0.1/32");

        let err = ObjectDefinition::new(json!({"ip_netmask": "10.0.0.1/32"})).unwrap_err();
        assert!(matches!(err, DefinitionError::MissingName { index: None }));
        assert_eq!(err.to_string(), "object definition has no string `name` field");
        assert!(matches!(
            ObjectDefinition::new(json!({"name": 7})),
            Err(DefinitionError::MissingName { .. })
        ));
        assert!(matches!(
            ObjectDefinition::new(json!("web-01")),
            Err(DefinitionError::NotAnObject { kind: "a string" })
        ));
    }

    #[test]
    fn test_parse_list_reports_index() {
        let result = ObjectDefinition::parse_list(json!([
            {"name": "a"},
            {"name": "b"},
            {"color": "Red"}
        ]));
        let err = result.unwrap_err();
        assert!(matches!(err, DefinitionError::MissingName { index: Some(2) }));
        assert_eq!(err.to_string(), "object definition at index 2 has no string `name` field");

        let definitions = ObjectDefinition::parse_list(json!([{"name": "a"}, {"name": "b"}])).unwrap();
        assert_eq!(definitions.len(), 2);
        assert_eq!(definitions[1].name(), "b");
    }

    #[test]
    fn test_failure_summaries() {
        let failed = FailureReason::CreationFailed {
            status: 400,
            body: "{}".to_string(),
        };
        assert_eq!(failed.summary(), "object creation failed");
        assert_eq!(
            FailureReason::Exception {
                message: "timeout".to_string()
            }
            .summary(),
            "exception occurred"
        );
        assert_eq!(
            FailureReason::RetriesExhausted {
                attempts: 3,
                last_error: "invalid reference".to_string()
            }
            .summary(),
            "failed after retries"
        );
    }

    #[test]
    fn test_outcome_name() {
        let outcome = CreateOutcome::Failed {
            name: "x".to_string(),
            reason: FailureReason::Exception {
                message: "boom".to_string(),
            },
        };
        assert_eq!(outcome.name(), "x");
        assert!(outcome.is_failure());
        assert!(!CreateOutcome::Created("y".to_string()).is_failure());
    }
}
