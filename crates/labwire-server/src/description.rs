//! Static feature interface descriptions.
//!
//! A description names a feature's commands and properties and flags which
//! parameters are mandatory; the dispatcher consults it before any handler
//! runs. Descriptions are JSON documents; built-in features embed theirs
//! next to the crate sources.

use serde::{Deserialize, Serialize};

use crate::error::{Result, ServerError};

/// How a described operation behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    /// Invocable operation with parameters, possibly with side effects.
    Command,
    /// Parameterless read that must not mutate server-visible state.
    Property,
}

/// A parameter of a described command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterDescription {
    pub name: String,
    #[serde(default)]
    pub mandatory: bool,
}

/// A command or property within a feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandDescription {
    pub name: String,
    pub kind: CommandKind,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parameters: Vec<ParameterDescription>,
}

/// Static interface description of one feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureDescription {
    /// Globally-unique feature identifier (namespaced path).
    pub identifier: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    pub commands: Vec<CommandDescription>,
}

impl FeatureDescription {
    /// Parse and validate a description from a JSON document.
    pub fn from_json(json: &str) -> Result<Self> {
        let description: Self = serde_json::from_str(json)?;
        description.validate()?;
        Ok(description)
    }

    /// Look up a described command by name.
    pub fn command(&self, name: &str) -> Option<&CommandDescription> {
        self.commands.iter().find(|c| c.name == name)
    }

    fn validate(&self) -> Result<()> {
        if self.identifier.is_empty() {
            return Err(ServerError::Description(
                "feature identifier must not be empty".to_string(),
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for command in &self.commands {
            if command.name.is_empty() {
                return Err(ServerError::Description(format!(
                    "feature '{}' has a command with an empty name",
                    self.identifier
                )));
            }
            if !seen.insert(command.name.as_str()) {
                return Err(ServerError::Description(format!(
                    "feature '{}' describes command '{}' twice",
                    self.identifier, command.name
                )));
            }
            if command.kind == CommandKind::Property && !command.parameters.is_empty() {
                return Err(ServerError::Description(format!(
                    "property '{}' of feature '{}' must not declare parameters",
                    command.name, self.identifier
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GOOD: &str = r#"{
        "identifier": "org.example/test/v1/Probe",
        "display_name": "Probe",
        "commands": [
            {
                "name": "Poke",
                "kind": "command",
                "parameters": [ { "name": "Target", "mandatory": true } ]
            },
            { "name": "Status", "kind": "property" }
        ]
    }"#;

    #[test]
    fn parses_valid_description() {
        let description = FeatureDescription::from_json(GOOD).unwrap();
        assert_eq!(description.identifier, "org.example/test/v1/Probe");
        assert_eq!(description.commands.len(), 2);

        let poke = description.command("Poke").unwrap();
        assert_eq!(poke.kind, CommandKind::Command);
        assert!(poke.parameters[0].mandatory);

        let status = description.command("Status").unwrap();
        assert_eq!(status.kind, CommandKind::Property);
        assert!(status.parameters.is_empty());
    }

    #[test]
    fn rejects_empty_identifier() {
        let result = FeatureDescription::from_json(r#"{"identifier":"","commands":[]}"#);
        assert!(matches!(result, Err(ServerError::Description(_))));
    }

    #[test]
    fn rejects_duplicate_command_names() {
        let json = r#"{
            "identifier": "org.example/test/v1/Dup",
            "commands": [
                { "name": "X", "kind": "command" },
                { "name": "X", "kind": "command" }
            ]
        }"#;
        assert!(matches!(
            FeatureDescription::from_json(json),
            Err(ServerError::Description(_))
        ));
    }

    #[test]
    fn rejects_property_with_parameters() {
        let json = r#"{
            "identifier": "org.example/test/v1/Bad",
            "commands": [
                {
                    "name": "Status",
                    "kind": "property",
                    "parameters": [ { "name": "X" } ]
                }
            ]
        }"#;
        assert!(matches!(
            FeatureDescription::from_json(json),
            Err(ServerError::Description(_))
        ));
    }

    #[test]
    fn unknown_command_lookup_is_none() {
        let description = FeatureDescription::from_json(GOOD).unwrap();
        assert!(description.command("Missing").is_none());
    }
}
