//! Feature registry and command dispatch.
//!
//! One flat handler table keyed by (feature identifier, command name), built
//! once at server construction and read-only afterwards. Dispatch validates
//! in a fixed order — feature, command, mandatory-parameter presence — before
//! the handler effect runs, so a rejected request never has a side effect.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};

use labwire_wire::{CommandCall, CommandReply, ParamMap, StructuredError};
use tracing::warn;

use crate::description::FeatureDescription;
use crate::error::{Result, ServerError};

/// A command or property handler.
///
/// Returns the reply's return values or a structured error. Handlers must be
/// safe under concurrent invocation; any feature-internal state sits behind
/// its own lock.
pub type Handler =
    Box<dyn Fn(&CommandCall) -> std::result::Result<ParamMap, StructuredError> + Send + Sync>;

/// A feature implementation awaiting registration: its static description
/// plus one handler per described command.
pub struct Feature {
    description: FeatureDescription,
    handlers: HashMap<String, Handler>,
}

impl Feature {
    /// Start a feature implementation from its description.
    pub fn new(description: FeatureDescription) -> Self {
        Self {
            description,
            handlers: HashMap::new(),
        }
    }

    /// Attach the handler for a described command.
    pub fn handler<F>(mut self, command: &str, f: F) -> Self
    where
        F: Fn(&CommandCall) -> std::result::Result<ParamMap, StructuredError>
            + Send
            + Sync
            + 'static,
    {
        self.handlers.insert(command.to_string(), Box::new(f));
        self
    }
}

struct FeatureEntry {
    description: FeatureDescription,
    handlers: HashMap<String, Handler>,
}

/// Process-wide mapping from feature identifier to its implementation.
///
/// Populated once before [`Server::start`](crate::Server::start); afterwards
/// only read, so it is shared freely across connection workers.
#[derive(Default)]
pub struct FeatureRegistry {
    features: HashMap<String, FeatureEntry>,
}

impl FeatureRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a feature.
    ///
    /// Every described command must have a handler and every handler must
    /// correspond to a described command; a feature identifier may only be
    /// registered once.
    pub fn register(&mut self, feature: Feature) -> Result<()> {
        let Feature {
            description,
            handlers,
        } = feature;

        if self.features.contains_key(&description.identifier) {
            return Err(ServerError::Registration(format!(
                "feature '{}' is already registered",
                description.identifier
            )));
        }

        for command in &description.commands {
            if !handlers.contains_key(&command.name) {
                return Err(ServerError::Registration(format!(
                    "feature '{}' describes '{}' but no handler was attached",
                    description.identifier, command.name
                )));
            }
        }
        for name in handlers.keys() {
            if description.command(name).is_none() {
                return Err(ServerError::Registration(format!(
                    "feature '{}' has a handler for undescribed command '{}'",
                    description.identifier, name
                )));
            }
        }

        self.features.insert(
            description.identifier.clone(),
            FeatureEntry {
                description,
                handlers,
            },
        );
        Ok(())
    }

    /// Identifiers of every registered feature, sorted.
    pub fn feature_identifiers(&self) -> Vec<String> {
        let mut identifiers: Vec<String> = self.features.keys().cloned().collect();
        identifiers.sort();
        identifiers
    }

    /// Description of a registered feature.
    pub fn description(&self, identifier: &str) -> Option<&FeatureDescription> {
        self.features.get(identifier).map(|entry| &entry.description)
    }

    /// Dispatch a command call.
    ///
    /// Validation order: feature registered, command described, mandatory
    /// parameters present — only then does the handler effect run. Handler
    /// panics are wrapped as `UndefinedExecution`; no failure here escapes
    /// as anything but a structured error.
    pub fn dispatch(
        &self,
        call: &CommandCall,
    ) -> std::result::Result<CommandReply, StructuredError> {
        let entry = self.features.get(&call.feature).ok_or_else(|| {
            StructuredError::framework(format!("feature '{}' is not implemented", call.feature))
        })?;

        let command = entry.description.command(&call.command).ok_or_else(|| {
            StructuredError::framework(format!(
                "feature '{}' has no command '{}'",
                call.feature, call.command
            ))
        })?;

        for parameter in &command.parameters {
            if parameter.mandatory && !call.parameters.contains_key(&parameter.name) {
                return Err(StructuredError::validation(
                    &parameter.name,
                    format!("{} parameter was not set", parameter.name),
                    format!("Supply the {} parameter", parameter.name),
                ));
            }
        }

        let handler = entry.handlers.get(&call.command).ok_or_else(|| {
            // Registration guarantees a handler per described command.
            StructuredError::framework(format!(
                "no handler bound for '{}' on '{}'",
                call.command, call.feature
            ))
        })?;

        let returns = match catch_unwind(AssertUnwindSafe(|| handler(call))) {
            Ok(result) => result?,
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                warn!(
                    feature = %call.feature,
                    command = %call.command,
                    %message,
                    "handler panicked"
                );
                return Err(StructuredError::undefined_execution(message));
            }
        };

        Ok(CommandReply::for_call(call, returns))
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(text) = panic.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = panic.downcast_ref::<String>() {
        text.clone()
    } else {
        "handler panicked".to_string()
    }
}

/// Read a parameter that the description marks mandatory and the handler
/// expects to be a string. Presence is already checked by dispatch; a
/// non-string value is a caller fault.
pub fn string_parameter<'a>(
    call: &'a CommandCall,
    name: &str,
) -> std::result::Result<&'a str, StructuredError> {
    call.string_parameter(name).ok_or_else(|| {
        StructuredError::validation(
            name,
            format!("{name} parameter must be a string"),
            format!("Supply {name} as a JSON string"),
        )
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::description::FeatureDescription;

    const PROBE: &str = r#"{
        "identifier": "org.example/test/v1/Probe",
        "commands": [
            {
                "name": "Poke",
                "kind": "command",
                "parameters": [ { "name": "Target", "mandatory": true } ]
            },
            { "name": "Crash", "kind": "command" },
            { "name": "Status", "kind": "property" }
        ]
    }"#;

    fn probe_registry(effects: Arc<AtomicUsize>) -> FeatureRegistry {
        let description = FeatureDescription::from_json(PROBE).unwrap();
        let feature = Feature::new(description)
            .handler("Poke", move |call| {
                effects.fetch_add(1, Ordering::SeqCst);
                let target = string_parameter(call, "Target")?;
                let mut returns = ParamMap::new();
                returns.insert("Poked".into(), target.into());
                Ok(returns)
            })
            .handler("Crash", |_call| panic!("probe exploded"))
            .handler("Status", |_call| {
                let mut returns = ParamMap::new();
                returns.insert("Status".into(), "idle".into());
                Ok(returns)
            });

        let mut registry = FeatureRegistry::new();
        registry.register(feature).unwrap();
        registry
    }

    #[test]
    fn missing_mandatory_parameter_names_it_and_has_no_effect() {
        let effects = Arc::new(AtomicUsize::new(0));
        let registry = probe_registry(effects.clone());

        let call = CommandCall::new("org.example/test/v1/Probe", "Poke");
        let err = registry.dispatch(&call).unwrap_err();

        match err {
            StructuredError::Validation { parameter, .. } => assert_eq!(parameter, "Target"),
            other => panic!("expected validation error, got {other:?}"),
        }
        assert_eq!(effects.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn present_but_empty_passes_presence_check() {
        let effects = Arc::new(AtomicUsize::new(0));
        let registry = probe_registry(effects.clone());

        let call =
            CommandCall::new("org.example/test/v1/Probe", "Poke").with_parameter("Target", "");
        let reply = registry.dispatch(&call).unwrap();

        assert_eq!(reply.string_value("Poked"), Some(""));
        assert_eq!(effects.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn non_string_parameter_is_a_validation_error() {
        let effects = Arc::new(AtomicUsize::new(0));
        let registry = probe_registry(effects);

        let call =
            CommandCall::new("org.example/test/v1/Probe", "Poke").with_parameter("Target", 42);
        let err = registry.dispatch(&call).unwrap_err();
        assert!(matches!(err, StructuredError::Validation { parameter, .. } if parameter == "Target"));
    }

    #[test]
    fn unknown_feature_is_a_framework_error() {
        let registry = probe_registry(Arc::new(AtomicUsize::new(0)));
        let call = CommandCall::new("org.example/test/v1/Nope", "Poke");
        assert!(matches!(
            registry.dispatch(&call),
            Err(StructuredError::Framework { .. })
        ));
    }

    #[test]
    fn unknown_command_is_a_framework_error() {
        let registry = probe_registry(Arc::new(AtomicUsize::new(0)));
        let call = CommandCall::new("org.example/test/v1/Probe", "Nope");
        assert!(matches!(
            registry.dispatch(&call),
            Err(StructuredError::Framework { .. })
        ));
    }

    #[test]
    fn handler_panic_is_wrapped_as_undefined_execution() {
        let registry = probe_registry(Arc::new(AtomicUsize::new(0)));
        let call = CommandCall::new("org.example/test/v1/Probe", "Crash");
        match registry.dispatch(&call) {
            Err(StructuredError::UndefinedExecution { message }) => {
                assert!(message.contains("probe exploded"));
            }
            other => panic!("expected undefined execution error, got {other:?}"),
        }
    }

    #[test]
    fn property_dispatch_succeeds_without_parameters() {
        let registry = probe_registry(Arc::new(AtomicUsize::new(0)));
        let call = CommandCall::new("org.example/test/v1/Probe", "Status");
        let reply = registry.dispatch(&call).unwrap();
        assert_eq!(reply.string_value("Status"), Some("idle"));
    }

    #[test]
    fn registration_requires_handler_per_command() {
        let description = FeatureDescription::from_json(PROBE).unwrap();
        let incomplete = Feature::new(description).handler("Poke", |_| Ok(ParamMap::new()));

        let mut registry = FeatureRegistry::new();
        assert!(matches!(
            registry.register(incomplete),
            Err(ServerError::Registration(_))
        ));
    }

    #[test]
    fn registration_rejects_undescribed_handler() {
        let description = FeatureDescription::from_json(
            r#"{"identifier":"org.example/test/v1/One","commands":[{"name":"A","kind":"command"}]}"#,
        )
        .unwrap();
        let feature = Feature::new(description)
            .handler("A", |_| Ok(ParamMap::new()))
            .handler("Ghost", |_| Ok(ParamMap::new()));

        let mut registry = FeatureRegistry::new();
        assert!(matches!(
            registry.register(feature),
            Err(ServerError::Registration(_))
        ));
    }

    #[test]
    fn duplicate_registration_rejected() {
        let effects = Arc::new(AtomicUsize::new(0));
        let mut registry = probe_registry(effects);

        let description = FeatureDescription::from_json(PROBE).unwrap();
        let feature = Feature::new(description)
            .handler("Poke", |_| Ok(ParamMap::new()))
            .handler("Crash", |_| Ok(ParamMap::new()))
            .handler("Status", |_| Ok(ParamMap::new()));

        assert!(matches!(
            registry.register(feature),
            Err(ServerError::Registration(_))
        ));
    }

    #[test]
    fn identifiers_are_sorted() {
        let mut registry = FeatureRegistry::new();
        for id in ["org.example/b", "org.example/a"] {
            let description = FeatureDescription::from_json(&format!(
                r#"{{"identifier":"{id}","commands":[]}}"#
            ))
            .unwrap();
            registry.register(Feature::new(description)).unwrap();
        }

        assert_eq!(
            registry.feature_identifiers(),
            vec!["org.example/a".to_string(), "org.example/b".to_string()]
        );
    }
}
