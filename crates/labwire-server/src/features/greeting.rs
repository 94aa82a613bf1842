//! The GreetingProvider example feature.

use labwire_wire::{ParamMap, StructuredError};

use crate::error::Result;
use crate::registry::{string_parameter, Feature};

/// Identifier of the GreetingProvider feature.
pub const GREETING_PROVIDER: &str = "org.labwire/examples/v1/GreetingProvider";

const DESCRIPTION: &str = include_str!("../../descriptions/greeting_provider.json");

/// Build the GreetingProvider implementation.
///
/// `SayHello` greets the given name; a name case-insensitively equal to
/// `"error"` is refused with a validation error, which demos the structured
/// error path. `StartYear` is an unobservable property returning the current
/// calendar year.
pub fn greeting_provider() -> Result<Feature> {
    let description = crate::description::FeatureDescription::from_json(DESCRIPTION)?;

    Ok(Feature::new(description)
        .handler("SayHello", |call| {
            let name = string_parameter(call, "Name")?;

            if name.eq_ignore_ascii_case("error") {
                return Err(StructuredError::validation(
                    "Name",
                    "Name was called error, refusing to greet",
                    "Specify a name that is not \"error\"",
                ));
            }

            let mut returns = ParamMap::new();
            returns.insert("Greeting".into(), format!("Hello {name}").into());
            Ok(returns)
        })
        .handler("StartYear", |_call| {
            let year = time::OffsetDateTime::now_utc().year();
            let mut returns = ParamMap::new();
            returns.insert("StartYear".into(), year.into());
            Ok(returns)
        }))
}

#[cfg(test)]
mod tests {
    use labwire_wire::CommandCall;

    use super::*;
    use crate::registry::FeatureRegistry;

    fn registry() -> FeatureRegistry {
        let mut registry = FeatureRegistry::new();
        registry.register(greeting_provider().unwrap()).unwrap();
        registry
    }

    #[test]
    fn greets_by_name() {
        let registry = registry();
        let call = CommandCall::new(GREETING_PROVIDER, "SayHello").with_parameter("Name", "SiLA");
        let reply = registry.dispatch(&call).unwrap();
        assert_eq!(reply.string_value("Greeting"), Some("Hello SiLA"));
    }

    #[test]
    fn absent_name_is_rejected() {
        let registry = registry();
        let call = CommandCall::new(GREETING_PROVIDER, "SayHello");
        match registry.dispatch(&call) {
            Err(StructuredError::Validation { parameter, .. }) => assert_eq!(parameter, "Name"),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn error_literal_is_rejected_case_insensitively() {
        let registry = registry();
        for name in ["error", "ERROR", "Error"] {
            let call =
                CommandCall::new(GREETING_PROVIDER, "SayHello").with_parameter("Name", name);
            match registry.dispatch(&call) {
                Err(StructuredError::Validation {
                    parameter, message, ..
                }) => {
                    assert_eq!(parameter, "Name");
                    assert!(message.contains("error"));
                }
                other => panic!("expected validation error for {name}, got {other:?}"),
            }
        }
    }

    #[test]
    fn start_year_is_plausible() {
        let registry = registry();
        let call = CommandCall::new(GREETING_PROVIDER, "StartYear");
        let reply = registry.dispatch(&call).unwrap();
        let year = reply.value("StartYear").and_then(|v| v.as_i64()).unwrap();
        assert!(year >= 2024);
    }
}
