use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Parameter and return-value map.
///
/// A field is *absent* when its key is missing, which is distinct from
/// present-but-empty. Mandatory-parameter validation keys off this
/// distinction.
pub type ParamMap = BTreeMap<String, Value>;

/// A command invocation, sent on the COMMAND channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandCall {
    /// Feature identifier, e.g. `org.labwire/examples/v1/GreetingProvider`.
    pub feature: String,
    /// Command or property name within the feature.
    pub command: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: ParamMap,
}

impl CommandCall {
    /// Create a call with no parameters.
    pub fn new(feature: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            feature: feature.into(),
            command: command.into(),
            parameters: ParamMap::new(),
        }
    }

    /// Add a parameter.
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    /// Parameter by name, if present.
    pub fn parameter(&self, name: &str) -> Option<&Value> {
        self.parameters.get(name)
    }

    /// String parameter by name, if present and a string.
    pub fn string_parameter(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).and_then(Value::as_str)
    }
}

/// A successful command response, sent on the REPLY channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandReply {
    pub feature: String,
    pub command: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub returns: ParamMap,
}

impl CommandReply {
    /// Build the reply for a call with the given return values.
    pub fn for_call(call: &CommandCall, returns: ParamMap) -> Self {
        Self {
            feature: call.feature.clone(),
            command: call.command.clone(),
            returns,
        }
    }

    /// Return value by name, if present.
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.returns.get(name)
    }

    /// String return value by name, if present and a string.
    pub fn string_value(&self, name: &str) -> Option<&str> {
        self.returns.get(name).and_then(Value::as_str)
    }
}

/// CONTROL message type: request the implemented feature list.
pub const CONTROL_LIST_FEATURES: &str = "list_features";
/// CONTROL message type: implemented feature list response.
pub const CONTROL_FEATURE_LIST: &str = "feature_list";
/// CONTROL message type: graceful session release.
pub const CONTROL_GOODBYE: &str = "goodbye";
/// CONTROL message type: session release acknowledgement.
pub const CONTROL_GOODBYE_ACK: &str = "goodbye_ack";

/// CONTROL channel message payload (post-hello).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ControlMessage {
    #[serde(rename = "type")]
    pub msg_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl ControlMessage {
    /// Request the implemented feature list.
    pub fn list_features() -> Self {
        Self {
            msg_type: CONTROL_LIST_FEATURES.to_string(),
            payload: None,
        }
    }

    /// Respond with the implemented feature list.
    pub fn feature_list(features: &[String]) -> Self {
        Self {
            msg_type: CONTROL_FEATURE_LIST.to_string(),
            payload: Some(serde_json::json!({ "features": features })),
        }
    }

    /// Request graceful session release.
    pub fn goodbye() -> Self {
        Self {
            msg_type: CONTROL_GOODBYE.to_string(),
            payload: None,
        }
    }

    /// Acknowledge session release.
    pub fn goodbye_ack() -> Self {
        Self {
            msg_type: CONTROL_GOODBYE_ACK.to_string(),
            payload: None,
        }
    }

    /// Extract the feature list from a `feature_list` message.
    pub fn features(&self) -> Option<Vec<String>> {
        if self.msg_type != CONTROL_FEATURE_LIST {
            return None;
        }
        let list = self.payload.as_ref()?.get("features")?.as_array()?;
        list.iter()
            .map(|v| v.as_str().map(str::to_string))
            .collect()
    }
}

/// A discovery announcement datagram.
///
/// The announcing server does not know its own reachable address; the
/// listener fills in the host from the datagram source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Announcement {
    pub server_type: String,
    pub port: u16,
    pub uuid: String,
}

impl Announcement {
    /// Resolve into a descriptor given the observed source host.
    pub fn into_descriptor(self, host: impl Into<String>) -> ServerDescriptor {
        ServerDescriptor {
            server_type: self.server_type,
            host: host.into(),
            port: self.port,
            uuid: self.uuid,
        }
    }
}

/// A discovered server. Immutable once produced by a scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerDescriptor {
    pub server_type: String,
    pub host: String,
    pub port: u16,
    pub uuid: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_parameter_is_distinct_from_empty() {
        let without = CommandCall::new("f", "c");
        let with_empty = CommandCall::new("f", "c").with_parameter("Name", "");

        assert!(without.parameter("Name").is_none());
        assert_eq!(with_empty.string_parameter("Name"), Some(""));
    }

    #[test]
    fn call_serde_omits_empty_parameters() {
        let call = CommandCall::new("f", "c");
        let json = serde_json::to_string(&call).unwrap();
        assert!(!json.contains("parameters"));

        let parsed: CommandCall = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, call);
    }

    #[test]
    fn feature_list_roundtrip() {
        let features = vec![
            "org.labwire/examples/v1/GreetingProvider".to_string(),
            "org.labwire/examples/v1/AutomatedStorage".to_string(),
        ];
        let msg = ControlMessage::feature_list(&features);
        assert_eq!(msg.features(), Some(features));
    }

    #[test]
    fn features_absent_for_other_message_types() {
        assert_eq!(ControlMessage::goodbye().features(), None);
    }

    #[test]
    fn announcement_resolves_host_from_source() {
        let ann = Announcement {
            server_type: "Hello Labwire Server".into(),
            port: 50051,
            uuid: "u-1".into(),
        };
        let descriptor = ann.into_descriptor("192.168.1.20");
        assert_eq!(descriptor.host, "192.168.1.20");
        assert_eq!(descriptor.port, 50051);
    }
}
