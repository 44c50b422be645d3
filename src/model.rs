//! Graph model definitions.
//!
//! The graph model is the parsed, in-memory representation of a
//! device/message network description. It is built once by the parser
//! and read-only thereafter: the code generator consumes it to produce
//! the simulation engine source, and the driver never mutates it.

use serde::{Deserialize, Serialize};

/// A parsed application graph: type declarations plus one instance.
///
/// This is the unit handed to the code generator. The `doc` and
/// `shared_code` sections are optional in the source document and stay
/// `None` when absent.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GraphModel {
    /// Graph type identifier
    pub id: String,
    /// Optional graph-level documentation text
    pub doc: Option<String>,
    /// Optional shared code block emitted verbatim by the generator
    pub shared_code: Option<String>,
    /// Declared device types
    pub device_types: Vec<DeviceType>,
    /// Declared message types
    pub message_types: Vec<MessageType>,
    /// The instantiated graph (devices and edges)
    pub instance: GraphInstance,
}

impl GraphModel {
    /// Looks up a declared device type by id.
    pub fn device_type(&self, id: &str) -> Option<&DeviceType> {
        self.device_types.iter().find(|dt| dt.id == id)
    }

    /// Looks up a declared message type by id.
    pub fn message_type(&self, id: &str) -> Option<&MessageType> {
        self.message_types.iter().find(|mt| mt.id == id)
    }
}

/// A class of simulated node.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeviceType {
    /// Device type identifier
    pub id: String,
    /// Per-device state fields
    pub state: StateFields,
    /// Readiness expression (generator-language source, opaque here)
    pub ready_to_send: String,
    /// Input pins, each carrying an OnReceive handler body
    pub input_pins: Vec<Pin>,
    /// Output pins, each carrying an OnSend handler body
    pub output_pins: Vec<Pin>,
}

/// A named input or output port on a device type.
///
/// The `code_body` is the raw handler source attached to the pin
/// (OnReceive for inputs, OnSend for outputs); the driver treats it as
/// opaque text for the code generator.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Pin {
    /// Pin name
    pub name: String,
    /// Identifier of the message type carried by this pin
    pub message_type: String,
    /// Raw handler source bound to the pin
    pub code_body: String,
}

impl Pin {
    /// Creates a new pin.
    pub fn new(
        name: impl Into<String>,
        message_type: impl Into<String>,
        code_body: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            message_type: message_type.into(),
            code_body: code_body.into(),
        }
    }
}

/// A declared message type.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MessageType {
    /// Message type identifier
    pub id: String,
    /// Optional documentation text
    pub doc: Option<String>,
    /// Message payload fields
    pub fields: StateFields,
}

/// Scalar and array fields of a state or message declaration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StateFields {
    /// Scalar fields
    pub scalars: Vec<ScalarField>,
    /// Fixed-length array fields
    pub arrays: Vec<ArrayField>,
}

impl StateFields {
    /// Returns true if there are no fields at all.
    pub fn is_empty(&self) -> bool {
        self.scalars.is_empty() && self.arrays.is_empty()
    }
}

/// A scalar field declaration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScalarField {
    /// Field name
    pub name: String,
    /// Type descriptor (e.g., "uint32_t")
    pub ty: String,
    /// Optional documentation text
    pub doc: Option<String>,
}

/// A fixed-length array field declaration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ArrayField {
    /// Field name
    pub name: String,
    /// Element type descriptor
    pub ty: String,
    /// Optional documentation text
    pub doc: Option<String>,
    /// Number of elements, always positive
    pub length: usize,
}

/// The instantiated graph: concrete devices and the edges between them.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GraphInstance {
    /// Device instances
    pub devices: Vec<DeviceInstance>,
    /// Directed pin-to-pin connections
    pub edges: Vec<Edge>,
}

/// A concrete node in the instantiated graph.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeviceInstance {
    /// Instance identifier
    pub id: String,
    /// Identifier of the declared device type this instance references
    pub device_type: String,
    /// Instance properties as parsed JSON values
    pub properties: serde_json::Map<String, serde_json::Value>,
}

/// One endpoint of an edge: a device instance and a pin name on it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    /// Device instance identifier
    pub device: String,
    /// Pin name on that device
    pub pin: String,
}

impl Endpoint {
    /// Creates a new endpoint.
    pub fn new(device: impl Into<String>, pin: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            pin: pin.into(),
        }
    }
}

/// A directed connection from an output pin to an input pin.
///
/// Endpoints are not cross-checked against declared device instances or
/// pins; that validation belongs to the code generator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    /// Source endpoint (output pin)
    pub src: Endpoint,
    /// Destination endpoint (input pin)
    pub dst: Endpoint,
}

impl Edge {
    /// Creates a new edge between two endpoints.
    pub fn new(src: Endpoint, dst: Endpoint) -> Self {
        Self { src, dst }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_and_edge() {
        let edge = Edge::new(Endpoint::new("n0", "out"), Endpoint::new("n1", "in"));
        assert_eq!(edge.src.device, "n0");
        assert_eq!(edge.src.pin, "out");
        assert_eq!(edge.dst.device, "n1");
        assert_eq!(edge.dst.pin, "in");
    }

    #[test]
    fn test_type_lookup() {
        let model = GraphModel {
            id: "ring".to_string(),
            doc: None,
            shared_code: None,
            device_types: vec![DeviceType {
                id: "node".to_string(),
                state: StateFields::default(),
                ready_to_send: "*readyToSend = 1;".to_string(),
                input_pins: vec![Pin::new("in", "token", "// receive")],
                output_pins: vec![Pin::new("out", "token", "// send")],
            }],
            message_types: vec![MessageType {
                id: "token".to_string(),
                doc: None,
                fields: StateFields::default(),
            }],
            instance: GraphInstance::default(),
        };

        assert!(model.device_type("node").is_some());
        assert!(model.device_type("missing").is_none());
        assert!(model.message_type("token").is_some());
        assert!(model.message_type("missing").is_none());
    }

    #[test]
    fn test_state_fields_empty() {
        let fields = StateFields::default();
        assert!(fields.is_empty());

        let fields = StateFields {
            scalars: vec![ScalarField {
                name: "counter".to_string(),
                ty: "uint32_t".to_string(),
                doc: None,
            }],
            arrays: Vec::new(),
        };
        assert!(!fields.is_empty());
    }
}
