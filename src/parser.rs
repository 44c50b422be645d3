//! Graph XML parsing.
//!
//! This module turns a namespaced graph description document into a
//! [`GraphModel`](crate::model::GraphModel). All element lookups are
//! qualified by the fixed graph schema namespace; optional children
//! that are absent simply yield `None` rather than failing.
//!
//! Two textual micro-formats live inside the document and get their own
//! helpers:
//!
//! - edge paths: `"srcDevice:srcPin-dstDevice:dstPin"` ([`parse_edge`])
//! - device properties: the *interior* of a JSON object, without the
//!   surrounding braces ([`parse_properties`])

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use crate::model::{
    ArrayField, DeviceInstance, DeviceType, Edge, Endpoint, GraphInstance, GraphModel, MessageType,
    Pin, ScalarField, StateFields,
};

/// The XML namespace qualifying every element of the graph schema.
pub const GRAPH_NS: &str = "https://poets-project.org/schemas/virtual-graph-schema-v2";

/// Errors that can occur while building a graph model.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XML error: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error("missing element: <{0}>")]
    MissingElement(&'static str),

    #[error("missing attribute '{attribute}' on <{element}>")]
    MissingAttribute {
        element: String,
        attribute: &'static str,
    },

    #[error("malformed property string: {0}")]
    Properties(#[from] serde_json::Error),

    #[error("invalid array length {value:?} for field '{field}'")]
    ArrayLength { field: String, value: String },
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// Parses a graph description file into a model.
pub fn parse_file<P: AsRef<Path>>(path: P) -> ParseResult<GraphModel> {
    let content = std::fs::read_to_string(path)?;
    parse_str(&content)
}

/// Parses a graph description from an XML string.
pub fn parse_str(xml: &str) -> ParseResult<GraphModel> {
    let doc = roxmltree::Document::parse(xml)?;
    let root = doc.root_element();

    let graph_type = require(root, "GraphType")?;
    let graph_inst = require(root, "GraphInstance")?;
    let device_types = require(graph_type, "DeviceTypes")?;
    let message_types = require(graph_type, "MessageTypes")?;

    Ok(GraphModel {
        id: attr(graph_type, "id")?,
        doc: text(child(graph_type, "Documentation")),
        shared_code: text(child(graph_type, "SharedCode")),
        device_types: children(device_types, "DeviceType")
            .map(parse_device_type)
            .collect::<ParseResult<_>>()?,
        message_types: children(message_types, "MessageType")
            .map(parse_message_type)
            .collect::<ParseResult<_>>()?,
        instance: parse_graph_instance(graph_inst)?,
    })
}

/// Parses an edge path string of the form `"A:out-B:in"`.
///
/// Only the first match of the pattern is used; a string that does not
/// match yields `None` and the edge is silently dropped by the caller.
/// This mirrors the source format's tolerance for annotation text
/// around the path proper.
pub fn parse_edge(path: &str) -> Option<Edge> {
    static EDGE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(\w+):(\w+)-(\w+):(\w+)").unwrap());

    EDGE_RE.captures(path).map(|caps| {
        Edge::new(
            Endpoint::new(&caps[1], &caps[2]),
            Endpoint::new(&caps[3], &caps[4]),
        )
    })
}

/// Parses a device property string.
///
/// Property strings are the interior of a JSON object without the
/// leading and trailing braces, e.g. `"a": 1, "b": 2`. An absent or
/// empty string yields an empty map.
pub fn parse_properties(
    text: Option<&str>,
) -> ParseResult<serde_json::Map<String, serde_json::Value>> {
    match text {
        Some(interior) if !interior.trim().is_empty() => {
            Ok(serde_json::from_str(&format!("{{{interior}}}"))?)
        }
        _ => Ok(serde_json::Map::new()),
    }
}

/// Parses the `<Scalar>` and `<Array>` children of a state-bearing
/// element (`<State>` on a device type, `<Message>` on a message type).
///
/// An absent element yields an empty field set. Array lengths must be
/// positive integers.
fn parse_state_fields(element: Option<roxmltree::Node>) -> ParseResult<StateFields> {
    let Some(element) = element else {
        return Ok(StateFields::default());
    };

    let scalars = children(element, "Scalar")
        .map(|scalar| {
            Ok(ScalarField {
                name: attr(scalar, "name")?,
                ty: attr(scalar, "type")?,
                doc: text(child(scalar, "Documentation")),
            })
        })
        .collect::<ParseResult<_>>()?;

    let arrays = children(element, "Array")
        .map(|array| {
            let name = attr(array, "name")?;
            let raw_length = attr(array, "length")?;
            let length = raw_length
                .parse::<i64>()
                .ok()
                .filter(|len| *len > 0)
                .ok_or_else(|| ParseError::ArrayLength {
                    field: name.clone(),
                    value: raw_length,
                })?;
            Ok(ArrayField {
                name,
                ty: attr(array, "type")?,
                doc: text(child(array, "Documentation")),
                length: length as usize,
            })
        })
        .collect::<ParseResult<_>>()?;

    Ok(StateFields { scalars, arrays })
}

fn parse_device_type(element: roxmltree::Node) -> ParseResult<DeviceType> {
    let ready_to_send = text(Some(require(element, "ReadyToSend")?))
        .ok_or(ParseError::MissingElement("ReadyToSend"))?;

    Ok(DeviceType {
        id: attr(element, "id")?,
        state: parse_state_fields(child(element, "State"))?,
        ready_to_send,
        input_pins: children(element, "InputPin")
            .map(|pin| parse_pin(pin, "OnReceive"))
            .collect::<ParseResult<_>>()?,
        output_pins: children(element, "OutputPin")
            .map(|pin| parse_pin(pin, "OnSend"))
            .collect::<ParseResult<_>>()?,
    })
}

fn parse_pin(element: roxmltree::Node, handler: &'static str) -> ParseResult<Pin> {
    let code_body =
        text(Some(require(element, handler)?)).ok_or(ParseError::MissingElement(handler))?;

    Ok(Pin {
        name: attr(element, "name")?,
        message_type: attr(element, "messageTypeId")?,
        code_body,
    })
}

fn parse_message_type(element: roxmltree::Node) -> ParseResult<MessageType> {
    Ok(MessageType {
        id: attr(element, "id")?,
        doc: text(child(element, "Documentation")),
        fields: parse_state_fields(child(element, "Message"))?,
    })
}

fn parse_graph_instance(element: roxmltree::Node) -> ParseResult<GraphInstance> {
    let device_instances = require(element, "DeviceInstances")?;
    let edge_instances = require(element, "EdgeInstances")?;

    let devices = children(device_instances, "DeviceInstance")
        .map(|device| {
            let properties_text = text(child(device, "P"));
            Ok(DeviceInstance {
                id: attr(device, "id")?,
                device_type: attr(device, "type")?,
                properties: parse_properties(properties_text.as_deref())?,
            })
        })
        .collect::<ParseResult<_>>()?;

    // Paths that do not match the edge pattern are dropped, not errors.
    let edges = children(edge_instances, "EdgeInstance")
        .filter_map(|edge| edge.attribute("path"))
        .filter_map(parse_edge)
        .collect();

    Ok(GraphInstance { devices, edges })
}

/// Returns the first child of `parent` with the given name in the graph
/// namespace.
fn child<'a, 'input>(
    parent: roxmltree::Node<'a, 'input>,
    name: &str,
) -> Option<roxmltree::Node<'a, 'input>> {
    parent.children().find(|node| {
        node.is_element()
            && node.tag_name().name() == name
            && node.tag_name().namespace() == Some(GRAPH_NS)
    })
}

/// Like [`child`], but failing when the element is absent.
fn require<'a, 'input>(
    parent: roxmltree::Node<'a, 'input>,
    name: &'static str,
) -> ParseResult<roxmltree::Node<'a, 'input>> {
    child(parent, name).ok_or(ParseError::MissingElement(name))
}

/// Returns all children of `parent` with the given name in the graph
/// namespace.
fn children<'a, 'input>(
    parent: roxmltree::Node<'a, 'input>,
    name: &'static str,
) -> impl Iterator<Item = roxmltree::Node<'a, 'input>> {
    parent.children().filter(move |node| {
        node.is_element()
            && node.tag_name().name() == name
            && node.tag_name().namespace() == Some(GRAPH_NS)
    })
}

/// Returns the trimmed inner text of an element, or `None` when the
/// element is absent or empty.
fn text(element: Option<roxmltree::Node>) -> Option<String> {
    element
        .and_then(|node| node.text())
        .map(|t| t.trim().to_string())
}

fn attr(element: roxmltree::Node, name: &'static str) -> ParseResult<String> {
    element
        .attribute(name)
        .map(String::from)
        .ok_or_else(|| ParseError::MissingAttribute {
            element: element.tag_name().name().to_string(),
            attribute: name,
        })
}
