//! Worker output protocol.
//!
//! Workers report progress as newline-delimited text. Exactly three
//! line shapes carry simulation data:
//!
//! ```text
//! App [<device>, <level>]: <message>
//! State [<device>]: <k1> = <v1>, <k2> = <v2>, ...
//! Metric [<name>]: <value>
//! ```
//!
//! Decoding is total: a line matching none of the shapes (or one whose
//! numeric payload does not parse) decodes to no event. The shapes are
//! mutually exclusive by their literal prefixes, so match order does
//! not matter.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::types::{FieldValue, LogLevel, MetricValue};

static APP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^App \[(.+), (\d+)\]: (.+)").unwrap());
static STATE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^State \[(.+)\]: (.+)").unwrap());
static METRIC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Metric \[(.+)\]: (.+)").unwrap());

/// Prefix of display-only binary message echo lines.
const MSG_PREFIX: &str = "msg: ";

/// A decoded worker output line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// An application log line.
    App {
        /// Reporting device
        device: String,
        /// Verbosity level
        level: LogLevel,
        /// Log message text
        message: String,
    },

    /// A full state snapshot for one device.
    State {
        /// Reporting device
        device: String,
        /// Field name to value map
        fields: HashMap<String, FieldValue>,
    },

    /// A named aggregate metric.
    Metric {
        /// Metric name
        name: String,
        /// Metric value
        value: MetricValue,
    },
}

/// Decodes one output line into at most one event.
///
/// Never errors; unrecognized lines yield `None` and are ignored by
/// the aggregation pipeline.
pub fn decode(line: &str) -> Option<Event> {
    if let Some(caps) = APP_RE.captures(line) {
        return Some(Event::App {
            device: caps[1].to_string(),
            level: caps[2].parse().ok()?,
            message: caps[3].to_string(),
        });
    }

    if let Some(caps) = STATE_RE.captures(line) {
        return Some(Event::State {
            device: caps[1].to_string(),
            fields: parse_fields(&caps[2])?,
        });
    }

    if let Some(caps) = METRIC_RE.captures(line) {
        return Some(Event::Metric {
            name: caps[1].to_string(),
            value: caps[2].parse().ok()?,
        });
    }

    None
}

/// Parses the `k1 = v1, k2 = v2` field list of a State line.
fn parse_fields(field_str: &str) -> Option<HashMap<String, FieldValue>> {
    let mut fields = HashMap::new();
    for item in field_str.split(", ") {
        let (key, value) = item.split_once(" = ")?;
        fields.insert(key.to_string(), value.parse().ok()?);
    }
    Some(fields)
}

/// Renders a line for console echo.
///
/// Lines starting with `msg: ` carry a raw binary payload whose first
/// eight bytes are two little-endian u32s; they are rendered as a
/// human-readable diagnostic. This is display-only and never feeds the
/// aggregator. All other lines are returned unchanged.
pub fn echo_line(line: &str) -> String {
    let Some(payload) = line.strip_prefix(MSG_PREFIX) else {
        return line.to_string();
    };

    let bytes = payload.as_bytes();
    if bytes.len() < 8 {
        return line.to_string();
    }

    let first = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    let second = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);

    format!(
        "Got message, bytes = {:?}\nDecoded message = ({}, {})",
        bytes, first, second
    )
}
