//! Event records delivered by an open [`ZpClient`](crate::ZpClient).

use serde_json::{Map, Value};

use crate::error::{Result, ZpError};
use crate::xml::{self, XmlOptions};

/// One event notification, attributed to the device and service that sent it.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    /// Device identifier (UDN without `uuid:`), e.g. `RINCON_000E58A0123401400_MR`
    pub device: String,
    /// Service name, e.g. `AVTransport`
    pub service: String,
    /// GENA sequence number, when the device sent one
    pub sequence: Option<u32>,
    /// The decoded property set
    pub payload: Value,
}

/// Messages an open client sends to its owner.
#[derive(Debug)]
pub enum ClientMessage {
    /// A decoded event
    Event(EventRecord),
    /// A non-fatal problem: undecodable event, failed renewal
    Error(ZpError),
}

/// Decode a GENA property set into one JSON object.
///
/// All `<e:property>` children are merged, so
/// `<e:property><Volume>10</Volume></e:property>` becomes `{"Volume": 10}`.
///
/// # Errors
///
/// `ZpError::Protocol` if the body is not a property set.
pub fn decode_payload(event_xml: &str) -> Result<Value> {
    let not_a_property_set = || ZpError::Protocol("event is not a UPnP property set".to_string());

    let properties = match xml::to_json(event_xml, XmlOptions::event())? {
        Value::Object(mut root) => root.remove("property").ok_or_else(not_a_property_set)?,
        _ => return Err(not_a_property_set()),
    };

    let properties = match properties {
        Value::Array(items) => items,
        single => vec![single],
    };

    let mut payload = Map::new();
    for property in properties {
        match property {
            Value::Object(fields) => payload.extend(fields),
            _ => return Err(not_a_property_set()),
        }
    }
    Ok(Value::Object(payload))
}
