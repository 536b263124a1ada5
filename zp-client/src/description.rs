//! ZonePlayer device description model.
//!
//! The typed fields are the ones the tool navigates (devices, services and
//! their URLs). Everything else a ZonePlayer reports is kept in the
//! `properties` maps, so printing a description loses nothing.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, ZpError};
use crate::xml::{self, XmlOptions};

/// Root of a UPnP device description document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceDescription {
    #[serde(flatten)]
    pub properties: Map<String, Value>,
    pub device: Device,
}

/// A device node; ZonePlayers embed a MediaServer and a MediaRenderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    #[serde(deserialize_with = "string_like")]
    pub device_type: String,
    #[serde(deserialize_with = "string_like")]
    pub friendly_name: String,
    #[serde(deserialize_with = "string_like")]
    pub udn: String,
    #[serde(flatten)]
    pub properties: Map<String, Value>,
    #[serde(default)]
    pub service_list: Vec<Service>,
    #[serde(default)]
    pub device_list: Vec<Device>,
}

/// A service descriptor, with its SCPD once enrichment attached it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    #[serde(deserialize_with = "string_like")]
    pub service_type: String,
    #[serde(deserialize_with = "string_like")]
    pub service_id: String,
    #[serde(deserialize_with = "string_like")]
    pub scpd_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_sub_url: Option<String>,
    #[serde(flatten)]
    pub properties: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scpd: Option<Value>,
}

impl DeviceDescription {
    /// Parse a device description document.
    ///
    /// # Errors
    ///
    /// `ZpError::Protocol` if the XML is malformed or has no usable `device`.
    pub fn from_xml(xml: &str) -> Result<Self> {
        let value = xml::to_json(xml, XmlOptions::description())?;
        serde_json::from_value(value)
            .map_err(|e| ZpError::Protocol(format!("not a device description: {e}")))
    }

    /// All devices of the tree, depth-first, root first.
    pub fn devices(&self) -> Vec<&Device> {
        let mut devices = Vec::new();
        let mut stack = vec![&self.device];
        while let Some(device) = stack.pop() {
            devices.push(device);
            stack.extend(device.device_list.iter().rev());
        }
        devices
    }

    /// Every (device, service) pair, in the same order as [`devices`](Self::devices).
    pub fn services(&self) -> Vec<(&Device, &Service)> {
        self.devices()
            .into_iter()
            .flat_map(|device| device.service_list.iter().map(move |service| (device, service)))
            .collect()
    }
}

impl Device {
    /// Identifier used in event records: the UDN without `uuid:`.
    pub fn id(&self) -> &str {
        self.udn.strip_prefix("uuid:").unwrap_or(&self.udn)
    }
}

impl Service {
    /// Short service name: the last segment of the service ID.
    ///
    /// `urn:upnp-org:serviceId:AVTransport` becomes `AVTransport`.
    pub fn name(&self) -> &str {
        self.service_id
            .rsplit(':')
            .next()
            .unwrap_or(&self.service_id)
    }
}

/// Accept strings, and numbers the XML conversion turned into numbers.
fn string_like<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected a string, found {other}"
        ))),
    }
}
