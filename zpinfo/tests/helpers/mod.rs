//! Mock collaborators for orchestrator and fetcher tests.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use zpinfo::{
    Device, DeviceClient, DeviceDescription, Error, EventListener, Notice, NoticeSender, Service,
    ShutdownTrigger, Signal, SignalSource,
};

pub const ADDRESS: &str = "192.168.1.50";

/// What the mocks were asked to do.
#[derive(Debug, Default)]
pub struct Calls {
    pub descriptions: AtomicUsize,
    pub definitions: Mutex<Vec<String>>,
    pub listener_starts: AtomicUsize,
    pub listener_stops: AtomicUsize,
    pub opens: AtomicUsize,
    pub closes: AtomicUsize,
    pub signal_installs: AtomicUsize,
}

impl Calls {
    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    pub fn definitions(&self) -> Vec<String> {
        self.definitions.lock().unwrap().clone()
    }
}

fn bump(counter: &AtomicUsize) {
    counter.fetch_add(1, Ordering::SeqCst);
}

pub fn service(name: &str) -> Service {
    Service {
        service_type: format!("urn:schemas-upnp-org:service:{name}:1"),
        service_id: format!("urn:upnp-org:serviceId:{name}"),
        scpd_url: format!("/xml/{name}1.xml"),
        event_sub_url: Some(format!("/{name}/Event")),
        properties: Map::new(),
        scpd: None,
    }
}

pub fn device(id: &str, services: &[&str], children: Vec<Device>) -> Device {
    Device {
        device_type: "urn:schemas-upnp-org:device:ZonePlayer:1".to_string(),
        friendly_name: format!("{ADDRESS} - {id}"),
        udn: format!("uuid:{id}"),
        properties: Map::new(),
        service_list: services.iter().map(|name| service(name)).collect(),
        device_list: children,
    }
}

/// A ZonePlayer-like tree: root with AlarmClock, a MediaRenderer with two
/// services and a MediaServer with one.
pub fn zoneplayer() -> DeviceDescription {
    let mut properties = Map::new();
    properties.insert("specVersion".to_string(), json!({ "major": 1, "minor": 0 }));
    DeviceDescription {
        properties,
        device: device(
            "RINCON_1",
            &["AlarmClock"],
            vec![
                device("RINCON_1_MR", &["RenderingControl", "AVTransport"], vec![]),
                device("RINCON_1_MS", &["ContentDirectory"], vec![]),
            ],
        ),
    }
}

/// Configurable [`DeviceClient`] that counts calls.
pub struct MockClient {
    pub calls: Arc<Calls>,
    pub description: DeviceDescription,
    pub unreachable: bool,
    pub failing_definition: Option<String>,
    pub failing_listener: bool,
    pub failing_open: bool,
    pub failing_close: bool,
    pub close_delay: Duration,
    /// Sent on the notice channel right after a successful open
    pub notices: Vec<Notice>,
}

impl MockClient {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(Calls::default()),
            description: zoneplayer(),
            unreachable: false,
            failing_definition: None,
            failing_listener: false,
            failing_open: false,
            failing_close: false,
            close_delay: Duration::ZERO,
            notices: Vec::new(),
        }
    }
}

pub struct MockListener {
    calls: Arc<Calls>,
    failing: bool,
}

#[async_trait]
impl EventListener for MockListener {
    async fn start(&mut self, notices: NoticeSender) -> Result<String, Error> {
        bump(&self.calls.listener_starts);
        if self.failing {
            return Err(Error::Listener("no available port in range 3400-3500".to_string()));
        }
        let _ = notices.send(Notice::ListenerError("stray NOTIFY".to_string()));
        Ok("http://127.0.0.1:3400".to_string())
    }

    async fn stop(&mut self) {
        bump(&self.calls.listener_stops);
    }
}

#[async_trait]
impl DeviceClient for MockClient {
    type Listener = MockListener;

    fn address(&self) -> &str {
        ADDRESS
    }

    async fn device_description(&mut self) -> Result<DeviceDescription, Error> {
        bump(&self.calls.descriptions);
        if self.unreachable {
            return Err(Error::DeviceUnreachable(format!(
                "http://{ADDRESS}:1400/xml/device_description.xml: operation timed out"
            )));
        }
        Ok(self.description.clone())
    }

    async fn service_definition(&mut self, url: &str) -> Result<Value, Error> {
        self.calls.definitions.lock().unwrap().push(url.to_string());
        if self.failing_definition.as_deref() == Some(url) {
            return Err(Error::Protocol(format!("http://{ADDRESS}:1400{url}: HTTP status 404")));
        }
        Ok(json!({ "actionList": [ { "name": url } ] }))
    }

    fn listener(&self) -> MockListener {
        MockListener {
            calls: self.calls.clone(),
            failing: self.failing_listener,
        }
    }

    async fn open(&mut self, _listener: &mut MockListener, notices: NoticeSender) -> Result<(), Error> {
        bump(&self.calls.opens);
        if self.failing_open {
            return Err(Error::Protocol("subscribe failed: HTTP 503".to_string()));
        }
        for notice in self.notices.drain(..) {
            let _ = notices.send(notice);
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<(), Error> {
        bump(&self.calls.closes);
        if !self.close_delay.is_zero() {
            tokio::time::sleep(self.close_delay).await;
        }
        if self.failing_close {
            return Err(Error::Close("unsubscribe failed: HTTP 412".to_string()));
        }
        Ok(())
    }
}

/// Signal source releasing scripted signals.
#[derive(Default)]
pub struct ScriptedSignals {
    pub calls: Arc<Calls>,
    /// Released as soon as handlers are installed
    pub immediate: Vec<Signal>,
    /// Released after the given delay
    pub delayed: Vec<(Duration, Signal)>,
}

impl ScriptedSignals {
    pub fn new(calls: Arc<Calls>) -> Self {
        Self {
            calls,
            immediate: Vec::new(),
            delayed: Vec::new(),
        }
    }
}

impl SignalSource for ScriptedSignals {
    fn install(&mut self, trigger: ShutdownTrigger) -> std::io::Result<()> {
        bump(&self.calls.signal_installs);
        for signal in self.immediate.drain(..) {
            trigger.release(signal);
        }
        for (delay, signal) in self.delayed.drain(..) {
            let trigger = trigger.clone();
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                trigger.release(signal);
            });
        }
        Ok(())
    }
}
