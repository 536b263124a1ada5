//! Orchestrator scenarios against mock collaborators.

mod helpers;

use helpers::{Calls, MockClient, ScriptedSignals, ADDRESS};
use serde_json::{json, Value};
use std::time::Duration;
use zpinfo::{Error, EventRecord, MonitorConfig, Notice, Options, Orchestrator, Signal, State};

fn options(args: &[&str]) -> Options {
    let args = std::iter::once("zpinfo")
        .chain(args.iter().copied())
        .chain(std::iter::once(ADDRESS));
    Options::try_parse_from(args).unwrap()
}

async fn run(
    args: &[&str],
    client: MockClient,
    signals: ScriptedSignals,
    monitor: MonitorConfig,
) -> (Result<(), Error>, String, State) {
    let mut orchestrator = Orchestrator::new(options(args), monitor, client, signals);
    let mut out = Vec::new();
    let result = tokio::time::timeout(Duration::from_secs(10), orchestrator.run(&mut out))
        .await
        .expect("orchestrator finished");
    (result, String::from_utf8(out).unwrap(), orchestrator.state())
}

#[tokio::test]
async fn test_query_prints_pretty_description() {
    let client = MockClient::new();
    let calls = client.calls.clone();
    let signals = ScriptedSignals::new(calls.clone());

    let (result, out, state) = run(&[], client, signals, MonitorConfig::default()).await;

    result.unwrap();
    assert_eq!(state, State::Terminated);
    assert_eq!(Calls::count(&calls.descriptions), 1);
    assert!(calls.definitions().is_empty());
    assert_eq!(Calls::count(&calls.listener_starts), 0);
    assert_eq!(Calls::count(&calls.signal_installs), 0);

    assert!(out.starts_with("{\n  \"specVersion\""));
    assert!(out.ends_with("}\n"));
    let value: Value = serde_json::from_str(&out).unwrap();
    assert_eq!(value["device"]["udn"], "uuid:RINCON_1");
    assert!(value["device"]["serviceList"][0].get("scpd").is_none());
}

#[tokio::test]
async fn test_query_compact_output() {
    let client = MockClient::new();
    let signals = ScriptedSignals::new(client.calls.clone());

    let (result, out, _) = run(&["-n"], client, signals, MonitorConfig::default()).await;

    result.unwrap();
    assert_eq!(out.lines().count(), 1);
    assert!(!out.contains("\": "));
    assert!(out.starts_with(r#"{"specVersion":{"major":1,"minor":0},"device":"#));
}

#[tokio::test]
async fn test_query_with_scdp_fetches_each_service_once() {
    let client = MockClient::new();
    let calls = client.calls.clone();
    let signals = ScriptedSignals::new(calls.clone());

    let (result, out, _) = run(&["-S"], client, signals, MonitorConfig::default()).await;

    result.unwrap();
    assert_eq!(Calls::count(&calls.descriptions), 1);
    assert_eq!(
        calls.definitions(),
        vec![
            "/xml/AlarmClock1.xml",
            "/xml/RenderingControl1.xml",
            "/xml/AVTransport1.xml",
            "/xml/ContentDirectory1.xml",
        ]
    );

    let value: Value = serde_json::from_str(&out).unwrap();
    assert_eq!(
        value["device"]["deviceList"][0]["serviceList"][1]["scpd"],
        json!({ "actionList": [ { "name": "/xml/AVTransport1.xml" } ] })
    );
}

#[tokio::test]
async fn test_unreachable_device_fails_before_anything_else() {
    let mut client = MockClient::new();
    client.unreachable = true;
    let calls = client.calls.clone();
    let signals = ScriptedSignals::new(calls.clone());

    let (result, out, state) = run(&["-d"], client, signals, MonitorConfig::default()).await;

    let error = result.unwrap_err();
    assert!(matches!(error, Error::DeviceUnreachable(_)));
    assert_eq!(error.exit_code(), 1);
    assert_eq!(state, State::Terminated);
    assert!(out.is_empty());
    assert_eq!(Calls::count(&calls.signal_installs), 0);
    assert_eq!(Calls::count(&calls.listener_starts), 0);
    assert_eq!(Calls::count(&calls.opens), 0);
}

#[tokio::test]
async fn test_enrichment_failure_prints_nothing() {
    let mut client = MockClient::new();
    client.failing_definition = Some("/xml/RenderingControl1.xml".to_string());
    let calls = client.calls.clone();
    let signals = ScriptedSignals::new(calls.clone());

    let (result, out, _) = run(&["--scdp"], client, signals, MonitorConfig::default()).await;

    assert!(matches!(result, Err(Error::Protocol(_))));
    assert!(out.is_empty());
    assert_eq!(
        calls.definitions(),
        vec!["/xml/AlarmClock1.xml", "/xml/RenderingControl1.xml"]
    );
}

#[tokio::test]
async fn test_monitor_two_signals_close_once() {
    let client = MockClient::new();
    let calls = client.calls.clone();
    let mut signals = ScriptedSignals::new(calls.clone());
    signals.immediate = vec![Signal::Interrupt, Signal::Terminate];

    let (result, out, state) = run(&["--daemon"], client, signals, MonitorConfig::default()).await;

    result.unwrap();
    assert_eq!(state, State::Terminated);
    assert!(out.is_empty());
    assert_eq!(Calls::count(&calls.descriptions), 1);
    assert_eq!(Calls::count(&calls.signal_installs), 1);
    assert_eq!(Calls::count(&calls.listener_starts), 1);
    assert_eq!(Calls::count(&calls.opens), 1);
    assert_eq!(Calls::count(&calls.closes), 1);
    assert_eq!(Calls::count(&calls.listener_stops), 1);
}

#[tokio::test]
async fn test_monitor_keeps_running_through_notices() {
    let mut client = MockClient::new();
    client.notices = vec![
        Notice::Event(EventRecord {
            device: "RINCON_1".to_string(),
            service: "AVTransport".to_string(),
            sequence: Some(0),
            payload: json!({ "Volume": 10 }),
        }),
        Notice::ClientError("renewal of /AVTransport/Event failed: HTTP 412".to_string()),
    ];
    let calls = client.calls.clone();
    let mut signals = ScriptedSignals::new(calls.clone());
    signals.delayed = vec![(Duration::from_millis(50), Signal::Terminate)];

    let (result, _, _) = run(&["-s"], client, signals, MonitorConfig::default()).await;

    result.unwrap();
    assert_eq!(Calls::count(&calls.opens), 1);
    assert_eq!(Calls::count(&calls.closes), 1);
}

#[tokio::test]
async fn test_signal_during_close_is_ignored() {
    let mut client = MockClient::new();
    client.close_delay = Duration::from_millis(200);
    let calls = client.calls.clone();
    let mut signals = ScriptedSignals::new(calls.clone());
    signals.immediate = vec![Signal::Interrupt];
    signals.delayed = vec![
        (Duration::from_millis(20), Signal::Terminate),
        (Duration::from_millis(40), Signal::Interrupt),
    ];

    let (result, _, state) = run(&["-d"], client, signals, MonitorConfig::default()).await;

    result.unwrap();
    assert_eq!(state, State::Terminated);
    assert_eq!(Calls::count(&calls.closes), 1);
    assert_eq!(Calls::count(&calls.listener_stops), 1);
}

#[tokio::test]
async fn test_close_failure_is_fatal() {
    let mut client = MockClient::new();
    client.failing_close = true;
    let calls = client.calls.clone();
    let mut signals = ScriptedSignals::new(calls.clone());
    signals.immediate = vec![Signal::Terminate];

    let (result, _, state) = run(&["-d"], client, signals, MonitorConfig::default()).await;

    let error = result.unwrap_err();
    assert!(matches!(error, Error::Close(_)));
    assert_eq!(error.exit_code(), 1);
    assert_eq!(state, State::Terminated);
    assert_eq!(Calls::count(&calls.closes), 1);
    assert_eq!(Calls::count(&calls.listener_stops), 1);
}

#[tokio::test]
async fn test_close_timeout() {
    let mut client = MockClient::new();
    client.close_delay = Duration::from_secs(30);
    let calls = client.calls.clone();
    let mut signals = ScriptedSignals::new(calls.clone());
    signals.immediate = vec![Signal::Interrupt];
    let monitor = MonitorConfig {
        close_timeout: Some(Duration::from_millis(50)),
        ..MonitorConfig::default()
    };

    let (result, _, _) = run(&["-d"], client, signals, monitor).await;

    match result {
        Err(Error::Close(message)) => assert!(message.contains("no response")),
        other => panic!("expected close timeout, got {other:?}"),
    }
}

#[tokio::test]
async fn test_open_failure_stops_listener() {
    let mut client = MockClient::new();
    client.failing_open = true;
    let calls = client.calls.clone();
    let signals = ScriptedSignals::new(calls.clone());

    let (result, _, state) = run(&["-d"], client, signals, MonitorConfig::default()).await;

    assert!(matches!(result, Err(Error::Protocol(_))));
    assert_eq!(state, State::Terminated);
    assert_eq!(Calls::count(&calls.listener_starts), 1);
    assert_eq!(Calls::count(&calls.listener_stops), 1);
    assert_eq!(Calls::count(&calls.closes), 0);
}

#[tokio::test]
async fn test_listener_failure_prevents_subscription() {
    let mut client = MockClient::new();
    client.failing_listener = true;
    let calls = client.calls.clone();
    let signals = ScriptedSignals::new(calls.clone());

    let (result, _, _) = run(&["-s"], client, signals, MonitorConfig::default()).await;

    assert!(matches!(result, Err(Error::Listener(_))));
    assert_eq!(Calls::count(&calls.opens), 0);
}

#[tokio::test]
async fn test_shutdown_trigger_releases_monitor() {
    let client = MockClient::new();
    let calls = client.calls.clone();
    let signals = ScriptedSignals::new(calls.clone());
    let mut orchestrator =
        Orchestrator::new(options(&["-d"]), MonitorConfig::default(), client, signals);
    assert_eq!(orchestrator.state(), State::Starting);

    let trigger = orchestrator.shutdown_trigger();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.release(Signal::Terminate);
    });

    let mut out = Vec::new();
    tokio::time::timeout(Duration::from_secs(10), orchestrator.run(&mut out))
        .await
        .expect("orchestrator finished")
        .unwrap();
    assert_eq!(orchestrator.state(), State::Terminated);
    assert_eq!(Calls::count(&calls.closes), 1);
}

#[test]
fn test_timeout_zero_is_a_usage_error() {
    let error = Options::try_parse_from(["zpinfo", "-t", "0", ADDRESS]).unwrap_err();
    let error = Error::Usage(error);
    assert_eq!(error.exit_code(), 2);
}
