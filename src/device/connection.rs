use std::convert::Infallible;
use std::time::Duration;
use iced::subscription::{self, Subscription};
use futures::{future, SinkExt, StreamExt};
use futures::channel::mpsc::Sender;
use log::{debug, info, warn};
use tokio_util::sync::CancellationToken;
use tokio::time::{interval, sleep, MissedTickBehavior};

use crate::config::types::Config;
use crate::device::constants::IS_CONNECTED_DEADLINE;
use crate::device::link::{BtleLink, GattTarget, NotificationStream, StepLink};
use crate::device::payload::{decode_step_payload, PayloadEncoding};
use crate::device::types::{DeviceEvent, DeviceState};
use crate::error::DeviceError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    pub device_name: String,
    pub target: GattTarget,
    pub encoding: PayloadEncoding,
    pub scan_interval: Duration,
    pub connection_check_interval: Duration,
}

impl From<&Config> for SessionOptions {
    fn from(config: &Config) -> Self {
        SessionOptions {
            device_name: config.device_name.clone(),
            target: GattTarget {
                service: config.service_uuid,
                characteristic: config.step_characteristic_uuid,
            },
            encoding: config.payload_encoding,
            // both are used as timer periods, which must be non-zero
            scan_interval: Duration::from_millis(config.scan_interval_ms.max(1)),
            connection_check_interval: Duration::from_millis(config.connection_check_interval_ms.max(1)),
        }
    }
}

// Fans events out to every listener, skipping repeated state changes.
struct Reporter {
    senders: Vec<Sender<DeviceEvent>>,
    previous_state: Option<DeviceState>,
}

impl Reporter {
    async fn send(&mut self, event: DeviceEvent) {
        for sender in &mut self.senders {
            if let Err(err) = sender.send(event.clone()).await {
                debug!("Device event listener went away: {}", err);
            }
        }
    }

    async fn state(&mut self, state: DeviceState) {
        if self.previous_state.as_ref() == Some(&state) {
            return;
        }

        info!("Device state: {}", state);
        self.previous_state = Some(state.clone());
        self.send(DeviceEvent::StateChange(state)).await;
    }
}

async fn search<L: StepLink>(link: &L, options: &SessionOptions) -> Result<L::Device, DeviceError> {
    loop {
        if let Some(device) = link.find_device(&options.device_name).await? {
            return Ok(device);
        }

        debug!("No peripherals matched");
        sleep(options.scan_interval).await;
    }
}

// Returns once the connection is considered lost.
async fn monitor<L: StepLink>(
    link: &L,
    device: &L::Device,
    notifications: &mut NotificationStream,
    options: &SessionOptions,
    reporter: &mut Reporter,
) {
    let mut check = interval(options.connection_check_interval);
    check.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;

            value = notifications.next() => match value {
                Some(value) => match decode_step_payload(options.encoding, &value) {
                    Ok(steps) => {
                        info!("Received step data: {}", steps);
                        reporter.send(DeviceEvent::Steps(steps)).await;
                    },
                    Err(err) => warn!("Failed to decode step data: {}", err),
                },
                None => {
                    warn!("Notification stream ended");
                    return;
                },
            },
            _ = check.tick() => {
                tokio::select! {
                    _ = sleep(Duration::from_millis(IS_CONNECTED_DEADLINE)) => {
                        warn!("Checking for connection status took too long");
                        return;
                    }
                    result = link.is_connected(device) => match result {
                        Err(err) => {
                            warn!("Error checking for connection state: {:?}", err);
                            return;
                        },
                        Ok(false) => {
                            warn!("Connection lost");
                            return;
                        },
                        Ok(true) => {},
                    }
                }
            },
        }
    }
}

// `connected` holds the device while a connection to it may be open.
async fn drive<L: StepLink>(
    link: &L,
    options: &SessionOptions,
    reporter: &mut Reporter,
    connected: &mut Option<L::Device>,
) {
    reporter.state(DeviceState::Searching).await;

    let device = match search(link, options).await {
        Ok(device) => device,
        Err(err) => {
            warn!("Searching for devices failed: {:?}", err);
            reporter.state(DeviceState::SearchFailed { no_permission: err.is_permission_denied() }).await;
            return;
        },
    };

    link.stop_scan().await;
    reporter.state(DeviceState::Connecting).await;

    let device_id = link.device_id(&device);
    *connected = Some(device.clone());
    let mut notifications = match link.connect(&device, &options.target).await {
        Ok(notifications) => notifications,
        Err(err) => {
            warn!("Connecting to peripheral failed: {:?}", err);
            link.disconnect(&device).await;
            *connected = None;
            reporter.state(DeviceState::ConnectionFailed).await;
            return;
        },
    };
    reporter.state(DeviceState::Connected { device_id: device_id.clone() }).await;

    loop {
        monitor(link, &device, &mut notifications, options, reporter).await;

        reporter.state(DeviceState::Disconnected).await;
        reporter.state(DeviceState::Reconnecting).await;

        notifications = match link.connect(&device, &options.target).await {
            Ok(notifications) => notifications,
            Err(err) => {
                warn!("Reconnection failed: {:?}", err);
                link.disconnect(&device).await;
                *connected = None;
                reporter.state(DeviceState::ReconnectionFailed).await;
                return;
            },
        };
        reporter.state(DeviceState::Connected { device_id: device_id.clone() }).await;
    }
}

/// Searches for, connects to and monitors the step peripheral until the session fails for good
/// or `cancel` is cancelled.
pub async fn run_session<L: StepLink>(
    link: &L,
    options: &SessionOptions,
    cancel: CancellationToken,
    senders: Vec<Sender<DeviceEvent>>,
) {
    let mut reporter = Reporter { senders, previous_state: None };
    let mut connected = None;

    tokio::select! {
        _ = cancel.cancelled() => {
            info!("Device session cancelled");
        },
        _ = drive(link, options, &mut reporter, &mut connected) => {
            info!("Device session ended");
        },
    }

    if let Some(device) = connected {
        link.disconnect(&device).await;
    }
}

async fn connect_device(options: SessionOptions, cancel: CancellationToken, senders: Vec<Sender<DeviceEvent>>) -> Infallible {
    connect_device_task(options, cancel, senders).await;

    // subscription::channel expects the future to never resolve (Infallible)
    future::pending().await
}

pub fn connect_device_subscription(options: SessionOptions, cancel: CancellationToken, senders: Vec<Sender<DeviceEvent>>) -> Subscription<DeviceEvent> {
    struct Connect;

    subscription::channel(
        std::any::TypeId::of::<Connect>(),
        64,
        move |subscription_sender| {
            let mut senders2 = senders.clone();
            senders2.push(subscription_sender);

            async move {
                connect_device(options, cancel, senders2).await
            }
        },
    )
}

/// Runs a session against the platform bluetooth stack.
pub async fn connect_device_task(options: SessionOptions, cancel: CancellationToken, mut senders: Vec<Sender<DeviceEvent>>) {
    match BtleLink::new().await {
        Ok(link) => run_session(&link, &options, cancel, senders).await,
        Err(err) => {
            warn!("Failed to initialize bluetooth: {:?}", err);
            let state = DeviceState::SearchFailed { no_permission: err.is_permission_denied() };
            for sender in &mut senders {
                let _ = sender.send(DeviceEvent::StateChange(state.clone())).await;
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use futures::channel::mpsc::channel;
    use futures::future::BoxFuture;
    use futures::{stream, FutureExt};
    use uuid::Uuid;

    use super::*;
    use crate::device::payload::StepCount;

    enum ConnectScript {
        Fail,
        // notified values, then either the stream ends or stays open
        Notify { values: Vec<&'static str>, hold_open: bool },
    }

    enum CheckScript {
        Connected(bool),
        Fail,
        // never answers
        Hang,
    }

    #[derive(Default)]
    struct MockLink {
        finds: Mutex<VecDeque<Result<Option<u32>, DeviceError>>>,
        connects: Mutex<VecDeque<ConnectScript>>,
        connection_checks: Mutex<VecDeque<CheckScript>>,
        stop_scan_calls: AtomicUsize,
        disconnect_calls: AtomicUsize,
    }

    impl MockLink {
        fn new(finds: Vec<Result<Option<u32>, DeviceError>>, connects: Vec<ConnectScript>) -> Self {
            MockLink {
                finds: Mutex::new(finds.into()),
                connects: Mutex::new(connects.into()),
                ..Default::default()
            }
        }
    }

    impl StepLink for MockLink {
        type Device = u32;

        fn find_device<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<Option<u32>, DeviceError>> {
            assert_eq!(name, "Step-Sense");
            let result = self.finds.lock().unwrap().pop_front().unwrap_or(Ok(None));
            future::ready(result).boxed()
        }

        fn stop_scan(&self) -> BoxFuture<'_, ()> {
            self.stop_scan_calls.fetch_add(1, Ordering::SeqCst);
            future::ready(()).boxed()
        }

        fn device_id(&self, device: &u32) -> String {
            format!("device-{}", device)
        }

        fn connect<'a>(&'a self, _device: &'a u32, _target: &'a GattTarget) -> BoxFuture<'a, Result<NotificationStream, DeviceError>> {
            let script = self.connects.lock().unwrap().pop_front().unwrap_or(ConnectScript::Fail);
            let result = match script {
                ConnectScript::Fail => Err(DeviceError::Btle { source: btleplug::Error::NotConnected }),
                ConnectScript::Notify { values, hold_open } => {
                    let values = stream::iter(values.into_iter().map(|value| value.as_bytes().to_vec()));
                    if hold_open {
                        Ok(values.chain(stream::pending()).boxed())
                    } else {
                        Ok(values.boxed())
                    }
                },
            };
            future::ready(result).boxed()
        }

        fn is_connected<'a>(&'a self, _device: &'a u32) -> BoxFuture<'a, Result<bool, DeviceError>> {
            let script = self.connection_checks.lock().unwrap().pop_front().unwrap_or(CheckScript::Connected(true));
            match script {
                CheckScript::Connected(connected) => future::ready(Ok(connected)).boxed(),
                CheckScript::Fail => future::ready(Err(DeviceError::Btle { source: btleplug::Error::DeviceNotFound })).boxed(),
                CheckScript::Hang => future::pending().boxed(),
            }
        }

        fn disconnect<'a>(&'a self, _device: &'a u32) -> BoxFuture<'a, ()> {
            self.disconnect_calls.fetch_add(1, Ordering::SeqCst);
            future::ready(()).boxed()
        }
    }

    fn options() -> SessionOptions {
        SessionOptions {
            device_name: "Step-Sense".to_string(),
            target: GattTarget { service: Uuid::nil(), characteristic: Uuid::nil() },
            encoding: PayloadEncoding::Base64,
            scan_interval: Duration::from_millis(1),
            connection_check_interval: Duration::from_millis(5),
        }
    }

    async fn run_to_end(link: &MockLink) -> Vec<DeviceEvent> {
        let (sender, receiver) = channel(64);
        let options = options();
        let (_, events) = futures::join!(
            run_session(link, &options, CancellationToken::new(), vec![sender]),
            receiver.collect::<Vec<_>>(),
        );
        events
    }

    fn state(state: DeviceState) -> DeviceEvent {
        DeviceEvent::StateChange(state)
    }

    fn steps(value: &str) -> DeviceEvent {
        DeviceEvent::Steps(StepCount::new(value))
    }

    fn connected() -> DeviceEvent {
        state(DeviceState::Connected { device_id: "device-7".to_string() })
    }

    #[tokio::test]
    async fn reports_steps_then_fails_to_reconnect() {
        let link = MockLink::new(
            vec![Ok(None), Ok(None), Ok(Some(7))],
            vec![ConnectScript::Notify { values: vec!["MTI=", "MTM="], hold_open: false }],
        );

        let events = run_to_end(&link).await;

        assert_eq!(events, vec![
            state(DeviceState::Searching),
            state(DeviceState::Connecting),
            connected(),
            steps("12"),
            steps("13"),
            state(DeviceState::Disconnected),
            state(DeviceState::Reconnecting),
            state(DeviceState::ReconnectionFailed),
        ]);
        assert_eq!(link.stop_scan_calls.load(Ordering::SeqCst), 1);
        assert_eq!(link.disconnect_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn every_disconnect_gets_one_reconnect_attempt() {
        let link = MockLink::new(
            vec![Ok(Some(7))],
            vec![
                ConnectScript::Notify { values: vec!["MTI="], hold_open: false },
                ConnectScript::Notify { values: vec!["MTQ="], hold_open: false },
            ],
        );

        let events = run_to_end(&link).await;

        assert_eq!(events, vec![
            state(DeviceState::Searching),
            state(DeviceState::Connecting),
            connected(),
            steps("12"),
            state(DeviceState::Disconnected),
            state(DeviceState::Reconnecting),
            connected(),
            steps("14"),
            state(DeviceState::Disconnected),
            state(DeviceState::Reconnecting),
            state(DeviceState::ReconnectionFailed),
        ]);
    }

    #[tokio::test]
    async fn search_error_stops_the_session() {
        let link = MockLink::new(
            vec![Err(DeviceError::Btle { source: btleplug::Error::PermissionDenied })],
            vec![],
        );

        let events = run_to_end(&link).await;

        assert_eq!(events, vec![
            state(DeviceState::Searching),
            state(DeviceState::SearchFailed { no_permission: true }),
        ]);
        assert_eq!(link.stop_scan_calls.load(Ordering::SeqCst), 0);
        assert_eq!(link.disconnect_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn connection_error_stops_the_session() {
        let link = MockLink::new(vec![Ok(Some(7))], vec![ConnectScript::Fail]);

        let events = run_to_end(&link).await;

        assert_eq!(events, vec![
            state(DeviceState::Searching),
            state(DeviceState::Connecting),
            state(DeviceState::ConnectionFailed),
        ]);
        assert_eq!(link.disconnect_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn undecodable_payloads_are_skipped() {
        let link = MockLink::new(
            vec![Ok(Some(7))],
            vec![ConnectScript::Notify { values: vec!["!!!", "NDI="], hold_open: false }],
        );

        let events = run_to_end(&link).await;

        assert_eq!(&events[2..5], &[
            connected(),
            steps("42"),
            state(DeviceState::Disconnected),
        ]);
    }

    #[tokio::test]
    async fn failed_connection_check_counts_as_disconnect() {
        let link = MockLink::new(
            vec![Ok(Some(7))],
            vec![ConnectScript::Notify { values: vec!["NQ=="], hold_open: true }],
        );
        link.connection_checks.lock().unwrap().extend([CheckScript::Connected(true), CheckScript::Connected(false)]);

        let events = run_to_end(&link).await;

        assert_eq!(events, vec![
            state(DeviceState::Searching),
            state(DeviceState::Connecting),
            connected(),
            steps("5"),
            state(DeviceState::Disconnected),
            state(DeviceState::Reconnecting),
            state(DeviceState::ReconnectionFailed),
        ]);
    }

    fn lost_connection() -> Vec<DeviceEvent> {
        vec![
            state(DeviceState::Searching),
            state(DeviceState::Connecting),
            connected(),
            state(DeviceState::Disconnected),
            state(DeviceState::Reconnecting),
            state(DeviceState::ReconnectionFailed),
        ]
    }

    #[tokio::test]
    async fn connection_check_error_counts_as_disconnect() {
        let link = MockLink::new(
            vec![Ok(Some(7))],
            vec![ConnectScript::Notify { values: vec![], hold_open: true }],
        );
        link.connection_checks.lock().unwrap().push_back(CheckScript::Fail);

        assert_eq!(run_to_end(&link).await, lost_connection());
    }

    #[tokio::test]
    async fn slow_connection_check_counts_as_disconnect() {
        tokio::time::pause();

        let link = MockLink::new(
            vec![Ok(Some(7))],
            vec![ConnectScript::Notify { values: vec![], hold_open: true }],
        );
        link.connection_checks.lock().unwrap().push_back(CheckScript::Hang);

        assert_eq!(run_to_end(&link).await, lost_connection());
    }

    #[tokio::test]
    async fn zero_check_interval_from_config_still_monitors() {
        let config: Config = serde_json::from_str(r#"{ "connectionCheckIntervalMs": 0, "scanIntervalMs": 0 }"#).unwrap();
        let options = SessionOptions::from(&config);
        assert!(!options.connection_check_interval.is_zero());
        assert!(!options.scan_interval.is_zero());

        let link = MockLink::new(
            vec![Ok(None), Ok(Some(7))],
            vec![ConnectScript::Notify { values: vec!["MTI="], hold_open: true }],
        );
        link.connection_checks.lock().unwrap().extend([CheckScript::Connected(true), CheckScript::Connected(false)]);
        let (sender, receiver) = channel(64);

        let (_, events) = futures::join!(
            run_session(&link, &options, CancellationToken::new(), vec![sender]),
            receiver.collect::<Vec<_>>(),
        );

        assert_eq!(events, vec![
            state(DeviceState::Searching),
            state(DeviceState::Connecting),
            connected(),
            steps("12"),
            state(DeviceState::Disconnected),
            state(DeviceState::Reconnecting),
            state(DeviceState::ReconnectionFailed),
        ]);
    }

    #[tokio::test]
    async fn cancel_stops_a_connected_session() {
        let link = Arc::new(MockLink::new(
            vec![Ok(Some(7))],
            vec![ConnectScript::Notify { values: vec![], hold_open: true }],
        ));
        let cancel = CancellationToken::new();
        let (sender, mut receiver) = channel(64);

        let session = tokio::spawn({
            let link = link.clone();
            let cancel = cancel.clone();
            async move {
                run_session(&*link, &options(), cancel, vec![sender]).await;
            }
        });

        while let Some(event) = receiver.next().await {
            if event == connected() {
                break;
            }
        }
        cancel.cancel();

        session.await.unwrap();
        assert_eq!(receiver.collect::<Vec<_>>().await, Vec::<DeviceEvent>::new());
        // the open connection is closed on the way out
        assert_eq!(link.disconnect_calls.load(Ordering::SeqCst), 1);
    }
}
