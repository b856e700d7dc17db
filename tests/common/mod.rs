#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use gatt_console_lib::console::{Console, InputEvent, LineSource};
use gatt_console_lib::core::bluetooth::{
    Capabilities, CharacteristicInfo, DiscoveredDevice, LinkEvent, LinkEventSink, Notification,
    NotificationSink, ServiceInfo, Transport, TransportError,
};
use uuid::Uuid;

/// 16-bit Bluetooth SIG UUID expanded onto the base UUID
pub fn sig(short: u16) -> Uuid {
    Uuid::from_u128(((short as u128) << 96) | 0x0000_1000_8000_00805f9b34fb)
}

/// Two devices: an unnamed one at AA:BB and "Sensor" at CC:DD
pub fn two_devices() -> Vec<DiscoveredDevice> {
    vec![
        DiscoveredDevice::new("AA:BB", None),
        DiscoveredDevice::new("CC:DD", Some("Sensor".to_string())),
    ]
}

/// One service with 2A00 (read), 2A19 (notify) and 2A05 (write)
pub fn battery_service() -> Vec<ServiceInfo> {
    vec![ServiceInfo::new(
        sig(0x180f),
        vec![
            CharacteristicInfo::new(sig(0x2a00), Capabilities::READ),
            CharacteristicInfo::new(sig(0x2a19), Capabilities::NOTIFY),
            CharacteristicInfo::new(sig(0x2a05), Capabilities::WRITE),
        ],
    )]
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Discover,
    Connect(String),
    Enumerate,
    Read(Uuid),
    Write(Uuid, Vec<u8>),
    Subscribe(Uuid),
    Unsubscribe(Uuid),
    Disconnect(String),
}

pub struct MockConnection {
    pub address: String,
}

/// In-memory transport that records every call
#[derive(Default)]
pub struct MockTransport {
    scans: Mutex<VecDeque<Vec<DiscoveredDevice>>>,
    last_scan: Mutex<Vec<DiscoveredDevice>>,
    services: Vec<ServiceInfo>,
    values: HashMap<Uuid, Vec<u8>>,
    failing_connect: HashSet<String>,
    failing_unsubscribe: HashSet<Uuid>,
    failing_discovery: bool,
    failing_enumerate: bool,
    drop_link_on_read: bool,
    connected: AtomicBool,
    sinks: Mutex<HashMap<Uuid, NotificationSink>>,
    link_events: Mutex<Option<LinkEventSink>>,
    calls: Mutex<Vec<Call>>,
}

impl MockTransport {
    pub fn new(devices: Vec<DiscoveredDevice>, services: Vec<ServiceInfo>) -> Self {
        Self {
            last_scan: Mutex::new(devices),
            services,
            ..Default::default()
        }
    }

    /// Results returned by successive scans before falling back to the initial list
    pub fn with_scans(self, scans: Vec<Vec<DiscoveredDevice>>) -> Self {
        *self.scans.lock().unwrap() = scans.into();
        self
    }

    pub fn with_value(mut self, uuid: Uuid, value: &[u8]) -> Self {
        self.values.insert(uuid, value.to_vec());
        self
    }

    pub fn failing_connect(mut self, address: &str) -> Self {
        self.failing_connect.insert(address.to_string());
        self
    }

    pub fn failing_unsubscribe(mut self, uuid: Uuid) -> Self {
        self.failing_unsubscribe.insert(uuid);
        self
    }

    pub fn failing_discovery(mut self) -> Self {
        self.failing_discovery = true;
        self
    }

    pub fn failing_enumerate(mut self) -> Self {
        self.failing_enumerate = true;
        self
    }

    pub fn dropping_link_on_read(mut self) -> Self {
        self.drop_link_on_read = true;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, call: &Call) -> usize {
        self.calls().iter().filter(|c| *c == call).count()
    }

    /// Pushes a value as if the peripheral had notified it
    pub fn emit(&self, uuid: Uuid, value: &[u8]) -> bool {
        match self.sinks.lock().unwrap().get(&uuid) {
            Some(sink) => sink
                .send(Notification {
                    characteristic: uuid,
                    value: value.to_vec(),
                })
                .is_ok(),
            None => false,
        }
    }

    /// Drops the link as if the peripheral went away
    pub fn drop_link(&self) -> bool {
        self.connected.store(false, Ordering::SeqCst);
        self.report(LinkEvent::Disconnected)
    }

    /// Ends one notify stream from the peripheral side
    pub fn end_subscription(&self, uuid: Uuid) -> bool {
        self.sinks.lock().unwrap().remove(&uuid);
        self.report(LinkEvent::SubscriptionEnded(uuid))
    }

    fn report(&self, event: LinkEvent) -> bool {
        match self.link_events.lock().unwrap().as_ref() {
            Some(events) => events.send(event).is_ok(),
            None => false,
        }
    }

    pub fn active_registrations(&self) -> usize {
        self.sinks.lock().unwrap().len()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait::async_trait]
impl Transport for MockTransport {
    type Connection = MockConnection;

    async fn discover(&self, _duration: Duration) -> Result<Vec<DiscoveredDevice>, TransportError> {
        self.record(Call::Discover);
        if self.failing_discovery {
            return Err(TransportError::Discovery("radio off".to_string()));
        }
        if let Some(next) = self.scans.lock().unwrap().pop_front() {
            *self.last_scan.lock().unwrap() = next;
        }
        Ok(self.last_scan.lock().unwrap().clone())
    }

    async fn connect(
        &self,
        address: &str,
        timeout: Duration,
    ) -> Result<MockConnection, TransportError> {
        self.record(Call::Connect(address.to_string()));
        if self.failing_connect.contains(address) {
            return Err(TransportError::ConnectTimeout {
                address: address.to_string(),
                timeout,
            });
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(MockConnection {
            address: address.to_string(),
        })
    }

    async fn enumerate(&self, _conn: &MockConnection) -> Result<Vec<ServiceInfo>, TransportError> {
        self.record(Call::Enumerate);
        if self.failing_enumerate {
            return Err(TransportError::ServiceDiscovery("GATT database unavailable".to_string()));
        }
        Ok(self.services.clone())
    }

    async fn watch(
        &self,
        _conn: &MockConnection,
        events: LinkEventSink,
    ) -> Result<(), TransportError> {
        *self.link_events.lock().unwrap() = Some(events);
        Ok(())
    }

    async fn read(&self, _conn: &MockConnection, uuid: Uuid) -> Result<Vec<u8>, TransportError> {
        self.record(Call::Read(uuid));
        if self.drop_link_on_read {
            self.connected.store(false, Ordering::SeqCst);
            return Err(TransportError::Read {
                uuid,
                reason: "link lost".to_string(),
            });
        }
        Ok(self.values.get(&uuid).cloned().unwrap_or_default())
    }

    async fn write(
        &self,
        _conn: &MockConnection,
        uuid: Uuid,
        data: &[u8],
    ) -> Result<(), TransportError> {
        self.record(Call::Write(uuid, data.to_vec()));
        Ok(())
    }

    async fn subscribe(
        &self,
        _conn: &MockConnection,
        uuid: Uuid,
        sink: NotificationSink,
    ) -> Result<(), TransportError> {
        self.record(Call::Subscribe(uuid));
        self.sinks.lock().unwrap().insert(uuid, sink);
        Ok(())
    }

    async fn unsubscribe(&self, _conn: &MockConnection, uuid: Uuid) -> Result<(), TransportError> {
        self.record(Call::Unsubscribe(uuid));
        self.sinks.lock().unwrap().remove(&uuid);
        if self.failing_unsubscribe.contains(&uuid) {
            return Err(TransportError::Subscription {
                uuid,
                reason: "peripheral refused".to_string(),
            });
        }
        Ok(())
    }

    async fn disconnect(&self, conn: MockConnection) -> Result<(), TransportError> {
        self.record(Call::Disconnect(conn.address));
        self.connected.store(false, Ordering::SeqCst);
        self.link_events.lock().unwrap().take();
        Ok(())
    }

    async fn is_connected(&self, _conn: &MockConnection) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

/// Feeds prepared input; reports `Closed` once the script runs out
pub struct ScriptedInput {
    events: VecDeque<InputEvent>,
    pub prompts: Arc<Mutex<Vec<String>>>,
}

impl ScriptedInput {
    pub fn lines(lines: &[&str]) -> Self {
        Self::events(lines.iter().map(|l| InputEvent::Line(l.to_string())).collect())
    }

    pub fn events(events: Vec<InputEvent>) -> Self {
        Self {
            events: events.into(),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait::async_trait]
impl LineSource for ScriptedInput {
    async fn next_line(&mut self, prompt: &str) -> InputEvent {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.events.pop_front().unwrap_or(InputEvent::Closed)
    }
}

/// Console that keeps everything it was asked to print
#[derive(Default)]
pub struct RecordingConsole {
    lines: Mutex<Vec<String>>,
}

impl RecordingConsole {
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|line| line.contains(needle))
    }

    pub fn count(&self, needle: &str) -> usize {
        self.lines().iter().filter(|line| line.contains(needle)).count()
    }
}

impl Console for RecordingConsole {
    fn print(&self, line: &str) {
        self.lines.lock().unwrap().push(line.to_string());
    }

    fn interject(&self, line: &str) {
        self.lines.lock().unwrap().push(line.to_string());
    }
}
