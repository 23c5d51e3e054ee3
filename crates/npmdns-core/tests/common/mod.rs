//! Test doubles and common utilities for contract tests
//!
//! The doubles are cheap to clone and share their state through `Arc`s, so a
//! test can hand one clone to the driver and keep another to inspect calls.

#![allow(dead_code)]

use async_trait::async_trait;
use npmdns_core::error::Result;
use npmdns_core::{
    CycleDriver, DnsProvider, DnsProviderFactory, DnsRecord, DomainIpMap, DomainSet, Error,
    HostSource, IpSource, MemoryStateStore, ReconcileConfig, Reconciler, RecordSettings,
    StateSnapshot, StateStore, ZoneConfig,
};
use std::collections::{BTreeMap, HashSet};
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const IP_A: Ipv4Addr = Ipv4Addr::new(1, 1, 1, 1);
pub const IP_B: Ipv4Addr = Ipv4Addr::new(2, 2, 2, 2);

/// One provider call as observed by [`FakeZone`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Find(String),
    Create(String, Ipv4Addr),
    Update(String, Ipv4Addr),
    Delete(String),
}

impl Call {
    pub fn is_write(&self) -> bool {
        !matches!(self, Call::Find(_))
    }

    pub fn domain(&self) -> &str {
        match self {
            Call::Find(d) | Call::Create(d, _) | Call::Update(d, _) | Call::Delete(d) => d,
        }
    }
}

#[derive(Debug, Default)]
struct ZoneState {
    /// record id → record
    records: BTreeMap<String, DnsRecord>,
    next_id: usize,
    calls: Vec<Call>,
    /// Writes touching these names fail with a simulated 500
    failing: HashSet<String>,
}

/// In-memory stand-in for the provider side of every configured zone
#[derive(Debug, Clone, Default)]
pub struct FakeZone {
    inner: Arc<Mutex<ZoneState>>,
}

impl FakeZone {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate an A-record, returning its id
    pub fn seed(&self, name: &str, ip: Ipv4Addr) -> String {
        let mut state = self.inner.lock().unwrap();
        insert_record(&mut state, name, ip).id
    }

    /// Make every write for `name` fail until [`FakeZone::heal`] is called
    pub fn fail_writes_for(&self, name: &str) {
        self.inner.lock().unwrap().failing.insert(name.to_string());
    }

    pub fn heal(&self, name: &str) {
        self.inner.lock().unwrap().failing.remove(name);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.inner.lock().unwrap().calls.clone()
    }

    pub fn writes(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_write).collect()
    }

    pub fn calls_for(&self, name: &str) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| c.domain() == name)
            .collect()
    }

    pub fn clear_calls(&self) {
        self.inner.lock().unwrap().calls.clear();
    }

    /// Contents of every A-record named `name`
    pub fn addresses(&self, name: &str) -> Vec<String> {
        self.inner
            .lock()
            .unwrap()
            .records
            .values()
            .filter(|r| r.name == name)
            .map(|r| r.content.clone())
            .collect()
    }
}

fn insert_record(state: &mut ZoneState, name: &str, ip: Ipv4Addr) -> DnsRecord {
    state.next_id += 1;
    let record = DnsRecord {
        id: format!("rec-{}", state.next_id),
        name: name.to_string(),
        content: ip.to_string(),
        ttl: Some(3600),
        proxied: Some(true),
    };
    state.records.insert(record.id.clone(), record.clone());
    record
}

fn simulated_500(name: &str) -> Error {
    Error::provider("mock", format!("HTTP 500 for {}", name))
}

/// A DnsProvider backed by a [`FakeZone`]
pub struct MockDnsProvider {
    zone: FakeZone,
}

#[async_trait]
impl DnsProvider for MockDnsProvider {
    async fn find_a_records(&self, name: &str) -> Result<Vec<DnsRecord>> {
        let mut state = self.zone.inner.lock().unwrap();
        state.calls.push(Call::Find(name.to_string()));
        Ok(state
            .records
            .values()
            .filter(|r| r.name == name)
            .cloned()
            .collect())
    }

    async fn create_a_record(&self, name: &str, ip: Ipv4Addr) -> Result<DnsRecord> {
        let mut state = self.zone.inner.lock().unwrap();
        state.calls.push(Call::Create(name.to_string(), ip));
        if state.failing.contains(name) {
            return Err(simulated_500(name));
        }
        Ok(insert_record(&mut state, name, ip))
    }

    async fn update_a_record(&self, record_id: &str, name: &str, ip: Ipv4Addr) -> Result<DnsRecord> {
        let mut state = self.zone.inner.lock().unwrap();
        state.calls.push(Call::Update(name.to_string(), ip));
        if state.failing.contains(name) {
            return Err(simulated_500(name));
        }
        let record = state
            .records
            .get_mut(record_id)
            .ok_or_else(|| Error::not_found(record_id))?;
        record.content = ip.to_string();
        Ok(record.clone())
    }

    async fn delete_record(&self, record_id: &str) -> Result<()> {
        let mut state = self.zone.inner.lock().unwrap();
        let name = state
            .records
            .get(record_id)
            .map(|r| r.name.clone())
            .ok_or_else(|| Error::not_found(record_id))?;
        state.calls.push(Call::Delete(name.clone()));
        if state.failing.contains(&name) {
            return Err(simulated_500(&name));
        }
        state.records.remove(record_id);
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

/// Factory handing out providers that all share one [`FakeZone`]
pub struct MockProviderFactory {
    zone: FakeZone,
    created: Arc<Mutex<Vec<String>>>,
}

impl MockProviderFactory {
    pub fn new(zone: FakeZone) -> Self {
        Self {
            zone,
            created: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Zone IDs a provider was created for
    pub fn created_for(&self) -> Vec<String> {
        self.created.lock().unwrap().clone()
    }
}

impl DnsProviderFactory for MockProviderFactory {
    fn create(&self, zone: &ZoneConfig, _settings: &RecordSettings) -> Result<Box<dyn DnsProvider>> {
        self.created.lock().unwrap().push(zone.zone_id.clone());
        Ok(Box::new(MockDnsProvider {
            zone: self.zone.clone(),
        }))
    }
}

/// An IpSource returning a settable address, or failing on demand
#[derive(Clone)]
pub struct StaticIpSource {
    ip: Arc<Mutex<Ipv4Addr>>,
    failing: Arc<AtomicBool>,
    calls: Arc<AtomicUsize>,
}

impl StaticIpSource {
    pub fn new(ip: Ipv4Addr) -> Self {
        Self {
            ip: Arc::new(Mutex::new(ip)),
            failing: Arc::new(AtomicBool::new(false)),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn set(&self, ip: Ipv4Addr) {
        *self.ip.lock().unwrap() = ip;
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IpSource for StaticIpSource {
    async fn current(&self) -> Result<Ipv4Addr> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::ip_source("service unreachable"));
        }
        Ok(*self.ip.lock().unwrap())
    }

    fn source_name(&self) -> &'static str {
        "static"
    }
}

/// A HostSource returning a settable domain set
#[derive(Clone)]
pub struct StaticHostSource {
    domains: Arc<Mutex<DomainSet>>,
    reject_login: Arc<AtomicBool>,
    fail_listing: Arc<AtomicBool>,
}

impl StaticHostSource {
    pub fn new(domains: &[&str]) -> Self {
        Self {
            domains: Arc::new(Mutex::new(set(domains))),
            reject_login: Arc::new(AtomicBool::new(false)),
            fail_listing: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn set(&self, domains: &[&str]) {
        *self.domains.lock().unwrap() = set(domains);
    }

    pub fn reject_login(&self, reject: bool) {
        self.reject_login.store(reject, Ordering::SeqCst);
    }

    pub fn fail_listing(&self, fail: bool) {
        self.fail_listing.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl HostSource for StaticHostSource {
    async fn authenticate(&self) -> Result<String> {
        if self.reject_login.load(Ordering::SeqCst) {
            return Err(Error::auth("invalid credentials"));
        }
        Ok("test-token".to_string())
    }

    async fn list_domains(&self, token: &str) -> Result<DomainSet> {
        assert_eq!(token, "test-token");
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(Error::host_source("HTTP 502"));
        }
        Ok(self.domains.lock().unwrap().clone())
    }

    fn source_name(&self) -> &'static str {
        "static"
    }
}

/// A StateStore wrapper counting saves
#[derive(Clone, Default)]
pub struct CountingStateStore {
    inner: MemoryStateStore,
    saves: Arc<AtomicUsize>,
}

impl CountingStateStore {
    pub fn with_snapshot(snapshot: StateSnapshot) -> Self {
        Self {
            inner: MemoryStateStore::with_snapshot(snapshot),
            saves: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub async fn snapshot(&self) -> StateSnapshot {
        self.inner.snapshot().await
    }
}

#[async_trait]
impl StateStore for CountingStateStore {
    async fn load(&self) -> Result<StateSnapshot> {
        self.inner.load().await
    }

    async fn save(&self, snapshot: &StateSnapshot) -> Result<()> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.inner.save(snapshot).await
    }
}

pub fn set(items: &[&str]) -> DomainSet {
    items.iter().map(|s| s.to_string()).collect()
}

pub fn ledger(items: &[(&str, Ipv4Addr)]) -> DomainIpMap {
    items.iter().map(|(d, ip)| (d.to_string(), *ip)).collect()
}

/// Two root domains: `example.com` and `example.org`
pub fn zones() -> Vec<ZoneConfig> {
    vec![
        ZoneConfig::new("example.com", "token-com", "zone-com"),
        ZoneConfig::new("example.org", "token-org", "zone-org"),
    ]
}

pub fn reconciler(zone: &FakeZone) -> Reconciler {
    reconciler_with(zone, ReconcileConfig::default())
}

pub fn reconciler_with(zone: &FakeZone, config: ReconcileConfig) -> Reconciler {
    Reconciler::new(
        zones(),
        &RecordSettings::default(),
        config,
        &MockProviderFactory::new(zone.clone()),
    )
    .expect("reconciler construction succeeds")
}

/// Everything a cycle-level test needs, with handles kept for inspection
pub struct Harness {
    pub zone: FakeZone,
    pub ip: StaticIpSource,
    pub hosts: StaticHostSource,
    pub store: CountingStateStore,
    pub driver: CycleDriver,
}

impl Harness {
    pub fn new(domains: &[&str], ip: Ipv4Addr) -> Self {
        Self::with_state(domains, ip, StateSnapshot::default())
    }

    pub fn with_state(domains: &[&str], ip: Ipv4Addr, snapshot: StateSnapshot) -> Self {
        let zone = FakeZone::new();
        let ip = StaticIpSource::new(ip);
        let hosts = StaticHostSource::new(domains);
        let store = CountingStateStore::with_snapshot(snapshot);
        let driver = CycleDriver::new(
            Box::new(ip.clone()),
            Box::new(hosts.clone()),
            Box::new(store.clone()),
            reconciler(&zone),
        );

        Self {
            zone,
            ip,
            hosts,
            store,
            driver,
        }
    }
}
