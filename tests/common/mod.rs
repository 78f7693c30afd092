//! Shared test infrastructure for catalog-level integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use hickory_proto::op::{Message, MessageType, OpCode, Query, ResponseCode};
use hickory_proto::rr::{DNSClass, Name, RData, RecordType};
use hickory_proto::serialize::binary::{BinDecodable, BinDecoder, BinEncoder};
use hickory_server::authority::{MessageRequest, MessageResponse};
use hickory_server::proto::rr::Record;
use hickory_server::proto::xfer::Protocol;
use hickory_server::server::{Request, RequestHandler, ResponseHandler, ResponseInfo};

use geo_cdn_dns::config::{DnsConfig, SoaConfig};
use geo_cdn_dns::hostname::HostResolver;
use geo_cdn_dns::provider::GeoProvider;
use geo_cdn_dns::{
    CdnRequestHandler, Coordinate, CoordinateResolver, DnsError, GeoError, ReplicaSelector,
};

// --- Constants ---

pub const CDN_NAME: &str = "cdn.example.com";

pub const BOSTON: Coordinate = Coordinate::new(42.3601, -71.0589);
pub const NEW_YORK: Coordinate = Coordinate::new(40.7128, -74.0060);
pub const SEATTLE: Coordinate = Coordinate::new(47.6062, -122.3321);
pub const FRANKFURT: Coordinate = Coordinate::new(50.1109, 8.6821);
pub const TOKYO: Coordinate = Coordinate::new(35.6762, 139.6503);

// --- TestResponseHandler ---

/// Captures the serialized DNS response for inspection in tests.
///
/// Implements `ResponseHandler` so it can be passed to `Catalog::handle_request()`.
/// The response is serialized via `MessageResponse::destructive_emit()` and stored
/// as raw wire-format bytes, which can then be parsed with `Message::from_vec()`.
#[derive(Clone)]
pub struct TestResponseHandler {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl TestResponseHandler {
    pub fn new() -> Self {
        Self {
            buf: Arc::new(Mutex::new(Vec::with_capacity(512))),
        }
    }

    /// Parse the captured wire bytes into a `Message` for assertions.
    pub fn into_message(self) -> Message {
        let buf = self.buf.lock().unwrap();
        assert!(!buf.is_empty(), "no response was captured");
        Message::from_vec(&buf).expect("failed to parse captured DNS response")
    }
}

#[async_trait]
impl ResponseHandler for TestResponseHandler {
    async fn send_response<'a>(
        &mut self,
        response: MessageResponse<
            '_,
            'a,
            impl Iterator<Item = &'a Record> + Send + 'a,
            impl Iterator<Item = &'a Record> + Send + 'a,
            impl Iterator<Item = &'a Record> + Send + 'a,
            impl Iterator<Item = &'a Record> + Send + 'a,
        >,
    ) -> io::Result<ResponseInfo> {
        let mut buf = self.buf.lock().unwrap();
        buf.clear();
        let mut encoder = BinEncoder::new(&mut *buf);
        encoder.set_max_size(u16::MAX);
        let info = response
            .destructive_emit(&mut encoder)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        Ok(info)
    }
}

// --- Test doubles ---

/// Geolocation provider answering from a mutable table, counting calls.
#[derive(Default)]
pub struct TestGeoProvider {
    name: String,
    table: Mutex<HashMap<IpAddr, Coordinate>>,
    calls: AtomicUsize,
}

impl TestGeoProvider {
    pub fn named(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            ..Default::default()
        })
    }

    pub fn set(&self, ip: IpAddr, coord: Coordinate) {
        self.table.lock().unwrap().insert(ip, coord);
    }

    pub fn clear(&self) {
        self.table.lock().unwrap().clear();
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GeoProvider for TestGeoProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn locate(&self, ip: IpAddr) -> Result<Coordinate, GeoError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.table
            .lock()
            .unwrap()
            .get(&ip)
            .copied()
            .ok_or(GeoError::Status(429))
    }
}

/// Hostname resolver answering from a fixed table, counting calls.
#[derive(Default)]
pub struct TestHostResolver {
    table: HashMap<String, IpAddr>,
    calls: AtomicUsize,
}

impl TestHostResolver {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HostResolver for TestHostResolver {
    async fn resolve(&self, hostname: &str) -> Result<IpAddr, DnsError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.table
            .get(hostname)
            .copied()
            .ok_or_else(|| DnsError::HostResolution {
                hostname: hostname.to_string(),
                reason: "NXDOMAIN".to_string(),
            })
    }
}

// --- Selector builder ---

/// Builds a selector over in-memory replicas and providers.
///
/// Replica `n` (1-based) gets address `192.0.2.n`.
pub struct TestSelectorBuilder {
    hostnames: Vec<String>,
    hosts: HashMap<String, IpAddr>,
    providers: Vec<Arc<TestGeoProvider>>,
}

impl TestSelectorBuilder {
    /// Start with a primary and a fallback provider.
    pub fn new() -> Self {
        Self {
            hostnames: Vec::new(),
            hosts: HashMap::new(),
            providers: vec![TestGeoProvider::named("primary"), TestGeoProvider::named("fallback")],
        }
    }

    /// Add a replica whose location is known to the primary provider.
    pub fn add_replica(&mut self, hostname: &str, coord: Coordinate) -> IpAddr {
        let ip = self.add_unlocated_replica(hostname);
        self.primary().set(ip, coord);
        ip
    }

    /// Add a replica with an address but no known location.
    pub fn add_unlocated_replica(&mut self, hostname: &str) -> IpAddr {
        let n = self.hosts.len() as u8 + 1;
        let ip = IpAddr::V4(Ipv4Addr::new(192, 0, 2, n));
        self.hostnames.push(hostname.to_string());
        self.hosts.insert(hostname.to_string(), ip);
        ip
    }

    /// Add a replica with only an IPv6 address, `2001:db8::n`.
    pub fn add_v6_replica(&mut self, hostname: &str, coord: Coordinate) -> IpAddr {
        let n = self.hosts.len() as u16 + 1;
        let ip = IpAddr::V6(Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, n));
        self.hostnames.push(hostname.to_string());
        self.hosts.insert(hostname.to_string(), ip);
        self.primary().set(ip, coord);
        ip
    }

    /// Add a replica hostname that never resolves.
    pub fn add_unresolvable_replica(&mut self, hostname: &str) {
        self.hostnames.push(hostname.to_string());
    }

    pub fn primary(&self) -> Arc<TestGeoProvider> {
        self.providers[0].clone()
    }

    pub fn fallback(&self) -> Arc<TestGeoProvider> {
        self.providers[1].clone()
    }

    pub fn build(self) -> ReplicaSelector {
        let providers: Vec<Arc<dyn GeoProvider>> = self
            .providers
            .iter()
            .map(|p| p.clone() as Arc<dyn GeoProvider>)
            .collect();
        ReplicaSelector::new(
            self.hostnames,
            Arc::new(TestHostResolver {
                table: self.hosts,
                ..Default::default()
            }),
            CoordinateResolver::new(providers),
        )
    }
}

// --- Config builders ---

pub fn test_dns_config() -> DnsConfig {
    DnsConfig {
        listen_addr: "127.0.0.1:5353".parse().unwrap(),
        cdn_name: CDN_NAME.to_string(),
        ttl: 60,
        soa: SoaConfig::default(),
    }
}

/// Request handler (and catalog) serving `CDN_NAME` from `selector`.
pub fn test_handler(selector: ReplicaSelector) -> CdnRequestHandler {
    CdnRequestHandler::new(test_dns_config(), selector).expect("failed to build handler")
}

// --- Query/Request construction ---

/// Client source address with an ephemeral port.
pub fn client(ip: &str) -> SocketAddr {
    SocketAddr::new(ip.parse().unwrap(), 40000)
}

/// Build wire-format bytes for a DNS query.
pub fn build_query_bytes(name: &str, record_type: RecordType, id: u16) -> Vec<u8> {
    let mut msg = Message::new();
    msg.set_id(id);
    msg.set_message_type(MessageType::Query);
    msg.set_op_code(OpCode::Query);
    msg.set_recursion_desired(true);
    let mut query = Query::new();
    query.set_name(Name::from_ascii(name).unwrap());
    query.set_query_type(record_type);
    query.set_query_class(DNSClass::IN);
    msg.add_query(query);
    msg.to_vec().unwrap()
}

/// Build a full `Request` with a crafted source address.
pub fn build_request(name: &str, record_type: RecordType, src: SocketAddr, id: u16) -> Request {
    let bytes = build_query_bytes(name, record_type, id);
    let mut decoder = BinDecoder::new(&bytes);
    let msg = MessageRequest::read(&mut decoder).expect("failed to parse MessageRequest");
    Request::new(msg, src, Protocol::Udp)
}

/// Execute a query through the handler and return the parsed response.
pub async fn execute_query(
    handler: &CdnRequestHandler,
    name: &str,
    record_type: RecordType,
    src: SocketAddr,
    id: u16,
) -> Message {
    let request = build_request(name, record_type, src, id);
    let response = TestResponseHandler::new();
    handler.handle_request(&request, response.clone()).await;
    response.into_message()
}

// --- Response helpers ---

/// Extract A and AAAA addresses from a response.
pub fn extract_ips(msg: &Message) -> Vec<IpAddr> {
    msg.answers()
        .iter()
        .filter_map(|r| match r.data() {
            RData::A(a) => Some(IpAddr::V4(a.0)),
            RData::AAAA(aaaa) => Some(IpAddr::V6(aaaa.0)),
            _ => None,
        })
        .collect()
}

/// Assert response code.
pub fn assert_response_code(msg: &Message, expected: ResponseCode) {
    assert_eq!(
        msg.response_code(),
        expected,
        "expected {:?}, got {:?}",
        expected,
        msg.response_code()
    );
}

/// Assert response is successful with exactly one answer, `expected`.
pub fn assert_single_answer(msg: &Message, expected: IpAddr) {
    assert_response_code(msg, ResponseCode::NoError);
    assert_eq!(extract_ips(msg), vec![expected], "unexpected answer section");
}
