//! Memcached Cache Tests
//!
//! Tests verify:
//! - SASL PLAIN authentication on connect
//! - GET/SET against a fake binary-protocol server
//! - Key validation before anything is sent
//! - Reconnect after the server drops the connection

use std::collections::HashMap;
use std::io::{BufReader, BufWriter};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use bytes::Bytes;
use misery::cache::{
    read_packet, write_packet, Cache, MemcachedCache, MemoryCache, Opcode, Packet, Status,
};
use misery::MiseryError;
use parking_lot::Mutex;

const USER: &str = "bot";
const PASS: &str = "hunter2";

type Shared = Arc<Mutex<HashMap<Vec<u8>, Vec<u8>>>>;

/// Serve one client per entry of `limits` in turn; each connection handles at
/// most that many packets before the server hangs up
fn spawn_server(limits: &[usize]) -> (String, Shared, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let data: Shared = Arc::new(Mutex::new(HashMap::new()));
    let server_data = data.clone();
    let limits = limits.to_vec();

    let handle = thread::spawn(move || {
        for max_requests in limits {
            let (stream, _) = match listener.accept() {
                Ok(conn) => conn,
                Err(_) => return,
            };
            serve(stream, &server_data, max_requests);
        }
    });

    (addr, data, handle)
}

fn serve(stream: TcpStream, data: &Shared, max_requests: usize) {
    let mut reader = BufReader::new(stream.try_clone().unwrap());
    let mut writer = BufWriter::new(stream);

    for _ in 0..max_requests {
        let request = match read_packet(&mut reader) {
            Ok(p) => p,
            Err(_) => return,
        };

        let response = match request.opcode {
            Opcode::SaslAuth => {
                let expected = format!("\0{}\0{}", USER, PASS);
                let ok = &request.key[..] == b"PLAIN" && &request.value[..] == expected.as_bytes();
                let status = if ok { Status::NoError } else { Status::AuthError };
                Packet::response_to(&request, status, Bytes::new())
            }
            Opcode::Get => match data.lock().get(&request.key[..]) {
                Some(v) => Packet::response_to(&request, Status::NoError, v.clone()),
                None => Packet::response_to(&request, Status::KeyNotFound, Bytes::new()),
            },
            Opcode::Set => {
                assert_eq!(request.extras.len(), 8);
                data.lock()
                    .insert(request.key.to_vec(), request.value.to_vec());
                Packet::response_to(&request, Status::NoError, Bytes::new())
            }
        };

        if write_packet(&mut writer, &response).is_err() {
            return;
        }
    }
}

fn credentials() -> Option<(String, String)> {
    Some((USER.to_string(), PASS.to_string()))
}

// =============================================================================
// Authentication Tests
// =============================================================================

#[test]
fn test_connect_authenticates() {
    let (addr, _data, _server) = spawn_server(&[10]);
    let cache = MemcachedCache::connect(&addr, credentials(), Duration::from_secs(2)).unwrap();
    assert_eq!(cache.endpoint(), addr);
}

#[test]
fn test_bad_credentials_fail_connect() {
    let (addr, _data, _server) = spawn_server(&[10]);
    let result = MemcachedCache::connect(
        &addr,
        Some((USER.to_string(), "wrong".to_string())),
        Duration::from_secs(2),
    );
    assert!(matches!(result, Err(MiseryError::CacheUnavailable(_))));
}

#[test]
fn test_unreachable_endpoint() {
    // bind then drop to get a port nobody listens on
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().to_string()
    };
    let result = MemcachedCache::connect(&addr, None, Duration::from_millis(500));
    assert!(matches!(result, Err(MiseryError::CacheUnavailable(_))));
}

// =============================================================================
// Read/Write Tests
// =============================================================================

#[test]
fn test_set_then_get() {
    let (addr, data, _server) = spawn_server(&[10]);
    let cache = MemcachedCache::connect(&addr, credentials(), Duration::from_secs(2)).unwrap();

    cache
        .write("Misery/Config%dispatch_deploy_endpoint", b"http://h/x")
        .unwrap();
    assert_eq!(
        cache.read("Misery/Config%dispatch_deploy_endpoint").unwrap(),
        Some(b"http://h/x".to_vec())
    );
    assert!(data
        .lock()
        .contains_key(b"Misery/Config%dispatch_deploy_endpoint".as_slice()));
}

#[test]
fn test_miss_reads_as_none() {
    let (addr, _data, _server) = spawn_server(&[10]);
    let cache = MemcachedCache::connect(&addr, None, Duration::from_secs(2)).unwrap();
    assert_eq!(cache.read("absent").unwrap(), None);
}

#[test]
fn test_invalid_keys_rejected_locally() {
    let (addr, _data, _server) = spawn_server(&[10]);
    let cache = MemcachedCache::connect(&addr, None, Duration::from_secs(2)).unwrap();

    for key in [String::new(), "has space".to_string(), "x".repeat(251)] {
        assert!(matches!(
            cache.read(&key),
            Err(MiseryError::InvalidKey { .. })
        ));
    }
    // the connection is still usable
    assert_eq!(cache.read("fine").unwrap(), None);
}

#[test]
fn test_failed_call_drops_connection_then_recovers() {
    // the first connection answers the auth request and then hangs up
    let (addr, _data, _server) = spawn_server(&[1, 10]);
    let cache = MemcachedCache::connect(&addr, credentials(), Duration::from_secs(2)).unwrap();

    let first = cache.write("k", b"v");
    assert!(matches!(first, Err(MiseryError::CacheUnavailable(_))));

    // the next call opens and authenticates a fresh connection
    cache.write("k", b"v").unwrap();
    assert_eq!(cache.read("k").unwrap(), Some(b"v".to_vec()));
}

// =============================================================================
// Memory Cache
// =============================================================================

#[test]
fn test_memory_cache_behaves_like_a_cache() {
    let cache: Box<dyn Cache> = Box::new(MemoryCache::new());
    assert_eq!(cache.read("k").unwrap(), None);
    cache.write("k", b"v1").unwrap();
    cache.write("k", b"v2").unwrap();
    assert_eq!(cache.read("k").unwrap(), Some(b"v2".to_vec()));
}
