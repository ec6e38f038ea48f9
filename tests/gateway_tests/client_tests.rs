//! Gateway Session Tests
//!
//! End-to-end tests driving a real bot over TCP through the relay.
//!
//! Tests verify:
//! - IDENTIFY/READY handshake and token rejection
//! - Command replies reach the channel they came from
//! - Shutdown command and gateway close both end the loop

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use misery::network::{Exit, GatewayClient, Relay, RelayEvent};
use misery::webhook::HttpDispatcher;
use misery::{BlobPartitioner, Bot, Config, MiseryError, Services};

const TOKEN: &str = "gateway-secret";
const BOT_ID: u64 = 9000;
const OWNER: u64 = 1;
const STRANGER: u64 = 2;
const WAIT: Duration = Duration::from_secs(5);

fn config(addr: &str, token: &str) -> Config {
    Config::builder()
        .gateway_addr(addr)
        .gateway_token(token)
        .authorized_ids([OWNER])
        .read_timeout_ms(50)
        .build()
}

/// Connect a bot to `addr` on a background thread and run it to completion
fn spawn_bot(addr: String, token: &'static str) -> JoinHandle<misery::Result<Exit>> {
    thread::spawn(move || {
        let config = config(&addr, token);
        let client = GatewayClient::connect(&config)?;
        assert_eq!(client.user_id(), BOT_ID);

        let services = Services::in_memory(
            BlobPartitioner::default(),
            Arc::new(HttpDispatcher::new(Duration::from_secs(5))?),
        );
        let bot = Bot::new(&config, services, Arc::new(AtomicBool::new(false)));
        client.run(&bot)
    })
}

fn reply(channel_id: u64, content: &str) -> Option<RelayEvent> {
    Some(RelayEvent::Reply {
        channel_id,
        content: content.to_string(),
    })
}

// =============================================================================
// Handshake Tests
// =============================================================================

#[test]
fn test_bad_token_is_unauthorized() {
    let relay = Relay::bind("127.0.0.1:0", TOKEN, BOT_ID).unwrap();
    let addr = relay.local_addr().unwrap().to_string();
    let bot = spawn_bot(addr, "wrong-token");

    let accepted = relay.accept();
    assert!(matches!(accepted, Err(MiseryError::Unauthorized(_))));

    let result = bot.join().unwrap();
    assert!(matches!(result, Err(MiseryError::Unauthorized(_))));
}

#[test]
fn test_connect_refused() {
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().to_string()
    };
    assert!(GatewayClient::connect(&config(&addr, TOKEN)).is_err());
}

// =============================================================================
// Session Tests
// =============================================================================

#[test]
fn test_ping_round_trip() {
    let relay = Relay::bind("127.0.0.1:0", TOKEN, BOT_ID).unwrap();
    let bot = spawn_bot(relay.local_addr().unwrap().to_string(), TOKEN);
    let mut session = relay.accept().unwrap();

    session.send_message(STRANGER, 77, "ping").unwrap();
    assert_eq!(session.next_event(WAIT), reply(77, "pong"));

    session.send_message(STRANGER, 78, "ping").unwrap();
    assert_eq!(session.next_event(WAIT), reply(78, "pong"));

    session.close().unwrap();
    assert_eq!(bot.join().unwrap().unwrap(), Exit::GatewayClosed);
}

#[test]
fn test_bot_ignores_itself_and_unknown_text() {
    let relay = Relay::bind("127.0.0.1:0", TOKEN, BOT_ID).unwrap();
    let bot = spawn_bot(relay.local_addr().unwrap().to_string(), TOKEN);
    let mut session = relay.accept().unwrap();

    session.send_message(BOT_ID, 5, "ping").unwrap();
    session.send_message(STRANGER, 5, "hello there").unwrap();
    session.send_message(STRANGER, 6, "ping").unwrap();

    // events are handled in order, so the first reply is the last ping's
    assert_eq!(session.next_event(WAIT), reply(6, "pong"));

    session.close().unwrap();
    assert_eq!(bot.join().unwrap().unwrap(), Exit::GatewayClosed);
}

#[test]
fn test_shutdown_command_ends_session() {
    let relay = Relay::bind("127.0.0.1:0", TOKEN, BOT_ID).unwrap();
    let bot = spawn_bot(relay.local_addr().unwrap().to_string(), TOKEN);
    let mut session = relay.accept().unwrap();

    // a stranger's shutdown is dropped without a reply
    session.send_message(STRANGER, 3, "misery shutdown").unwrap();
    session.send_message(STRANGER, 3, "ping").unwrap();
    assert_eq!(session.next_event(WAIT), reply(3, "pong"));

    session.send_message(OWNER, 3, "misery shutdown").unwrap();
    assert_eq!(session.next_event(WAIT), reply(3, "Shutting down"));
    assert_eq!(session.next_event(WAIT), Some(RelayEvent::Closed));

    assert_eq!(bot.join().unwrap().unwrap(), Exit::Shutdown);
    session.close().unwrap();
}
