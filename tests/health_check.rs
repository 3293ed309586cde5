//! Integration tests for readiness polling against a stub scripting server.

mod common;

use std::time::{Duration, Instant};

use common::{closed_port, silent_port, StubServer};
use wb_bridge::client::health::wait_until_ready;
use wb_bridge::client::protocol::PROBE_COMMAND;
use wb_bridge::client::{HealthPolicy, HealthState, TcpTransport, WorkbenchClient};

fn quick_policy(timeout_ms: u64) -> HealthPolicy {
    HealthPolicy {
        timeout: Duration::from_millis(timeout_ms),
        interval: Duration::from_millis(50),
        settle: Duration::ZERO,
    }
}

#[tokio::test]
async fn first_successful_probe_short_circuits() {
    let server = StubServer::accepting().await;
    let transport = TcpTransport::new("127.0.0.1", server.port);

    let state = wait_until_ready(&transport, &quick_policy(5_000)).await;

    assert_eq!(state, HealthState::Ready);
    assert_eq!(server.received(), [PROBE_COMMAND]);
}

#[tokio::test]
async fn retries_until_engine_answers_ok() {
    let server = StubServer::start(&["busy", "Error: project not loaded"], "<OK>").await;
    let transport = TcpTransport::new("127.0.0.1", server.port);

    let state = wait_until_ready(&transport, &quick_policy(5_000)).await;

    assert!(state.is_ready());
    assert_eq!(server.received().len(), 3);
}

#[tokio::test]
async fn never_ready_engine_gives_up_at_timeout() {
    let server = StubServer::start(&[], "still loading").await;
    let transport = TcpTransport::new("127.0.0.1", server.port);

    let started = Instant::now();
    let state = wait_until_ready(&transport, &quick_policy(300)).await;

    assert_eq!(state, HealthState::Unknown);
    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(server.received().len() >= 2);
}

#[tokio::test]
async fn silent_engine_gives_up_at_timeout() {
    let port = silent_port().await;
    let transport = TcpTransport::new("127.0.0.1", port);

    let started = Instant::now();
    let state = wait_until_ready(&transport, &quick_policy(300)).await;

    assert_eq!(state, HealthState::Unknown);
    assert!(started.elapsed() >= Duration::from_millis(250));
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn refused_connections_mean_not_ready() {
    let port = closed_port().await;
    let transport = TcpTransport::new("127.0.0.1", port);

    let started = Instant::now();
    let state = wait_until_ready(&transport, &quick_policy(200)).await;

    assert_eq!(state, HealthState::Unknown);
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn settle_delay_follows_success() {
    let server = StubServer::accepting().await;
    let transport = TcpTransport::new("127.0.0.1", server.port);
    let policy = HealthPolicy {
        settle: Duration::from_millis(150),
        ..quick_policy(5_000)
    };

    let started = Instant::now();
    assert!(wait_until_ready(&transport, &policy).await.is_ready());
    assert!(started.elapsed() >= Duration::from_millis(150));
}

#[tokio::test]
async fn client_health_check_uses_its_policy() {
    let server = StubServer::accepting().await;
    let client =
        WorkbenchClient::new("127.0.0.1", server.port).with_health_policy(quick_policy(1_000));

    assert!(client.wait_for_healthy_connection().await);
}
