//! Boots one shared server instance for this integration test binary.
//!
//! The server runs on its own OS thread with its own runtime so it
//! outlives the per-test tokio runtimes, and every test talks to the same
//! ephemeral port.

use std::net::{SocketAddr, TcpStream};
use std::sync::{mpsc, OnceLock};
use std::thread;
use std::time::{Duration, Instant};

static BASE_URL: OnceLock<String> = OnceLock::new();

/// Base URL of the shared test server, booting it on first use.
pub fn base_url() -> &'static str {
    BASE_URL.get_or_init(boot_server)
}

/// Environment for test worlds: small and deterministic, so startup is
/// fast and per-tick work stays negligible.
fn test_config() {
    std::env::set_var("BOTS_COUNT", "16");
    std::env::set_var("WORLD_SEED", "7");
}

fn boot_server() -> String {
    test_config();

    // The server thread reports its ephemeral port back over a channel
    // once the listener is bound.
    let (addr_tx, addr_rx) = mpsc::channel::<SocketAddr>();
    thread::spawn(move || {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("test runtime")
            .block_on(async move {
                let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
                    .await
                    .expect("bind test listener");
                let addr = listener.local_addr().expect("listener addr");
                addr_tx.send(addr).expect("publish test addr");
                sightline_server::run(listener).await.expect("test server exited");
            });
    });

    let addr = addr_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("server never published its address");
    wait_until_accepting(addr);
    format!("http://{addr}")
}

/// Bound does not mean accepting; poll until a raw TCP connect succeeds
/// so the first request cannot race server startup.
fn wait_until_accepting(addr: SocketAddr) {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if TcpStream::connect(addr).is_ok() {
            return;
        }
        thread::sleep(Duration::from_millis(20));
    }
    panic!("test server at {addr} never accepted a connection");
}
