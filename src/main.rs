#[tokio::main]
async fn main() {
    if let Err(e) = sightline_server::server::run_with_config().await {
        eprintln!("server failed: {e}");
        std::process::exit(1);
    }
}
