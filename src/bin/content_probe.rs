// src/bin/content_probe.rs
// One-off check of content store credentials: fetches every collection once.
//
// Run:
//   CONTENT_API_URL=... CONTENT_API_TOKEN=... cargo run --bin content_probe

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    site_content_sync::init_tracing();
    site_content_sync::run_content_probe().await
}
