//! gh-mirror service entry point.

use ghmirror_service::{init_tracing, load_config, run};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_file = std::env::var("GHMIRROR_CONFIG").ok();
    let config = load_config(config_file.as_deref())?;
    init_tracing(&config);
    run(config).await
}
