use std::sync::Arc;

use blob_core::config::{self, Config};

#[tokio::main]
async fn main() -> Result<(), blob_core::Error> {
    // `.env` first: it may carry RUST_LOG.
    config::load_env_file()?;
    blob_core::logging::init("blob")?;

    // A missing token must stop us before polling starts.
    let cfg = match Config::load() {
        Ok(cfg) => Arc::new(cfg),
        Err(e) => {
            tracing::error!("{e}");
            return Err(e);
        }
    };

    blob_telegram::router::run_polling(cfg)
        .await
        .map_err(|e| blob_core::Error::External(format!("telegram bot failed: {e}")))?;

    Ok(())
}
