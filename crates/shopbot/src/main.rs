use std::sync::Arc;

use anyhow::Context;

use shopbot_core::config::Config;
use shopbot_sqlite::SqliteStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    shopbot_core::logging::init("shopbot")?;

    let cfg = Arc::new(Config::load()?);

    let store = SqliteStore::connect(&cfg.database_url)
        .await
        .with_context(|| format!("opening database {}", cfg.database_url))?;

    shopbot_telegram::router::run_polling(cfg, Arc::new(store))
        .await
        .context("telegram bot failed")?;

    Ok(())
}
