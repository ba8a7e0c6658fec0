use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

mod config;
mod dbus_interface;
mod engine;
mod image_store;
mod storage;

use config::Config;
use dbus_interface::DermaService;
use image_store::ImageStore;
use storage::Store;

const BUS_NAME: &str = "org.derma.Agent1";
const OBJECT_PATH: &str = "/org/derma/Agent1";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("dermad starting");

    let config = Config::from_env();
    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create data dir {}", parent.display()))?;
    }

    let store = Store::open(&config.db_path)
        .await
        .with_context(|| format!("open database {}", config.db_path.display()))?;
    tracing::info!(db = %config.db_path.display(), "database ready");

    let images = if config.store_images {
        Some(
            ImageStore::open(config.image_dir.clone(), config.image_key.as_deref())
                .with_context(|| format!("open image store {}", config.image_dir.display()))?,
        )
    } else {
        tracing::info!("image storage disabled via DERMA_STORE_IMAGES=0");
        None
    };

    let engine = engine::spawn_engine(
        config.screen_model.as_deref(),
        engine::EnginePolicy {
            min_image_dim: config.min_image_dim,
            min_face_area: config.min_face_area,
        },
    )
    .context("spawn analysis engine")?;

    let service = DermaService::new(
        engine,
        store,
        images,
        config.second_brain,
        config.screen_model.is_some(),
    );

    let _conn = zbus::connection::Builder::session()?
        .name(BUS_NAME)?
        .serve_at(OBJECT_PATH, service)?
        .build()
        .await
        .context("register on the session bus")?;

    tracing::info!(bus = BUS_NAME, "dermad ready");

    tokio::signal::ctrl_c().await?;
    tracing::info!("dermad shutting down");

    Ok(())
}
