use anyhow::{Context, Result};
use likeness_backends::Config;
use tracing_subscriber::EnvFilter;

mod dbus_interface;
mod worker;

const BUS_NAME: &str = "org.freedesktop.Likeness1";
const OBJECT_PATH: &str = "/org/freedesktop/Likeness1";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("likenessd starting");

    let config = Config::load().context("failed to load configuration")?;
    tracing::info!(
        collection = %config.collection,
        table = %config.table,
        db = %config.db_path.display(),
        bucket = %config.bucket_dir.display(),
        policy = ?config.collision_policy,
        "configuration loaded"
    );

    // Backends connect synchronously so a missing engine or unwritable
    // store fails startup instead of the first request.
    let backend_config = config.clone();
    let pipeline =
        tokio::task::spawn_blocking(move || likeness_backends::open_pipeline(&backend_config))
            .await??;
    let handle = worker::spawn_pipeline(pipeline)?;

    let service = dbus_interface::LikenessService::new(
        handle,
        config.pipeline_config(),
        config.engine.service.clone(),
    );

    let builder = if config.engine.session_bus {
        zbus::connection::Builder::session()?
    } else {
        zbus::connection::Builder::system()?
    };
    let _conn = builder
        .name(BUS_NAME)?
        .serve_at(OBJECT_PATH, service)?
        .build()
        .await
        .with_context(|| format!("failed to register {BUS_NAME}"))?;

    tracing::info!(name = BUS_NAME, path = OBJECT_PATH, "likenessd ready");

    tokio::signal::ctrl_c().await?;
    tracing::info!("likenessd shutting down");

    Ok(())
}
