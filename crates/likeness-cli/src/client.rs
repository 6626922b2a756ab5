//! Commands served by `likenessd` over D-Bus.

use anyhow::{bail, Context, Result};
use likeness_backends::Config;
use std::path::Path;

// `#[zbus::proxy]` generates `LikenessProxy` (async) and
// `LikenessProxyBlocking`. The CLI runs on tokio and uses the async one.
#[zbus::proxy(
    interface = "org.freedesktop.Likeness1",
    default_service = "org.freedesktop.Likeness1",
    default_path = "/org/freedesktop/Likeness1"
)]
pub trait Likeness {
    async fn index(&self, label: &str, image: &[u8]) -> zbus::Result<u32>;

    async fn match_image(&self, image: &[u8]) -> zbus::Result<Vec<(String, f64)>>;

    async fn match_with_image(&self, image: &[u8]) -> zbus::Result<(String, f64, Vec<u8>)>;

    async fn detect_labels(&self, image: &[u8]) -> zbus::Result<Vec<(String, f64)>>;

    async fn detect_faces(&self, image: &[u8]) -> zbus::Result<Vec<(f64, f64, f64, f64, f64)>>;

    async fn upload_portrait(&self, key: &str, identity: &str, image: &[u8]) -> zbus::Result<()>;

    async fn status(&self) -> zbus::Result<String>;
}

pub async fn connect(config: &Config) -> Result<LikenessProxy<'static>> {
    let conn = if config.engine.session_bus {
        zbus::Connection::session().await
    } else {
        zbus::Connection::system().await
    }
    .context("failed to connect to D-Bus")?;
    LikenessProxy::new(&conn)
        .await
        .context("likenessd is not reachable")
}

/// Read an image file and reject anything that is not a recognisable image.
pub fn read_image(path: &Path) -> Result<Vec<u8>> {
    let bytes =
        std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    if let Err(e) = image::guess_format(&bytes) {
        bail!("{} is not a supported image: {e}", path.display());
    }
    Ok(bytes)
}

pub async fn index(proxy: &LikenessProxy<'_>, path: &Path, label: &str) -> Result<()> {
    let image = read_image(path)?;
    let indexed = proxy.index(label, &image).await?;
    if indexed == 0 {
        println!("No faces found in {}", path.display());
    } else {
        println!("Indexed {indexed} face(s) as '{label}'");
    }
    Ok(())
}

pub async fn match_faces(proxy: &LikenessProxy<'_>, path: &Path, json: bool) -> Result<()> {
    let image = read_image(path)?;
    let matches = proxy.match_image(&image).await?;
    if json {
        println!("{}", matches_json(&matches));
    } else if matches.is_empty() {
        println!("No match");
    } else {
        for (identity, confidence) in matches {
            println!("{identity}\t{confidence:.2}");
        }
    }
    Ok(())
}

/// Matches as a JSON array, keeping the daemon's order.
fn matches_json(matches: &[(String, f64)]) -> serde_json::Value {
    matches
        .iter()
        .map(|(identity, confidence)| {
            serde_json::json!({ "identity": identity, "confidence": confidence })
        })
        .collect()
}

pub async fn match_with_image(
    proxy: &LikenessProxy<'_>,
    path: &Path,
    output: Option<&Path>,
) -> Result<()> {
    let image = read_image(path)?;
    let (identity, confidence, portrait) = proxy.match_with_image(&image).await?;
    if identity.is_empty() {
        println!("No match");
        return Ok(());
    }
    println!("{identity}\t{confidence:.2}");

    match output {
        _ if portrait.is_empty() => println!("No portrait on file"),
        Some(out) => {
            std::fs::write(out, &portrait)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Portrait ({} bytes) written to {}", portrait.len(), out.display());
        }
        None => println!("Portrait available ({} bytes); use --output to save it", portrait.len()),
    }
    Ok(())
}

pub async fn labels(proxy: &LikenessProxy<'_>, path: &Path) -> Result<()> {
    let image = read_image(path)?;
    for (name, confidence) in proxy.detect_labels(&image).await? {
        println!("{name}\t{confidence:.2}");
    }
    Ok(())
}

pub async fn faces(proxy: &LikenessProxy<'_>, path: &Path) -> Result<()> {
    let image = read_image(path)?;
    let faces = proxy.detect_faces(&image).await?;
    println!("{} face(s)", faces.len());
    for (left, top, width, height, confidence) in faces {
        println!("  box=({left:.3}, {top:.3}, {width:.3}, {height:.3}) confidence={confidence:.2}");
    }
    Ok(())
}

pub async fn upload(
    proxy: &LikenessProxy<'_>,
    path: &Path,
    key: &str,
    identity: &str,
) -> Result<()> {
    let image = read_image(path)?;
    proxy.upload_portrait(key, identity, &image).await?;
    println!("Uploaded portrait '{key}' for '{identity}'");
    Ok(())
}

pub async fn status(proxy: &LikenessProxy<'_>) -> Result<()> {
    let raw = proxy.status().await?;
    let value: serde_json::Value =
        serde_json::from_str(&raw).context("daemon returned malformed status")?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}
