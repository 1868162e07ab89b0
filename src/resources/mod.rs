/**
 * This module contains all logic for loading the baked texture and the model from external files.
 *
 * Loaders only fetch and decode; they hand back plain CPU data so the caller decides when
 * and where the GPU upload happens.
 */
pub mod draco;
pub mod model;
pub mod texture;

pub use self::model::load_gltf_scene;
pub use self::texture::load_baked_image;

#[cfg(target_arch = "wasm32")]
fn format_url(file_name: &str) -> anyhow::Result<reqwest::Url> {
    let window = web_sys::window().ok_or_else(|| anyhow::anyhow!("no browser window"))?;
    let origin = window
        .location()
        .origin()
        .map_err(|e| anyhow::anyhow!("no page origin: {e:?}"))?;
    let base = reqwest::Url::parse(&format!("{}/assets/", origin))?;
    Ok(base.join(file_name)?)
}

/// Fetch a static asset.
///
/// Natively this reads `./assets/<file_name>`; on the web it fetches
/// `<origin>/assets/<file_name>`. There is no retry.
pub async fn load_binary(file_name: &str) -> anyhow::Result<Vec<u8>> {
    #[cfg(target_arch = "wasm32")]
    let data = {
        let url = format_url(file_name)?;
        reqwest::get(url)
            .await?
            .error_for_status()?
            .bytes()
            .await?
            .to_vec()
    };
    #[cfg(not(target_arch = "wasm32"))]
    let data = {
        let path = std::path::Path::new("./").join("assets").join(file_name);
        tokio::fs::read(&path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?
    };

    Ok(data)
}
