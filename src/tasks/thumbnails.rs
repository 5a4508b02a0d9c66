//! JPEG thumbnails of the first few page images.

use std::io::Cursor;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, GenericImageView, Rgb, RgbImage};
use url::Url;

use crate::analysis::HtmlDocument;
use crate::config::{FetcherConfig, ThumbnailConfig};
use crate::fetch::Fetcher;
use crate::tasks::TaskFailure;

/// Image downloader honouring the thumbnail size and time limits.
pub fn image_fetcher(config: &ThumbnailConfig, user_agent: &str) -> Fetcher {
    Fetcher::new(FetcherConfig {
        max_concurrent: config.max_images.max(1),
        timeout_secs: config.download_timeout_secs,
        max_binary_bytes: config.max_download_bytes,
        user_agent: user_agent.to_string(),
        close_grace_ms: 0,
        ..FetcherConfig::default()
    })
}

/// Thumbnail up to `max_images` raster images found in `html`.
///
/// Images that fail to download or decode are skipped.
pub async fn generate(
    images: &Fetcher,
    url: &str,
    html: &str,
    config: &ThumbnailConfig,
) -> Result<Vec<String>, TaskFailure> {
    let base = Url::parse(url)?;
    let image_urls = HtmlDocument::parse(html).image_urls(&base, config.max_images);

    let mut thumbnails = Vec::with_capacity(image_urls.len());
    for image_url in &image_urls {
        match thumbnail_for(images, image_url, config).await {
            Ok(encoded) => thumbnails.push(encoded),
            Err(e) => tracing::debug!(image = %image_url, error = %e, "Skipping image"),
        }
    }
    Ok(thumbnails)
}

async fn thumbnail_for(
    images: &Fetcher,
    image_url: &str,
    config: &ThumbnailConfig,
) -> Result<String, TaskFailure> {
    let bytes = images.fetch_binary(image_url).await?;
    let edge = config.max_edge;
    let quality = config.jpeg_quality;
    tokio::task::spawn_blocking(move || make_thumbnail(&bytes, edge, quality))
        .await
        .map_err(|e| TaskFailure::Image(e.to_string()))?
}

/// Decode `bytes`, fit within `max_edge` square, flatten onto white and
/// return base64 JPEG. Smaller images are never upscaled.
pub fn make_thumbnail(bytes: &[u8], max_edge: u32, quality: u8) -> Result<String, TaskFailure> {
    let source = image::load_from_memory(bytes)?;
    let (width, height) = source.dimensions();
    let fitted = if width > max_edge || height > max_edge {
        source.thumbnail(max_edge, max_edge)
    } else {
        source
    };

    let flat = flatten_on_white(&fitted);
    let mut jpeg = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut jpeg, quality).encode_image(&flat)?;
    Ok(BASE64.encode(jpeg.into_inner()))
}

fn flatten_on_white(image: &DynamicImage) -> RgbImage {
    let rgba = image.to_rgba8();
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let alpha = u16::from(a);
        let blend = |c: u8| ((u16::from(c) * alpha + 255 * (255 - alpha)) / 255) as u8;
        Rgb([blend(r), blend(g), blend(b)])
    })
}
