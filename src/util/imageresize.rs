use image::{imageops::FilterType, DynamicImage, GenericImageView, ImageFormat};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, error};

/// Largest upstream image we are willing to download.
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

/// Downloads remote posters, resizes them and keeps the result on disk.
pub struct ImageResizer {
    cache_dir: PathBuf,
    client: reqwest::Client,
    max_bytes: usize,
}

impl ImageResizer {
    pub fn new(cache_dir: PathBuf) -> Result<Self, ImageResizerError> {
        fs::create_dir_all(&cache_dir)?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            cache_dir,
            client,
            max_bytes: MAX_IMAGE_BYTES,
        })
    }

    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// Path of the cached (resized) copy of `url`, fetching and resizing it
    /// first if needed.
    pub async fn resize_url(
        &self,
        url: &str,
        width: Option<u32>,
        height: Option<u32>,
        quality: Option<u32>,
    ) -> Result<PathBuf, ImageResizerError> {
        let parsed = reqwest::Url::parse(url)
            .map_err(|_| ImageResizerError::InvalidUrl(url.to_string()))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(ImageResizerError::InvalidUrl(url.to_string()));
        }

        let cache_key = generate_cache_key(&parsed, width, height, quality);
        let cache_path = self.cache_dir.join(&cache_key);

        if cache_path.exists() {
            debug!("Serving cached image: {}", cache_key);
            return Ok(cache_path);
        }

        debug!("Fetching image: {}", url);
        let mut response = self.client.get(parsed).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ImageResizerError::Status(status.as_u16()));
        }
        if response
            .content_length()
            .is_some_and(|len| len > self.max_bytes as u64)
        {
            return Err(ImageResizerError::TooLarge(self.max_bytes));
        }
        let mut original = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            if original.len() + chunk.len() > self.max_bytes {
                return Err(ImageResizerError::TooLarge(self.max_bytes));
            }
            original.extend_from_slice(&chunk);
        }

        let label = url.to_string();
        let encoded = tokio::task::spawn_blocking(move || {
            match resize_bytes(&original, width, height, quality) {
                Ok(data) => data,
                Err(e) => {
                    // Keep the original so the poster still shows.
                    error!("Failed to resize image {}: {}", label, e);
                    original
                }
            }
        })
        .await
        .map_err(|e| ImageResizerError::Task(e.to_string()))?;

        // Write to a temp name first so a concurrent reader never sees a
        // partial file.
        let tmp_path = self.cache_dir.join(format!("{}.tmp", cache_key));
        tokio::fs::write(&tmp_path, &encoded).await?;
        tokio::fs::rename(&tmp_path, &cache_path).await?;

        Ok(cache_path)
    }

    pub fn get_cache_stats(&self) -> Result<CacheStats, ImageResizerError> {
        let mut stats = CacheStats {
            total_files: 0,
            total_size: 0,
            oldest_file: None,
            newest_file: None,
        };

        if !self.cache_dir.exists() {
            return Ok(stats);
        }

        for entry in fs::read_dir(&self.cache_dir)? {
            let entry = entry?;
            let metadata = entry.metadata()?;

            if metadata.is_file() {
                stats.total_files += 1;
                stats.total_size += metadata.len();

                if let Ok(modified) = metadata.modified() {
                    if stats.oldest_file.is_none() || Some(modified) < stats.oldest_file {
                        stats.oldest_file = Some(modified);
                    }
                    if stats.newest_file.is_none() || Some(modified) > stats.newest_file {
                        stats.newest_file = Some(modified);
                    }
                }
            }
        }

        Ok(stats)
    }

    pub fn cleanup_old_cache(&self, max_age_days: u64) -> Result<usize, ImageResizerError> {
        let mut removed = 0;

        if !self.cache_dir.exists() {
            return Ok(0);
        }

        let now = SystemTime::now();
        let max_age = Duration::from_secs(max_age_days * 24 * 60 * 60);

        for entry in fs::read_dir(&self.cache_dir)? {
            let entry = entry?;
            let metadata = entry.metadata()?;

            if metadata.is_file() {
                if let Ok(modified) = metadata.modified() {
                    if let Ok(age) = now.duration_since(modified) {
                        if age > max_age {
                            fs::remove_file(entry.path())?;
                            removed += 1;
                        }
                    }
                }
            }
        }

        Ok(removed)
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }
}

/// Resize and re-encode an image held in memory, keeping its format.
pub fn resize_bytes(
    bytes: &[u8],
    width: Option<u32>,
    height: Option<u32>,
    quality: Option<u32>,
) -> Result<Vec<u8>, ImageResizerError> {
    if width.is_none() && height.is_none() && quality.is_none() {
        return Ok(bytes.to_vec());
    }

    let format = image::guess_format(bytes)?;
    let img = image::load_from_memory_with_format(bytes, format)?;

    let (orig_width, orig_height) = img.dimensions();
    let (target_width, target_height) =
        calculate_dimensions(orig_width, orig_height, width, height);

    // Never upscale.
    let resized = if target_width >= orig_width && target_height >= orig_height {
        img
    } else {
        img.resize(target_width, target_height, FilterType::Lanczos3)
    };

    encode_image(resized, format, quality)
}

fn calculate_dimensions(
    orig_width: u32,
    orig_height: u32,
    width: Option<u32>,
    height: Option<u32>,
) -> (u32, u32) {
    match (width, height) {
        (Some(w), Some(h)) => (w, h),
        (Some(w), None) => {
            let aspect_ratio = orig_height as f32 / orig_width as f32;
            let h = (w as f32 * aspect_ratio).round() as u32;
            (w, h.max(1))
        }
        (None, Some(h)) => {
            let aspect_ratio = orig_width as f32 / orig_height as f32;
            let w = (h as f32 * aspect_ratio).round() as u32;
            (w.max(1), h)
        }
        (None, None) => (orig_width, orig_height),
    }
}

fn encode_image(
    img: DynamicImage,
    format: ImageFormat,
    quality: Option<u32>,
) -> Result<Vec<u8>, ImageResizerError> {
    let mut buffer = Cursor::new(Vec::new());

    match format {
        ImageFormat::Jpeg => {
            let quality = quality.unwrap_or(90).clamp(1, 100);
            let encoder =
                image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buffer, quality as u8);
            img.write_with_encoder(encoder)?;
        }
        _ => {
            img.write_to(&mut buffer, format)?;
        }
    }

    Ok(buffer.into_inner())
}

fn generate_cache_key(
    url: &reqwest::Url,
    width: Option<u32>,
    height: Option<u32>,
    quality: Option<u32>,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_str().as_bytes());
    hasher.update(width.unwrap_or(0).to_le_bytes());
    hasher.update(height.unwrap_or(0).to_le_bytes());
    hasher.update(quality.unwrap_or(0).to_le_bytes());
    let hash = hex::encode(hasher.finalize());

    let extension = Path::new(url.path())
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| e.len() <= 5 && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_else(|| "jpg".to_string());

    format!("{}.{}", hash, extension)
}

#[derive(Debug, Clone)]
pub struct CacheStats {
    pub total_files: usize,
    pub total_size: u64,
    pub oldest_file: Option<SystemTime>,
    pub newest_file: Option<SystemTime>,
}

#[derive(Debug, thiserror::Error)]
pub enum ImageResizerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Upstream returned status {0}")]
    Status(u16),
    #[error("Upstream image is larger than {0} bytes")]
    TooLarge(usize),
    #[error("Invalid image url: {0}")]
    InvalidUrl(String),
    #[error("Resize task failed: {0}")]
    Task(String),
}

/// Answer one HTTP request on a local port with `body`, optionally holding
/// the response until `hold` fires. Returns the URL of a poster on it.
#[cfg(test)]
pub(crate) async fn serve_once(
    body: Vec<u8>,
    hold: Option<tokio::sync::oneshot::Receiver<()>>,
) -> String {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = [0u8; 2048];
        let _ = socket.read(&mut request).await;
        if let Some(hold) = hold {
            let _ = hold.await;
        }
        let head = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: image/jpeg\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            body.len()
        );
        // The client may hang up early on an oversized body.
        let _ = socket.write_all(head.as_bytes()).await;
        let _ = socket.write_all(&body).await;
        let _ = socket.shutdown().await;
    });
    format!("http://{}/poster.jpg", addr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = ImageBuffer::from_fn(width, height, |x, y| Rgb([x as u8, y as u8, 128u8]));
        let mut buffer = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut buffer, ImageFormat::Png)
            .unwrap();
        buffer.into_inner()
    }

    #[test]
    fn test_calculate_dimensions() {
        assert_eq!(calculate_dimensions(400, 600, Some(200), None), (200, 300));
        assert_eq!(calculate_dimensions(400, 600, None, Some(300)), (200, 300));
        assert_eq!(calculate_dimensions(400, 600, Some(10), Some(10)), (10, 10));
        assert_eq!(calculate_dimensions(400, 600, None, None), (400, 600));
        assert_eq!(calculate_dimensions(1000, 1, Some(10), None), (10, 1));
    }

    #[test]
    fn test_resize_bytes_keeps_aspect() {
        let resized = resize_bytes(&png(40, 60), Some(20), None, Some(75)).unwrap();
        let img = image::load_from_memory(&resized).unwrap();
        assert_eq!(img.dimensions(), (20, 30));
        assert_eq!(image::guess_format(&resized).unwrap(), ImageFormat::Png);
    }

    #[test]
    fn test_resize_bytes_never_upscales() {
        let resized = resize_bytes(&png(40, 60), Some(640), None, None).unwrap();
        let img = image::load_from_memory(&resized).unwrap();
        assert_eq!(img.dimensions(), (40, 60));
    }

    #[test]
    fn test_resize_bytes_rejects_garbage() {
        assert!(resize_bytes(b"not an image", Some(10), None, None).is_err());
        assert_eq!(resize_bytes(b"raw", None, None, None).unwrap(), b"raw".to_vec());
    }

    #[test]
    fn test_cache_key() {
        let url = reqwest::Url::parse("https://cdn.example.com/posters/Ran.JPG?v=2").unwrap();
        let key = generate_cache_key(&url, Some(640), None, Some(75));
        assert!(key.ends_with(".jpg"));
        assert_eq!(key, generate_cache_key(&url, Some(640), None, Some(75)));
        assert_ne!(key, generate_cache_key(&url, Some(320), None, Some(75)));

        let bare = reqwest::Url::parse("https://cdn.example.com/poster").unwrap();
        assert!(generate_cache_key(&bare, None, None, None).ends_with(".jpg"));
    }

    #[tokio::test]
    async fn test_rejects_non_http_urls() {
        let dir = tempfile::tempdir().unwrap();
        let resizer = ImageResizer::new(dir.path().join("images")).unwrap();
        for url in ["file:///etc/passwd", "not a url", "/relative.jpg"] {
            assert!(matches!(
                resizer.resize_url(url, Some(640), None, None).await,
                Err(ImageResizerError::InvalidUrl(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_download_size_is_capped() {
        let dir = tempfile::tempdir().unwrap();
        let resizer = ImageResizer::new(dir.path().join("images"))
            .unwrap()
            .with_max_bytes(1024);

        let url = serve_once(vec![0u8; 4096], None).await;
        assert!(matches!(
            resizer.resize_url(&url, Some(640), None, Some(75)).await,
            Err(ImageResizerError::TooLarge(1024))
        ));
        assert_eq!(resizer.get_cache_stats().unwrap().total_files, 0);

        // Under the cap: undecodable bytes are cached as they came.
        let url = serve_once(b"poster".to_vec(), None).await;
        let path = resizer.resize_url(&url, Some(640), None, Some(75)).await.unwrap();
        assert_eq!(fs::read(path).unwrap(), b"poster".to_vec());
    }

    #[test]
    fn test_cache_stats_and_cleanup() {
        let dir = tempfile::tempdir().unwrap();
        let resizer = ImageResizer::new(dir.path().join("images")).unwrap();
        fs::write(resizer.cache_dir().join("a.jpg"), b"1234").unwrap();
        fs::write(resizer.cache_dir().join("b.jpg"), b"56").unwrap();

        let stats = resizer.get_cache_stats().unwrap();
        assert_eq!(stats.total_files, 2);
        assert_eq!(stats.total_size, 6);

        assert_eq!(resizer.cleanup_old_cache(1).unwrap(), 0);
        assert_eq!(resizer.get_cache_stats().unwrap().total_files, 2);
    }
}
