use crate::data::config::Config;
use image::imageops::{self, FilterType};
use image::RgbaImage;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Longer side is capped at this multiple of the target size.
pub const MAX_ASPECT_RATIO: u32 = 4;

/// Produces a decoded, downscaled bitmap for a resource locator.
pub trait ImageFetcher {
    /// `None` covers every failure: bad locator, I/O, HTTP and decode errors.
    fn fetch(&self, locator: &str) -> Option<RgbaImage>;
}

impl<T: ImageFetcher + ?Sized> ImageFetcher for &T {
    fn fetch(&self, locator: &str) -> Option<RgbaImage> {
        (**self).fetch(locator)
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("empty locator")]
    EmptyLocator,
    #[error("not a local file url: {0}")]
    BadFileUrl(String),
    #[error("request failed: {0}")]
    Http(Box<ureq::Error>),
    #[error("unexpected http status {0}")]
    Status(u16),
    #[error("image is {size} bytes, limit is {limit}")]
    TooLarge { size: u64, limit: u64 },
    #[error("empty body")]
    EmptyBody,
    #[error("read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("decode: {0}")]
    Decode(#[from] image::ImageError),
}

#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Length of the shorter side after scaling.
    pub target_size: u32,
    pub timeout: Duration,
    pub max_bytes: u64,
    pub user_agent: String,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl FetchOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            target_size: config.target_size.max(1),
            timeout: Duration::from_secs(config.fetch_timeout_secs),
            max_bytes: config.max_image_bytes,
            user_agent: config.user_agent.clone(),
        }
    }
}

/// Loads images over http(s), from `file://` URLs, or from plain paths.
#[derive(Debug)]
pub struct ImageFetch {
    options: FetchOptions,
    agent: ureq::Agent,
}

impl Default for ImageFetch {
    fn default() -> Self {
        Self::new(FetchOptions::default())
    }
}

impl ImageFetch {
    pub fn new(options: FetchOptions) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(options.timeout).build();
        Self { options, agent }
    }

    pub fn options(&self) -> &FetchOptions {
        &self.options
    }

    pub fn try_fetch(&self, locator: &str) -> Result<RgbaImage, FetchError> {
        let bytes = self.load_bytes(locator)?;
        decode_to_fill(&bytes, self.options.target_size)
    }

    fn load_bytes(&self, locator: &str) -> Result<Vec<u8>, FetchError> {
        let locator = locator.trim();
        if locator.is_empty() {
            return Err(FetchError::EmptyLocator);
        }

        if is_http(locator) {
            return self.http_fetch(locator);
        }

        if is_file_url(locator) {
            let path = file_url_to_path(locator)?;
            return self.read_file(&path);
        }

        self.read_file(Path::new(locator))
    }

    fn http_fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let resp = match self.agent.get(url).set("User-Agent", &self.options.user_agent).call() {
            Ok(r) => r,
            Err(ureq::Error::Status(code, _)) => return Err(FetchError::Status(code)),
            Err(e) => return Err(FetchError::Http(Box::new(e))),
        };

        if resp.status() != 200 {
            return Err(FetchError::Status(resp.status()));
        }

        let limit = self.options.max_bytes;
        if let Some(size) = resp.header("Content-Length").and_then(|len| len.parse::<u64>().ok()) {
            if size > limit {
                return Err(FetchError::TooLarge { size, limit });
            }
        }

        // One byte past the limit is enough to tell an oversized body apart.
        let mut bytes = Vec::new();
        resp.into_reader()
            .take(limit.saturating_add(1))
            .read_to_end(&mut bytes)
            .map_err(|source| FetchError::Io {
                path: url.to_string(),
                source,
            })?;
        check_body(bytes, limit)
    }

    fn read_file(&self, path: &Path) -> Result<Vec<u8>, FetchError> {
        let io_err = |source: std::io::Error| FetchError::Io {
            path: path.display().to_string(),
            source,
        };
        let limit = self.options.max_bytes;
        let size = fs::metadata(path).map_err(io_err)?.len();
        if size > limit {
            return Err(FetchError::TooLarge { size, limit });
        }
        let bytes = fs::read(path).map_err(io_err)?;
        check_body(bytes, limit)
    }
}

impl ImageFetcher for ImageFetch {
    fn fetch(&self, locator: &str) -> Option<RgbaImage> {
        match self.try_fetch(locator) {
            Ok(img) => Some(img),
            Err(e) => {
                log::debug!("image fetch failed for {locator:?}: {e}");
                None
            }
        }
    }
}

fn is_http(locator: &str) -> bool {
    let lower = locator.get(..8).unwrap_or(locator).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

fn is_file_url(locator: &str) -> bool {
    locator.get(..5).is_some_and(|scheme| scheme.eq_ignore_ascii_case("file:"))
}

// Percent-decodes and accepts the `file://localhost/` form.
fn file_url_to_path(locator: &str) -> Result<PathBuf, FetchError> {
    Url::parse(locator)
        .ok()
        .and_then(|url| url.to_file_path().ok())
        .ok_or_else(|| FetchError::BadFileUrl(locator.to_string()))
}

fn check_body(bytes: Vec<u8>, limit: u64) -> Result<Vec<u8>, FetchError> {
    if bytes.is_empty() {
        return Err(FetchError::EmptyBody);
    }
    let size = bytes.len() as u64;
    if size > limit {
        return Err(FetchError::TooLarge { size, limit });
    }
    Ok(bytes)
}

/// Decodes and shrinks so the shorter side equals `target`, keeping the aspect
/// ratio. The longer side never exceeds `MAX_ASPECT_RATIO * target`. Images
/// already within bounds are returned as decoded; nothing is enlarged.
pub fn decode_to_fill(bytes: &[u8], target: u32) -> Result<RgbaImage, FetchError> {
    let img = image::load_from_memory(bytes)?;
    let rgba = img.to_rgba8();

    let (w, h) = rgba.dimensions();
    let target = target.max(1);
    let (short, long) = (w.min(h), w.max(h));
    if short == 0 {
        return Ok(rgba);
    }

    let fill = target as f64 / short as f64;
    let cap = target.saturating_mul(MAX_ASPECT_RATIO) as f64 / long as f64;
    let scale = fill.min(cap);
    if scale >= 1.0 {
        return Ok(rgba);
    }

    let new_w = ((w as f64) * scale).round().max(1.0) as u32;
    let new_h = ((h as f64) * scale).round().max(1.0) as u32;
    Ok(imageops::resize(&rgba, new_w, new_h, FilterType::Triangle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageOutputFormat, Rgba};
    use std::io::{Cursor, Read, Write};
    use std::net::TcpListener;

    fn png_bytes(w: u32, h: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(w, h, Rgba([30, 200, 90, 255]));
        let mut out = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut out, ImageOutputFormat::Png)
            .unwrap();
        out.into_inner()
    }

    fn temp_png(w: u32, h: u32) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
        file.write_all(&png_bytes(w, h)).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn shrinks_shorter_side_to_target() {
        let img = decode_to_fill(&png_bytes(512, 256), 128).unwrap();
        assert_eq!(img.dimensions(), (256, 128));

        let img = decode_to_fill(&png_bytes(400, 800), 128).unwrap();
        assert_eq!(img.dimensions(), (128, 256));
    }

    #[test]
    fn small_images_are_not_enlarged() {
        let img = decode_to_fill(&png_bytes(16, 16), 128).unwrap();
        assert_eq!(img.dimensions(), (16, 16));

        let img = decode_to_fill(&png_bytes(40, 80), 128).unwrap();
        assert_eq!(img.dimensions(), (40, 80));
    }

    #[test]
    fn extreme_aspect_ratio_is_bounded() {
        let img = decode_to_fill(&png_bytes(1, 3000), 128).unwrap();
        assert_eq!(img.dimensions(), (1, 128 * MAX_ASPECT_RATIO));

        let img = decode_to_fill(&png_bytes(3000, 200), 128).unwrap();
        let (w, h) = img.dimensions();
        assert_eq!(w, 128 * MAX_ASPECT_RATIO);
        assert!(h < 128, "height was {h}");
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        assert!(matches!(decode_to_fill(b"not an image", 128), Err(FetchError::Decode(_))));
    }

    #[test]
    fn fetches_plain_path_and_file_url() {
        let file = temp_png(300, 300);
        let fetch = ImageFetch::default();

        let path = file.path().to_str().unwrap().to_string();
        let img = fetch.fetch(&path).unwrap();
        assert_eq!(img.dimensions(), (128, 128));
        let px = img.get_pixel(64, 64).0;
        for (got, want) in px.iter().zip([30u8, 200, 90, 255]) {
            assert!(got.abs_diff(want) <= 1, "pixel was {px:?}");
        }

        let url = format!("file://{path}");
        assert!(fetch.fetch(&url).is_some());
    }

    #[test]
    fn file_url_is_percent_decoded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("my cover.png");
        fs::write(&path, png_bytes(200, 200)).unwrap();
        let fetch = ImageFetch::default();

        let url = Url::from_file_path(&path).unwrap();
        assert!(url.as_str().contains("my%20cover.png"));
        let img = fetch.fetch(url.as_str()).unwrap();
        assert_eq!(img.dimensions(), (128, 128));

        let localhost = format!("file://localhost{}", url.path());
        assert!(fetch.fetch(&localhost).is_some());
        assert!(fetch.fetch(&format!("FILE://{}", url.path())).is_some());
    }

    #[test]
    fn remote_file_url_is_rejected() {
        let fetch = ImageFetch::default();
        assert!(matches!(
            fetch.try_fetch("file://example.com/cover.png"),
            Err(FetchError::BadFileUrl(_))
        ));
    }

    #[test]
    fn missing_and_empty_locators_are_none() {
        let fetch = ImageFetch::default();
        assert!(fetch.fetch("").is_none());
        assert!(fetch.fetch("   ").is_none());
        assert!(matches!(fetch.try_fetch(""), Err(FetchError::EmptyLocator)));
        assert!(fetch.fetch("/definitely/not/here.png").is_none());
    }

    #[test]
    fn oversized_file_is_rejected() {
        let file = temp_png(64, 64);
        let fetch = ImageFetch::new(FetchOptions {
            max_bytes: 10,
            ..FetchOptions::default()
        });
        let err = fetch.try_fetch(file.path().to_str().unwrap()).unwrap_err();
        assert!(matches!(err, FetchError::TooLarge { limit: 10, .. }));
    }

    #[test]
    fn empty_file_is_rejected() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let fetch = ImageFetch::default();
        assert!(matches!(
            fetch.try_fetch(file.path().to_str().unwrap()),
            Err(FetchError::EmptyBody)
        ));
    }

    #[test]
    fn detects_http_scheme() {
        assert!(is_http("https://example.com/a.png"));
        assert!(is_http("HTTP://example.com/a.png"));
        assert!(!is_http("file:///tmp/a.png"));
        assert!(!is_http("/tmp/http.png"));
    }

    /// Answers one request on 127.0.0.1 with `response`, then hangs up.
    fn serve_once(response: Vec<u8>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || {
            let Ok((mut stream, _)) = listener.accept() else { return };
            let mut seen = Vec::new();
            let mut buf = [0u8; 1024];
            while !seen.windows(4).any(|w| w == b"\r\n\r\n") {
                match stream.read(&mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => seen.extend_from_slice(&buf[..n]),
                }
            }
            let _ = stream.write_all(&response);
        });
        format!("http://{addr}/cover.png")
    }

    fn http_response(head: &str, body: &[u8]) -> Vec<u8> {
        let mut out = format!("{head}\r\nConnection: close\r\n\r\n").into_bytes();
        out.extend_from_slice(body);
        out
    }

    fn capped(max_bytes: u64) -> ImageFetch {
        ImageFetch::new(FetchOptions {
            max_bytes,
            ..FetchOptions::default()
        })
    }

    #[test]
    fn http_image_is_decoded() {
        let body = png_bytes(256, 256);
        let head = format!("HTTP/1.1 200 OK\r\nContent-Type: image/png\r\nContent-Length: {}", body.len());
        let url = serve_once(http_response(&head, &body));
        let img = ImageFetch::default().try_fetch(&url).unwrap();
        assert_eq!(img.dimensions(), (128, 128));
    }

    #[test]
    fn http_error_status_is_reported() {
        let url = serve_once(http_response("HTTP/1.1 404 Not Found\r\nContent-Length: 0", b""));
        let fetch = ImageFetch::default();
        assert!(matches!(fetch.try_fetch(&url), Err(FetchError::Status(404))));
    }

    #[test]
    fn http_content_length_over_cap_is_rejected() {
        let body = vec![0u8; 100];
        let url = serve_once(http_response("HTTP/1.1 200 OK\r\nContent-Length: 100", &body));
        assert!(matches!(
            capped(10).try_fetch(&url),
            Err(FetchError::TooLarge { size: 100, limit: 10 })
        ));
    }

    #[test]
    fn http_body_without_length_is_capped_while_reading() {
        let body = vec![7u8; 50];
        let url = serve_once(http_response("HTTP/1.1 200 OK", &body));
        assert!(matches!(
            capped(10).try_fetch(&url),
            Err(FetchError::TooLarge { size: 11, limit: 10 })
        ));
    }

    #[test]
    fn http_empty_body_is_rejected() {
        let url = serve_once(http_response("HTTP/1.1 200 OK\r\nContent-Length: 0", b""));
        assert!(matches!(ImageFetch::default().try_fetch(&url), Err(FetchError::EmptyBody)));
    }
}
