// src/download/mod.rs
// =============================================================================
// This module downloads the images a crawl discovered.
//
// For every image URL:
// 1. Claim it in the registry (already saved or in flight -> skipped)
// 2. GET it with the image timeout
// 3. Reject anything whose content type isn't image/*
// 4. Reserve a unique file name and write the bytes
//
// Files are written to a hidden `.name.part` file first and renamed when
// complete, so an interrupted run never leaves a truncated image behind.
// Up to `concurrency` downloads run at once, in no particular order.
//
// Rust concepts:
// - Drop guard (PartialFile): cleanup that runs however the write ends,
//   including when its future is dropped by a timeout or Ctrl-C
// - #[serde(tag = "result")]: DownloadResult serializes as a flat JSON
//   object with a "result" field naming the variant
// =============================================================================

mod filename;
mod registry;

pub use registry::ImageRegistry;

use filename::{file_name_for, part_name};

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::stream::{self, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::config::CrawlConfig;
use crate::crawl::fetch::get;
use crate::crawl::normalize::ImageUrl;
use crate::error::CrawlError;

/// What happened to one image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum DownloadResult {
    /// Written to `path`.
    Saved { path: PathBuf },
    /// Already saved (or being saved) earlier in this run; not fetched again.
    SkippedDuplicate,
    /// The server answered with something that isn't an image.
    RejectedContentType { content_type: String },
    /// Network, HTTP or filesystem failure.
    Failed { reason: String },
}

/// One image URL together with its outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageReport {
    pub url: String,
    #[serde(flatten)]
    pub result: DownloadResult,
}

pub struct Downloader {
    client: Client,
    output_dir: PathBuf,
    image_timeout: Duration,
    write_timeout: Duration,
    workers: usize,
    registry: ImageRegistry,
}

impl Downloader {
    /// Prepares `config.output_dir` (creating it and its parents) and
    /// remembers the files already in it so they are never overwritten.
    pub async fn new(client: Client, config: &CrawlConfig) -> Result<Self, CrawlError> {
        let output_dir = config.output_dir.clone();
        let dir_error = |source| CrawlError::OutputDir {
            path: output_dir.clone(),
            source,
        };

        tokio::fs::create_dir_all(&output_dir).await.map_err(dir_error)?;
        let existing = existing_file_names(&output_dir).await.map_err(dir_error)?;
        debug!(
            dir = %output_dir.display(),
            existing = existing.len(),
            "output directory ready"
        );

        Ok(Self {
            client,
            output_dir,
            image_timeout: config.image_timeout,
            write_timeout: config.write_timeout,
            workers: config.workers(),
            registry: ImageRegistry::with_taken_names(existing),
        })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Downloads every image in `images`. Failures are reported per image,
    /// they never stop the batch.
    pub async fn download_all<I>(&self, images: I) -> Vec<ImageReport>
    where
        I: IntoIterator<Item = ImageUrl>,
    {
        let mut images: Vec<ImageUrl> = images.into_iter().collect();
        images.sort();
        info!(images = images.len(), dir = %self.output_dir.display(), "downloading images");

        let mut reports: Vec<ImageReport> = stream::iter(images)
            .map(|url| async move {
                let result = self.download(&url).await;
                ImageReport {
                    url: url.as_str().to_string(),
                    result,
                }
            })
            .buffer_unordered(self.workers)
            .collect()
            .await;

        reports.sort_by(|a, b| a.url.cmp(&b.url));
        info!(saved = self.registry.saved_count(), "downloads finished");
        reports
    }

    // Downloads a single image
    //
    // Returns: What happened. Anything short of Saved releases the URL
    //   (and its reserved name) so a later attempt may retry it.
    pub async fn download(&self, url: &ImageUrl) -> DownloadResult {
        if !self.registry.begin(url) {
            debug!(image = %url, "already downloaded");
            return DownloadResult::SkippedDuplicate;
        }

        let fetched = match get(&self.client, url.as_url(), self.image_timeout).await {
            Ok(fetched) => fetched,
            Err(error) => {
                self.registry.release(url);
                warn!(image = %url, %error, "download failed");
                return DownloadResult::Failed {
                    reason: error.to_string(),
                };
            }
        };

        if !fetched.is_image() {
            self.registry.release(url);
            warn!(image = %url, content_type = %fetched.content_type, "not an image");
            return DownloadResult::RejectedContentType {
                content_type: fetched.content_type,
            };
        }

        // Only now do we know the content type, and so the extension
        let preferred = file_name_for(url.as_url(), &fetched.content_type);
        let name = self.registry.reserve_name(url, &preferred);

        let written = tokio::time::timeout(
            self.write_timeout,
            write_atomically(&self.output_dir, &name, &fetched.bytes),
        )
        .await
        .unwrap_or_else(|_| Err(io::Error::new(io::ErrorKind::TimedOut, "write timed out")));

        match written {
            Ok(path) => {
                self.registry.commit(url);
                debug!(image = %url, path = %path.display(), bytes = fetched.bytes.len(), "saved");
                DownloadResult::Saved { path }
            }
            Err(error) => {
                self.registry.release(url);
                warn!(image = %url, file = %name, %error, "could not write image");
                DownloadResult::Failed {
                    reason: format!("write {}: {}", name, error),
                }
            }
        }
    }
}

// Removes the temporary file unless the write completed
//
// Runs on every early exit: an I/O error, the write timeout firing, or the
// whole run being cancelled with Ctrl-C.
struct PartialFile {
    path: Option<PathBuf>,
}

impl PartialFile {
    fn disarm(mut self) {
        self.path = None;
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            let _ = std::fs::remove_file(path);
        }
    }
}

// Writes `bytes` to `dir/name` without ever exposing a half-written file
//
// Parameters:
//   dir: The output directory (already exists)
//   name: File name reserved in the registry, along with its `.part` twin
//   bytes: The image body
//
// Returns: The final path
//
// The temporary file is opened synchronously with create_new, so the open
// can't be cancelled halfway and can't clobber a file we didn't make. After
// that we own the handle: a write still pending on the blocking pool when
// the guard unlinks the path lands in the unlinked file, never a new one.
async fn write_atomically(dir: &Path, name: &str, bytes: &[u8]) -> io::Result<PathBuf> {
    let final_path = dir.join(name);
    let temp_path = dir.join(part_name(name));

    let file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&temp_path)?;
    let guard = PartialFile {
        path: Some(temp_path.clone()),
    };

    let mut file = tokio::fs::File::from_std(file);
    file.write_all(bytes).await?;
    // flush waits for the blocking-pool write to finish
    file.flush().await?;
    drop(file);

    tokio::fs::rename(&temp_path, &final_path).await?;
    guard.disarm();

    Ok(final_path)
}

async fn existing_file_names(dir: &Path) -> io::Result<Vec<String>> {
    let mut names = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if let Some(name) = entry.file_name().to_str() {
            names.push(name.to_string());
        }
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawl::normalize::image_link;
    use httpmock::prelude::*;
    use tempfile::TempDir;
    use url::Url;

    fn img(server: &MockServer, path: &str) -> ImageUrl {
        image_link(&Url::parse(&server.base_url()).unwrap(), path).unwrap()
    }

    async fn downloader(dir: &Path) -> Downloader {
        let mut config = CrawlConfig::new("http://unused.test", dir);
        config.image_timeout = Duration::from_millis(500);
        Downloader::new(Client::new(), &config).await.unwrap()
    }

    async fn serve<'a>(
        server: &'a MockServer,
        path: &str,
        content_type: &str,
        body: &str,
    ) -> httpmock::Mock<'a> {
        let (path, content_type, body) = (path.to_string(), content_type.to_string(), body.to_string());
        server
            .mock_async(move |when, then| {
                when.method(GET).path(path);
                then.status(200).header("content-type", content_type).body(body);
            })
            .await
    }

    fn files_in(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_saves_image() {
        let server = MockServer::start_async().await;
        serve(&server, "/img/logo.png", "image/png", "PNGDATA").await;
        let tmp = TempDir::new().unwrap();
        let downloader = downloader(tmp.path()).await;

        let result = downloader.download(&img(&server, "/img/logo.png")).await;

        let expected = tmp.path().join("logo.png");
        assert_eq!(result, DownloadResult::Saved { path: expected.clone() });
        assert_eq!(std::fs::read(expected).unwrap(), b"PNGDATA");
        assert_eq!(files_in(tmp.path()), vec!["logo.png"]);
    }

    #[tokio::test]
    async fn test_creates_missing_output_dir() {
        let tmp = TempDir::new().unwrap();
        let nested = tmp.path().join("a").join("b");
        let downloader = downloader(&nested).await;
        assert!(downloader.output_dir().is_dir());
    }

    #[tokio::test]
    async fn test_output_dir_that_is_a_file_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("taken");
        std::fs::write(&file, b"x").unwrap();

        let config = CrawlConfig::new("http://unused.test", &file);
        let result = Downloader::new(Client::new(), &config).await;
        assert!(matches!(result, Err(CrawlError::OutputDir { .. })));
    }

    #[tokio::test]
    async fn test_html_disguised_as_image_is_rejected() {
        let server = MockServer::start_async().await;
        serve(&server, "/broken.jpg", "text/html", "<html>not found</html>").await;
        let tmp = TempDir::new().unwrap();
        let downloader = downloader(tmp.path()).await;

        let result = downloader.download(&img(&server, "/broken.jpg")).await;

        assert_eq!(
            result,
            DownloadResult::RejectedContentType {
                content_type: "text/html".to_string()
            }
        );
        assert!(files_in(tmp.path()).is_empty());
    }

    #[tokio::test]
    async fn test_http_error_and_timeout_fail_without_files() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/gone.png");
                then.status(410);
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/slow.png");
                then.status(200)
                    .header("content-type", "image/png")
                    .body("late")
                    .delay(Duration::from_secs(3));
            })
            .await;
        let tmp = TempDir::new().unwrap();
        let downloader = downloader(tmp.path()).await;

        let gone = downloader.download(&img(&server, "/gone.png")).await;
        let slow = downloader.download(&img(&server, "/slow.png")).await;

        assert_eq!(gone, DownloadResult::Failed { reason: "HTTP 410".to_string() });
        assert_eq!(slow, DownloadResult::Failed { reason: "request timed out".to_string() });
        assert!(files_in(tmp.path()).is_empty());
    }

    #[tokio::test]
    async fn test_second_pass_is_all_duplicates() {
        let server = MockServer::start_async().await;
        let a = serve(&server, "/a.png", "image/png", "A").await;
        let b = serve(&server, "/b.gif", "image/gif", "B").await;
        let tmp = TempDir::new().unwrap();
        let downloader = downloader(tmp.path()).await;
        let images = vec![img(&server, "/a.png"), img(&server, "/b.gif")];

        let first = downloader.download_all(images.clone()).await;
        let second = downloader.download_all(images).await;

        assert!(first.iter().all(|r| matches!(r.result, DownloadResult::Saved { .. })));
        assert!(second.iter().all(|r| r.result == DownloadResult::SkippedDuplicate));
        a.assert_calls_async(1).await;
        b.assert_calls_async(1).await;
        assert_eq!(files_in(tmp.path()), vec!["a.png", "b.gif"]);
        assert_eq!(downloader.registry.saved_count(), 2);
    }

    #[tokio::test]
    async fn test_same_file_name_from_distinct_urls() {
        let server = MockServer::start_async().await;
        serve(&server, "/one/logo.png", "image/png", "ONE").await;
        serve(&server, "/two/logo.png", "image/png", "TWO").await;
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("logo.png"), b"OLD").unwrap();
        let downloader = downloader(tmp.path()).await;

        let reports = downloader
            .download_all(vec![img(&server, "/one/logo.png"), img(&server, "/two/logo.png")])
            .await;

        assert!(reports.iter().all(|r| matches!(r.result, DownloadResult::Saved { .. })));
        assert_eq!(files_in(tmp.path()), vec!["logo-1.png", "logo-2.png", "logo.png"]);
        assert_eq!(std::fs::read(tmp.path().join("logo.png")).unwrap(), b"OLD");

        let mut contents: Vec<Vec<u8>> = ["logo-1.png", "logo-2.png"]
            .iter()
            .map(|n| std::fs::read(tmp.path().join(n)).unwrap())
            .collect();
        contents.sort();
        assert_eq!(contents, vec![b"ONE".to_vec(), b"TWO".to_vec()]);
    }

    #[tokio::test]
    async fn test_extension_comes_from_content_type() {
        let server = MockServer::start_async().await;
        serve(&server, "/avatar", "image/jpeg", "JPEG").await;
        let tmp = TempDir::new().unwrap();
        let downloader = downloader(tmp.path()).await;

        let result = downloader.download(&img(&server, "/avatar?size=64")).await;
        assert_eq!(
            result,
            DownloadResult::Saved {
                path: tmp.path().join("avatar.jpg")
            }
        );
    }

    #[tokio::test]
    async fn test_failed_image_can_be_retried() {
        let server = MockServer::start_async().await;
        let missing = server
            .mock_async(|when, then| {
                when.method(GET).path("/later.png");
                then.status(503);
            })
            .await;
        let tmp = TempDir::new().unwrap();
        let downloader = downloader(tmp.path()).await;
        let url = img(&server, "/later.png");

        assert!(matches!(downloader.download(&url).await, DownloadResult::Failed { .. }));

        missing.delete_async().await;
        serve(&server, "/later.png", "image/png", "OK").await;
        assert!(matches!(downloader.download(&url).await, DownloadResult::Saved { .. }));
    }

    #[tokio::test]
    async fn test_write_leaves_no_partial_file() {
        let tmp = TempDir::new().unwrap();
        let path = write_atomically(tmp.path(), "x.png", b"data").await.unwrap();
        assert_eq!(path, tmp.path().join("x.png"));
        assert_eq!(files_in(tmp.path()), vec!["x.png"]);
    }

    #[tokio::test]
    async fn test_write_never_clobbers_a_foreign_part_file() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join(".x.png.part"), b"USER").unwrap();

        let result = write_atomically(tmp.path(), "x.png", b"data").await;

        assert_eq!(result.unwrap_err().kind(), io::ErrorKind::AlreadyExists);
        assert_eq!(std::fs::read(tmp.path().join(".x.png.part")).unwrap(), b"USER");
        assert_eq!(files_in(tmp.path()), vec![".x.png.part"]);
    }

    #[tokio::test]
    async fn test_existing_part_file_is_left_alone() {
        let server = MockServer::start_async().await;
        serve(&server, "/logo.png", "image/png", "NEW").await;
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join(".logo.png.part"), b"USER").unwrap();
        let downloader = downloader(tmp.path()).await;

        let result = downloader.download(&img(&server, "/logo.png")).await;

        assert_eq!(
            result,
            DownloadResult::Saved {
                path: tmp.path().join("logo-1.png")
            }
        );
        assert_eq!(std::fs::read(tmp.path().join(".logo.png.part")).unwrap(), b"USER");
    }

    #[tokio::test]
    async fn test_cancelled_write_leaves_no_part_file() {
        let tmp = TempDir::new().unwrap();
        let body = vec![7u8; 4 * 1024 * 1024];

        let result = tokio::time::timeout(
            Duration::ZERO,
            write_atomically(tmp.path(), "big.png", &body),
        )
        .await;

        // Give an abandoned blocking write time to land
        tokio::time::sleep(Duration::from_millis(200)).await;
        let files = files_in(tmp.path());
        assert!(files.iter().all(|name| !name.ends_with(".part")), "{:?}", files);
        if matches!(result, Ok(Ok(_))) {
            assert_eq!(files, vec!["big.png"]);
        }
    }

    #[tokio::test]
    async fn test_failed_write_cleans_up() {
        let tmp = TempDir::new().unwrap();
        // Renaming a file onto a directory fails.
        std::fs::create_dir(tmp.path().join("clash.png")).unwrap();

        let result = write_atomically(tmp.path(), "clash.png", b"data").await;
        assert!(result.is_err());
        assert_eq!(files_in(tmp.path()), vec!["clash.png"]);
    }

    #[test]
    fn test_report_json_shape() {
        let report = ImageReport {
            url: "http://ex.test/a.png".to_string(),
            result: DownloadResult::RejectedContentType {
                content_type: "text/html".to_string(),
            },
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["result"], "rejected_content_type");
        assert_eq!(json["content_type"], "text/html");
        assert_eq!(json["url"], "http://ex.test/a.png");
    }
}
