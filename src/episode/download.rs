// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use async_trait::async_trait;
use futures::StreamExt;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::config::FeedConfig;
use crate::error::DownloadError;
use crate::http::HttpClient;
use crate::media::TempMedia;
use crate::model::Episode;
use crate::progress::{NoopReporter, ProgressEvent, SharedProgressReporter};

const TOO_MANY_REQUESTS: u16 = 429;
const DOWNLOAD_PREFIX: &str = "podtrim-dl-";

/// Fetches the media of an episode
#[async_trait]
pub trait Downloader: Send + Sync {
    /// Download `episode` into temporary storage
    ///
    /// Throttling by the source must surface as [`DownloadError::RateLimited`].
    async fn download(
        &self,
        feed: &FeedConfig,
        episode: &Episode,
    ) -> Result<TempMedia, DownloadError>;
}

/// Downloader streaming the episode's source URL over HTTP
pub struct HttpDownloader<C> {
    client: C,
    reporter: SharedProgressReporter,
}

impl<C: HttpClient> HttpDownloader<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            reporter: NoopReporter::shared(),
        }
    }

    pub fn with_reporter(mut self, reporter: SharedProgressReporter) -> Self {
        self.reporter = reporter;
        self
    }
}

#[async_trait]
impl<C: HttpClient> Downloader for HttpDownloader<C> {
    async fn download(
        &self,
        feed: &FeedConfig,
        episode: &Episode,
    ) -> Result<TempMedia, DownloadError> {
        let url = episode.video_url.as_str();

        let response = self
            .client
            .get_stream(url)
            .await
            .map_err(|e| DownloadError::HttpFailed {
                url: url.to_string(),
                source: e,
            })?;

        if response.status == TOO_MANY_REQUESTS {
            return Err(DownloadError::RateLimited {
                url: url.to_string(),
            });
        }
        if response.status >= 400 {
            return Err(DownloadError::HttpStatus {
                url: url.to_string(),
                status: response.status,
            });
        }

        let media = TempMedia::allocate(
            DOWNLOAD_PREFIX,
            &format!("download.{}", feed.format.extension()),
        )
        .map_err(DownloadError::TempDirFailed)?;
        let output_path = media.path().to_path_buf();

        let mut file =
            File::create(&output_path)
                .await
                .map_err(|e| DownloadError::FileWriteFailed {
                    path: output_path.clone(),
                    source: e,
                })?;

        let mut bytes_downloaded: u64 = 0;
        let mut stream = response.body;

        while let Some(chunk_result) = stream.next().await {
            let chunk = chunk_result.map_err(|e| DownloadError::StreamFailed {
                url: url.to_string(),
                source: e,
            })?;

            file.write_all(&chunk)
                .await
                .map_err(|e| DownloadError::FileWriteFailed {
                    path: output_path.clone(),
                    source: e,
                })?;

            bytes_downloaded += chunk.len() as u64;

            self.reporter.report(ProgressEvent::DownloadProgress {
                feed_id: feed.id.clone(),
                episode_id: episode.id.clone(),
                bytes_downloaded,
                total_bytes: response.content_length,
            });
        }

        file.flush()
            .await
            .map_err(|e| DownloadError::FileWriteFailed {
                path: output_path.clone(),
                source: e,
            })?;

        if let Some(expected) = response.content_length
            && expected != bytes_downloaded
        {
            warn!(
                episode_id = %episode.id,
                expected,
                received = bytes_downloaded,
                "content length mismatch"
            );
        }

        debug!(episode_id = %episode.id, bytes = bytes_downloaded, "download finished");
        Ok(media)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{ByteStream, HttpBytes, HttpResponse};
    use crate::model::EpisodeStatus;
    use crate::model::tests::make_episode;
    use bytes::Bytes;

    struct MockHttpClient {
        response_data: Vec<u8>,
        status: u16,
    }

    #[async_trait]
    impl HttpClient for MockHttpClient {
        async fn get_bytes(&self, _url: &str) -> Result<HttpBytes, reqwest::Error> {
            Ok(HttpBytes {
                status: self.status,
                body: Bytes::from(self.response_data.clone()),
            })
        }

        async fn get_stream(&self, _url: &str) -> Result<HttpResponse, reqwest::Error> {
            let data = self.response_data.clone();
            let len = data.len() as u64;

            let stream: ByteStream =
                Box::pin(futures::stream::once(async move { Ok(Bytes::from(data)) }));

            Ok(HttpResponse {
                status: self.status,
                content_length: Some(len),
                body: stream,
            })
        }
    }

    fn feed() -> FeedConfig {
        FeedConfig::new("feed", "https://example.com/feed.xml")
    }

    #[tokio::test]
    async fn download_writes_temp_file() {
        let downloader = HttpDownloader::new(MockHttpClient {
            response_data: b"test audio content".to_vec(),
            status: 200,
        });
        let episode = make_episode("ep", 0, EpisodeStatus::New);

        let media = downloader.download(&feed(), &episode).await.unwrap();

        assert_eq!(std::fs::read(media.path()).unwrap(), b"test audio content");
        assert!(media.path().ends_with("download.mp3"));
    }

    #[tokio::test]
    async fn too_many_requests_is_rate_limit() {
        let downloader = HttpDownloader::new(MockHttpClient {
            response_data: Vec::new(),
            status: 429,
        });
        let episode = make_episode("ep", 0, EpisodeStatus::New);

        let result = downloader.download(&feed(), &episode).await;

        assert!(matches!(result, Err(DownloadError::RateLimited { .. })));
    }

    #[tokio::test]
    async fn download_fails_on_http_error() {
        let downloader = HttpDownloader::new(MockHttpClient {
            response_data: b"Not Found".to_vec(),
            status: 404,
        });
        let episode = make_episode("ep", 0, EpisodeStatus::New);

        match downloader.download(&feed(), &episode).await.unwrap_err() {
            DownloadError::HttpStatus { status, .. } => assert_eq!(status, 404),
            other => panic!("Expected HttpStatus error, got {other:?}"),
        }
    }
}
