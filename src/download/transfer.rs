//! Resumable transfer of a single file.
//!
//! One call to [`ResumableTransfer::run`] is one attempt:
//!
//! 1. probe the resource and read the `.part` size
//! 2. reconcile the two (finalize if complete, truncate if too long, drop
//!    the offset if the server cannot do ranges)
//! 3. GET the remaining bytes, ranged when possible
//! 4. check the result against the known total and rename `.part` into place
//!
//! A `416` triggers a second probe and at most one restart from step 2.
//! Everything else that goes wrong is returned to the retry loop.

use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use reqwest::header::{CONTENT_RANGE, HeaderMap, HeaderValue, IF_RANGE, RANGE};
use reqwest::{Method, StatusCode};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument, warn};

use super::client::HttpClient;
use super::error::DownloadError;
use super::filename::part_path;
use super::probe::{ProbeResult, probe};

/// How a successful attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferOutcome {
    /// Bytes were received and the file was finalized.
    Completed {
        /// Final file size.
        bytes: u64,
        /// Offset the transfer resumed from (0 for a full download).
        resumed_from: u64,
    },
    /// The `.part` already held the whole resource; it was only renamed.
    AlreadyComplete {
        /// Final file size.
        bytes: u64,
    },
}

impl TransferOutcome {
    /// Size of the finalized file.
    #[must_use]
    pub fn bytes(&self) -> u64 {
        match self {
            Self::Completed { bytes, .. } | Self::AlreadyComplete { bytes } => *bytes,
        }
    }
}

/// One file's transfer state: where it goes and how to ask for it.
#[derive(Debug)]
pub struct ResumableTransfer<'a> {
    client: &'a HttpClient,
    headers: &'a HeaderMap,
    url: &'a str,
    final_path: PathBuf,
    part_path: PathBuf,
}

impl<'a> ResumableTransfer<'a> {
    /// Prepares a transfer of `url` into `final_path` using `client`.
    ///
    /// `headers` are sent with every request of the attempt; range headers
    /// are added on top as needed.
    #[must_use]
    pub fn new(
        client: &'a HttpClient,
        headers: &'a HeaderMap,
        url: &'a str,
        final_path: impl Into<PathBuf>,
    ) -> Self {
        let final_path = final_path.into();
        let part_path = part_path(&final_path);
        Self {
            client,
            headers,
            url,
            final_path,
            part_path,
        }
    }

    /// Path of the in-flight partial file.
    #[must_use]
    pub fn part_path(&self) -> &Path {
        &self.part_path
    }

    /// Runs one attempt of the state machine.
    ///
    /// # Errors
    ///
    /// Returns a [`DownloadError`] for any failure; the `.part` file is left
    /// in a state the next attempt can reconcile.
    #[instrument(skip(self), fields(url = %self.url, path = %self.final_path.display()))]
    pub async fn run(&self) -> Result<TransferOutcome, DownloadError> {
        let mut probed = probe(self.client, self.url, self.headers).await;
        let mut restarted = false;

        loop {
            let mut offset = self.reconcile_partial(&probed).await?;
            if let Some(total) = probed.total_size
                && offset == total
                && self.part_exists().await
            {
                return self.finalize_complete(total).await;
            }
            if !probed.supports_range {
                offset = 0;
            }

            let response = self.request(offset, &probed).await?;
            let status = response.status();

            if status == StatusCode::RANGE_NOT_SATISFIABLE {
                if restarted {
                    return Err(self.unhealed_range_error().await);
                }
                warn!(resume_from = offset, "server rejected range, re-probing");
                probed = probe(self.client, self.url, self.headers).await;
                let partial = self.partial_len().await?;
                match probed.total_size {
                    Some(total) if partial == total && self.part_exists().await => {
                        return self.finalize_complete(total).await;
                    }
                    Some(total) if partial > total => {
                        restarted = true;
                        continue;
                    }
                    _ => return Err(self.unhealed_range_error().await),
                }
            }

            if matches!(status.as_u16(), 418 | 429) {
                return Err(DownloadError::temporary_block(self.url, status.as_u16()));
            }
            if !matches!(status, StatusCode::OK | StatusCode::PARTIAL_CONTENT) {
                return Err(DownloadError::http_status(self.url, status.as_u16()));
            }

            return self.receive(response, offset, probed.total_size).await;
        }
    }

    /// Returns the usable partial size, truncating overage.
    async fn reconcile_partial(&self, probed: &ProbeResult) -> Result<u64, DownloadError> {
        let partial = self.partial_len().await?;
        let Some(total) = probed.total_size else {
            return Ok(partial);
        };
        if partial <= total {
            return Ok(partial);
        }

        info!(partial, total, "partial file longer than resource, truncating");
        match self.truncate_partial(total).await {
            Ok(()) => Ok(total),
            Err(error) => {
                warn!(error = %error, "truncate failed, discarding partial file");
                self.discard_partial().await;
                Ok(0)
            }
        }
    }

    async fn request(
        &self,
        offset: u64,
        probed: &ProbeResult,
    ) -> Result<reqwest::Response, DownloadError> {
        let mut headers = self.headers.clone();
        if offset > 0 {
            let range = HeaderValue::from_str(&format!("bytes={offset}-"))
                .map_err(|_| DownloadError::invalid_url(self.url))?;
            headers.insert(RANGE, range);
            if let Some(token) = probed
                .validation_token
                .as_deref()
                .and_then(|t| HeaderValue::from_str(t).ok())
            {
                headers.insert(IF_RANGE, token);
            }
        }
        debug!(resume_from = offset, "issuing GET");
        self.client.send(Method::GET, self.url, &headers).await
    }

    /// Writes a 200 or 206 body, checks its size and renames it into place.
    async fn receive(
        &self,
        response: reqwest::Response,
        requested_offset: u64,
        probed_total: Option<u64>,
    ) -> Result<TransferOutcome, DownloadError> {
        let (write_offset, expected_total) = if response.status() == StatusCode::PARTIAL_CONTENT {
            let content_range = response
                .headers()
                .get(CONTENT_RANGE)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_content_range);
            match content_range {
                Some(range) if range.start == requested_offset => {
                    (requested_offset, range.total.or(probed_total))
                }
                other => {
                    self.discard_partial().await;
                    return Err(DownloadError::range_mismatch(
                        self.url,
                        requested_offset,
                        other.map(|r| r.start),
                    ));
                }
            }
        } else {
            if requested_offset > 0 {
                debug!(
                    resume_from = requested_offset,
                    "server ignored range, overwriting partial"
                );
            }
            // Full body: only its own Content-Length counts, never the probe's.
            (0, response.content_length())
        };

        let file = if write_offset > 0 {
            OpenOptions::new()
                .append(true)
                .open(&self.part_path)
                .await
        } else {
            File::create(&self.part_path).await
        }
        .map_err(|e| DownloadError::io(self.part_path.clone(), e))?;

        let received = stream_to_file(file, response, self.url, &self.part_path).await?;
        let actual = write_offset.saturating_add(received);

        if let Some(expected) = expected_total
            && expected != actual
        {
            return Err(DownloadError::integrity(
                self.part_path.clone(),
                expected,
                actual,
            ));
        }

        self.rename_into_place().await?;
        info!(
            bytes = actual,
            resume_from = write_offset,
            "download complete"
        );
        Ok(TransferOutcome::Completed {
            bytes: actual,
            resumed_from: write_offset,
        })
    }

    async fn finalize_complete(&self, total: u64) -> Result<TransferOutcome, DownloadError> {
        self.rename_into_place().await?;
        info!(bytes = total, "partial file already complete, finalized");
        Ok(TransferOutcome::AlreadyComplete { bytes: total })
    }

    async fn rename_into_place(&self) -> Result<(), DownloadError> {
        tokio::fs::rename(&self.part_path, &self.final_path)
            .await
            .map_err(|e| DownloadError::io(self.final_path.clone(), e))
    }

    async fn unhealed_range_error(&self) -> DownloadError {
        let partial = self.partial_len().await.unwrap_or(0);
        self.discard_partial().await;
        DownloadError::range_not_satisfiable(self.url, partial)
    }

    async fn partial_len(&self) -> Result<u64, DownloadError> {
        match tokio::fs::metadata(&self.part_path).await {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(DownloadError::io(self.part_path.clone(), e)),
        }
    }

    async fn part_exists(&self) -> bool {
        tokio::fs::try_exists(&self.part_path)
            .await
            .unwrap_or(false)
    }

    async fn truncate_partial(&self, len: u64) -> std::io::Result<()> {
        let file = OpenOptions::new().write(true).open(&self.part_path).await?;
        file.set_len(len).await?;
        file.sync_all().await
    }

    async fn discard_partial(&self) {
        if let Err(error) = tokio::fs::remove_file(&self.part_path).await
            && error.kind() != std::io::ErrorKind::NotFound
        {
            warn!(path = %self.part_path.display(), error = %error, "failed to remove partial file");
        }
    }
}

/// Streams the response body into `file`, returning the bytes written.
///
/// Bytes written before a stream error stay on disk for the next attempt.
async fn stream_to_file(
    file: File,
    response: reqwest::Response,
    url: &str,
    file_path: &Path,
) -> Result<u64, DownloadError> {
    let mut writer = BufWriter::new(file);
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;

    let streamed = async {
        while let Some(chunk_result) = stream.next().await {
            let chunk = chunk_result.map_err(|e| DownloadError::from_reqwest(url, e))?;
            writer
                .write_all(&chunk)
                .await
                .map_err(|e| DownloadError::io(file_path.to_path_buf(), e))?;
            bytes_written += chunk.len() as u64;
        }
        Ok::<(), DownloadError>(())
    }
    .await;

    let flushed = writer
        .flush()
        .await
        .map_err(|e| DownloadError::io(file_path.to_path_buf(), e));
    streamed?;
    flushed?;
    Ok(bytes_written)
}

/// Parsed `Content-Range: bytes <start>-<end>/<total|*>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ContentRange {
    pub(crate) start: u64,
    pub(crate) total: Option<u64>,
}

pub(crate) fn parse_content_range(value: &str) -> Option<ContentRange> {
    let rest = value.trim().strip_prefix("bytes")?.trim_start();
    let (span, total) = rest.split_once('/')?;
    let (start, end) = span.trim().split_once('-')?;
    let start = start.trim().parse::<u64>().ok()?;
    let end = end.trim().parse::<u64>().ok()?;
    if end < start {
        return None;
    }
    let total = match total.trim() {
        "*" => None,
        t => Some(t.parse::<u64>().ok()?),
    };
    Some(ContentRange { start, total })
}
