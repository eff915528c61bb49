use anyhow::{Context, Result, anyhow};
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::blocking::Client as HttpClient;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use std::collections::VecDeque;
use std::fs::OpenOptions;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use crate::config::Credentials;
use crate::error::{ApiError, vendor_message};
use crate::util::{filename_from_url, redact_params};

pub const DEFAULT_WORKER_COUNT: usize = 5;
pub const DEFAULT_MAX_ATTEMPTS: usize = 10;

/// Terminal state of one download task.
#[derive(Debug)]
pub enum Outcome {
    /// File written completely; holds the destination path.
    Done(PathBuf),
    /// Task failed permanently: an HTTP-level rejection, or transient
    /// transport errors exhausting the attempt budget.
    Failed(anyhow::Error),
}

impl Outcome {
    pub fn is_done(&self) -> bool {
        matches!(self, Outcome::Done(_))
    }
}

struct Task {
    url: String,
    attempts: usize,
}

enum FetchFailure {
    /// Connection-level error; the task goes back on the queue.
    Transient(anyhow::Error),
    /// Not retried: HTTP rejection or a local filesystem problem.
    Permanent(anyhow::Error),
}

/// Bulk file downloader with a fixed-size worker pool.
///
/// Workers pull from a shared queue; a transient transport failure requeues
/// the task until `max_attempts`, while a non-2xx HTTP response fails the
/// task immediately. The batch always runs every task to a terminal state;
/// failures are reported per URL next to the successes.
pub struct Downloader {
    credentials: Credentials,
    worker_count: usize,
    max_attempts: usize,
    progress: bool,
    http: HttpClient,
}

impl Downloader {
    pub fn new(credentials: Credentials) -> Result<Self> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("swrve-export-rs/{}", env!("CARGO_PKG_VERSION")))
                .unwrap_or(HeaderValue::from_static("swrve-export-rs")),
        );

        let http = HttpClient::builder()
            .default_headers(default_headers)
            .timeout(Duration::from_secs(60))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            credentials,
            worker_count: DEFAULT_WORKER_COUNT,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            progress: true,
            http,
        })
    }

    /// Number of concurrently in-flight downloads.
    pub fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count.max(1);
        self
    }

    /// Attempt budget per task for transient transport failures.
    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    /// Downloads every URL into `dest_dir`, naming each file from the URL's
    /// final path segment. Returns one `(url, outcome)` per task, in
    /// completion order. Sibling tasks are unaffected by a failure.
    pub fn download_all(&self, urls: &[String], dest_dir: &Path) -> Result<Vec<(String, Outcome)>> {
        if urls.is_empty() {
            return Ok(Vec::new());
        }

        std::fs::create_dir_all(dest_dir)
            .with_context(|| format!("failed to create directory {}", dest_dir.display()))?;

        let queue: Mutex<VecDeque<Task>> = Mutex::new(
            urls.iter()
                .map(|url| Task {
                    url: url.clone(),
                    attempts: 0,
                })
                .collect(),
        );
        let results: Mutex<Vec<(String, Outcome)>> = Mutex::new(Vec::with_capacity(urls.len()));

        let pb = if self.progress {
            let pb = ProgressBar::new(urls.len() as u64);
            pb.set_style(
                ProgressStyle::with_template(
                    "{spinner:.green} {pos}/{len} files {wide_bar} {eta}",
                )
                .unwrap()
                .progress_chars("=>-"),
            );
            Some(pb)
        } else {
            None
        };

        let workers = self.worker_count.min(urls.len());
        thread::scope(|s| {
            for _ in 0..workers {
                s.spawn(|| {
                    loop {
                        let task = queue.lock().unwrap().pop_front();
                        let Some(mut task) = task else { break };

                        match self.fetch_one(&task.url, dest_dir) {
                            Ok(path) => {
                                results
                                    .lock()
                                    .unwrap()
                                    .push((task.url, Outcome::Done(path)));
                                if let Some(pb) = &pb {
                                    pb.inc(1);
                                }
                            }
                            Err(FetchFailure::Permanent(err)) => {
                                results.lock().unwrap().push((task.url, Outcome::Failed(err)));
                                if let Some(pb) = &pb {
                                    pb.inc(1);
                                }
                            }
                            Err(FetchFailure::Transient(err)) => {
                                task.attempts += 1;
                                if task.attempts >= self.max_attempts {
                                    let failure = ApiError {
                                        status_code: 0,
                                        message: Some(format!(
                                            "transport failure after {} attempts: {}",
                                            task.attempts, err
                                        )),
                                        url: task.url.clone(),
                                        params: redact_params(&self.credentials.to_params()),
                                    };
                                    results
                                        .lock()
                                        .unwrap()
                                        .push((task.url, Outcome::Failed(failure.into())));
                                    if let Some(pb) = &pb {
                                        pb.inc(1);
                                    }
                                } else {
                                    queue.lock().unwrap().push_back(task);
                                }
                            }
                        }
                    }
                });
            }
        });

        if let Some(pb) = &pb {
            pb.finish_and_clear();
        }

        Ok(results.into_inner().unwrap())
    }

    /// One attempt: GET the URL and stream the body to disk in fixed-size
    /// chunks, so memory stays bounded regardless of file size.
    fn fetch_one(&self, url: &str, dest_dir: &Path) -> std::result::Result<PathBuf, FetchFailure> {
        let fname = filename_from_url(url).ok_or_else(|| {
            FetchFailure::Permanent(anyhow!("cannot derive a file name from url {}", url))
        })?;
        let target = dest_dir.join(fname);
        let query = self.credentials.to_params();

        let resp = self.http.get(url).query(&query).send().map_err(|e| {
            // only transport-level failures are worth another attempt;
            // a request that cannot even be built never will be
            if e.is_builder() || e.is_redirect() {
                FetchFailure::Permanent(
                    anyhow::Error::new(e).context(format!("invalid request for {}", url)),
                )
            } else {
                FetchFailure::Transient(anyhow::Error::new(e))
            }
        })?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().unwrap_or_default();
            return Err(FetchFailure::Permanent(
                ApiError {
                    status_code: status.as_u16(),
                    message: vendor_message(&text),
                    url: url.to_string(),
                    params: redact_params(&query),
                }
                .into(),
            ));
        }

        let mut resp = resp;
        let mut out = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&target)
            .map_err(|e| {
                FetchFailure::Permanent(
                    anyhow::Error::new(e)
                        .context(format!("failed to open {}", target.display())),
                )
            })?;

        let mut buf = [0u8; 64 * 1024];
        loop {
            let n = match resp.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) => {
                    // mid-body reset; the whole file restarts on the next attempt
                    return Err(FetchFailure::Transient(
                        anyhow::Error::new(e)
                            .context(format!("download of {} interrupted", url)),
                    ));
                }
            };
            out.write_all(&buf[..n]).map_err(|e| {
                FetchFailure::Permanent(
                    anyhow::Error::new(e)
                        .context(format!("failed to write {}", target.display())),
                )
            })?;
        }

        out.flush().map_err(|e| {
            FetchFailure::Permanent(
                anyhow::Error::new(e).context(format!("failed to flush {}", target.display())),
            )
        })?;

        Ok(target)
    }
}
