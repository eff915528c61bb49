use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

use crate::client::ApiClient;
use crate::download::{Downloader, Outcome};

/// Listing of everything one UserDB export run should fetch, as returned
/// by the `userdbs.json` endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct UserDbManifest {
    /// Date label of this export snapshot.
    pub date: String,
    /// Schema file URLs.
    #[serde(default)]
    pub schemas: Vec<String>,
    /// Data-set section name to file URL(s). The vendor returns a bare
    /// string for single-file sections and a list otherwise.
    #[serde(default)]
    pub data_files: BTreeMap<String, UrlSet>,
}

/// One URL or several; flattened with [`UrlSet::to_vec`].
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum UrlSet {
    One(String),
    Many(Vec<String>),
}

impl UrlSet {
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            UrlSet::One(url) => vec![url.clone()],
            UrlSet::Many(urls) => urls.clone(),
        }
    }
}

/// Per-file results of a full UserDB export run.
#[derive(Debug)]
pub struct ExportReport {
    /// Manifest date the files were mirrored under.
    pub date: String,
    /// One `(url, outcome)` per downloaded file, in completion order.
    pub outcomes: Vec<(String, Outcome)>,
}

impl ExportReport {
    /// URLs of every task that ended in terminal failure.
    pub fn failed_urls(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| !outcome.is_done())
            .map(|(url, _)| url.as_str())
            .collect()
    }
}

/// Accessor for the UserDB export endpoint and its bulk download.
#[derive(Debug, Clone)]
pub struct UserdbApi {
    client: ApiClient,
}

impl UserdbApi {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// Fetches the current export manifest.
    pub fn manifest(&self) -> Result<UserDbManifest> {
        let url = self.client.endpoint("userdbs.json");
        let data = self.client.send(&url, &[])?;
        serde_json::from_value(data).context("unexpected userdbs manifest shape")
    }

    /// Flattened URL list of one data-file section, or of every section
    /// for `"all"`.
    pub fn urls(&self, item: &str) -> Result<Vec<String>> {
        let manifest = self.manifest()?;
        if item == "all" {
            return Ok(manifest
                .data_files
                .values()
                .flat_map(UrlSet::to_vec)
                .collect());
        }
        manifest
            .data_files
            .get(item)
            .map(UrlSet::to_vec)
            .with_context(|| format!("no data-file section [{}] in the manifest", item))
    }

    /// Builds a downloader carrying this accessor's credentials.
    pub fn downloader(&self) -> Result<Downloader> {
        Downloader::new(self.client.credentials().clone())
    }

    /// Mirrors the whole manifest under `dir`: schema files into
    /// `<date>/schemas/` and each data-file section into
    /// `<date>/data/<section>/`. Every file reaches a terminal state before
    /// this returns; failures sit in the report next to the successes.
    pub fn export_to(&self, dir: &Path, downloader: &Downloader) -> Result<ExportReport> {
        let manifest = self.manifest()?;
        let root = dir.join(&manifest.date);

        let mut outcomes = downloader.download_all(&manifest.schemas, &root.join("schemas"))?;

        for (section, urls) in &manifest.data_files {
            let section_dir = root.join("data").join(section);
            outcomes.extend(downloader.download_all(&urls.to_vec(), &section_dir)?);
        }

        Ok(ExportReport {
            date: manifest.date,
            outcomes,
        })
    }
}
