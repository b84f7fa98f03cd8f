//! Video metadata plugin
//!
//! Derives a title and release year from the uploaded file name, looks the
//! title up on a remote metadata API and stores the match plus a downloaded
//! poster. Posters are keyed by title and year, so copies of the same film
//! share one asset.

use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use serde_json::json;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::path::Path;
use std::time::Duration;
use stowage_core::models::UploadItem;

use crate::plugin::{poster_file_name, FilePlugin, PluginContext};

const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Remote metadata API settings
#[derive(Clone)]
pub struct VideoInfoConfig {
    pub base_url: String,
    pub api_key: String,
}

pub struct VideoInfoPlugin {
    http_client: reqwest::Client,
    config: VideoInfoConfig,
    year_pattern: Regex,
    release_tags: Regex,
}

impl Debug for VideoInfoPlugin {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("VideoInfoPlugin")
            .field("base_url", &self.config.base_url)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    id: serde_json::Value,
    title: String,
    #[serde(default)]
    overview: Option<String>,
    #[serde(default)]
    release_date: Option<String>,
    #[serde(default)]
    poster_url: Option<String>,
}

/// Title and year parsed from a file name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTitle {
    pub title: String,
    pub year: Option<u16>,
}

impl VideoInfoPlugin {
    pub fn new(config: VideoInfoConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http_client,
            config,
            year_pattern: Regex::new(r"[\s(\[]((?:19|20)\d{2})(?:[\s)\]]|$)")?,
            release_tags: Regex::new(
                r"(?i)\b(2160p|1080p|720p|480p|4k|uhd|bluray|blu-ray|brrip|bdrip|web-?dl|webrip|hdtv|dvdrip|x264|x265|h264|h265|hevc|remux)\b",
            )?,
        })
    }

    /// Split a release-style file name into a search title and optional year.
    pub fn parse_title(&self, file_name: &str) -> ParsedTitle {
        let stem = Path::new(file_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(file_name);
        let spaced: String = stem
            .chars()
            .map(|c| if c == '.' || c == '_' { ' ' } else { c })
            .collect();

        let (mut title, year) = match self.year_pattern.captures(&spaced) {
            Some(caps) => {
                let start = caps.get(0).map(|m| m.start()).unwrap_or(spaced.len());
                let year = caps.get(1).and_then(|m| m.as_str().parse().ok());
                (spaced[..start].to_string(), year)
            }
            None => (spaced.clone(), None),
        };

        if let Some(tag) = self.release_tags.find(&title) {
            title.truncate(tag.start());
        }

        let title = title
            .trim_matches(|c: char| c.is_whitespace() || c == '-' || c == '(' || c == '[')
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");

        ParsedTitle {
            title: if title.is_empty() { stem.to_string() } else { title },
            year,
        }
    }

    async fn search(&self, parsed: &ParsedTitle) -> Result<Option<SearchResult>> {
        let url = format!("{}/search/movie", self.config.base_url.trim_end_matches('/'));
        let mut query = vec![
            ("query", parsed.title.clone()),
            ("api_key", self.config.api_key.clone()),
        ];
        if let Some(year) = parsed.year {
            query.push(("year", year.to_string()));
        }

        let response = self
            .http_client
            .get(&url)
            .query(&query)
            .send()
            .await
            .context("Metadata search request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Metadata API returned {}: {}", status, body);
        }

        let body: SearchResponse = response
            .json()
            .await
            .context("Failed to parse metadata search response")?;

        Ok(body.results.into_iter().next())
    }

    async fn download_poster(
        &self,
        poster_url: &str,
        key: &str,
        ctx: &PluginContext,
    ) -> Result<String> {
        let extension = Path::new(poster_url.split('?').next().unwrap_or(poster_url))
            .extension()
            .and_then(|e| e.to_str())
            .filter(|e| e.chars().all(|c| c.is_ascii_alphanumeric()) && e.len() <= 5)
            .unwrap_or("jpg")
            .to_lowercase();
        let name = poster_file_name(key, &extension);
        let path = ctx.asset_path(&name);

        let cached = tokio::fs::metadata(&path)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false);
        if cached {
            return Ok(name);
        }

        let response = self
            .http_client
            .get(poster_url)
            .send()
            .await
            .context("Poster download failed")?;
        if !response.status().is_success() {
            anyhow::bail!("Poster download returned {}", response.status());
        }
        let bytes = response.bytes().await.context("Failed to read poster body")?;

        tokio::fs::create_dir_all(&ctx.assets_dir).await?;
        let partial = path.with_extension(format!("{}.part", extension));
        let written = match tokio::fs::write(&partial, &bytes).await {
            Ok(()) => tokio::fs::rename(&partial, &path).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(e).context("Failed to store poster");
        }

        Ok(name)
    }
}

#[async_trait]
impl FilePlugin for VideoInfoPlugin {
    fn name(&self) -> &str {
        "video-info"
    }

    fn file_extensions(&self) -> &[&'static str] {
        &["mp4", "mkv", "avi", "mov", "webm", "m4v"]
    }

    #[tracing::instrument(skip(self, item, ctx), fields(item_id = %item.id, group_id = %item.group_id))]
    async fn process(&self, item: &mut UploadItem, ctx: &PluginContext) -> Result<()> {
        let parsed = self.parse_title(&item.file_name);

        let result = tokio::select! {
            _ = ctx.cancel.cancelled() => anyhow::bail!("Shutdown requested during metadata lookup"),
            result = self.search(&parsed) => result?,
        };

        let Some(found) = result else {
            tracing::info!(title = %parsed.title, year = ?parsed.year, "No metadata match");
            item.metadata = Some(json!({
                "kind": "video",
                "title": parsed.title,
                "year": parsed.year,
                "matched": false,
            }));
            return Ok(());
        };

        let poster = match found.poster_url.as_deref() {
            Some(url) => {
                let key = match parsed.year {
                    Some(year) => format!("{} ({})", found.title, year),
                    None => found.title.clone(),
                };
                match self.download_poster(url, &key, ctx).await {
                    Ok(name) => Some(name),
                    Err(e) => {
                        tracing::warn!(error = %e, "Poster download failed, storing metadata without poster");
                        None
                    }
                }
            }
            None => None,
        };

        item.metadata = Some(json!({
            "kind": "video",
            "title": found.title,
            "year": parsed.year,
            "matched": true,
            "remoteId": found.id,
            "overview": found.overview,
            "releaseDate": found.release_date,
            "poster": poster,
        }));

        tracing::debug!(title = %parsed.title, "Video metadata attached");
        Ok(())
    }
}
