use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{info, instrument, warn};

use crate::config::Config;
use crate::error::{MapperError, Result};
use crate::ftm::{normalize_file, ParseStats};
use crate::tables::{entity_frame, relationship_frame, write_parquet, ENTITIES_FILE, RELATIONSHIPS_FILE};

/// Available bulk datasets and their paths under the OpenSanctions base URL.
pub const DATASETS: &[(&str, &str)] = &[
    ("default", "default/entities.ftm.json"),
    ("sanctions", "sanctions/entities.ftm.json"),
    ("peps", "peps/entities.ftm.json"),
    ("crime", "crime/entities.ftm.json"),
];

/// Log download progress roughly every 50MB
const PROGRESS_CHUNK_BYTES: u64 = 50 * 1024 * 1024;

/// Client for downloading OpenSanctions NDJSON datasets.
///
/// Downloads are streamed to disk (the combined dataset is 500MB+) and
/// cached locally keyed by calendar date, so repeated runs within a day
/// reuse the same file unless forced.
pub struct OpenSanctionsClient {
    client: reqwest::Client,
    base_url: String,
    cache_dir: PathBuf,
    max_retries: u32,
}

impl OpenSanctionsClient {
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout())
            .build()?;
        Ok(Self {
            client,
            base_url: config.opensanctions.base_url.clone(),
            cache_dir: config.raw_data_dir().join("opensanctions"),
            max_retries: config.http.max_retries,
        })
    }

    fn dataset_path(dataset: &str) -> Result<&'static str> {
        DATASETS
            .iter()
            .find(|(name, _)| *name == dataset)
            .map(|(_, path)| *path)
            .ok_or_else(|| {
                let available: Vec<&str> = DATASETS.iter().map(|(name, _)| *name).collect();
                MapperError::Config(format!(
                    "Unknown dataset: {}. Available: {}",
                    dataset,
                    available.join(", ")
                ))
            })
    }

    /// Download a dataset, reusing today's cached copy unless `force` is
    /// set. Retries with exponential backoff on transient failure.
    #[instrument(skip(self))]
    pub async fn download_dataset(&self, dataset: &str, force: bool) -> Result<PathBuf> {
        let path = Self::dataset_path(dataset)?;

        let date_str = chrono::Local::now().format("%Y%m%d");
        let local_path = self.cache_dir.join(format!("{dataset}_{date_str}.json"));

        if local_path.exists() && !force {
            info!("Using cached file: {}", local_path.display());
            return Ok(local_path);
        }

        fs::create_dir_all(&self.cache_dir)?;
        let url = format!("{}/{}", self.base_url, path);
        info!("Downloading {} dataset from {}", dataset, url);

        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.fetch_to_file(&url, &local_path).await {
                Ok(()) => return Ok(local_path),
                Err(err) if attempt < self.max_retries => {
                    let delay = Duration::from_secs((1u64 << attempt).min(60));
                    warn!(
                        "Download failed (attempt {}/{}): {}; retrying in {}s",
                        attempt,
                        self.max_retries,
                        err,
                        delay.as_secs()
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Stream the response body to a temporary file, then move it into
    /// place. A failed download never clobbers a previously cached file.
    async fn fetch_to_file(&self, url: &str, dest: &Path) -> Result<()> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?;

        let total_size = response.content_length().unwrap_or(0);
        let part_path = dest.with_extension("json.part");
        let mut file = fs::File::create(&part_path)?;

        let mut downloaded: u64 = 0;
        let mut next_progress = PROGRESS_CHUNK_BYTES;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk)?;
            downloaded += chunk.len() as u64;
            if total_size > 0 && downloaded >= next_progress {
                info!(
                    "Download progress: {:.1}%",
                    (downloaded as f64 / total_size as f64) * 100.0
                );
                next_progress += PROGRESS_CHUNK_BYTES;
            }
        }
        file.flush()?;
        drop(file);
        fs::rename(&part_path, dest)?;

        info!(
            "Downloaded {:.1}MB to {}",
            downloaded as f64 / (1024.0 * 1024.0),
            dest.display()
        );
        Ok(())
    }
}

/// Outcome of one full ingestion run.
#[derive(Debug)]
pub struct IngestSummary {
    pub entities: usize,
    pub relationships: usize,
    pub stats: ParseStats,
    pub entities_path: PathBuf,
    pub relationships_path: PathBuf,
}

/// Complete ingestion pipeline: download (or reuse cache), normalize, and
/// write both parquet tables. A fresh run fully replaces the prior output.
pub async fn ingest_opensanctions(
    config: &Config,
    dataset: &str,
    output_dir: Option<&Path>,
    force_download: bool,
) -> Result<IngestSummary> {
    let output_dir = output_dir
        .map(Path::to_path_buf)
        .unwrap_or_else(|| config.processed_data_dir());
    fs::create_dir_all(&output_dir)?;

    let client = OpenSanctionsClient::new(config)?;
    let filepath = client.download_dataset(dataset, force_download).await?;

    let (rows, edges, stats) = normalize_file(&filepath)?;

    let entities_path = output_dir.join(ENTITIES_FILE);
    let mut entities_df = entity_frame(&rows)?;
    write_parquet(&mut entities_df, &entities_path)?;

    let relationships_path = output_dir.join(RELATIONSHIPS_FILE);
    let mut relationships_df = relationship_frame(&edges)?;
    write_parquet(&mut relationships_df, &relationships_path)?;

    Ok(IngestSummary {
        entities: rows.len(),
        relationships: edges.len(),
        stats,
        entities_path,
        relationships_path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_datasets_resolve_to_paths() {
        assert_eq!(
            OpenSanctionsClient::dataset_path("sanctions").unwrap(),
            "sanctions/entities.ftm.json"
        );
        assert_eq!(
            OpenSanctionsClient::dataset_path("crime").unwrap(),
            "crime/entities.ftm.json"
        );
    }

    #[test]
    fn unknown_dataset_is_a_config_error() {
        let err = OpenSanctionsClient::dataset_path("everything").unwrap_err();
        assert!(err.to_string().contains("Unknown dataset"));
    }
}
