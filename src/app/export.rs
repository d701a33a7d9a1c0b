use std::io::Write;

use chrono::Utc;
use tracing::debug;
use zip::write::{SimpleFileOptions, ZipWriter};

use crate::config::ToolkitConfig;
use crate::domain::ports::Storage;
use crate::utils::error::Result;

/// Rendered forms of one report. Which of them reach disk is decided by the
/// configured output formats.
pub struct RenderedReport {
    pub base_name: String,
    pub text: String,
    pub csv: Vec<u8>,
    pub json: Vec<u8>,
}

impl RenderedReport {
    fn file_for(&self, format: &str) -> Option<(String, Vec<u8>)> {
        match format {
            "text" => Some((
                format!("{}.txt", self.base_name),
                self.text.clone().into_bytes(),
            )),
            "csv" => Some((format!("{}.csv", self.base_name), self.csv.clone())),
            "json" => Some((format!("{}.json", self.base_name), self.json.clone())),
            _ => None,
        }
    }
}

/// Writes the configured formats under `report.output_path`. With
/// compression enabled the files go into a single zip archive instead; a
/// `{timestamp}` placeholder in the archive name is filled in UTC.
pub async fn write_report<T: Storage>(
    storage: &T,
    config: &ToolkitConfig,
    report: &RenderedReport,
) -> Result<Vec<String>> {
    let files: Vec<(String, Vec<u8>)> = config
        .output_formats()
        .iter()
        .filter_map(|format| report.file_for(format))
        .collect();
    if files.is_empty() {
        return Ok(Vec::new());
    }

    let output_path = config.output_path().trim_end_matches('/');

    if let Some(compression) = config.compression() {
        let timestamp = Utc::now().format("%Y%m%d_%H%M%S").to_string();
        let archive_name = compression.filename.replace("{timestamp}", &timestamp);

        let zip_data = {
            let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));
            for (name, data) in &files {
                zip.start_file(name.as_str(), SimpleFileOptions::default())?;
                zip.write_all(data)?;
            }
            let cursor = zip.finish()?;
            cursor.into_inner()
        };

        let path = format!("{}/{}", output_path, archive_name);
        debug!("Writing report archive ({} bytes) to {}", zip_data.len(), path);
        storage.write_file(&path, &zip_data).await?;
        return Ok(vec![path]);
    }

    let mut written = Vec::new();
    for (name, data) in &files {
        let path = format!("{}/{}", output_path, name);
        storage.write_file(&path, data).await?;
        written.push(path);
    }
    Ok(written)
}
