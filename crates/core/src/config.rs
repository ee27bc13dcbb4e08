use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub scan: ScanConfig,
    pub archive: ArchiveConfig,
    pub conversion: ConversionConfig,
    pub images: ImageConfig,
    pub report: ReportConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub exclude: Vec<String>,
    pub include_hidden: bool,
    pub follow_links: bool,
}

impl ScanConfig {
    /// Rejects exclude patterns that are not valid globs.
    pub fn validate(&self) -> anyhow::Result<()> {
        for pattern in &self.exclude {
            globset::Glob::new(pattern)
                .map_err(|e| anyhow::anyhow!("invalid scan.exclude pattern {pattern:?}: {e}"))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    pub base_dir: Option<String>,
    pub prefix: String,
    pub write_manifest: bool,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            base_dir: None,
            prefix: "Office_Archive".to_string(),
            write_manifest: true,
        }
    }
}

impl ArchiveConfig {
    /// Directory that receives the per-run archive folders. Defaults to the
    /// user's desktop, then home, then the working directory.
    pub fn base_dir(&self) -> PathBuf {
        if let Some(dir) = &self.base_dir {
            return PathBuf::from(dir);
        }
        dirs::desktop_dir()
            .filter(|d| d.is_dir())
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionConfig {
    /// `soffice` or `none`.
    pub backend: String,
    pub soffice_path: Option<String>,
    pub timeout_secs: u64,
    pub max_file_size_mb: u64,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            backend: "soffice".to_string(),
            soffice_path: None,
            timeout_secs: 300,
            max_file_size_mb: 100,
        }
    }
}

impl ConversionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb.saturating_mul(1024 * 1024)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    pub resolution_dpi: u32,
    pub jpeg_quality: u8,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            resolution_dpi: 100,
            jpeg_quality: 90,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub max_error_lines: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self { max_error_lines: 5 }
    }
}

pub fn load(path: Option<&str>) -> anyhow::Result<AppConfig> {
    let mut settings = config::Config::builder();
    if let Some(p) = path {
        settings = settings.add_source(config::File::with_name(p));
    } else {
        settings = settings.add_source(config::File::with_name("config/default").required(false));
    }
    settings = settings.add_source(
        config::Environment::with_prefix("PCUTIL")
            .prefix_separator("_")
            .separator("__"),
    );
    let cfg: AppConfig = settings.build()?.try_deserialize()?;
    cfg.scan.validate()?;
    Ok(cfg)
}
