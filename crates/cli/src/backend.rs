use automation::noop::NoopHost;
use automation::soffice::{SofficeConfig, SofficeHost};
use automation::AutomationHost;
use converter_core::config::ConversionConfig;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

/// Picks the automation backend named in `conversion.backend`.
pub fn build_host(cfg: &ConversionConfig) -> Arc<dyn AutomationHost> {
    match cfg.backend.as_str() {
        "soffice" | "libreoffice" => {
            let mut soffice = SofficeConfig {
                timeout: cfg.timeout(),
                ..SofficeConfig::default()
            };
            if let Some(path) = &cfg.soffice_path {
                soffice.binary = PathBuf::from(path);
            }
            debug!(binary = %soffice.binary.display(), timeout = ?soffice.timeout, "using soffice backend");
            Arc::new(SofficeHost::new(soffice))
        }
        "none" => Arc::new(NoopHost),
        other => {
            warn!(backend = other, "unknown conversion backend; conversions are disabled");
            Arc::new(NoopHost)
        }
    }
}
