pub(crate) mod catalog;
pub(crate) mod check;
pub(crate) mod params;

use std::path::Path;
use std::process;

use broker_orchestrator::BrokerConfig;

use crate::{report_error, OutputFormat};

/// Load the configuration at `path`, exiting with status 1 on failure.
pub(crate) fn load_config(path: &Path, output: OutputFormat, quiet: bool) -> BrokerConfig {
    match BrokerConfig::load(path) {
        Ok(config) => {
            tracing::info!(
                path = %path.display(),
                services = config.services.len(),
                vault = config.vault.enabled,
                "loaded broker configuration"
            );
            config
        }
        Err(e) => {
            report_error(&format!("error: {}", e), output, quiet);
            process::exit(1);
        }
    }
}
