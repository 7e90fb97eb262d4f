use std::path::Path;
use std::process;

use broker_orchestrator::params::ensure_valid_or_empty_json;
use broker_orchestrator::{BrokerError, ProvisionDetails};

use crate::{report_error, OutputFormat};

/// Merge `parameters` the way a provision of `service`/`plan` would and
/// print the result, without touching any provider.
pub(crate) fn cmd_params(
    config_path: &Path,
    service_id: &str,
    plan_id: &str,
    parameters: Option<&str>,
    instance_id: &str,
    output: OutputFormat,
    quiet: bool,
) {
    let config = super::load_config(config_path, output, quiet);

    let Some(service) = config.service(service_id) else {
        let err = BrokerError::ServiceNotFound {
            service_id: service_id.to_string(),
        };
        report_error(&err.to_string(), output, quiet);
        process::exit(1);
    };

    let details = ProvisionDetails {
        service_id: service_id.to_string(),
        plan_id: plan_id.to_string(),
        raw_parameters: parameters.map(str::to_string),
        ..ProvisionDetails::default()
    };
    let merged = service
        .resolve_plan(plan_id)
        .and_then(|plan| {
            ensure_valid_or_empty_json(parameters)?;
            service.provision_variables(instance_id, &details, plan)
        });

    let vars = match merged {
        Ok(vars) => vars,
        Err(e) => {
            tracing::debug!(kind = %e.kind(), "parameter merge rejected");
            report_error(&e.to_string(), output, quiet);
            process::exit(1);
        }
    };

    match output {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&vars).unwrap_or_default()
        ),
        OutputFormat::Text => {
            for (key, value) in &vars {
                println!("{} = {}", key, value);
            }
        }
    }
}
