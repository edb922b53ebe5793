use std::process::ExitCode;

use anyhow::{Context, Result};
use exthub_registry::RegistryIndex;
use exthub_state::{list_instances, read_instance};
use exthub_update::{
    UpdateCollaborators, UpdateOutcome, UpdateRequest, UpdateSettings, UpdateWorkflow,
};

use crate::backends::LocalBackend;
use crate::config::{ConfigOverrides, ExthubConfig};
use crate::operator::TerminalOperator;
use crate::render::{OutputStyle, TerminalRenderer};
use crate::report::{error_lines, instance_row, InstanceInfo};
use crate::{Cli, Commands};

pub(crate) fn run_cli(cli: Cli) -> Result<ExitCode> {
    let config = ExthubConfig::resolve(ConfigOverrides {
        state_root: cli.state_root,
        registry_root: cli.registry_root,
        project: cli.project,
        config_path: cli.config,
        extdev: cli.extdev,
    })?;
    let renderer = TerminalRenderer::new(OutputStyle::detect(cli.plain));
    tracing::debug!(
        state_root = %config.state_root.display(),
        registry_root = %config.registry_root.display(),
        "resolved configuration"
    );

    match cli.command {
        Commands::Update {
            instance_id,
            source,
        } => {
            let operator = TerminalOperator::stdin(renderer, !cli.non_interactive);
            let status = run_update(&config, renderer, &operator, instance_id, source)?;
            Ok(ExitCode::from(status))
        }
        Commands::Instances => {
            let project = config.require_project()?;
            let instances = list_instances(&config.layout(), project)?;
            if instances.is_empty() {
                println!("No extension instances in project {project}");
            } else {
                let rows = instances.iter().map(instance_row).collect::<Vec<_>>();
                renderer.print_lines(&rows);
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Info { instance_id, json } => {
            let project = config.require_project()?;
            let Some(instance) = read_instance(&config.layout(), project, &instance_id)? else {
                renderer.eprint_status(
                    "err",
                    &format!("no extension instance {instance_id} found in project {project}"),
                );
                return Ok(ExitCode::from(1));
            };

            let info = InstanceInfo::from_instance(&instance);
            if json {
                let rendered = serde_json::to_string_pretty(&info)
                    .context("failed to serialize instance info")?;
                println!("{rendered}");
            } else {
                renderer.print_lines(&info.lines());
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Exit status of one update run: 0 when updated or declined.
pub(crate) fn run_update<R: std::io::BufRead>(
    config: &ExthubConfig,
    renderer: TerminalRenderer,
    operator: &TerminalOperator<R>,
    instance_id: String,
    override_location: Option<String>,
) -> Result<u8> {
    let project_id = config.require_project()?.to_string();
    let backend = LocalBackend::new(
        config.layout(),
        RegistryIndex::open(&config.registry_root),
    );
    let workflow = UpdateWorkflow::new(
        UpdateCollaborators {
            store: &backend,
            registry: &backend,
            sources: &backend,
            billing: &backend,
            operator,
        },
        UpdateSettings {
            allow_override: config.extdev,
            console_base_url: config.console_base_url.clone(),
        },
    );

    let result = workflow.run(&UpdateRequest {
        project_id,
        instance_id,
        override_location,
    });
    operator.finish_pending();

    match result {
        Ok(UpdateOutcome::Updated(updated)) => {
            tracing::debug!(
                instance = %updated.instance.instance_id,
                provenance = updated.provenance.as_str(),
                params_changed = updated.params_changed,
                "update finished"
            );
            Ok(0)
        }
        Ok(UpdateOutcome::Declined) => Ok(0),
        Err(err) => {
            tracing::debug!(stage = workflow.stage().as_str(), "update failed");
            for line in error_lines(&err) {
                renderer.eprint_status("err", &line);
            }
            Ok(err.exit_code())
        }
    }
}
