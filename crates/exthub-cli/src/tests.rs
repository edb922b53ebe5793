use std::collections::BTreeMap;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::Parser;
use ed25519_dalek::{Signer, SigningKey};
use exthub_core::{ExtensionInstance, ExtensionSpec, InstanceConfig, ParamDefinition, SourceRef};
use exthub_state::{is_billing_enabled, read_instance, write_instance, StateLayout};
use exthub_update::{
    diff_specs, Operator, SourceProvenance, UpdateError, UpdateNotice, UpdateWarning,
};
use semver::Version;

use super::*;
use crate::config::{ConfigOverrides, ExthubConfig, DEFAULT_CONSOLE_BASE_URL};
use crate::dispatch::run_update;
use crate::operator::TerminalOperator;
use crate::render::{render_status_line, OutputStyle, TerminalRenderer};
use crate::report::{change_lines, error_lines, notice_lines, InstanceInfo, SECRET_MASK};

static TEST_ROOT_COUNTER: AtomicU64 = AtomicU64::new(0);

const PROJECT: &str = "demo-project";

fn test_root(label: &str) -> PathBuf {
    let mut path = std::env::temp_dir();
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time")
        .as_nanos();
    let counter = TEST_ROOT_COUNTER.fetch_add(1, Ordering::SeqCst);
    path.push(format!(
        "exthub-cli-tests-{label}-{}-{}-{}",
        std::process::id(),
        nanos,
        counter
    ));
    path
}

fn signing_key() -> SigningKey {
    SigningKey::from_bytes(&[11u8; 32])
}

/// Publishes `specs` (raw `extension.toml` bodies keyed by version) under publisher `exthub`.
fn write_registry(root: &Path, extension: &str, specs: &[(&str, String)]) {
    let key = signing_key();
    let extension_dir = root.join("index").join(extension);
    fs::create_dir_all(&extension_dir).expect("must create extension dir");
    fs::write(
        root.join("registry.pub"),
        hex::encode(key.verifying_key().to_bytes()),
    )
    .expect("must write key");
    fs::write(extension_dir.join("entry.toml"), "publisher = \"exthub\"\n")
        .expect("must write entry");
    for (version, body) in specs {
        let spec_path = extension_dir.join(format!("{version}.toml"));
        fs::write(&spec_path, body.as_bytes()).expect("must write spec");
        let signature = key.sign(body.as_bytes());
        fs::write(
            spec_path.with_extension("toml.sig"),
            hex::encode(signature.to_bytes()),
        )
        .expect("must write signature");
    }
}

fn spec_body(name: &str, version: &str, extra: &str) -> String {
    format!("name = \"{name}\"\nversion = \"{version}\"\n{extra}")
}

fn write_installed(layout: &StateLayout, body: &str, source_name: &str, params: &[(&str, &str)]) {
    let spec = ExtensionSpec::from_toml_str(body).expect("installed spec must parse");
    let instance = ExtensionInstance {
        project_id: PROJECT.to_string(),
        instance_id: "resize-1".to_string(),
        config: InstanceConfig {
            source: SourceRef {
                name: source_name.to_string(),
                spec,
            },
            params: params
                .iter()
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .collect(),
        },
        created_at_unix: 1,
        updated_at_unix: 1,
    };
    write_instance(layout, &instance).expect("must write instance");
}

fn test_config(root: &Path, extdev: bool) -> ExthubConfig {
    ExthubConfig::resolve(ConfigOverrides {
        state_root: Some(root.join("state")),
        registry_root: Some(root.join("registry")),
        project: Some(PROJECT.to_string()),
        config_path: None,
        extdev,
    })
    .expect("config must resolve")
}

fn plain_operator(interactive: bool, input: &str) -> TerminalOperator<Cursor<Vec<u8>>> {
    TerminalOperator::new(
        TerminalRenderer::new(OutputStyle::Plain),
        interactive,
        Cursor::new(input.as_bytes().to_vec()),
    )
}

fn update(config: &ExthubConfig, operator: &TerminalOperator<Cursor<Vec<u8>>>, source: Option<&str>) -> u8 {
    run_update(
        config,
        TerminalRenderer::new(OutputStyle::Plain),
        operator,
        "resize-1".to_string(),
        source.map(str::to_string),
    )
    .expect("update run must not fail outside the workflow")
}

fn installed(config: &ExthubConfig) -> ExtensionInstance {
    read_instance(&config.layout(), PROJECT, "resize-1")
        .expect("must read instance")
        .expect("instance must exist")
}

#[test]
fn render_status_line_plain_is_unadorned() {
    assert_eq!(
        render_status_line(OutputStyle::Plain, "ok", "Successfully updated resize-1."),
        "Successfully updated resize-1."
    );
}

#[test]
fn render_status_line_rich_includes_ascii_badge() {
    assert_eq!(
        render_status_line(OutputStyle::Rich, "ok", "Successfully updated resize-1."),
        "[OK] Successfully updated resize-1."
    );
    assert_eq!(
        render_status_line(OutputStyle::Rich, "warn", "billing will be enabled"),
        "[WARN] billing will be enabled"
    );
}

#[test]
fn cli_accepts_global_flags_after_subcommand() {
    let cli = Cli::try_parse_from([
        "exthub",
        "update",
        "resize-1",
        "./resize",
        "--project",
        "demo-project",
        "--non-interactive",
        "--extdev",
    ])
    .expect("must parse");

    assert_eq!(cli.project.as_deref(), Some("demo-project"));
    assert!(cli.non_interactive);
    assert!(cli.extdev);
    match cli.command {
        Commands::Update {
            instance_id,
            source,
        } => {
            assert_eq!(instance_id, "resize-1");
            assert_eq!(source.as_deref(), Some("./resize"));
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn config_file_fills_values_not_given_as_flags() {
    let root = test_root("config");
    let state_root = root.join("state");
    fs::create_dir_all(&state_root).expect("must create state root");
    fs::write(
        state_root.join("config.toml"),
        "project = \"from-file\"\nregistry_root = \"/srv/registry\"\n\
         console_base_url = \"https://console.internal\"\n\n[previews]\nextdev = true\n",
    )
    .expect("must write config");

    let from_file = ExthubConfig::resolve(ConfigOverrides {
        state_root: Some(state_root.clone()),
        ..ConfigOverrides::default()
    })
    .expect("must resolve");
    assert_eq!(from_file.project.as_deref(), Some("from-file"));
    assert_eq!(from_file.registry_root, PathBuf::from("/srv/registry"));
    assert_eq!(from_file.console_base_url, "https://console.internal");
    assert!(from_file.extdev);

    let flagged = ExthubConfig::resolve(ConfigOverrides {
        state_root: Some(state_root.clone()),
        project: Some("from-flag".to_string()),
        registry_root: Some(root.join("other-registry")),
        ..ConfigOverrides::default()
    })
    .expect("must resolve");
    assert_eq!(flagged.require_project().expect("project"), "from-flag");
    assert_eq!(flagged.registry_root, root.join("other-registry"));

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn missing_config_file_uses_defaults() {
    let root = test_root("config-defaults");

    let config = ExthubConfig::resolve(ConfigOverrides {
        state_root: Some(root.clone()),
        ..ConfigOverrides::default()
    })
    .expect("must resolve");

    assert_eq!(config.registry_root, root.join("registry"));
    assert_eq!(config.console_base_url, DEFAULT_CONSOLE_BASE_URL);
    assert!(!config.extdev);
    let err = config.require_project().expect_err("no project configured");
    assert!(err.to_string().contains("pass --project"));
}

#[test]
fn empty_diff_is_reported_as_no_changes() {
    let current = ExtensionSpec::from_toml_str(&spec_body("resize", "1.0.0", "")).expect("spec");
    let next = ExtensionSpec::from_toml_str(&spec_body("resize", "1.0.1", "")).expect("spec");

    let lines = change_lines(&diff_specs(&current, &next));

    assert_eq!(
        lines,
        vec![
            "version: 1.0.0 -> 1.0.1".to_string(),
            "no changes to resources, APIs, roles or params".to_string(),
        ]
    );
}

#[test]
fn override_notice_names_location_kind() {
    let lines = notice_lines(&UpdateNotice::UpdatingFromOverride {
        instance_id: "resize-1".to_string(),
        from_version: Version::new(1, 0, 0),
        location: "https://example.com/resize".to_string(),
        to_version: Version::new(1, 2, 0),
        provenance: SourceProvenance::Url,
    });
    assert_eq!(
        lines,
        vec![(
            "info",
            "Updating resize-1 from version 1.0.0 to URL https://example.com/resize (1.2.0)"
                .to_string()
        )]
    );
}

#[test]
fn error_lines_skip_causes_repeated_in_message() {
    let err = UpdateError::from(anyhow::anyhow!("backend unavailable"));
    assert_eq!(
        error_lines(&err),
        vec!["error occurred while updating the instance: backend unavailable".to_string()]
    );

    let err = UpdateError::BillingEnableFailed {
        project_id: PROJECT.to_string(),
        source: anyhow::anyhow!("billing account is closed"),
    };
    assert_eq!(
        error_lines(&err),
        vec![
            "failed to enable billing for project demo-project".to_string(),
            "caused by: billing account is closed".to_string(),
        ]
    );
}

#[test]
fn instance_info_masks_secret_params() {
    let body = spec_body(
        "resize",
        "1.0.0",
        "[[params]]\nparam = \"API_KEY\"\nlabel = \"API key\"\ntype = \"secret\"\n\n\
         [[params]]\nparam = \"SIZE\"\nlabel = \"Size\"\n",
    );
    let spec = ExtensionSpec::from_toml_str(&body).expect("spec");
    let instance = ExtensionInstance {
        project_id: PROJECT.to_string(),
        instance_id: "resize-1".to_string(),
        config: InstanceConfig {
            source: SourceRef {
                name: "exthub/resize@1.0.0".to_string(),
                spec,
            },
            params: BTreeMap::from([
                ("API_KEY".to_string(), "sk-live-123".to_string()),
                ("SIZE".to_string(), "200x200".to_string()),
            ]),
        },
        created_at_unix: 1,
        updated_at_unix: 2,
    };

    let info = InstanceInfo::from_instance(&instance);
    assert_eq!(info.params["API_KEY"], SECRET_MASK);
    assert_eq!(info.params["SIZE"], "200x200");

    let json = serde_json::to_value(&info).expect("must serialize");
    assert_eq!(json["params"]["API_KEY"], SECRET_MASK);
    assert_eq!(json["version"], "1.0.0");
    assert!(info.lines().contains(&"  SIZE = 200x200".to_string()));
}

#[test]
fn interactive_confirmation_defaults_to_no() {
    let operator = plain_operator(true, "y\n\n");
    let warning = UpdateWarning {
        description: "overwrite\n\nirreversible".to_string(),
    };

    assert!(operator.confirm_warning(&warning).expect("first answer"));
    assert!(!operator.confirm_warning(&warning).expect("second answer"));
    let err = operator
        .confirm_warning(&warning)
        .expect_err("closed input must fail");
    assert!(err.to_string().contains("input closed"));
}

#[test]
fn interactive_prompt_uses_suggestion_and_reasks_invalid_values() {
    let param = ParamDefinition {
        param: "SIZE".to_string(),
        label: "Size".to_string(),
        description: None,
        kind: Default::default(),
        default: None,
        required: true,
        validation_regex: Some("[0-9]+x[0-9]+".to_string()),
        validation_error_message: None,
        options: Vec::new(),
        immutable: false,
    };

    let operator = plain_operator(true, "\n");
    let answer = operator
        .prompt_param(PROJECT, &param, Some("100x100"))
        .expect("must answer");
    assert_eq!(answer, "100x100");

    let operator = plain_operator(true, "large\n300x300\n");
    let answer = operator
        .prompt_param(PROJECT, &param, None)
        .expect("must answer");
    assert_eq!(answer, "300x300");
}

#[test]
fn non_interactive_prompt_needs_a_suggestion_for_required_params() {
    let mut param = ParamDefinition {
        param: "BUCKET".to_string(),
        label: "Bucket".to_string(),
        description: None,
        kind: Default::default(),
        default: None,
        required: true,
        validation_regex: None,
        validation_error_message: None,
        options: Vec::new(),
        immutable: false,
    };
    let operator = plain_operator(false, "");

    let err = operator
        .prompt_param(PROJECT, &param, None)
        .expect_err("required param without default must fail");
    assert!(err.to_string().contains("BUCKET requires a value"));

    param.required = false;
    assert_eq!(
        operator.prompt_param(PROJECT, &param, None).expect("optional"),
        ""
    );
    assert_eq!(
        operator
            .prompt_param(PROJECT, &param, Some("thumbs"))
            .expect("suggested"),
        "thumbs"
    );
}

#[test]
fn update_moves_instance_to_latest_signed_registry_version() {
    let root = test_root("update-official");
    let config = test_config(&root, false);
    write_registry(
        &config.registry_root,
        "resize",
        &[
            ("1.0.0", spec_body("resize", "1.0.0", "")),
            (
                "2.0.0",
                spec_body(
                    "resize",
                    "2.0.0",
                    "[[params]]\nparam = \"FORMAT\"\nlabel = \"Format\"\ndefault = \"webp\"\n",
                ),
            ),
        ],
    );
    write_installed(
        &config.layout(),
        &spec_body("resize", "1.0.0", ""),
        "exthub/resize@1.0.0",
        &[],
    );

    let status = update(&config, &plain_operator(false, ""), None);

    assert_eq!(status, 0);
    let instance = installed(&config);
    assert_eq!(instance.source_name(), "exthub/resize@2.0.0");
    assert_eq!(instance.spec().version, Version::new(2, 0, 0));
    assert_eq!(instance.params().get("FORMAT").map(String::as_str), Some("webp"));
    assert!(instance.updated_at_unix > 1);

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn declined_reapply_leaves_instance_untouched() {
    let root = test_root("update-declined");
    let config = test_config(&root, false);
    write_registry(
        &config.registry_root,
        "resize",
        &[("1.0.0", spec_body("resize", "1.0.0", ""))],
    );
    write_installed(
        &config.layout(),
        &spec_body("resize", "1.0.0", ""),
        "exthub/resize@1.0.0",
        &[],
    );

    let status = update(&config, &plain_operator(true, "n\n"), None);

    assert_eq!(status, 0);
    assert_eq!(installed(&config).updated_at_unix, 1);

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn update_of_missing_instance_exits_with_failure() {
    let root = test_root("update-missing");
    let config = test_config(&root, false);

    let status = update(&config, &plain_operator(false, ""), None);

    assert_eq!(status, 1);
}

#[test]
fn local_override_builds_uploaded_source_when_preview_enabled() {
    let root = test_root("update-local");
    let config = test_config(&root, true);
    write_registry(
        &config.registry_root,
        "resize",
        &[("1.0.0", spec_body("resize", "1.0.0", ""))],
    );
    write_installed(
        &config.layout(),
        &spec_body("resize", "1.0.0", ""),
        "exthub/resize@1.0.0",
        &[],
    );
    let source_dir = root.join("resize-src");
    fs::create_dir_all(&source_dir).expect("must create source dir");
    fs::write(
        source_dir.join("extension.toml"),
        spec_body("resize", "1.1.0-dev", ""),
    )
    .expect("must write local spec");
    let location = source_dir.display().to_string();

    let status = update(&config, &plain_operator(false, ""), Some(&location));

    assert_eq!(status, 0);
    let instance = installed(&config);
    assert!(instance
        .source_name()
        .starts_with("projects/demo-project/sources/"));
    assert_eq!(instance.spec().version.to_string(), "1.1.0-dev");

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn override_without_preview_falls_back_to_registry() {
    let root = test_root("update-no-preview");
    let config = test_config(&root, false);
    write_registry(
        &config.registry_root,
        "resize",
        &[
            ("1.0.0", spec_body("resize", "1.0.0", "")),
            ("1.0.1", spec_body("resize", "1.0.1", "")),
        ],
    );
    write_installed(
        &config.layout(),
        &spec_body("resize", "1.0.0", ""),
        "exthub/resize@1.0.0",
        &[],
    );

    let status = update(&config, &plain_operator(false, ""), Some("./does-not-exist"));

    assert_eq!(status, 0);
    assert_eq!(installed(&config).source_name(), "exthub/resize@1.0.1");

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn billing_is_enabled_when_new_version_requires_it() {
    let root = test_root("update-billing");
    let config = test_config(&root, false);
    write_registry(
        &config.registry_root,
        "resize",
        &[
            ("1.0.0", spec_body("resize", "1.0.0", "")),
            (
                "2.0.0",
                spec_body("resize", "2.0.0", "billing_required = true\n"),
            ),
        ],
    );
    write_installed(
        &config.layout(),
        &spec_body("resize", "1.0.0", ""),
        "exthub/resize@1.0.0",
        &[],
    );

    let status = update(&config, &plain_operator(false, ""), None);

    assert_eq!(status, 0);
    assert!(is_billing_enabled(&config.layout(), PROJECT).expect("billing state"));

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn tampered_registry_spec_fails_update() {
    let root = test_root("update-tampered");
    let config = test_config(&root, false);
    write_registry(
        &config.registry_root,
        "resize",
        &[
            ("1.0.0", spec_body("resize", "1.0.0", "")),
            ("2.0.0", spec_body("resize", "2.0.0", "")),
        ],
    );
    fs::write(
        config.registry_root.join("index/resize/2.0.0.toml"),
        spec_body("resize", "2.0.0", "billing_required = true\n"),
    )
    .expect("must tamper spec");
    write_installed(
        &config.layout(),
        &spec_body("resize", "1.0.0", ""),
        "exthub/resize@1.0.0",
        &[],
    );

    let status = update(&config, &plain_operator(false, ""), None);

    assert_eq!(status, 1);
    assert_eq!(installed(&config).source_name(), "exthub/resize@1.0.0");

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn invalid_stored_param_takes_new_default_when_non_interactive() {
    let root = test_root("update-param-default");
    let config = test_config(&root, false);
    let size_v1 = "[[params]]\nparam = \"SIZE\"\nlabel = \"Size\"\n";
    let size_v2 = "[[params]]\nparam = \"SIZE\"\nlabel = \"Size\"\nrequired = true\n\
                   default = \"200x200\"\nvalidation_regex = \"[0-9]+x[0-9]+\"\n";
    write_registry(
        &config.registry_root,
        "resize",
        &[
            ("1.0.0", spec_body("resize", "1.0.0", size_v1)),
            ("2.0.0", spec_body("resize", "2.0.0", size_v2)),
        ],
    );
    write_installed(
        &config.layout(),
        &spec_body("resize", "1.0.0", size_v1),
        "exthub/resize@1.0.0",
        &[("SIZE", "large")],
    );

    let status = update(&config, &plain_operator(false, ""), None);

    assert_eq!(status, 0);
    let instance = installed(&config);
    assert_eq!(instance.spec().version, Version::new(2, 0, 0));
    assert_eq!(instance.params().get("SIZE").map(String::as_str), Some("200x200"));

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn changed_param_definition_is_listed_in_diff() {
    let current = ExtensionSpec::from_toml_str(&spec_body(
        "resize",
        "1.0.0",
        "[[params]]\nparam = \"SIZE\"\nlabel = \"Size\"\n",
    ))
    .expect("spec");
    let next = ExtensionSpec::from_toml_str(&spec_body(
        "resize",
        "2.0.0",
        "[[params]]\nparam = \"SIZE\"\nlabel = \"Size\"\nrequired = true\n",
    ))
    .expect("spec");

    let lines = change_lines(&diff_specs(&current, &next));

    assert_eq!(
        lines,
        vec![
            "version: 1.0.0 -> 2.0.0".to_string(),
            "~ param SIZE: definition changed".to_string(),
        ]
    );
}
