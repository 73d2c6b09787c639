//! `reconcile` command implementation.

use std::io::{BufReader, Write};

use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use landmatch_core::{BatchReport, IdGenerator, MatchConfig, UuidGenerator, reconcile_batch};
use landmatch_fs::{create_utf8_file, open_utf8_file};
use log::info;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::document::{BatchDocument, ReportDocument};
use crate::{
    ARG_RECONCILE_INPUT, ARG_RECONCILE_MATCH_CONFIG, ARG_RECONCILE_OUTPUT, CliError,
    ENV_RECONCILE_INPUT,
};

/// CLI arguments for the `reconcile` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Match every source inventory of a JSON batch against its \
                 target inventory, assign each source feature to a bucket and \
                 derive keep/remove/add/change-geometry actions for the \
                 automatic buckets. Paths can come from CLI flags, \
                 configuration files, or environment variables.",
    about = "Reconcile source inventories against the target inventory"
)]
#[ortho_config(prefix = "LANDMATCH")]
pub(crate) struct ReconcileArgs {
    /// Path to the JSON batch holding targets and per-asset sources.
    #[arg(value_name = "path")]
    #[serde(default)]
    pub(crate) input: Option<Utf8PathBuf>,
    /// Write the report to this file instead of standard output.
    #[arg(long = ARG_RECONCILE_OUTPUT, value_name = "path")]
    #[serde(default)]
    pub(crate) output: Option<Utf8PathBuf>,
    /// JSON file overriding the default match thresholds.
    #[arg(long = ARG_RECONCILE_MATCH_CONFIG, value_name = "path")]
    #[serde(default)]
    pub(crate) match_config: Option<Utf8PathBuf>,
}

impl ReconcileArgs {
    pub(crate) fn into_config(self) -> Result<ReconcileConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        ReconcileConfig::try_from(merged)
    }
}

/// Resolved `reconcile` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ReconcileConfig {
    /// Path to the JSON batch.
    pub(crate) input: Utf8PathBuf,
    /// Report destination; standard output when absent.
    pub(crate) output: Option<Utf8PathBuf>,
    /// Optional match configuration document.
    pub(crate) match_config: Option<Utf8PathBuf>,
}

impl ReconcileConfig {
    pub(crate) fn validate_sources(&self) -> Result<(), CliError> {
        Self::require_existing(&self.input, ARG_RECONCILE_INPUT)?;
        if let Some(path) = &self.match_config {
            Self::require_existing(path, ARG_RECONCILE_MATCH_CONFIG)?;
        }
        Ok(())
    }

    fn require_existing(path: &Utf8Path, field: &'static str) -> Result<(), CliError> {
        match landmatch_fs::file_is_file(path) {
            Ok(true) => Ok(()),
            Ok(false) => Err(CliError::SourcePathNotFile {
                field,
                path: path.to_path_buf(),
            }),
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
                Err(CliError::MissingSourceFile {
                    field,
                    path: path.to_path_buf(),
                })
            }
            Err(source) => Err(CliError::InspectSourcePath {
                field,
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}

impl TryFrom<ReconcileArgs> for ReconcileConfig {
    type Error = CliError;

    fn try_from(args: ReconcileArgs) -> Result<Self, Self::Error> {
        let input = args.input.ok_or(CliError::MissingArgument {
            field: ARG_RECONCILE_INPUT,
            env: ENV_RECONCILE_INPUT,
        })?;
        Ok(Self {
            input,
            output: args.output,
            match_config: args.match_config,
        })
    }
}

pub(crate) fn run_reconcile(args: ReconcileArgs) -> Result<(), CliError> {
    let config = resolve_reconcile_config(args)?;
    match &config.output {
        Some(path) => {
            let mut file = create_utf8_file(path).map_err(|source| CliError::CreateReport {
                path: path.clone(),
                source,
            })?;
            run_reconcile_with(&config, &UuidGenerator, &mut file)?;
            info!("report written to {path}");
            Ok(())
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            run_reconcile_with(&config, &UuidGenerator, &mut stdout)
        }
    }
}

/// Run the batch, write the report and fail if any asset type failed.
pub(crate) fn run_reconcile_with(
    config: &ReconcileConfig,
    ids: &dyn IdGenerator,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    let report = execute_reconcile(config, ids)?;
    write_report(writer, &ReportDocument::from_report(&report))?;
    match report.failures().count() {
        0 => Ok(()),
        failed => Err(CliError::AssetsFailed { failed }),
    }
}

fn execute_reconcile(
    config: &ReconcileConfig,
    ids: &dyn IdGenerator,
) -> Result<BatchReport, CliError> {
    let batch: BatchDocument = load_json(&config.input, ARG_RECONCILE_INPUT)?;
    let match_config = match &config.match_config {
        Some(path) => load_json(path, ARG_RECONCILE_MATCH_CONFIG)?,
        None => MatchConfig::default(),
    };
    Ok(reconcile_batch(&batch.into(), &match_config, ids)?)
}

fn resolve_reconcile_config(args: ReconcileArgs) -> Result<ReconcileConfig, CliError> {
    let config = args.into_config()?;
    config.validate_sources()?;
    Ok(config)
}

/// Loads a JSON document from disk.
pub(crate) fn load_json<T: DeserializeOwned>(
    path: &Utf8Path,
    field: &'static str,
) -> Result<T, CliError> {
    let file = open_utf8_file(path).map_err(|source| CliError::OpenInput {
        field,
        path: path.to_path_buf(),
        source,
    })?;
    let reader = BufReader::new(file);
    serde_json::from_reader(reader).map_err(|source| CliError::ParseInput {
        field,
        path: path.to_path_buf(),
        source,
    })
}

fn write_report(writer: &mut dyn Write, report: &ReportDocument<'_>) -> Result<(), CliError> {
    let payload = serde_json::to_string_pretty(report).map_err(CliError::SerialiseReport)?;
    writer
        .write_all(payload.as_bytes())
        .map_err(CliError::WriteReport)?;
    writer.write_all(b"\n").map_err(CliError::WriteReport)?;
    Ok(())
}

#[cfg(test)]
pub(crate) fn config_from_layers_for_test(
    layers: Vec<ortho_config::MergeLayer<'static>>,
) -> Result<ReconcileConfig, CliError> {
    let merged = ReconcileArgs::merge_from_layers(layers).map_err(CliError::from)?;
    ReconcileConfig::try_from(merged)
}
