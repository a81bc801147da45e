use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::constants::{
    DEFAULT_COLUMN_OUTPUT, DEFAULT_DB_OUTPUT, GLOBAL_TAG, MSR_SUFFIX, NO_OUTPUT, ONE_RUN_FIT_TAG,
};
use super::error::ConfigError;
use super::run_set::RunSpec;

/// Where the msr file of each run comes from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TemplateMode {
    /// Every run is generated from the template run
    #[default]
    Same,
    /// Every run is generated from the fitted file of the run before it
    Successive,
}

/// What to do with the msr files
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    /// Only read already fitted files and write the parameter summary
    #[default]
    Collect,
    /// Generate the input files from the template but do not fit them
    CreateOnly,
    /// Generate the input files (if a template is given) and fit them
    Fit,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum GlobalMode {
    /// One msr file per run
    #[default]
    Off,
    /// One global msr file for all runs
    Global,
    /// One global msr file whose run specific start values come from single run pre-fits
    GlobalPlus,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    #[default]
    Db,
    Columns,
}

impl OutputFormat {
    pub fn default_file_name(&self) -> &'static str {
        match self {
            OutputFormat::Db => DEFAULT_DB_OUTPUT,
            OutputFormat::Columns => DEFAULT_COLUMN_OUTPUT,
        }
    }
}

/// Structure representing the application configuration. Contains pathing and run information
/// Configs are seralizable and deserializable to YAML using serde and serde_yaml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub msr_directory: PathBuf,
    pub extension: String,
    pub runs: RunSpec,
    pub template_run: Option<u32>,
    pub template_mode: TemplateMode,
    pub action: Action,
    pub global: GlobalMode,
    pub run_number_width: Option<usize>,
    pub output_path: Option<PathBuf>,
    pub output_format: OutputFormat,
    pub write_header: bool,
    pub keep_minuit_output: bool,
    pub title_from_data_file: bool,
}

impl Default for Config {
    /// Generate a new Config object. Paths point at the working directory
    fn default() -> Self {
        Self {
            msr_directory: PathBuf::from("."),
            extension: String::from(""),
            runs: RunSpec::default(),
            template_run: None,
            template_mode: TemplateMode::default(),
            action: Action::default(),
            global: GlobalMode::default(),
            run_number_width: None,
            output_path: Some(PathBuf::from(OutputFormat::Db.default_file_name())),
            output_format: OutputFormat::Db,
            write_header: true,
            keep_minuit_output: false,
            title_from_data_file: false,
        }
    }
}

impl Config {
    /// Read the configuration in a YAML file
    /// Returns a Config if successful
    pub fn read_config_file(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            return Err(ConfigError::BadFilePath(config_path.to_path_buf()));
        }

        let yaml_str = std::fs::read_to_string(config_path)?;

        Ok(serde_yaml::from_str::<Self>(&yaml_str)?)
    }

    /// Path to the msr file of a run: `<run><ext>.msr`
    pub fn msr_file_path(&self, run_number: u32) -> PathBuf {
        self.msr_directory
            .join(format!("{run_number}{}{MSR_SUFFIX}", self.extension))
    }

    /// Path to the temporary single run file of a global+ pre-fit: `<run>-OneRunFit<ext>.msr`
    pub fn prefit_file_path(&self, run_number: u32) -> PathBuf {
        self.msr_directory.join(format!(
            "{run_number}{ONE_RUN_FIT_TAG}{}{MSR_SUFFIX}",
            self.extension
        ))
    }

    /// Path to the global file: `<template>+global<ext>.msr`
    pub fn global_file_path(&self, template_run: u32) -> PathBuf {
        self.msr_directory.join(format!(
            "{template_run}{GLOBAL_TAG}{}{MSR_SUFFIX}",
            self.extension
        ))
    }

    /// Path of the parameter summary, None if no summary should be written
    pub fn summary_path(&self) -> Option<&Path> {
        match &self.output_path {
            Some(path) if path.as_os_str() != NO_OUTPUT => Some(path.as_path()),
            _ => None,
        }
    }

    /// The template run, required by everything except collecting existing results
    pub fn require_template(&self, purpose: &'static str) -> Result<u32, ConfigError> {
        self.template_run
            .ok_or(ConfigError::MissingTemplate(purpose))
    }

    pub fn is_global(&self) -> bool {
        self.global != GlobalMode::Off
    }

    pub fn need_fit(&self) -> bool {
        self.action == Action::Fit
    }

    /// Whether msr files have to be generated from a template
    pub fn need_generate(&self) -> bool {
        match self.action {
            Action::Collect => false,
            Action::CreateOnly => true,
            Action::Fit => self.template_run.is_some(),
        }
    }
}
