use std::path::{Path, PathBuf};
use std::process::Command;

use super::config::Config;
use super::constants::{
    FIT_ENGINE_NAME, FIT_ENGINE_PATH_VAR, KEEP_MINUIT_OUTPUT_FLAG, TITLE_FROM_DATA_FLAG,
};
use super::error::FitEngineError;

/// Something that fits an msr file in place.
///
/// A successful call means the engine ran to completion; whether the fit converged is read
/// back from the file.
pub trait FitEngine {
    fn fit(&self, msr_path: &Path) -> Result<(), FitEngineError>;
}

/// The musrfit executable, run as a blocking subprocess
#[derive(Debug, Clone, Default)]
pub struct Musrfit {
    program: Option<PathBuf>,
    keep_minuit_output: bool,
    title_from_data_file: bool,
}

impl Musrfit {
    pub fn new(keep_minuit_output: bool, title_from_data_file: bool) -> Self {
        Self {
            program: None,
            keep_minuit_output,
            title_from_data_file,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.keep_minuit_output, config.title_from_data_file)
    }

    /// Use an explicit executable instead of looking it up through the environment
    pub fn with_program(mut self, program: &Path) -> Self {
        self.program = Some(program.to_path_buf());
        self
    }

    /// The executable: explicit, `$MUSRFITPATH/musrfit`, or `musrfit` from the PATH
    pub fn program(&self) -> PathBuf {
        if let Some(program) = &self.program {
            return program.clone();
        }
        match std::env::var_os(FIT_ENGINE_PATH_VAR) {
            Some(dir) => PathBuf::from(dir).join(FIT_ENGINE_NAME),
            None => {
                log::warn!(
                    "{FIT_ENGINE_PATH_VAR} is not set, relying on {FIT_ENGINE_NAME} being in the PATH"
                );
                PathBuf::from(FIT_ENGINE_NAME)
            }
        }
    }

    fn options(&self) -> Vec<&'static str> {
        let mut options = vec![];
        if self.keep_minuit_output {
            options.push(KEEP_MINUIT_OUTPUT_FLAG);
        }
        if self.title_from_data_file {
            options.push(TITLE_FROM_DATA_FLAG);
        }
        options
    }
}

impl FitEngine for Musrfit {
    fn fit(&self, msr_path: &Path) -> Result<(), FitEngineError> {
        let program = self.program();
        log::info!("Calling {} on {}", program.display(), msr_path.display());
        let mut command = Command::new(&program);
        // musrfit resolves data and output files relative to the msr file
        match (msr_path.parent(), msr_path.file_name()) {
            (Some(dir), Some(name)) if !dir.as_os_str().is_empty() => {
                command.current_dir(dir).arg(name);
            }
            _ => {
                command.arg(msr_path);
            }
        }
        let status = command
            .args(self.options())
            .status()
            .map_err(|source| FitEngineError::Launch {
                program: program.clone(),
                source,
            })?;
        if !status.success() {
            return Err(FitEngineError::ExitStatus {
                path: msr_path.to_path_buf(),
                status: status.to_string(),
            });
        }
        Ok(())
    }
}
