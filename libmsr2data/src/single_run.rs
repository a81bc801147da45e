use std::path::PathBuf;

use super::config::{Config, TemplateMode};
use super::document::{MsrDocument, SectionComments};
use super::error::SingleRunError;
use super::run_number::RunNumberFormat;

// COMMANDS lines left behind by an earlier batch fit
const BATCH_COMMANDS: [&str; 2] = ["SET BATCH", "END RETURN"];

/// Derive the msr document of `run` from the document of `source_run`.
///
/// The title becomes the run number and the source run number is replaced in every run name.
/// A run name without the source run number is kept as it is with a warning. The fit
/// statistic is dropped since it belongs to the source run.
pub fn derive_run_document<D: MsrDocument>(
    source: &D,
    source_run: u32,
    run: u32,
    format: &RunNumberFormat,
) -> Result<D, SingleRunError> {
    let source_str = format.format(source_run)?;
    let run_str = format.format(run)?;

    let mut doc = source.clone();
    doc.set_title(&run.to_string());
    for (idx, block) in doc.run_blocks_mut().iter_mut().enumerate() {
        if !block.replace_run_number(&source_str, &run_str) {
            log::warn!(
                "RUN block {} ({}) of the template does not contain run number {source_str}; it is copied unchanged",
                idx + 1,
                block.run_name
            );
        }
    }
    doc.set_statistic(None);
    Ok(doc)
}

/// Writes the per run input files `<run><ext>.msr` from a template run.
///
/// In `Same` mode every file is derived from the template run, in `Successive` mode from the
/// file of the run processed before (which, when fitting, already holds that run's results).
#[derive(Debug)]
pub struct SingleRunGenerator<'a> {
    config: &'a Config,
    format: RunNumberFormat,
    template_run: u32,
    previous_run: Option<u32>,
}

impl<'a> SingleRunGenerator<'a> {
    pub fn new(config: &'a Config, format: RunNumberFormat, template_run: u32) -> Self {
        Self {
            config,
            format,
            template_run,
            previous_run: None,
        }
    }

    /// The run whose file the next run is derived from
    pub fn source_run(&self) -> u32 {
        match (self.config.template_mode, self.previous_run) {
            (TemplateMode::Successive, Some(previous)) => previous,
            _ => self.template_run,
        }
    }

    /// Create the input file of `run` and remember it as the source of the next one
    pub fn generate<D: MsrDocument>(&mut self, run: u32) -> Result<PathBuf, SingleRunError> {
        let source_run = self.source_run();
        let output_path = self.config.msr_file_path(run);
        self.previous_run = Some(run);
        if source_run == run {
            log::info!("Run {run} is its own template, keeping {}", output_path.display());
            return Ok(output_path);
        }

        let source_path = self.config.msr_file_path(source_run);
        if !source_path.exists() {
            return Err(SingleRunError::MissingTemplate(source_path));
        }
        let source = D::read(&source_path)?;
        let mut doc = derive_run_document(&source, source_run, run, &self.format)?;
        doc.commands_mut()
            .retain(|line| !BATCH_COMMANDS.contains(&line.trim()));

        log::info!("Generating new input msr file {}", output_path.display());
        doc.write(&output_path, &SectionComments::default())?;
        Ok(output_path)
    }
}
