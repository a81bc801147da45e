use std::sync::mpsc::Sender;

use super::config::{Action, Config, GlobalMode};
use super::document::MsrDocument;
use super::error::{ProcessorError, RunNumberError};
use super::fit_engine::{FitEngine, Musrfit};
use super::global::{synthesize, GlobalFile, GlobalLayout};
use super::msr_file::MsrFile;
use super::prefit::PrefitChainer;
use super::run_number::RunNumberFormat;
use super::run_set::RunSet;
use super::run_status::{RunStatus, Stage};
use super::single_run::SingleRunGenerator;
use super::summary::SummaryWriter;

/// Establish the run number width once: from the config, otherwise from the first template or
/// run file that can be opened
pub fn run_number_format(config: &Config, runs: &RunSet) -> Result<RunNumberFormat, ProcessorError> {
    if let Some(width) = config.run_number_width {
        return Ok(RunNumberFormat::new(width)?);
    }
    let candidates = config.template_run.iter().chain(runs.runs().iter());
    for run in candidates {
        let path = config.msr_file_path(*run);
        if !path.exists() {
            continue;
        }
        let text = std::fs::read_to_string(&path)?;
        let format = RunNumberFormat::detect(&text, *run)?;
        log::info!(
            "Run numbers are {} digits wide (detected from {})",
            format.width(),
            path.display()
        );
        return Ok(format);
    }
    let first = config.template_run.or(runs.first()).unwrap_or_default();
    Err(RunNumberError::RunLineNotFound(first).into())
}

/// One msr file per run: generate, fit and collect each run in turn
fn process_single_runs<E: FitEngine>(
    config: &Config,
    engine: &E,
    runs: &RunSet,
    format: RunNumberFormat,
    tx: &Sender<RunStatus>,
) -> Result<(), ProcessorError> {
    let mut generator = if config.need_generate() {
        let template_run = config.require_template("generating msr files")?;
        Some(SingleRunGenerator::new(config, format, template_run))
    } else {
        None
    };
    let mut summary = match (config.action, config.summary_path()) {
        (Action::CreateOnly, _) | (_, None) => None,
        (_, Some(path)) => Some(SummaryWriter::new(
            path,
            config.output_format,
            config.write_header,
            runs,
            format,
        )),
    };

    let mut cursor = runs.cursor();
    while let Some(run) = cursor.current() {
        let index = cursor.index();
        let msr_path = config.msr_file_path(run);
        tx.send(RunStatus::new(cursor.progress(), run, Stage::Prepare))?;
        if let Some(generator) = generator.as_mut() {
            generator.generate::<MsrFile>(run)?;
        }

        if config.need_fit() {
            tx.send(RunStatus::new(cursor.progress(), run, Stage::Fit))?;
            if let Err(e) = engine.fit(&msr_path) {
                log::warn!("Fitting run {run} failed: {e}\nSkipping run {run}.");
                cursor.advance();
                continue;
            }
        }

        if let Some(writer) = summary.as_mut() {
            tx.send(RunStatus::new(cursor.progress(), run, Stage::Summary))?;
            match MsrFile::read(&msr_path) {
                Ok(doc) => {
                    writer.append(&doc, index)?;
                }
                Err(e) => log::warn!("Could not read the results of run {run}: {e}\nSkipping run {run}."),
            }
        }
        cursor.advance();
    }

    if let Some(writer) = summary.as_mut() {
        writer.finish()?;
    }
    Ok(())
}

/// One global msr file for all runs
fn process_global<E: FitEngine>(
    config: &Config,
    engine: &E,
    runs: &RunSet,
    format: RunNumberFormat,
    tx: &Sender<RunStatus>,
) -> Result<(), ProcessorError> {
    let template_run = config.require_template("global msr files")?;
    let global_path = config.global_file_path(template_run);
    let mut layout: Option<GlobalLayout> = None;

    if config.action != Action::Collect {
        let template = MsrFile::read(&config.msr_file_path(template_run))?;
        tx.send(RunStatus::new(0.0, template_run, Stage::Prepare))?;
        let global: GlobalFile<MsrFile> = match config.global {
            GlobalMode::GlobalPlus => {
                tx.send(RunStatus::new(0.0, template_run, Stage::Prefit))?;
                PrefitChainer::new(config, engine).synthesize(&template, template_run, runs, &format)?
            }
            _ => synthesize(&template, template_run, runs, &format)?,
        };
        global.write(&global_path)?;
        log::info!("Wrote global msr file {}", global_path.display());
        layout = Some(global.layout);
    }

    if config.need_fit() {
        tx.send(RunStatus::new(0.5, template_run, Stage::Fit))?;
        if let Err(e) = engine.fit(&global_path) {
            log::warn!(
                "Fitting {} failed: {e}\nNo parameter summary is written.",
                global_path.display()
            );
            return Ok(());
        }
    }

    let Some(summary_path) = config.summary_path() else {
        return Ok(());
    };
    if config.action == Action::CreateOnly {
        return Ok(());
    }
    let doc = MsrFile::read(&global_path)?;
    let mut writer = SummaryWriter::new(
        summary_path,
        config.output_format,
        config.write_header,
        runs,
        format,
    )
    .global(layout);
    let mut cursor = runs.cursor();
    while let Some(run) = cursor.current() {
        tx.send(RunStatus::new(cursor.progress(), run, Stage::Summary))?;
        writer.append(&doc, cursor.index())?;
        cursor.advance();
    }
    writer.finish()?;
    Ok(())
}

/// Run everything a Config asks for with the given fit engine.
pub fn process_with_engine<E: FitEngine>(
    config: &Config,
    engine: &E,
    tx: &Sender<RunStatus>,
) -> Result<(), ProcessorError> {
    let runs = RunSet::from_spec(&config.runs)?;
    let format = run_number_format(config, &runs)?;
    log::info!("Processing {} runs...", runs.len());
    if config.is_global() {
        process_global(config, engine, &runs, format, tx)?;
    } else {
        process_single_runs(config, engine, &runs, format, tx)?;
    }
    if let Some(last) = runs.runs().last() {
        tx.send(RunStatus::new(1.0, *last, Stage::Summary))?;
    }
    log::info!("Finished processing {} runs.", runs.len());
    Ok(())
}

/// The function to be called by a separate thread (typically the UI).
///
/// Fits are done with musrfit; progress is reported through `tx`.
pub fn process(config: Config, tx: Sender<RunStatus>) -> Result<(), ProcessorError> {
    let engine = Musrfit::from_config(&config);
    process_with_engine(&config, &engine, &tx)
}
