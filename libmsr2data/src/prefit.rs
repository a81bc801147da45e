use super::config::{Config, TemplateMode};
use super::document::{MsrDocument, SectionComments};
use super::error::{GlobalFileError, PrefitError};
use super::fit_engine::FitEngine;
use super::global::{synthesize_with_prefit, GlobalFile, GlobalLayout};
use super::parameter::Parameter;
use super::run_number::RunNumberFormat;
use super::run_set::RunSet;

/// Copy the fit results (value, step/negative error, positive error) of one parameter onto another
fn take_fit_values(target: &mut Parameter, source: &Parameter) {
    target.value = source.value;
    target.step = source.step;
    target.pos_error = source.pos_error;
}

/// Start values for the run specific parameters of a global file, obtained by fitting each run
/// on its own first.
///
/// For every run a single run file `<run>-OneRunFit<ext>.msr` is cut out of the global file as
/// synthesized so far and fitted; the results replace the run's specific parameters. In
/// `Successive` mode a run starts from the fitted values of the run before it, in `Same` mode
/// from the template values.
pub struct PrefitChainer<'a, E: FitEngine> {
    config: &'a Config,
    engine: &'a E,
    mode: TemplateMode,
    template_values: Vec<Parameter>,
}

impl<'a, E: FitEngine> PrefitChainer<'a, E> {
    pub fn new(config: &'a Config, engine: &'a E) -> Self {
        Self {
            config,
            engine,
            mode: config.template_mode,
            template_values: vec![],
        }
    }

    /// Synthesize the global file of `runs`, pre-fitting every run on the way
    pub fn synthesize<D: MsrDocument>(
        &mut self,
        template: &D,
        template_run: u32,
        runs: &RunSet,
        format: &RunNumberFormat,
    ) -> Result<GlobalFile<D>, GlobalFileError> {
        synthesize_with_prefit(template, template_run, runs, format, |doc, layout, index, run| {
            self.prefit(doc, layout, index, run, format)
        })
    }

    /// Pre-fit run `index` of a partially synthesized global document.
    ///
    /// The pre-fit file carries the generic parameter names (run string stripped); results are
    /// copied back by position.
    pub fn prefit<D: MsrDocument>(
        &mut self,
        doc: &mut D,
        layout: &GlobalLayout,
        index: usize,
        run: u32,
        format: &RunNumberFormat,
    ) -> Result<(), PrefitError> {
        if layout.n_specific == 0 {
            log::info!("No run specific parameters, skipping the pre-fit of run {run}");
            return Ok(());
        }
        let start = layout.n_global + index * layout.n_specific;
        let end = start + layout.n_specific;

        if index == 0 {
            self.template_values = doc.parameters()[start..end].to_vec();
        } else if self.mode == TemplateMode::Same {
            for (param, seed) in doc.parameters_mut()[start..end]
                .iter_mut()
                .zip(self.template_values.iter())
            {
                take_fit_values(param, seed);
            }
        }

        let run_str = format
            .format(run)
            .map_err(|source| PrefitError::RunNumber { run, source })?;
        let single = layout.single_run_document(doc, index, &run_str);
        let path = self.config.prefit_file_path(run);
        single
            .write(&path, &SectionComments::default())
            .map_err(|source| PrefitError::MsrFile { run, source })?;

        log::info!("Pre-fitting run {run} using {}", path.display());
        self.engine
            .fit(&path)
            .map_err(|source| PrefitError::Engine { run, source })?;

        let fitted = D::read(&path).map_err(|source| PrefitError::MsrFile { run, source })?;
        let expected = layout.n_global + layout.n_specific;
        if fitted.parameters().len() != expected {
            return Err(PrefitError::ParameterCountMismatch {
                run,
                found: fitted.parameters().len(),
                expected,
            });
        }
        if !fitted.is_fit_valid() {
            log::warn!(
                "The pre-fit of run {run} did not converge; its results are used as start values anyway"
            );
        }

        for (param, result) in doc.parameters_mut()[start..end]
            .iter_mut()
            .zip(fitted.parameters()[layout.n_global..].iter())
        {
            take_fit_values(param, result);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Statistic, StatisticKind};
    use crate::error::FitEngineError;
    use crate::msr_file::MsrFile;
    use crate::run_block::{Role, RoleRef, RunBlock};
    use std::cell::RefCell;
    use std::path::Path;

    /// Doubles the run specific rate and records what it was handed
    #[derive(Default)]
    struct DoublingEngine {
        seen: RefCell<Vec<(String, f64)>>,
    }

    impl FitEngine for DoublingEngine {
        fn fit(&self, msr_path: &Path) -> Result<(), FitEngineError> {
            let mut msr = MsrFile::read(msr_path).unwrap();
            let rate = &mut msr.parameters[1];
            self.seen.borrow_mut().push((rate.name.clone(), rate.value));
            rate.value *= 2.0;
            rate.step = -0.05;
            rate.pos_error = Some(0.06);
            msr.statistic = Some(Statistic {
                kind: StatisticKind::ChiSquare,
                min: 101.0,
                ndf: 100,
                converged: true,
            });
            msr.write(msr_path, &SectionComments::default()).unwrap();
            Ok(())
        }
    }

    struct FailingEngine;

    impl FitEngine for FailingEngine {
        fn fit(&self, msr_path: &Path) -> Result<(), FitEngineError> {
            Err(FitEngineError::ExitStatus {
                path: msr_path.to_path_buf(),
                status: String::from("exit status: 1"),
            })
        }
    }

    fn template() -> MsrFile {
        let mut doc = MsrFile::default();
        doc.title = String::from("chain");
        doc.parameters = vec![
            Parameter::new(1, "phase", 5.0, 0.5),
            Parameter::new(2, "rate10", 1.0, 0.1),
        ];
        doc.theory = vec![String::from("simplExpo 2")];
        let mut block = RunBlock::new("data/run10");
        block.set_role(Role::Norm, RoleRef::Param(1));
        doc.run_blocks = vec![block];
        doc
    }

    fn config(dir: &Path, mode: TemplateMode) -> Config {
        Config {
            msr_directory: dir.to_path_buf(),
            template_mode: mode,
            ..Default::default()
        }
    }

    #[test]
    fn test_successive_chains_fitted_values() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path(), TemplateMode::Successive);
        let engine = DoublingEngine::default();
        let runs = RunSet::list(vec![10, 11, 12]).unwrap();
        let format = RunNumberFormat::new(2).unwrap();

        let global = PrefitChainer::new(&config, &engine)
            .synthesize(&template(), 10, &runs, &format)
            .unwrap();

        // run 11 starts from what the fit of run 10 produced
        assert_eq!(
            *engine.seen.borrow(),
            vec![
                (String::from("rate"), 1.0),
                (String::from("rate"), 2.0),
                (String::from("rate"), 4.0)
            ]
        );
        let values: Vec<f64> = global.document.parameters.iter().map(|p| p.value).collect();
        assert_eq!(values, vec![5.0, 2.0, 4.0, 8.0]);
        assert_eq!(global.document.parameters[3].pos_error, Some(0.06));

        let names: Vec<&str> = global.document.parameters.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["phase", "rate10", "rate11", "rate12"]);
        let written = MsrFile::read(&config.prefit_file_path(11)).unwrap();
        let written_names: Vec<&str> = written.parameters.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(written_names, vec!["phase", "rate"]);
        assert_eq!(written.run_blocks[0].run_name, "data/run11");
    }

    #[test]
    fn test_same_template_restarts_from_template() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path(), TemplateMode::Same);
        let engine = DoublingEngine::default();
        let runs = RunSet::list(vec![10, 11, 12]).unwrap();
        let format = RunNumberFormat::new(2).unwrap();

        let global = PrefitChainer::new(&config, &engine)
            .synthesize(&template(), 10, &runs, &format)
            .unwrap();

        let seen: Vec<f64> = engine.seen.borrow().iter().map(|(_, v)| *v).collect();
        assert_eq!(seen, vec![1.0, 1.0, 1.0]);
        let values: Vec<f64> = global.document.parameters.iter().map(|p| p.value).collect();
        assert_eq!(values, vec![5.0, 2.0, 2.0, 2.0]);
    }

    #[test]
    fn test_failed_prefit_aborts_synthesis() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path(), TemplateMode::Successive);
        let runs = RunSet::list(vec![10, 11]).unwrap();
        let format = RunNumberFormat::new(2).unwrap();

        let result = PrefitChainer::new(&config, &FailingEngine).synthesize(
            &template(),
            10,
            &runs,
            &format,
        );
        assert!(matches!(
            result,
            Err(GlobalFileError::PrefitError(PrefitError::Engine { run: 10, .. }))
        ));
        assert!(!config.global_file_path(10).exists());
    }
}
