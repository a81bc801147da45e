use std::path::Path;

use super::constants::GLOBAL_PARAMS_COMMENT;
use super::document::{MsrDocument, SectionComments};
use super::error::{GlobalFileError, PrefitError};
use super::param_sort::{sort_parameters, Remap};
use super::parameter::classify_parameters;
use super::replicate::Replicator;
use super::rewrite::ReferenceRewriter;
use super::run_block::{Role, RoleRef, RunBlock};
use super::run_number::{strip_run_suffix, RunNumberFormat};
use super::run_set::RunSet;

/// Shape of a global file: G global parameters, then S run specific parameters and B RUN
/// blocks per run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GlobalLayout {
    pub n_global: usize,
    pub n_specific: usize,
    pub n_template_blocks: usize,
}

impl GlobalLayout {
    pub fn n_parameters(&self, n_runs: usize) -> usize {
        self.n_global + n_runs * self.n_specific
    }

    pub fn n_run_blocks(&self, n_runs: usize) -> usize {
        n_runs * self.n_template_blocks
    }

    /// Check that a document holds exactly `n_runs` runs of this layout
    pub fn verify<D: MsrDocument>(&self, doc: &D, n_runs: usize) -> Result<(), GlobalFileError> {
        let parameters = doc.parameters().len();
        let blocks = doc.run_blocks().len();
        if parameters != self.n_parameters(n_runs) || blocks != self.n_run_blocks(n_runs) {
            return Err(GlobalFileError::InconsistentLayout {
                parameters,
                blocks,
                runs: n_runs,
            });
        }
        Ok(())
    }

    /// Cut the single run document of run `index` out of a (partially) synthesized global one.
    ///
    /// The result holds the global parameters followed by the run's specific parameters
    /// renumbered as G+1..=G+S with the run string `run_str` stripped from their names, and the
    /// run's RUN blocks with their references moved to match. `doc` itself is left untouched.
    pub fn single_run_document<D: MsrDocument>(
        &self,
        doc: &D,
        index: usize,
        run_str: &str,
    ) -> D {
        let mut single = doc.clone();
        let n_global = self.n_global;
        let n_specific = self.n_specific;

        let start = n_global + index * n_specific;
        let mut parameters = doc.parameters()[..n_global].to_vec();
        parameters.extend(
            doc.parameters()[start..start + n_specific]
                .iter()
                .enumerate()
                .map(|(offset, param)| {
                    let mut param = param.clone();
                    param.number = n_global + offset + 1;
                    if let Some(generic) = strip_run_suffix(&param.name, run_str) {
                        param.name = generic.to_string();
                    }
                    param
                }),
        );
        *single.parameters_mut() = parameters;

        let block_start = index * self.n_template_blocks;
        *single.run_blocks_mut() = doc.run_blocks()
            [block_start..block_start + self.n_template_blocks]
            .iter()
            .map(|block| {
                let mut block = block.clone();
                block.shift_specific_down(index * n_specific);
                block
            })
            .collect();
        single.set_statistic(None);
        single
    }
}

/// A synthesized global document together with its layout and the section comments to write
#[derive(Debug, Clone)]
pub struct GlobalFile<D: MsrDocument> {
    pub document: D,
    pub layout: GlobalLayout,
    pub comments: SectionComments,
}

impl<D: MsrDocument> GlobalFile<D> {
    pub fn write(&self, path: &Path) -> Result<(), GlobalFileError> {
        self.document.write(path, &self.comments)?;
        Ok(())
    }
}

/// Renumber the role references and map targets of the template RUN blocks after sorting and
/// mark each of them global or run specific.
fn remap_run_blocks(blocks: &mut [RunBlock], remap: &Remap) -> Result<(), GlobalFileError> {
    for (idx, block) in blocks.iter_mut().enumerate() {
        for role in Role::ALL {
            let Some(entry) = block.role_mut(role) else {
                continue;
            };
            match entry.reference {
                RoleRef::Param(old) => {
                    let renumbered =
                        remap
                            .get(old)
                            .ok_or(GlobalFileError::ParameterNotFound {
                                role,
                                block: idx + 1,
                                number: old,
                            })?;
                    entry.reference = RoleRef::Param(renumbered.number);
                    entry.is_global = renumbered.is_global;
                }
                // FUNCTIONS are shared by all runs
                RoleRef::Function(_) => entry.is_global = true,
            }
        }
        for (slot_idx, slot) in block.map.iter_mut().enumerate() {
            if slot.is_empty() {
                continue;
            }
            let renumbered = remap
                .get(slot.target)
                .ok_or(GlobalFileError::MapTargetNotFound {
                    slot: slot_idx + 1,
                    block: idx + 1,
                    number: slot.target,
                })?;
            slot.target = renumbered.number;
            slot.is_global = renumbered.is_global;
        }
    }
    Ok(())
}

/// Turn a single run template into the first run of a global file.
///
/// Classifies the parameters by the template run number string, sorts them global first,
/// renumbers the THEORY and FUNCTIONS references (run specific ones become map slots) and
/// renumbers the RUN blocks. Returns the prepared copy; the template is not modified.
pub fn prepare_template<D: MsrDocument>(
    template: &D,
    template_str: &str,
) -> Result<(D, GlobalLayout), GlobalFileError> {
    let mut doc = template.clone();
    if doc.run_blocks().is_empty() {
        return Err(GlobalFileError::NoRunBlocks);
    }
    for (idx, block) in doc.run_blocks().iter().enumerate() {
        if !block.run_name.contains(template_str) {
            return Err(GlobalFileError::TemplateMismatch {
                block: idx + 1,
                name: block.run_name.clone(),
                run: template_str.to_string(),
            });
        }
    }

    let classification = classify_parameters(doc.parameters_mut(), template_str)?;
    let remap = sort_parameters(doc.parameters_mut());

    let mut blocks = std::mem::take(doc.run_blocks_mut());
    let mut theory = std::mem::take(doc.theory_mut());
    let mut functions = std::mem::take(doc.functions_mut());
    let mut rewriter = ReferenceRewriter::new(&remap, &mut blocks);
    rewriter.rewrite_theory(&mut theory);
    rewriter.rewrite_functions(&mut functions);
    if rewriter.n_converted() > 0 {
        log::warn!(
            "{} direct references to run specific parameters were converted to map slots; check the map lines of the template RUN blocks",
            rewriter.n_converted()
        );
    }
    remap_run_blocks(&mut blocks, &remap)?;

    let layout = GlobalLayout {
        n_global: classification.n_global,
        n_specific: classification.n_specific,
        n_template_blocks: blocks.len(),
    };
    *doc.run_blocks_mut() = blocks;
    *doc.theory_mut() = theory;
    *doc.functions_mut() = functions;
    doc.set_statistic(None);
    Ok((doc, layout))
}

/// Synthesize the global document of `runs` from a template without pre-fitting
pub fn synthesize<D: MsrDocument>(
    template: &D,
    template_run: u32,
    runs: &RunSet,
    format: &RunNumberFormat,
) -> Result<GlobalFile<D>, GlobalFileError> {
    synthesize_with_prefit(template, template_run, runs, format, |_, _, _, _| Ok(()))
}

/// Synthesize the global document of `runs` from a template.
///
/// Runs are processed in run set order. Once run k's parameters and RUN blocks are in place,
/// `prefit(doc, layout, k, run)` is called; it may change run k's specific parameters before
/// they are cloned for run k+1. Any pre-fit error aborts the synthesis.
pub fn synthesize_with_prefit<D, F>(
    template: &D,
    template_run: u32,
    runs: &RunSet,
    format: &RunNumberFormat,
    mut prefit: F,
) -> Result<GlobalFile<D>, GlobalFileError>
where
    D: MsrDocument,
    F: FnMut(&mut D, &GlobalLayout, usize, u32) -> Result<(), PrefitError>,
{
    let template_str = format.format(template_run)?;
    let (mut doc, layout) = prepare_template(template, &template_str)?;
    log::info!(
        "Template run {template_run}: {} global parameters, {} run specific parameters, {} RUN blocks",
        layout.n_global,
        layout.n_specific,
        layout.n_template_blocks
    );

    let replicator = Replicator::new(layout);
    let mut comments = SectionComments::default();
    if layout.n_global > 0 {
        comments
            .parameters
            .insert(1, GLOBAL_PARAMS_COMMENT.to_string());
    }

    let mut previous_str = template_str.clone();
    let mut cursor = runs.cursor();
    while let Some(run) = cursor.current() {
        let index = cursor.index();
        let run_str = format.format(run)?;
        if cursor.is_first() {
            if run_str != template_str {
                replicator.retarget_template(&mut doc, &template_str, &run_str)?;
            }
        } else {
            replicator.append_run(&mut doc, index, &previous_str, &run_str)?;
        }

        if layout.n_specific > 0 {
            comments.parameters.insert(
                layout.n_global + index * layout.n_specific + 1,
                format!("Specific parameters for run {run}"),
            );
        }
        comments.run_blocks.insert(
            index * layout.n_template_blocks + 1,
            format!("RUN blocks for run {run}"),
        );

        prefit(&mut doc, &layout, index, run)?;

        previous_str = run_str;
        cursor.advance();
    }

    layout.verify(&doc, runs.len())?;
    Ok(GlobalFile {
        document: doc,
        layout,
        comments,
    })
}
