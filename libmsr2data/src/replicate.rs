use super::document::MsrDocument;
use super::error::GlobalFileError;
use super::global::GlobalLayout;
use super::run_number::replace_last;

fn rename_parameter(name: &str, from: &str, to: &str) -> Result<String, GlobalFileError> {
    replace_last(name, from, to).ok_or_else(|| GlobalFileError::SuffixMismatch {
        name: name.to_string(),
        run: from.to_string(),
    })
}

/// Appends the run specific parameters and RUN blocks of one run after another to a prepared
/// template document.
///
/// Run k (0-based within the run set) owns the parameters `G + k*S + 1 ..= G + (k+1)*S` and
/// the RUN blocks `k*B .. (k+1)*B`.
#[derive(Debug, Clone, Copy)]
pub struct Replicator {
    layout: GlobalLayout,
}

impl Replicator {
    pub fn new(layout: GlobalLayout) -> Self {
        Self { layout }
    }

    /// Rename the template's run specific parameters and RUN blocks to the first run of the set.
    ///
    /// Only needed when the first run is not the template run itself.
    pub fn retarget_template<D: MsrDocument>(
        &self,
        doc: &mut D,
        template_str: &str,
        first_str: &str,
    ) -> Result<(), GlobalFileError> {
        let n_global = self.layout.n_global;
        for param in doc.parameters_mut().iter_mut().skip(n_global) {
            param.name = rename_parameter(&param.name, template_str, first_str)?;
        }
        for (idx, block) in doc.run_blocks_mut().iter_mut().enumerate() {
            if !block.replace_run_number(template_str, first_str) {
                return Err(GlobalFileError::TemplateMismatch {
                    block: idx + 1,
                    name: block.run_name.clone(),
                    run: template_str.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Append the parameters and RUN blocks of run `index` by cloning those of run `index - 1`.
    ///
    /// The clones get `previous_str` replaced by `current_str` in their names, the parameters
    /// are numbered as the next S parameters and every run specific reference of the cloned
    /// blocks moves up by S.
    pub fn append_run<D: MsrDocument>(
        &self,
        doc: &mut D,
        index: usize,
        previous_str: &str,
        current_str: &str,
    ) -> Result<(), GlobalFileError> {
        let GlobalLayout {
            n_global,
            n_specific,
            n_template_blocks,
        } = self.layout;
        let Some(previous_index) = index.checked_sub(1) else {
            return Ok(());
        };

        let param_start = n_global + previous_index * n_specific;
        let mut new_params = doc.parameters()[param_start..param_start + n_specific].to_vec();
        for param in new_params.iter_mut() {
            param.name = rename_parameter(&param.name, previous_str, current_str)?;
            param.number += n_specific;
        }

        let block_start = previous_index * n_template_blocks;
        let mut new_blocks =
            doc.run_blocks()[block_start..block_start + n_template_blocks].to_vec();
        for (offset, block) in new_blocks.iter_mut().enumerate() {
            if !block.replace_run_number(previous_str, current_str) {
                return Err(GlobalFileError::TemplateMismatch {
                    block: block_start + offset + 1,
                    name: block.run_name.clone(),
                    run: previous_str.to_string(),
                });
            }
            block.shift_specific_up(n_specific);
        }

        doc.parameters_mut().extend(new_params);
        doc.run_blocks_mut().extend(new_blocks);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::msr_file::MsrFile;
    use crate::parameter::Parameter;
    use crate::run_block::{MapSlot, Role, RoleRef, RunBlock};

    fn prepared() -> MsrFile {
        let mut doc = MsrFile::default();
        doc.parameters = vec![
            Parameter::new(1, "phase", 10.0, 1.0),
            Parameter::new(2, "asy0100", 0.2, 0.01),
            Parameter::new(3, "rate0100", 0.4, 0.02),
        ];
        for param in doc.parameters.iter_mut().skip(1) {
            param.is_global = false;
        }
        let mut block = RunBlock::new("d2026/deltat_0100");
        block.set_role(Role::Alpha, RoleRef::Param(2));
        block.role_mut(Role::Alpha).unwrap().is_global = false;
        block.set_role(Role::Beta, RoleRef::Param(1));
        block.map = vec![
            MapSlot {
                target: 3,
                is_global: false,
            },
            MapSlot::new(1),
        ];
        doc.run_blocks = vec![block];
        doc
    }

    fn layout() -> GlobalLayout {
        GlobalLayout {
            n_global: 1,
            n_specific: 2,
            n_template_blocks: 1,
        }
    }

    #[test]
    fn test_append_runs() {
        let mut doc = prepared();
        let replicator = Replicator::new(layout());
        replicator.append_run(&mut doc, 1, "0100", "0101").unwrap();
        replicator.append_run(&mut doc, 2, "0101", "0105").unwrap();

        let names: Vec<&str> = doc.parameters.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["phase", "asy0100", "rate0100", "asy0101", "rate0101", "asy0105", "rate0105"]
        );
        let numbers: Vec<usize> = doc.parameters.iter().map(|p| p.number).collect();
        assert_eq!(numbers, (1..=7).collect::<Vec<usize>>());

        let last = &doc.run_blocks[2];
        assert_eq!(last.run_name, "d2026/deltat_0105");
        assert_eq!(last.role(Role::Alpha).unwrap().reference, RoleRef::Param(6));
        assert_eq!(last.role(Role::Beta).unwrap().reference, RoleRef::Param(1));
        assert_eq!(last.map_target(1), 7);
        assert_eq!(last.map_target(2), 1);
    }

    #[test]
    fn test_retarget_template() {
        let mut doc = prepared();
        Replicator::new(layout())
            .retarget_template(&mut doc, "0100", "0090")
            .unwrap();
        assert_eq!(doc.parameters[0].name, "phase");
        assert_eq!(doc.parameters[1].name, "asy0090");
        assert_eq!(doc.run_blocks[0].run_name, "d2026/deltat_0090");
    }

    #[test]
    fn test_missing_run_number_is_an_error() {
        let mut doc = prepared();
        let result = Replicator::new(layout()).append_run(&mut doc, 1, "0200", "0201");
        assert!(matches!(
            result,
            Err(GlobalFileError::SuffixMismatch { .. })
        ));

        let mut doc = prepared();
        doc.run_blocks[0].run_name = "d2026/deltat_0200".into();
        let result = Replicator::new(layout()).append_run(&mut doc, 1, "0100", "0101");
        assert!(matches!(
            result,
            Err(GlobalFileError::TemplateMismatch { block: 1, .. })
        ));
    }
}
