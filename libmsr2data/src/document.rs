use std::collections::BTreeMap;
use std::path::Path;

use super::error::MsrFileError;
use super::parameter::Parameter;
use super::run_block::RunBlock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatisticKind {
    ChiSquare,
    MaxLikelihood,
}

impl StatisticKind {
    pub fn label(&self) -> &'static str {
        match self {
            StatisticKind::ChiSquare => "chisq",
            StatisticKind::MaxLikelihood => "maxLH",
        }
    }

    /// Column label used by the summary output
    pub fn summary_label(&self) -> &'static str {
        match self {
            StatisticKind::ChiSquare => "CHISQ",
            StatisticKind::MaxLikelihood => "maxLH",
        }
    }
}

/// Fit statistic of the STATISTIC block
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Statistic {
    pub kind: StatisticKind,
    pub min: f64,
    pub ndf: u32,
    pub converged: bool,
}

impl Statistic {
    pub fn reduced(&self) -> f64 {
        if self.ndf == 0 {
            f64::NAN
        } else {
            self.min / self.ndf as f64
        }
    }
}

/// Comment lines emitted before the parameter or RUN block with the given 1-based index
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SectionComments {
    pub parameters: BTreeMap<usize, String>,
    pub run_blocks: BTreeMap<usize, String>,
}

/// Access to an msr document.
///
/// This is everything the global file synthesis needs from a document. Any representation
/// offering it (in memory, database backed, ...) can be synthesized.
pub trait MsrDocument: Clone + Sized {
    fn read(path: &Path) -> Result<Self, MsrFileError>;
    fn write(&self, path: &Path, comments: &SectionComments) -> Result<(), MsrFileError>;

    fn title(&self) -> &str;
    fn set_title(&mut self, title: &str);

    fn parameters(&self) -> &[Parameter];
    fn parameters_mut(&mut self) -> &mut Vec<Parameter>;

    fn run_blocks(&self) -> &[RunBlock];
    fn run_blocks_mut(&mut self) -> &mut Vec<RunBlock>;

    fn theory(&self) -> &[String];
    fn theory_mut(&mut self) -> &mut Vec<String>;

    fn functions(&self) -> &[String];
    fn functions_mut(&mut self) -> &mut Vec<String>;

    fn commands(&self) -> &[String];
    fn commands_mut(&mut self) -> &mut Vec<String>;

    fn fourier(&self) -> &[String];

    fn statistic(&self) -> Option<&Statistic>;
    fn set_statistic(&mut self, statistic: Option<Statistic>);

    /// True if the document carries a converged fit
    fn is_fit_valid(&self) -> bool {
        self.statistic().map(|s| s.converged).unwrap_or(false)
    }
}
