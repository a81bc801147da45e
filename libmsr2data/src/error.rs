use std::path::PathBuf;
use thiserror::Error;

use super::run_block::Role;
use super::run_status::RunStatus;

#[derive(Debug, Error)]
pub enum RunSetError {
    #[error("RunSet was given an empty run list")]
    EmptyRunList,
    #[error("Run number {0} is out of range; run numbers start at 1")]
    RunOutOfRange(u32),
    #[error("Could not open run list file {0:?} because it does not exist")]
    BadFilePath(PathBuf),
    #[error("Run list file {0:?} does not start with a RUN header line")]
    MissingHeader(PathBuf),
    #[error("Run list file entry for run {run} has {found} values but the header names {expected} variables")]
    VariableCountMismatch {
        run: u32,
        found: usize,
        expected: usize,
    },
    #[error("RunSet failed to parse a run number: {0}")]
    ParseRunError(#[from] std::num::ParseIntError),
    #[error("RunSet failed to parse an independent variable value: {0}")]
    ParseValueError(#[from] std::num::ParseFloatError),
    #[error("RunSet failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
}

#[derive(Debug, Clone, Error)]
pub enum RunNumberError {
    #[error("Run number width must be at least one digit")]
    ZeroWidth,
    #[error("Run number {run} does not fit into {width} digits")]
    TooWide { run: u32, width: usize },
    #[error("No RUN line was found while detecting the run number width for run {0}")]
    RunLineNotFound(u32),
    #[error("Run number {run} does not appear as a suffix of the run name {token}")]
    RunNotInRunLine { run: u32, token: String },
}

#[derive(Debug, Error)]
pub enum MsrFileError {
    #[error("Could not open msr file {0:?} because it does not exist")]
    BadFilePath(PathBuf),
    #[error("Malformed FITPARAMETER line {line_no}: {line}")]
    BadParameterLine { line_no: usize, line: String },
    #[error("Malformed RUN block line {line_no}: {line}")]
    BadRunLine { line_no: usize, line: String },
    #[error("Found a RUN block entry at line {0} before any RUN header")]
    OrphanRunLine(usize),
    #[error("Parameter numbers must be contiguous from 1; found {found} where {expected} was expected")]
    NonContiguousParameters { found: usize, expected: usize },
    #[error("msr file failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("msr file failed to format the statistic date: {0}")]
    DateError(#[from] time::error::Format),
}

#[derive(Debug, Error)]
pub enum FitEngineError {
    #[error("Could not launch fit engine {program:?}: {source}")]
    Launch {
        program: PathBuf,
        source: std::io::Error,
    },
    #[error("Fit engine failed on {path:?} with exit status {status}")]
    ExitStatus { path: PathBuf, status: String },
}

#[derive(Debug, Error)]
pub enum PrefitError {
    #[error("Pre-fit of run {run} failed due to fit engine error: {source}")]
    Engine { run: u32, source: FitEngineError },
    #[error("Pre-fit of run {run} failed due to msr file error: {source}")]
    MsrFile { run: u32, source: MsrFileError },
    #[error("Pre-fit of run {run} failed due to run number error: {source}")]
    RunNumber { run: u32, source: RunNumberError },
    #[error("Pre-fit output for run {run} holds {found} parameters where {expected} were expected")]
    ParameterCountMismatch {
        run: u32,
        found: usize,
        expected: usize,
    },
}

#[derive(Debug, Error)]
pub enum GlobalFileError {
    #[error("RUN block {block} ({name}) does not contain the template run number {run}")]
    TemplateMismatch {
        block: usize,
        name: String,
        run: String,
    },
    #[error("Run specific parameter {name} does not end with run number {run}")]
    SuffixMismatch { name: String, run: String },
    #[error("The {role} parameter {number} referenced in RUN block {block} does not exist")]
    ParameterNotFound {
        role: Role,
        block: usize,
        number: usize,
    },
    #[error("The map{slot} parameter {number} referenced in RUN block {block} does not exist")]
    MapTargetNotFound {
        slot: usize,
        block: usize,
        number: usize,
    },
    #[error("Global file holds {parameters} parameters and {blocks} RUN blocks which does not match {runs} runs")]
    InconsistentLayout {
        parameters: usize,
        blocks: usize,
        runs: usize,
    },
    #[error("The template holds no RUN blocks")]
    NoRunBlocks,
    #[error("Global file failed due to run number error: {0}")]
    RunNumberError(#[from] RunNumberError),
    #[error("Global file failed due to msr file error: {0}")]
    MsrFileError(#[from] MsrFileError),
    #[error("Global file failed due to pre-fit error: {0}")]
    PrefitError(#[from] PrefitError),
}

#[derive(Debug, Error)]
pub enum SingleRunError {
    #[error("Could not open template msr file {0:?}")]
    MissingTemplate(PathBuf),
    #[error("Single run file failed due to run number error: {0}")]
    RunNumberError(#[from] RunNumberError),
    #[error("Single run file failed due to msr file error: {0}")]
    MsrFileError(#[from] MsrFileError),
}

#[derive(Debug, Error)]
pub enum SummaryError {
    #[error("The number of parameters ({parameters}) is not consistent with {runs} runs")]
    InconsistentParameters { parameters: usize, runs: usize },
    #[error("The number of RUN blocks ({blocks}) is not consistent with {runs} runs")]
    InconsistentRunBlocks { blocks: usize, runs: usize },
    #[error("No run at index {0} of the run set")]
    RunIndexOutOfRange(usize),
    #[error("Parameter {name} does not carry the run number {run} of the record being written")]
    RunSuffixMismatch { name: String, run: String },
    #[error("Summary failed due to run number error: {0}")]
    RunNumberError(#[from] RunNumberError),
    #[error("Summary failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration as file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Configuration requires a template run for {0}")]
    MissingTemplate(&'static str),
    #[error("Config failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Config failed to parse YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
}

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("Processor failed due to Config error: {0}")]
    ConfigError(#[from] ConfigError),
    #[error("Processor failed due to RunSet error: {0}")]
    RunSetError(#[from] RunSetError),
    #[error("Processor failed due to run number error: {0}")]
    RunNumberError(#[from] RunNumberError),
    #[error("Processor failed due to msr file error: {0}")]
    MsrFileError(#[from] MsrFileError),
    #[error("Processor failed due to single run file error: {0}")]
    SingleRunError(#[from] SingleRunError),
    #[error("Processor failed due to global file error: {0}")]
    GlobalFileError(#[from] GlobalFileError),
    #[error("Processor failed due to Summary error: {0}")]
    SummaryError(#[from] SummaryError),
    #[error("Processor failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Processor failed due to Send error: {0}")]
    SendError(#[from] std::sync::mpsc::SendError<RunStatus>),
}
