//! # msr2data
//!
//! msr2data creates and collects the msr files of a series of μSR runs. Starting from the msr
//! file of a single template run it can
//!
//! - write one input file per run and fit each of them with musrfit,
//! - merge all runs into one global msr file, where parameters shared by every run appear once
//!   and each run gets its own copy of the run specific parameters and RUN blocks,
//! - pre-fit every run on its own before building the global file (global+), so that the
//!   global fit starts from sensible values,
//! - collect the fit results of all runs into a DB or column data file.
//!
//! ## Installation
//!
//! The only method of install is from source. If you have not used Rust before, you will most
//! likely need to install the Rust tool chain. See the
//! [Rust docs](https://www.rust-lang.org/tools/install) for installation instructions.
//!
//! To build and install the CLI use `cargo install --path ./msr2data_cli` from the top level
//! repository. Fitting requires musrfit; set `MUSRFITPATH` to the directory holding the
//! musrfit executable, otherwise musrfit is looked up in the `PATH`.
//!
//! ## Global files
//!
//! A parameter is run specific if its name ends with the (zero padded) run number of the
//! template, e.g. `asym2045` for template run 2045. Everything else is global. The global file
//! of runs `[2045, 2046]` holds
//!
//! ```text
//! # Global parameters for all runs
//!         1 phase ...
//! # Specific parameters for run 2045
//!         2 asym2045 ...
//! # Specific parameters for run 2046
//!         3 asym2046 ...
//! ```
//!
//! and one copy of the template RUN blocks per run. THEORY and FUNCTIONS are shared by all
//! runs, so a direct reference to a run specific parameter in them is replaced by a `mapN`
//! reference and the parameter is entered into the map lines of the RUN blocks.
//!
//! ## Configuration
//!
//! The CLI is driven by a YAML configuration file:
//!
//! ```yml
//! msr_directory: .
//! extension: ''
//! runs: !Range
//!   first: 2045
//!   last: 2050
//! template_run: 2045
//! template_mode: Same
//! action: Fit
//! global: Off
//! run_number_width: null
//! output_path: out.db
//! output_format: Db
//! write_header: true
//! keep_minuit_output: false
//! title_from_data_file: false
//! ```
//!
//! - `runs`: `!Single 2045`, `!Range {first, last}` (descending if first > last),
//! `!List [...]`, or `!File path` for a run list file with independent variables.
//! - `template_mode`: `Same` derives every run from the template, `Successive` from the run
//! fitted before it.
//! - `action`: `Collect` only reads results, `CreateOnly` writes the msr files, `Fit` writes
//! and fits them.
//! - `global`: `Off`, `Global` or `GlobalPlus`.
//! - `run_number_width`: digits of the run numbers in file and parameter names; detected from
//! the template if null.
//! - `output_path`: the summary file; `none` or null disables it.
//!
//! ## Output
//!
//! Per run files are named `<run><extension>.msr`, the global file
//! `<template>+global<extension>.msr` and the global+ pre-fit files
//! `<run>-OneRunFit<extension>.msr`.
pub mod config;
pub mod constants;
pub mod document;
pub mod error;
pub mod fit_engine;
pub mod global;
pub mod map_table;
pub mod msr_file;
pub mod param_sort;
pub mod parameter;
pub mod prefit;
pub mod process;
pub mod replicate;
pub mod rewrite;
pub mod run_block;
pub mod run_number;
pub mod run_set;
pub mod run_status;
pub mod single_run;
pub mod summary;
