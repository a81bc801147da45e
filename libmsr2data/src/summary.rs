use std::fmt::Write as _;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use super::config::OutputFormat;
use super::constants::MIN_COLUMN_WIDTH;
use super::document::{MsrDocument, Statistic};
use super::error::SummaryError;
use super::global::GlobalLayout;
use super::parameter::Parameter;
use super::run_number::{strip_run_suffix, RunNumberFormat};
use super::run_set::RunSet;

/// Format a value for the column output, switching to scientific notation for very large and
/// very small magnitudes
fn format_value(value: f64, width: usize) -> String {
    let magnitude = value.abs();
    if magnitude >= 1.0e6 || (magnitude < 1.0e-4 && magnitude > 0.0) {
        let precision = width.saturating_sub(8);
        format!("{value:<width$.precision$e}")
    } else {
        format!("{value:<width$}")
    }
}

/// One line of parameter data in the summary
struct Entry<'a> {
    name: &'a str,
    param: &'a Parameter,
}

/// Appends the fit results of one run after another to a DB or column data file.
///
/// In global mode only the global parameters and the parameters of the run being written are
/// part of a record, the latter with their run number suffix removed.
#[derive(Debug)]
pub struct SummaryWriter<'a> {
    path: PathBuf,
    format: OutputFormat,
    write_header: bool,
    runs: &'a RunSet,
    run_format: RunNumberFormat,
    global: bool,
    layout: Option<GlobalLayout>,
    records_written: usize,
}

impl<'a> SummaryWriter<'a> {
    pub fn new(
        path: &Path,
        format: OutputFormat,
        write_header: bool,
        runs: &'a RunSet,
        run_format: RunNumberFormat,
    ) -> Self {
        Self {
            path: path.to_path_buf(),
            format,
            write_header,
            runs,
            run_format,
            global: false,
            layout: None,
            records_written: 0,
        }
    }

    /// Switch to global mode. Without a layout it is derived from the document on the first record.
    pub fn global(mut self, layout: Option<GlobalLayout>) -> Self {
        self.global = true;
        self.layout = layout;
        self
    }

    pub fn records_written(&self) -> usize {
        self.records_written
    }

    /// Append the record of the run at `index` in the run set.
    ///
    /// Returns false if the fit in `doc` did not converge, in which case nothing is written.
    pub fn append<D: MsrDocument>(&mut self, doc: &D, index: usize) -> Result<bool, SummaryError> {
        let run = self
            .runs
            .runs()
            .get(index)
            .copied()
            .ok_or(SummaryError::RunIndexOutOfRange(index))?;
        if self.global && self.records_written == 0 && index == 0 {
            self.check_global_layout(doc)?;
        }

        let statistic = match doc.statistic() {
            Some(stat) if stat.converged => *stat,
            _ => {
                log::warn!(
                    "The fit of run {run} has not converged; its parameters are not appended to {}",
                    self.path.display()
                );
                return Ok(false);
            }
        };

        let entries = self.entries(doc, index)?;
        let variables: Vec<(&str, f64)> = self
            .runs
            .variable_names()
            .iter()
            .map(String::as_str)
            .zip(self.runs.variable_values(index).iter().copied())
            .collect();

        let mut text = String::new();
        let with_header = self.write_header && self.records_written == 0;
        match self.format {
            OutputFormat::Db => {
                if with_header {
                    db_header(&mut text, &variables, &entries, &statistic);
                }
                db_record(&mut text, &variables, &entries, &statistic, run, doc.title());
            }
            OutputFormat::Columns => {
                let width = column_width(&variables, &entries);
                if with_header {
                    column_header(&mut text, &variables, &entries, &statistic, width);
                }
                column_record(&mut text, &variables, &entries, &statistic, run, width);
            }
        }

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(text.as_bytes())?;
        self.records_written += 1;
        log::info!(
            "Parameter data of run {run} have been appended to {}",
            self.path.display()
        );
        Ok(true)
    }

    /// Close the block of records with two empty lines
    pub fn finish(&mut self) -> Result<(), SummaryError> {
        if self.records_written == 0 {
            return Ok(());
        }
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(b"\n\n")?;
        Ok(())
    }

    /// Derive the global layout from a document whose shape is unknown, using the first run
    fn derive_layout<D: MsrDocument>(&self, doc: &D) -> Result<GlobalLayout, SummaryError> {
        let first = self
            .runs
            .first()
            .ok_or(SummaryError::RunIndexOutOfRange(0))?;
        let first_str = self.run_format.format(first)?;
        let params = doc.parameters();
        let n_specific = params
            .iter()
            .filter(|p| strip_run_suffix(&p.name, &first_str).is_some())
            .count();
        let n_global = params
            .iter()
            .position(|p| strip_run_suffix(&p.name, &first_str).is_some())
            .unwrap_or(params.len());
        let n_template_blocks = doc
            .run_blocks()
            .iter()
            .filter(|b| b.run_name.contains(&first_str))
            .count();
        log::warn!(
            "The integrity of the global msr file can only be checked roughly; from run {first_str}: {n_global} global parameters, {n_specific} run specific parameters, {n_template_blocks} RUN blocks per run"
        );
        Ok(GlobalLayout {
            n_global,
            n_specific,
            n_template_blocks,
        })
    }

    fn check_global_layout<D: MsrDocument>(&mut self, doc: &D) -> Result<(), SummaryError> {
        let layout = match self.layout {
            Some(layout) => layout,
            None => self.derive_layout(doc)?,
        };
        let n_runs = self.runs.len();
        let n_params = doc.parameters().len();
        let params_ok = if layout.n_specific == 0 {
            n_params == layout.n_global
        } else {
            n_params >= layout.n_global
                && (n_params - layout.n_global) % layout.n_specific == 0
                && (n_params - layout.n_global) / layout.n_specific == n_runs
        };
        if !params_ok {
            return Err(SummaryError::InconsistentParameters {
                parameters: n_params,
                runs: n_runs,
            });
        }

        let n_blocks = doc.run_blocks().len();
        let blocks_ok = layout.n_template_blocks > 0
            && n_blocks % layout.n_template_blocks == 0
            && n_blocks / layout.n_template_blocks == n_runs;
        if !blocks_ok {
            return Err(SummaryError::InconsistentRunBlocks {
                blocks: n_blocks,
                runs: n_runs,
            });
        }
        self.layout = Some(layout);
        Ok(())
    }

    fn entries<'d, D: MsrDocument>(
        &self,
        doc: &'d D,
        index: usize,
    ) -> Result<Vec<Entry<'d>>, SummaryError> {
        let params = doc.parameters();
        let layout = match (self.global, self.layout) {
            (true, Some(layout)) => layout,
            _ => {
                return Ok(params
                    .iter()
                    .map(|param| Entry {
                        name: &param.name,
                        param,
                    })
                    .collect())
            }
        };

        let run_str = self.run_format.format(self.runs.runs()[index])?;
        let mut entries: Vec<Entry> = params[..layout.n_global]
            .iter()
            .map(|param| Entry {
                name: &param.name,
                param,
            })
            .collect();
        let start = layout.n_global + index * layout.n_specific;
        for param in params[start..start + layout.n_specific].iter() {
            let name = strip_run_suffix(&param.name, &run_str).ok_or_else(|| {
                SummaryError::RunSuffixMismatch {
                    name: param.name.clone(),
                    run: run_str.clone(),
                }
            })?;
            entries.push(Entry { name, param });
        }
        Ok(entries)
    }
}

fn db_header(text: &mut String, variables: &[(&str, f64)], entries: &[Entry], stat: &Statistic) {
    let label = stat.kind.summary_label();
    let _ = writeln!(text, "TITLE\n>>>Put your title here<<<\n");
    let _ = writeln!(text, "Abstract\n>>>Put your abstract here<<<\n");
    let _ = writeln!(text, "LABELS");
    let mut columns: Vec<String> = variables.iter().map(|(name, _)| name.to_string()).collect();
    columns.extend(entries.iter().map(|e| e.name.to_string()));
    columns.extend([
        label.to_string(),
        String::from("NDF"),
        format!("{label}red"),
        String::from("RUN"),
    ]);
    for column in columns.iter() {
        let _ = writeln!(text, "{column}");
    }
    let _ = writeln!(text, "\nData {}", columns.join(" "));
    let _ = writeln!(text, "\\-e");
}

fn db_record(
    text: &mut String,
    variables: &[(&str, f64)],
    entries: &[Entry],
    stat: &Statistic,
    run: u32,
    title: &str,
) {
    let label = stat.kind.summary_label();
    for (name, value) in variables.iter() {
        let _ = writeln!(text, "{name} = {value}, 0, 0,\\");
    }
    for entry in entries.iter() {
        let _ = writeln!(
            text,
            "{} = {}, {}, {},\\",
            entry.name,
            entry.param.value,
            entry.param.positive_error(),
            entry.param.negative_error()
        );
    }
    let _ = writeln!(text, "{label} = {}, 0, 0,\\", stat.min);
    let _ = writeln!(text, "NDF = {}, 0, 0,\\", stat.ndf);
    let _ = writeln!(text, "{label}red = {}, 0, 0,\\", stat.reduced());
    let _ = writeln!(text, "{run},,, {title}");
}

/// Field width of the column output: longest name plus one, at least 13
fn column_width(variables: &[(&str, f64)], entries: &[Entry]) -> usize {
    let longest = variables
        .iter()
        .map(|(name, _)| name.len())
        .chain(entries.iter().map(|e| e.name.len()))
        .max()
        .unwrap_or(0);
    if longest < MIN_COLUMN_WIDTH {
        MIN_COLUMN_WIDTH
    } else {
        longest + 1
    }
}

fn column_header(
    text: &mut String,
    variables: &[(&str, f64)],
    entries: &[Entry],
    stat: &Statistic,
    width: usize,
) {
    let label = stat.kind.summary_label();
    let err_width = width + 6;
    for (name, _) in variables.iter() {
        let _ = write!(text, "{name:<width$}");
    }
    for entry in entries.iter() {
        let _ = write!(
            text,
            "{:<width$}{:<err_width$}{:<err_width$}",
            entry.name,
            format!("{}PosErr", entry.name),
            format!("{}NegErr", entry.name)
        );
    }
    let _ = writeln!(
        text,
        "{label:<width$}{:<width$}{:<width$}{:<width$}",
        "NDF",
        format!("{label}red"),
        "RUN"
    );
}

fn column_record(
    text: &mut String,
    variables: &[(&str, f64)],
    entries: &[Entry],
    stat: &Statistic,
    run: u32,
    width: usize,
) {
    for (_, value) in variables.iter() {
        text.push_str(&format_value(*value, width));
    }
    for entry in entries.iter() {
        text.push_str(&format_value(entry.param.value, width));
        text.push_str(&format_value(entry.param.positive_error(), width + 6));
        text.push_str(&format_value(entry.param.negative_error(), width + 6));
    }
    text.push_str(&format_value(stat.min, width));
    text.push_str(&format_value(stat.ndf as f64, width));
    text.push_str(&format_value(stat.reduced(), width));
    text.push_str(&format_value(run as f64, width));
    text.push('\n');
}
