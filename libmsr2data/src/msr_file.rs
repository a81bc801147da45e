use std::fmt::Write as _;
use std::path::Path;
use std::str::FromStr;

use time::macros::format_description;
use time::OffsetDateTime;

use super::constants::{COMMENT_CHAR, FUNCTION_PREFIX};
use super::document::{MsrDocument, SectionComments, Statistic, StatisticKind};
use super::error::MsrFileError;
use super::parameter::Parameter;
use super::run_block::{MapSlot, Role, RoleRef, RunBlock};

const SEPARATOR: &str =
    "###############################################################";
const NOT_CONVERGED: &str = "*** FIT DID NOT CONVERGE ***";
const NONE: &str = "none";

#[derive(Debug, Clone, Copy, PartialEq)]
enum Section {
    Preamble,
    FitParameter,
    Theory,
    Functions,
    Global,
    Run,
    Commands,
    Fourier,
    Plot,
    Statistic,
}

impl Section {
    /// Recognize a block header by the first token of a line
    fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "FITPARAMETER" => Some(Self::FitParameter),
            "THEORY" => Some(Self::Theory),
            "FUNCTIONS" => Some(Self::Functions),
            "GLOBAL" => Some(Self::Global),
            "RUN" => Some(Self::Run),
            "COMMANDS" => Some(Self::Commands),
            "FOURIER" => Some(Self::Fourier),
            "PLOT" => Some(Self::Plot),
            "STATISTIC" => Some(Self::Statistic),
            _ => None,
        }
    }
}

/// In-memory msr document with a reader and writer for the msr text format.
///
/// Comment lines inside THEORY, FUNCTIONS, RUN and the verbatim blocks (GLOBAL, COMMANDS,
/// FOURIER, PLOT) are kept; a comment directly before a block header, empty lines and
/// FITPARAMETER comments are not.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MsrFile {
    pub title: String,
    pub parameters: Vec<Parameter>,
    pub theory: Vec<String>,
    pub functions: Vec<String>,
    pub global: Vec<String>,
    pub run_blocks: Vec<RunBlock>,
    pub commands: Vec<String>,
    pub fourier: Vec<String>,
    /// PLOT blocks including their header lines
    pub plots: Vec<String>,
    pub statistic: Option<Statistic>,
}

impl MsrFile {
    /// Parse the text of an msr file
    pub fn parse(text: &str) -> Result<Self, MsrFileError> {
        let mut msr = MsrFile::default();
        let mut section = Section::Preamble;
        let mut lines = text.lines().enumerate();
        let mut stat_kind: Option<(StatisticKind, f64)> = None;
        let mut stat_ndf: Option<u32> = None;
        let mut converged = true;
        // comment lines wait here until the next content line of the same block
        let mut pending_comments: Vec<String> = vec![];

        if let Some((_, title)) = lines.next() {
            msr.title = title.trim_end().to_string();
        }

        for (idx, raw) in lines {
            let line_no = idx + 1;
            let line = raw.trim_end();
            let trimmed = line.trim_start();
            if trimmed.is_empty() {
                continue;
            }
            if trimmed.starts_with(COMMENT_CHAR) {
                if !is_separator(trimmed) {
                    pending_comments.push(line.to_string());
                }
                continue;
            }
            let keyword = trimmed.split_whitespace().next().unwrap_or("");
            if let Some(next) = Section::from_keyword(keyword) {
                pending_comments.clear();
                section = next;
                match section {
                    Section::Run => msr.run_blocks.push(parse_run_header(trimmed, line_no)?),
                    Section::Plot => msr.plots.push(line.to_string()),
                    _ => (),
                }
                continue;
            }

            if !pending_comments.is_empty() {
                if let Some(block_lines) = msr.verbatim_lines(section) {
                    block_lines.append(&mut pending_comments);
                }
                pending_comments.clear();
            }
            match section {
                Section::Preamble => (),
                Section::FitParameter => msr.parameters.push(parse_parameter(trimmed, line_no)?),
                Section::Theory => msr.theory.push(line.to_string()),
                Section::Functions => msr.functions.push(trimmed.to_string()),
                Section::Global => msr.global.push(line.to_string()),
                Section::Run => {
                    let block = msr
                        .run_blocks
                        .last_mut()
                        .ok_or(MsrFileError::OrphanRunLine(line_no))?;
                    parse_run_line(block, trimmed, line_no)?;
                }
                Section::Commands => msr.commands.push(line.to_string()),
                Section::Fourier => msr.fourier.push(line.to_string()),
                Section::Plot => msr.plots.push(line.to_string()),
                Section::Statistic => {
                    if trimmed.contains("NOT CONVERGE") {
                        converged = false;
                    }
                    for kind in [StatisticKind::ChiSquare, StatisticKind::MaxLikelihood] {
                        if let Some(min) = value_after(trimmed, &format!("{} =", kind.label())) {
                            stat_kind = Some((kind, min));
                        }
                    }
                    if let Some(ndf) = value_after(trimmed, "NDF =") {
                        stat_ndf = Some(ndf);
                    }
                }
            }
        }

        if let (Some((kind, min)), Some(ndf)) = (stat_kind, stat_ndf) {
            msr.statistic = Some(Statistic {
                kind,
                min,
                ndf,
                converged,
            });
        }

        for (idx, param) in msr.parameters.iter().enumerate() {
            if param.number != idx + 1 {
                return Err(MsrFileError::NonContiguousParameters {
                    found: param.number,
                    expected: idx + 1,
                });
            }
        }

        Ok(msr)
    }

    /// The block of `section` that keeps comment lines, if any
    fn verbatim_lines(&mut self, section: Section) -> Option<&mut Vec<String>> {
        match section {
            Section::Theory => Some(&mut self.theory),
            Section::Functions => Some(&mut self.functions),
            Section::Global => Some(&mut self.global),
            Section::Run => self.run_blocks.last_mut().map(|b| &mut b.other_lines),
            Section::Commands => Some(&mut self.commands),
            Section::Fourier => Some(&mut self.fourier),
            Section::Plot => Some(&mut self.plots),
            Section::Preamble | Section::FitParameter | Section::Statistic => None,
        }
    }

    /// Render the document as msr text, with comment lines placed according to `comments`
    pub fn to_msr_string(&self, comments: &SectionComments) -> Result<String, MsrFileError> {
        // Writing to a String is infallible
        let mut out = String::new();
        let _ = writeln!(out, "{}", self.title);
        let _ = writeln!(out, "{SEPARATOR}");
        let _ = writeln!(out, "FITPARAMETER");
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "#      No Name        Value     Step        Pos_Error  Boundaries"
        );
        for (idx, param) in self.parameters.iter().enumerate() {
            if let Some(comment) = comments.parameters.get(&(idx + 1)) {
                let _ = writeln!(out, "\n# {comment}");
            }
            let _ = writeln!(out, "{}", format_parameter(param));
        }

        write_block(&mut out, "THEORY", &self.theory);
        write_block(&mut out, "FUNCTIONS", &self.functions);
        write_block(&mut out, "GLOBAL", &self.global);

        for (idx, block) in self.run_blocks.iter().enumerate() {
            let _ = writeln!(out, "{SEPARATOR}");
            if let Some(comment) = comments.run_blocks.get(&(idx + 1)) {
                let _ = writeln!(out, "# {comment}");
            }
            write_run_block(&mut out, block);
        }

        write_block(&mut out, "COMMANDS", &self.commands);
        write_block(&mut out, "FOURIER", &self.fourier);
        if !self.plots.is_empty() {
            let _ = writeln!(out, "{SEPARATOR}");
            for line in self.plots.iter() {
                let _ = writeln!(out, "{line}");
            }
        }

        let now = OffsetDateTime::now_utc()
            .format(format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"))?;
        let _ = writeln!(out, "{SEPARATOR}");
        let _ = writeln!(out, "STATISTIC --- {now}");
        if let Some(stat) = &self.statistic {
            let label = stat.kind.label();
            let _ = writeln!(
                out,
                "  {label} = {}, NDF = {}, {label}/NDF = {}",
                stat.min,
                stat.ndf,
                stat.reduced()
            );
            if !stat.converged {
                let _ = writeln!(out, "{NOT_CONVERGED}");
            }
        }
        Ok(out)
    }
}

impl MsrDocument for MsrFile {
    fn read(path: &Path) -> Result<Self, MsrFileError> {
        if !path.exists() {
            return Err(MsrFileError::BadFilePath(path.to_path_buf()));
        }
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    fn write(&self, path: &Path, comments: &SectionComments) -> Result<(), MsrFileError> {
        let text = self.to_msr_string(comments)?;
        std::fs::write(path, text)?;
        Ok(())
    }

    fn title(&self) -> &str {
        &self.title
    }

    fn set_title(&mut self, title: &str) {
        self.title = title.to_string();
    }

    fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    fn parameters_mut(&mut self) -> &mut Vec<Parameter> {
        &mut self.parameters
    }

    fn run_blocks(&self) -> &[RunBlock] {
        &self.run_blocks
    }

    fn run_blocks_mut(&mut self) -> &mut Vec<RunBlock> {
        &mut self.run_blocks
    }

    fn theory(&self) -> &[String] {
        &self.theory
    }

    fn theory_mut(&mut self) -> &mut Vec<String> {
        &mut self.theory
    }

    fn functions(&self) -> &[String] {
        &self.functions
    }

    fn functions_mut(&mut self) -> &mut Vec<String> {
        &mut self.functions
    }

    fn commands(&self) -> &[String] {
        &self.commands
    }

    fn commands_mut(&mut self) -> &mut Vec<String> {
        &mut self.commands
    }

    fn fourier(&self) -> &[String] {
        &self.fourier
    }

    fn statistic(&self) -> Option<&Statistic> {
        self.statistic.as_ref()
    }

    fn set_statistic(&mut self, statistic: Option<Statistic>) {
        self.statistic = statistic;
    }
}

fn is_separator(line: &str) -> bool {
    line.chars().all(|c| c == COMMENT_CHAR)
}

/// Parse the number following `key` up to the next comma or whitespace
fn value_after<T: FromStr>(line: &str, key: &str) -> Option<T> {
    let loc = line.find(key)?;
    line[loc + key.len()..]
        .trim_start()
        .split(|c: char| c == ',' || c.is_whitespace())
        .next()?
        .parse()
        .ok()
}

fn parse_optional(token: Option<&str>) -> Result<Option<f64>, ()> {
    match token {
        None => Ok(None),
        Some(t) if t.eq_ignore_ascii_case(NONE) => Ok(None),
        Some(t) => t.parse().map(Some).map_err(|_| ()),
    }
}

fn parse_parameter(line: &str, line_no: usize) -> Result<Parameter, MsrFileError> {
    let bad = || MsrFileError::BadParameterLine {
        line_no,
        line: line.to_string(),
    };
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() < 4 {
        return Err(bad());
    }
    let number: usize = tokens[0].parse().map_err(|_| bad())?;
    let value: f64 = tokens[2].parse().map_err(|_| bad())?;
    let step: f64 = tokens[3].parse().map_err(|_| bad())?;
    let mut param = Parameter::new(number, tokens[1], value, step);
    param.pos_error = parse_optional(tokens.get(4).copied()).map_err(|_| bad())?;
    param.lower_bound = parse_optional(tokens.get(5).copied()).map_err(|_| bad())?;
    param.upper_bound = parse_optional(tokens.get(6).copied()).map_err(|_| bad())?;
    Ok(param)
}

fn parse_run_header(line: &str, line_no: usize) -> Result<RunBlock, MsrFileError> {
    // RUN <name> <beamline institute format ...>
    let rest = line["RUN".len()..].trim_start();
    let name = rest
        .split_whitespace()
        .next()
        .ok_or_else(|| MsrFileError::BadRunLine {
            line_no,
            line: line.to_string(),
        })?;
    let mut block = RunBlock::new(name);
    block.header_tail = rest[name.len()..].trim().to_string();
    Ok(block)
}

fn parse_run_line(block: &mut RunBlock, line: &str, line_no: usize) -> Result<(), MsrFileError> {
    let bad = || MsrFileError::BadRunLine {
        line_no,
        line: line.to_string(),
    };
    let mut tokens = line.split_whitespace();
    let keyword = tokens.next().unwrap_or("");

    if keyword == "map" {
        block.map = tokens
            .map(|t| t.parse::<usize>().map(MapSlot::new))
            .collect::<Result<Vec<MapSlot>, _>>()
            .map_err(|_| bad())?;
        return Ok(());
    }

    if let Ok(role) = Role::from_str(keyword) {
        let value = tokens.next().ok_or_else(bad)?;
        let reference = match value.strip_prefix(FUNCTION_PREFIX) {
            Some(n) => RoleRef::Function(n.parse().map_err(|_| bad())?),
            None => RoleRef::Param(value.parse().map_err(|_| bad())?),
        };
        if reference != RoleRef::Param(0) {
            block.set_role(role, reference);
        }
        return Ok(());
    }

    block.other_lines.push(line.to_string());
    Ok(())
}

fn format_optional(value: Option<f64>) -> String {
    match value {
        Some(v) => v.to_string(),
        None => NONE.to_string(),
    }
}

fn format_parameter(param: &Parameter) -> String {
    let mut line = format!(
        "{:>9} {:<11} {:<9} {:<11} {:<11}",
        param.number,
        param.name,
        param.value,
        param.step,
        format_optional(param.pos_error)
    );
    if param.has_boundaries() {
        let _ = write!(
            line,
            " {:<7} {:<7}",
            format_optional(param.lower_bound),
            format_optional(param.upper_bound)
        );
    }
    line.trim_end().to_string()
}

fn write_block(out: &mut String, header: &str, lines: &[String]) {
    if lines.is_empty() {
        return;
    }
    let _ = writeln!(out, "{SEPARATOR}");
    let _ = writeln!(out, "{header}");
    for line in lines {
        let _ = writeln!(out, "{line}");
    }
}

fn write_run_block(out: &mut String, block: &RunBlock) {
    if block.header_tail.is_empty() {
        let _ = writeln!(out, "RUN {}", block.run_name);
    } else {
        let _ = writeln!(out, "RUN {} {}", block.run_name, block.header_tail);
    }
    for role in Role::ALL {
        if let Some(entry) = block.role(role) {
            let value = match entry.reference {
                RoleRef::Param(n) => n.to_string(),
                RoleRef::Function(n) => format!("{FUNCTION_PREFIX}{n}"),
            };
            let _ = writeln!(out, "{:<16}{}", role.keyword(), value);
        }
    }
    if !block.map.is_empty() {
        let mut map_line = String::from("map         ");
        for slot in block.map.iter() {
            let _ = write!(map_line, "{:>5}", slot.target);
        }
        let _ = writeln!(out, "{map_line}");
    }
    for line in block.other_lines.iter() {
        let _ = writeln!(out, "{line}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
LSCO x=0.02, T=5K
###############################################################
FITPARAMETER
#      No Name        Value     Step        Pos_Error  Boundaries
        1 alpha       1.02      0.003       none
        2 asym0100    0.21      -0.004      0.0041     0       0.3
        3 phase       12.5      0.8         none
        4 rate0100    0.35      0.02        none       none    5
###############################################################
THEORY
asymmetry 2
simplExpo 4         (rate)
TFieldCos 3 fun1    (phase frequency)
###############################################################
FUNCTIONS
fun1 = gamma_mu * par3
###############################################################
RUN data/deltat_tdc_gps_0100 PIM3 PSI ROOT-NPP   (name beamline institute data-file-format)
fittype         2         (asymmetry fit)
alpha           1
map             0    0    0
forward         1
backward        2
fit             0.00    8.00
packing         50
###############################################################
COMMANDS
MINIMIZE
HESSE
SAVE
###############################################################
PLOT 2   (asymmetry plot)
runs     1
range    0   8
###############################################################
STATISTIC --- 2026-01-12 10:31:05
  chisq = 1048.7, NDF = 980, chisq/NDF = 1.070102
";

    #[test]
    fn test_parse_sample() {
        let msr = MsrFile::parse(SAMPLE).unwrap();
        assert_eq!(msr.title, "LSCO x=0.02, T=5K");
        assert_eq!(msr.parameters.len(), 4);
        let asym = &msr.parameters[1];
        assert_eq!(asym.name, "asym0100");
        assert_eq!(asym.step, -0.004);
        assert_eq!(asym.pos_error, Some(0.0041));
        assert_eq!(asym.lower_bound, Some(0.0));
        assert_eq!(asym.upper_bound, Some(0.3));
        assert_eq!(msr.parameters[3].lower_bound, None);
        assert_eq!(msr.parameters[3].upper_bound, Some(5.0));
        assert_eq!(msr.theory.len(), 3);
        assert_eq!(msr.functions, vec!["fun1 = gamma_mu * par3".to_string()]);

        assert_eq!(msr.run_blocks.len(), 1);
        let block = &msr.run_blocks[0];
        assert_eq!(block.run_name, "data/deltat_tdc_gps_0100");
        assert!(block.header_tail.starts_with("PIM3 PSI ROOT-NPP"));
        assert_eq!(block.role(Role::Alpha).unwrap().reference, RoleRef::Param(1));
        assert_eq!(block.role(Role::Norm), None);
        assert_eq!(block.map.len(), 3);
        assert_eq!(block.other_lines.len(), 5);

        assert_eq!(msr.commands.len(), 3);
        assert_eq!(msr.plots.len(), 3);
        assert!(msr.fourier().is_empty());
        let stat = msr.statistic.unwrap();
        assert_eq!(stat.kind, StatisticKind::ChiSquare);
        assert_eq!(stat.min, 1048.7);
        assert_eq!(stat.ndf, 980);
        assert!(stat.converged);
        assert!(msr.is_fit_valid());
    }

    #[test]
    fn test_written_file_reads_back_identically() {
        let msr = MsrFile::parse(SAMPLE).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("0100_tf.msr");
        let mut comments = SectionComments::default();
        comments.parameters.insert(1, "Global parameters for all runs".into());
        comments.run_blocks.insert(1, "RUN blocks for run 100".into());
        msr.write(&path, &comments).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("# Global parameters for all runs"));
        assert!(text.contains("# RUN blocks for run 100"));
        let reread = MsrFile::read(&path).unwrap();
        assert_eq!(reread, msr);
    }

    #[test]
    fn test_block_comments_survive() {
        let text = "\
title
###############################################################
FITPARAMETER
# kept out, the writer adds its own
        1 rate        0.3       0.01        none
###############################################################
THEORY
# slow relaxation
simplExpo 1
###############################################################
RUN run0100 PIM3 PSI ROOT-NPP
# detector pair A
forward         1
# dropped, it precedes a block header
###############################################################
COMMANDS
MINIMIZE
";
        let msr = MsrFile::parse(text).unwrap();
        assert_eq!(msr.theory, vec!["# slow relaxation", "simplExpo 1"]);
        assert_eq!(msr.run_blocks[0].other_lines, vec!["# detector pair A", "forward         1"]);
        assert_eq!(msr.commands, vec!["MINIMIZE"]);
        assert_eq!(msr.parameters.len(), 1);

        let written = msr.to_msr_string(&SectionComments::default()).unwrap();
        assert!(written.contains("RUN run0100 PIM3 PSI ROOT-NPP\n"));
        assert_eq!(MsrFile::parse(&written).unwrap().theory, msr.theory);

        let mut bare = msr.clone();
        bare.run_blocks[0].header_tail.clear();
        let written = bare.to_msr_string(&SectionComments::default()).unwrap();
        assert!(written.contains("RUN run0100\n"));
    }

    #[test]
    fn test_unconverged_and_maxlh_statistic() {
        let text = "title\nFITPARAMETER\n 1 a 1 0.1 none\nSTATISTIC --- 2026-01-01 00:00:00\n  maxLH = 512.5, NDF = 400, maxLH/NDF = 1.28\n*** FIT DID NOT CONVERGE ***\n";
        let msr = MsrFile::parse(text).unwrap();
        let stat = msr.statistic.unwrap();
        assert_eq!(stat.kind, StatisticKind::MaxLikelihood);
        assert!(!stat.converged);
        assert!(!msr.is_fit_valid());
    }

    #[test]
    fn test_malformed_input() {
        assert!(matches!(
            MsrFile::parse("t\nFITPARAMETER\n 1 a one 0.1\n"),
            Err(MsrFileError::BadParameterLine { line_no: 3, .. })
        ));
        assert!(matches!(
            MsrFile::parse("t\nFITPARAMETER\n 2 a 1 0.1\n"),
            Err(MsrFileError::NonContiguousParameters {
                found: 2,
                expected: 1
            })
        ));
        assert!(matches!(
            MsrFile::parse("t\nRUN\n"),
            Err(MsrFileError::BadRunLine { line_no: 2, .. })
        ));
        assert!(matches!(
            MsrFile::read(Path::new("/nonexistent/0001.msr")),
            Err(MsrFileError::BadFilePath(_))
        ));
    }

    #[test]
    fn test_function_role_reference() {
        let text = "t\nRUN run0100 PIM3 PSI ROOT-NPP\nnorm fun2\nlifetime 0\n";
        let msr = MsrFile::parse(text).unwrap();
        let block = &msr.run_blocks[0];
        assert_eq!(block.role(Role::Norm).unwrap().reference, RoleRef::Function(2));
        assert_eq!(block.role(Role::Lifetime), None);
    }
}
