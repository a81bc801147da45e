use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::constants::{COMMENT_CHAR, RUN_LIST_HEADER};
use super::error::RunSetError;

/// How the runs to process are specified in a Config
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RunSpec {
    Single(u32),
    Range { first: u32, last: u32 },
    List(Vec<u32>),
    File(PathBuf),
}

impl Default for RunSpec {
    fn default() -> Self {
        Self::Single(1)
    }
}

/// Ordered collection of run numbers, optionally with the independent variables of a run list file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSet {
    runs: Vec<u32>,
    variable_names: Vec<String>,
    variable_values: Vec<Vec<f64>>,
}

impl RunSet {
    pub fn single(run: u32) -> Result<Self, RunSetError> {
        Self::list(vec![run])
    }

    /// Inclusive range; descending if first > last
    pub fn range(first: u32, last: u32) -> Result<Self, RunSetError> {
        let runs: Vec<u32> = if first <= last {
            (first..=last).collect()
        } else {
            (last..=first).rev().collect()
        };
        Self::list(runs)
    }

    pub fn list(runs: Vec<u32>) -> Result<Self, RunSetError> {
        if runs.is_empty() {
            return Err(RunSetError::EmptyRunList);
        }
        if let Some(bad) = runs.iter().find(|r| **r < 1) {
            return Err(RunSetError::RunOutOfRange(*bad));
        }
        Ok(Self {
            runs,
            variable_names: vec![],
            variable_values: vec![],
        })
    }

    /// Read a run list file.
    ///
    /// The first non-comment line is a header `RUN var1 var2 ...`. Every following line holds a
    /// run number and one value per variable. Anything after a `#` is a comment.
    pub fn from_run_list_file(path: &Path) -> Result<Self, RunSetError> {
        if !path.exists() {
            return Err(RunSetError::BadFilePath(path.to_path_buf()));
        }
        let contents = std::fs::read_to_string(path)?;

        let mut lines = contents
            .lines()
            .map(|line| match line.find(COMMENT_CHAR) {
                Some(loc) => line[..loc].trim(),
                None => line.trim(),
            })
            .filter(|line| !line.is_empty());

        let header = lines
            .next()
            .ok_or_else(|| RunSetError::MissingHeader(path.to_path_buf()))?;
        let mut header_tokens = header.split_whitespace();
        if header_tokens.next() != Some(RUN_LIST_HEADER) {
            return Err(RunSetError::MissingHeader(path.to_path_buf()));
        }
        let variable_names: Vec<String> = header_tokens.map(String::from).collect();

        let mut runs = Vec::new();
        let mut variable_values = Vec::new();
        for line in lines {
            let mut tokens = line.split_whitespace();
            let run: u32 = match tokens.next() {
                Some(t) => t.parse()?,
                None => continue,
            };
            let values = tokens
                .map(|t| t.parse::<f64>())
                .collect::<Result<Vec<f64>, _>>()?;
            if values.len() != variable_names.len() {
                return Err(RunSetError::VariableCountMismatch {
                    run,
                    found: values.len(),
                    expected: variable_names.len(),
                });
            }
            runs.push(run);
            variable_values.push(values);
        }

        let mut set = Self::list(runs)?;
        set.variable_names = variable_names;
        set.variable_values = variable_values;
        Ok(set)
    }

    pub fn from_spec(spec: &RunSpec) -> Result<Self, RunSetError> {
        match spec {
            RunSpec::Single(run) => Self::single(*run),
            RunSpec::Range { first, last } => Self::range(*first, *last),
            RunSpec::List(runs) => Self::list(runs.clone()),
            RunSpec::File(path) => Self::from_run_list_file(path),
        }
    }

    pub fn runs(&self) -> &[u32] {
        &self.runs
    }

    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    pub fn first(&self) -> Option<u32> {
        self.runs.first().copied()
    }

    pub fn variable_names(&self) -> &[String] {
        &self.variable_names
    }

    /// Independent variable values of the run at index, empty if no run list file was used
    pub fn variable_values(&self, index: usize) -> &[f64] {
        self.variable_values
            .get(index)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn cursor(&self) -> RunCursor<'_> {
        RunCursor {
            runs: &self.runs,
            index: 0,
        }
    }
}

/// Explicit position within a RunSet.
///
/// Marks the run currently being processed; callers pass it around instead of sharing an iterator.
#[derive(Debug, Clone)]
pub struct RunCursor<'a> {
    runs: &'a [u32],
    index: usize,
}

impl RunCursor<'_> {
    pub fn current(&self) -> Option<u32> {
        self.runs.get(self.index).copied()
    }

    pub fn previous(&self) -> Option<u32> {
        if self.index == 0 {
            None
        } else {
            self.runs.get(self.index - 1).copied()
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn is_first(&self) -> bool {
        self.index == 0
    }

    pub fn is_exhausted(&self) -> bool {
        self.index >= self.runs.len()
    }

    pub fn advance(&mut self) {
        if !self.is_exhausted() {
            self.index += 1;
        }
    }

    /// Fraction of the set already passed, for progress reporting
    pub fn progress(&self) -> f32 {
        if self.runs.is_empty() {
            1.0
        } else {
            self.index as f32 / self.runs.len() as f32
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_range_ascending_and_descending() {
        assert_eq!(RunSet::range(3, 5).unwrap().runs(), &[3, 4, 5]);
        assert_eq!(RunSet::range(5, 3).unwrap().runs(), &[5, 4, 3]);
    }

    #[test]
    fn test_invalid_lists() {
        assert!(matches!(RunSet::list(vec![]), Err(RunSetError::EmptyRunList)));
        assert!(matches!(
            RunSet::list(vec![4, 0]),
            Err(RunSetError::RunOutOfRange(0))
        ));
    }

    #[test]
    fn test_cursor_walks_in_order() {
        let set = RunSet::list(vec![10, 11, 12]).unwrap();
        let mut cursor = set.cursor();
        assert!(cursor.is_first());
        assert_eq!(cursor.current(), Some(10));
        assert_eq!(cursor.previous(), None);
        cursor.advance();
        assert_eq!(cursor.current(), Some(11));
        assert_eq!(cursor.previous(), Some(10));
        cursor.advance();
        cursor.advance();
        assert!(cursor.is_exhausted());
        assert_eq!(cursor.current(), None);
        cursor.advance();
        assert_eq!(cursor.index(), 3);
    }

    #[test]
    fn test_run_list_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# temperature scan").unwrap();
        writeln!(file, "RUN T B   # header").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "2010 5.0 100.0").unwrap();
        writeln!(file, "2011 10.0 100.0 # warmer").unwrap();
        let set = RunSet::from_run_list_file(file.path()).unwrap();
        assert_eq!(set.runs(), &[2010, 2011]);
        assert_eq!(set.variable_names(), &["T".to_string(), "B".to_string()]);
        assert_eq!(set.variable_values(1), &[10.0, 100.0]);
        assert!(set.variable_values(5).is_empty());
    }

    #[test]
    fn test_run_list_file_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "TEMP T").unwrap();
        writeln!(file, "2010 5.0").unwrap();
        assert!(matches!(
            RunSet::from_run_list_file(file.path()),
            Err(RunSetError::MissingHeader(_))
        ));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "RUN T B").unwrap();
        writeln!(file, "2010 5.0").unwrap();
        assert!(matches!(
            RunSet::from_run_list_file(file.path()),
            Err(RunSetError::VariableCountMismatch {
                run: 2010,
                found: 1,
                expected: 2
            })
        ));
    }
}
