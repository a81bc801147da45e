use super::error::RunNumberError;

/// Zero-padded decimal formatting of run numbers.
///
/// The width is fixed once per session (usually detected from the first template file) and
/// every substring match against parameter and run names uses it afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunNumberFormat {
    width: usize,
}

impl RunNumberFormat {
    pub fn new(width: usize) -> Result<Self, RunNumberError> {
        if width == 0 {
            return Err(RunNumberError::ZeroWidth);
        }
        Ok(Self { width })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Format a run number as a zero-padded string of the configured width
    pub fn format(&self, run: u32) -> Result<String, RunNumberError> {
        let run_str = format!("{run:0>width$}", width = self.width);
        if run_str.len() > self.width {
            return Err(RunNumberError::TooWide {
                run,
                width: self.width,
            });
        }
        Ok(run_str)
    }

    /// Detect the width from the text of an msr file.
    ///
    /// Looks for the first line starting with the keyword `run` (any case) and takes the
    /// length of the last digit group of the run name whose value is the run number.
    pub fn detect(msr_text: &str, run: u32) -> Result<Self, RunNumberError> {
        for line in msr_text.lines() {
            let mut tokens = line.split_whitespace();
            match tokens.next() {
                Some(keyword) if keyword.eq_ignore_ascii_case("run") => (),
                _ => continue,
            }
            let token = match tokens.next() {
                Some(t) => t,
                None => continue,
            };
            return match last_matching_digit_group(token, run) {
                Some(width) => Self::new(width),
                None => Err(RunNumberError::RunNotInRunLine {
                    run,
                    token: token.to_string(),
                }),
            };
        }
        Err(RunNumberError::RunLineNotFound(run))
    }
}

/// Length of the right-most group of digits in token which parses to run
fn last_matching_digit_group(token: &str, run: u32) -> Option<usize> {
    token
        .split(|c: char| !c.is_ascii_digit())
        .filter(|group| !group.is_empty())
        .rev()
        .find(|group| group.parse::<u32>().map(|v| v == run).unwrap_or(false))
        .map(|group| group.len())
}

/// Replace the last occurrence of `old` in `name` by `new`.
///
/// Returns None if `old` does not occur at all.
pub fn replace_last(name: &str, old: &str, new: &str) -> Option<String> {
    let loc = name.rfind(old)?;
    let mut replaced = String::with_capacity(name.len() - old.len() + new.len());
    replaced.push_str(&name[..loc]);
    replaced.push_str(new);
    replaced.push_str(&name[loc + old.len()..]);
    Some(replaced)
}

/// Strip the run number string from the end of a parameter name.
///
/// The name must be strictly longer than the run string, mirroring the classification rule.
pub fn strip_run_suffix<'a>(name: &'a str, run_str: &str) -> Option<&'a str> {
    if name.len() > run_str.len() {
        name.strip_suffix(run_str)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_pads_with_zeros() {
        let format = RunNumberFormat::new(4).unwrap();
        assert_eq!(format.format(7).unwrap(), "0007");
        assert_eq!(format.format(1234).unwrap(), "1234");
        assert!(matches!(
            format.format(12345),
            Err(RunNumberError::TooWide { run: 12345, width: 4 })
        ));
    }

    #[test]
    fn test_zero_width_is_rejected() {
        assert!(matches!(
            RunNumberFormat::new(0),
            Err(RunNumberError::ZeroWidth)
        ));
    }

    #[test]
    fn test_detect_width_from_run_line() {
        let text = "some title\n\
                    FITPARAMETER\n  1 alpha 1.0 0.01 none\n\
                    RUN data/deltat_tdc_gps_2010_00842 PIM3 PSI ROOT-NPP\n";
        let format = RunNumberFormat::detect(text, 842).unwrap();
        assert_eq!(format.width(), 5);
    }

    #[test]
    fn test_detect_is_case_insensitive_and_uses_last_group() {
        let text = "run lem10_his_0100 MUE4 PSI ROOT-NPP";
        assert_eq!(RunNumberFormat::detect(text, 100).unwrap().width(), 4);
        let text = "Run d2010/tdc/run0100_0100";
        assert_eq!(RunNumberFormat::detect(text, 100).unwrap().width(), 4);
    }

    #[test]
    fn test_detect_failures() {
        assert!(matches!(
            RunNumberFormat::detect("title\nTHEORY\nasymmetry 1\n", 3),
            Err(RunNumberError::RunLineNotFound(3))
        ));
        assert!(matches!(
            RunNumberFormat::detect("RUN data/run0200 PIM3 PSI ROOT-NPP", 100),
            Err(RunNumberError::RunNotInRunLine { run: 100, .. })
        ));
    }

    #[test]
    fn test_replace_last_and_strip() {
        assert_eq!(
            replace_last("data/run0100_0100", "0100", "0101").as_deref(),
            Some("data/run0100_0101")
        );
        assert_eq!(replace_last("asym", "0100", "0101"), None);
        assert_eq!(strip_run_suffix("asym0100", "0100"), Some("asym"));
        assert_eq!(strip_run_suffix("0100", "0100"), None);
        assert_eq!(strip_run_suffix("asym0101", "0100"), None);
    }
}
