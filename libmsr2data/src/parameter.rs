use super::error::RunNumberError;
use super::run_number::strip_run_suffix;

/// A single entry of the FITPARAMETER block
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub number: usize,
    pub name: String,
    pub value: f64,
    /// Step before a fit, (negative) error afterwards
    pub step: f64,
    pub pos_error: Option<f64>,
    pub lower_bound: Option<f64>,
    pub upper_bound: Option<f64>,
    /// Derived by classification, never written to file
    pub is_global: bool,
}

impl Parameter {
    pub fn new(number: usize, name: &str, value: f64, step: f64) -> Self {
        Self {
            number,
            name: name.to_string(),
            value,
            step,
            pos_error: None,
            lower_bound: None,
            upper_bound: None,
            is_global: true,
        }
    }

    pub fn has_boundaries(&self) -> bool {
        self.lower_bound.is_some() || self.upper_bound.is_some()
    }

    /// Positive error if a fit produced one, |step| otherwise
    pub fn positive_error(&self) -> f64 {
        self.pos_error.unwrap_or(self.step.abs())
    }

    /// Negative error (the step after a fit)
    pub fn negative_error(&self) -> f64 {
        self.step.abs()
    }
}

/// Numbers of global (G) and run specific (S) parameters of a template
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Classification {
    pub n_global: usize,
    pub n_specific: usize,
}

/// A parameter is run specific if its name carries the template run number as a proper suffix
pub fn is_run_specific(name: &str, template_run_str: &str) -> bool {
    strip_run_suffix(name, template_run_str).is_some()
}

/// Partition the parameters into global and run specific ones by their names.
///
/// Sets `is_global` on every parameter. A template without any suffixed parameter is simply
/// all-global. An empty run string means no width was established, which is an error.
pub fn classify_parameters(
    params: &mut [Parameter],
    template_run_str: &str,
) -> Result<Classification, RunNumberError> {
    if template_run_str.is_empty() {
        return Err(RunNumberError::ZeroWidth);
    }
    let mut classification = Classification::default();
    for param in params.iter_mut() {
        if is_run_specific(&param.name, template_run_str) {
            param.is_global = false;
            classification.n_specific += 1;
        } else {
            param.is_global = true;
            classification.n_global += 1;
        }
    }
    log::info!(
        "Found {} global and {} run specific parameters for run {}",
        classification.n_global,
        classification.n_specific,
        template_run_str
    );
    Ok(classification)
}
