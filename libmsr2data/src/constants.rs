// File naming
pub const MSR_SUFFIX: &str = ".msr";
pub const ONE_RUN_FIT_TAG: &str = "-OneRunFit";
pub const GLOBAL_TAG: &str = "+global";

// Run-list files
pub const RUN_LIST_HEADER: &str = "RUN";
pub const COMMENT_CHAR: char = '#';

// Fit engine
pub const FIT_ENGINE_NAME: &str = "musrfit";
pub const FIT_ENGINE_PATH_VAR: &str = "MUSRFITPATH";
pub const KEEP_MINUIT_OUTPUT_FLAG: &str = "-k";
pub const TITLE_FROM_DATA_FLAG: &str = "-t";

// Token syntax shared by THEORY and FUNCTIONS
pub const MAP_PREFIX: &str = "map";
pub const PARAM_PREFIX: &str = "par";
pub const FUNCTION_PREFIX: &str = "fun";
/// Delimiters separating tokens inside a FUNCTIONS line
pub const FUNCTION_DELIMITERS: &[char] = &['(', ')', '+', '-', '*', '/', '^', ',', '='];

// Summary output
pub const MIN_COLUMN_WIDTH: usize = 13;
pub const DEFAULT_DB_OUTPUT: &str = "out.db";
pub const DEFAULT_COLUMN_OUTPUT: &str = "out.dat";
pub const NO_OUTPUT: &str = "none";

// Section comments of a synthesized global file
pub const GLOBAL_PARAMS_COMMENT: &str = "Global parameters for all runs";
