//! Constants used throughout tinplate

/// Opening marker delimiter
pub const OPEN_DELIMITER: &str = "[[";

/// Closing marker delimiter
pub const CLOSE_DELIMITER: &str = "]]";

/// First marker character selecting escaped output
pub const ESCAPED_SIGIL: char = '=';

/// First marker character selecting raw output
pub const RAW_SIGIL: char = '-';

/// Default number of compiled routines kept in the cache
pub const DEFAULT_MAX_CACHE: usize = 100;

/// Maximum nesting of fragment inclusion and layout inheritance
pub const MAX_INCLUDE_DEPTH: usize = 10;

/// Longest string a routine may build with `repeat` or padding
pub const MAX_STRING_LENGTH: usize = 1 << 27;

/// Highest length an array may reach through index assignment
pub const MAX_ARRAY_LENGTH: usize = 1 << 22;

/// Accumulator variable used by generated routines
pub const OUTPUT_VAR: &str = "__out";

/// Fixed routine parameters, always in this order before any plugin parameters
pub mod params {
    pub const DATA: &str = "data";
    pub const ESCAPE: &str = "escapeHTML";
}

/// Configuration file names in order of preference
pub const CONFIG_FILENAMES: &[&str] = &["tinplate.json", "tinplate.yaml", "tinplate.yml"];

/// STDIN indicator for CLI arguments
pub const STDIN_INDICATOR: &str = "-";

/// Exit codes
pub mod exit_codes {
    pub const FAILURE: i32 = 1;
}

/// Verbosity levels
pub mod verbosity {
    pub const OFF: u8 = 0;
    pub const INFO: u8 = 1;
    pub const DEBUG: u8 = 2;
    pub const TRACE: u8 = 3;
}
