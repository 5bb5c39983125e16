/// Engine limits and diagnostics policy. The engine reads no files; a host
/// fills this in however it likes and hands it to [`Runtime::with_config`].
///
/// [`Runtime::with_config`]: super::Runtime::with_config
#[derive(Debug, Clone)]
pub struct Config {
    /// Instructions one resumption may execute. Zero disables the check.
    pub check_cmdcount: u32,
    /// Jumps one resumption may take. Zero disables the check.
    pub check_gotocount: u32,
    /// Too few arguments to a command fails the compile.
    pub warn_func_mismatch_paramnum: bool,
    pub warn_func_mismatch_argtypes: bool,
    /// An argument type mismatch ends the script instead of warning.
    pub argtype_mismatch_fatal: bool,
    pub input_min_value: i32,
    pub input_max_value: i32,
    pub max_stack: usize,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            check_cmdcount: 65535,
            check_gotocount: 2048,
            warn_func_mismatch_paramnum: true,
            warn_func_mismatch_argtypes: true,
            argtype_mismatch_fatal: false,
            input_min_value: 0,
            input_max_value: i32::MAX,
            max_stack: 65535,
        }
    }
}
