//! Verbose diagnostics, switched on with `--verbose`.
//!
//! Each line is tagged with the emitting module so interleaved capture,
//! session, and dispatch output can be told apart.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

static VERBOSE: AtomicBool = AtomicBool::new(false);

/// Enable or disable verbose output for the whole process.
pub fn set_verbose(enabled: bool) {
    VERBOSE.store(enabled, Ordering::SeqCst);
}

pub fn is_verbose() -> bool {
    VERBOSE.load(Ordering::SeqCst)
}

/// Print one tagged diagnostic line. Use [`verbose!`] instead of calling
/// this directly.
pub fn emit(module: &str, args: fmt::Arguments<'_>) {
    eprintln!("[memovox:{}] {args}", tag_of(module));
}

fn tag_of(module: &str) -> &str {
    module.rsplit("::").next().unwrap_or(module)
}

/// Log a formatted message when verbose mode is on, tagged with the
/// calling module.
#[macro_export]
macro_rules! verbose {
    ($($arg:tt)*) => {
        if $crate::verbose::is_verbose() {
            $crate::verbose::emit(module_path!(), format_args!($($arg)*));
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_is_the_last_module_path_segment() {
        assert_eq!(
            tag_of("memovox_core::capture::cpal_backend"),
            "cpal_backend"
        );
        assert_eq!(tag_of("memovox_cli"), "memovox_cli");
    }
}
