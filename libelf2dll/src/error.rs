pub use anyhow::Error;

pub type Result<T = (), E = Error> = core::result::Result<T, E>;

/// Prints the error chain to stderr and exits with a failing status. Kept
/// here rather than in the binary so that the exit path for build failures
/// and I/O failures is identical.
pub fn report_error_and_exit(error: &Error) -> ! {
    eprintln!("elf2dll: error: {error:#}");
    std::process::exit(1);
}
