fn main() {
    let args = match libelf2dll::Args::from_env() {
        Ok(args) => args,
        Err(error) => {
            // clap routes --help and --version to stdout, usage errors to
            // stderr; the exit status follows the same split.
            let _ = error.print();
            std::process::exit(i32::from(error.use_stderr()));
        }
    };

    if let Err(error) = libelf2dll::run(&args) {
        libelf2dll::error::report_error_and_exit(&error);
    }
}
