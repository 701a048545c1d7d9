// These Clippy lints are disabled because this is a CLI binary, not a library:
// - print_stderr: CLI tools are expected to print to stderr for user output.
// - exit: Calling `std::process::exit()` is standard for CLI apps to signal failure to the shell.
#![allow(clippy::print_stderr, clippy::exit)]

use clap::Parser;
use sand_cli::inject::{self, HeaderArgs};
use sand_cli::logging;

#[tokio::main]
async fn main() {
    let args = HeaderArgs::parse();
    logging::init(args.verbose, false);

    let mut out = std::io::stdout();
    if let Err(e) = inject::run(&args, &mut out).await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
