//! Conflate - line-preserving key-value configuration manager
//!
//! Binary entry point. A declined file creation or any other failure exits
//! with status 1.

fn main() -> conflate::Result<()> {
    conflate::cli::run_cli()
}
