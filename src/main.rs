fn main() {
    use clap::Parser;
    use std::error::Error;
    let args = liferake::cli::Args::parse();
    liferake::cli::setup_logging(args.verbose, args.quiet);
    if let Err(e) = liferake::cli::run(&args) {
        eprintln!("{}", e);
        if args.verbose {
            let mut source = e.source();
            while let Some(s) = source {
                eprintln!("  cause: {}", s);
                source = s.source();
            }
        }
        std::process::exit(e.exit_code());
    }
}
