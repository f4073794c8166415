fn main() {
    #[cfg(feature = "cli")]
    wrapfile::cli::run();

    #[cfg(not(feature = "cli"))]
    {
        eprintln!("wrapfile: CLI not enabled. Rebuild with `--features cli`.");
        std::process::exit(1);
    }
}
