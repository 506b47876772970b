/// rustbox-cg: cgroup v2 lifecycle management for rustbox sandboxes
///
/// Creates a dedicated cgroup for a numbered box, applies cpuset and memory
/// limits, moves the sandboxed process into it, reports CPU time and removes it.
///
/// # Usage
/// ```bash
/// rustbox-cg init --box-id 0 --cpus 0-1
/// rustbox-cg run --box-id 0 --mem 262144 -- /usr/bin/python3 solution.py
/// rustbox-cg cleanup --box-id 0
/// ```
use clap::Parser;
use rustbox_cgroup::cli::{self, Cli};

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if !cli.no_cgroup && unsafe { libc::getuid() } != 0 {
        log::warn!("rustbox-cg usually needs root privileges to manage cgroups");
    }

    // Any failure here means the cgroup environment is unusable; report and bail
    // out without attempting to undo completed steps.
    if let Err(e) = cli::execute(cli) {
        eprintln!("{:#}", e);
        std::process::exit(2);
    }
}
