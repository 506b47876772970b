/// Command line interface for managing box cgroups
use crate::cgroup::Cgroup;
use crate::config::CgroupConfig;
use crate::fs::CgroupFs;
use crate::launch::HeldChild;
use crate::types::RunReport;
use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "rustbox-cg")]
#[command(author, version, about = "Cgroup v2 lifecycle for rustbox sandboxes", long_about = None)]
pub struct Cli {
    /// JSON configuration file; command-line flags take precedence
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Mount point of the cgroup v2 filesystem
    #[arg(long, global = true)]
    pub cg_root: Option<PathBuf>,

    /// Parent cgroup to create boxes under, relative to the root
    #[arg(long, global = true)]
    pub cg_parent: Option<String>,

    /// Disable cgroup support; every command becomes a no-op
    #[arg(long, global = true)]
    pub no_cgroup: bool,

    /// Increase verbosity (repeat for attribute tracing)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the box cgroup, removing any stale one
    Init {
        /// Box ID for the sandbox
        #[arg(long)]
        box_id: u32,
        /// Allowed CPUs (cpuset list, e.g. 0-3)
        #[arg(long)]
        cpus: Option<String>,
        /// Allowed memory nodes (cpuset list)
        #[arg(long)]
        mems: Option<String>,
    },
    /// Run a command inside a fresh box cgroup and report its CPU time
    Run {
        /// Box ID for the sandbox
        #[arg(long)]
        box_id: u32,
        /// Memory limit in KiB
        #[arg(long)]
        mem: Option<u64>,
        /// Allowed CPUs (cpuset list, e.g. 0-3)
        #[arg(long)]
        cpus: Option<String>,
        /// Allowed memory nodes (cpuset list)
        #[arg(long)]
        mems: Option<String>,
        /// Command and arguments to execute
        #[arg(last = true, required = true)]
        command: Vec<String>,
    },
    /// Print the CPU time accumulated by a box, in milliseconds
    Usage {
        /// Box ID for the sandbox
        #[arg(long)]
        box_id: u32,
    },
    /// Remove a box cgroup
    Cleanup {
        /// Box ID for the sandbox
        #[arg(long)]
        box_id: u32,
    },
}

impl Cli {
    /// Defaults, then the config file, then flags
    pub fn build_config(&self, box_id: u32) -> Result<CgroupConfig> {
        let mut config = match &self.config {
            Some(path) => CgroupConfig::from_json_file(path)?,
            None => CgroupConfig::default(),
        };

        config.box_id = box_id;
        if let Some(root) = &self.cg_root {
            config.root = root.clone();
        }
        if let Some(parent) = &self.cg_parent {
            config.parent = Some(parent.clone());
        }
        if self.no_cgroup {
            config.enabled = false;
        }
        config.verbose = config.verbose.max(self.verbose);

        if let Commands::Init { cpus, mems, .. } | Commands::Run { cpus, mems, .. } =
            &self.command
        {
            if cpus.is_some() {
                config.cpus = cpus.clone();
            }
            if mems.is_some() {
                config.mems = mems.clone();
            }
        }
        if let Commands::Run { mem: Some(mem), .. } = &self.command {
            config.memory_limit_kb = Some(*mem);
        }

        config.validate()?;
        Ok(config)
    }

    fn box_id(&self) -> u32 {
        match &self.command {
            Commands::Init { box_id, .. }
            | Commands::Run { box_id, .. }
            | Commands::Usage { box_id }
            | Commands::Cleanup { box_id } => *box_id,
        }
    }
}

/// Execute the parsed command
pub fn execute(cli: Cli) -> Result<()> {
    let config = cli.build_config(cli.box_id())?;

    match &cli.command {
        Commands::Init { .. } => {
            let mut cg = Cgroup::new(config);
            cg.init()?;
            cg.prepare()?;
            match cg.name() {
                Some(name) => println!("{}", name.name()),
                None => println!("cgroups disabled"),
            }
        }
        Commands::Run { command, .. } => {
            let report = run_in_cgroup(Cgroup::new(config), command)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Usage { .. } => {
            let mut cg = Cgroup::new(config);
            cg.init()?;
            cg.open_existing()?;
            println!("{}", cg.run_time_ms()?);
        }
        Commands::Cleanup { .. } => {
            let mut cg = Cgroup::new(config);
            cg.init()?;
            cg.open_existing()?;
            cg.remove()?;
        }
    }

    Ok(())
}

/// Prepare a box, run `command` confined to its runner leaf, then collect
/// usage and remove the box.
///
/// The child is forked parked and only execs once this process has written its
/// pid to `runner/cgroup.procs` and applied the memory limit, so cgroup errors
/// keep their full diagnostic.
pub fn run_in_cgroup<F: CgroupFs>(mut cg: Cgroup<F>, command: &[String]) -> Result<RunReport> {
    let program = command.first().context("No command given")?;
    let box_id = cg.config().box_id;

    cg.init()?;
    cg.prepare()?;

    let child = match HeldChild::spawn(command) {
        Ok(child) => child,
        Err(e) => {
            cg.remove()?;
            return Err(e).with_context(|| format!("Cannot run {}", program));
        }
    };

    if let Err(e) = cg.enter_process(child.pid()) {
        child.abandon();
        return Err(e.into());
    }

    let exit = child.release();

    let cpu_time_ms = cg.run_time_ms()?;
    cg.stats()?;
    let cgroup = cg.name().map(|n| n.name().to_string());
    cg.remove()?;

    let exit = exit.with_context(|| format!("Cannot run {}", program))?;
    Ok(RunReport {
        box_id,
        cgroup,
        exit_code: exit.exit_code,
        signal: exit.signal,
        cpu_time_ms,
    })
}
