/// Resource limits written into a prepared box cgroup
use crate::attr::AttributeIo;
use crate::fs::CgroupFs;
use crate::types::Result;

/// Controllers delegated to the runner leaf through `cgroup.subtree_control`
pub const SUBTREE_CONTROLLERS: &str = "+memory +cpu +cpuset";

/// Let the runner leaf use the memory, cpu and cpuset controllers
pub fn delegate_controllers<F: CgroupFs>(io: &AttributeIo<'_, F>) -> Result<()> {
    io.write("cgroup.subtree_control", SUBTREE_CONTROLLERS)
}

/// Pin the box to the given CPUs and memory nodes.
///
/// cpuset is enforced top-down, so this must happen before any process is
/// placed in the runner leaf.
pub fn apply_cpuset<F: CgroupFs>(
    io: &AttributeIo<'_, F>,
    cpus: Option<&str>,
    mems: Option<&str>,
) -> Result<()> {
    if let Some(cpus) = cpus {
        io.write("cpuset.cpus", cpus)?;
    }
    if let Some(mems) = mems {
        io.write("cpuset.mems", mems)?;
    }
    Ok(())
}

/// Set `memory.max` from a KiB limit and forbid swap.
pub fn apply_memory<F: CgroupFs>(io: &AttributeIo<'_, F>, limit_kb: u64) -> Result<()> {
    io.write("memory.max", format_args!("{}\n", limit_kb << 10))?;
    io.write("memory.swap.max", "0\n")
}
