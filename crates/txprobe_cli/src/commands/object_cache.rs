//! Object cache probe command.

use txprobe_probes::ProbeSet;

/// Runs the object cache probe.
pub fn run(probes: &ProbeSet, transactional: bool) -> Result<(), Box<dyn std::error::Error>> {
    if transactional {
        probes.object_cache.run_transactional()?;
    } else {
        probes.object_cache.run_direct()?;
    }
    Ok(())
}
