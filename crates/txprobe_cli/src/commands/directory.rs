//! Directory cache probe command.

use txprobe_probes::ProbeSet;

/// Runs the directory cache probe.
pub fn run(probes: &ProbeSet) -> Result<(), Box<dyn std::error::Error>> {
    probes.directory_cache.run_transactional()?;
    Ok(())
}
