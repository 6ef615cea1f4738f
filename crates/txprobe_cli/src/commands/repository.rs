//! Repository probe command.

use txprobe_probes::ProbeSet;

/// Scenario selection for the repository probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Scenario {
    /// Session operations with no transaction in play.
    Direct,
    /// Session operations bracketed by transactions.
    Transactional,
    /// Save inside a rollback-marked transaction.
    Rollback,
}

/// Runs the repository probe.
pub fn run(probes: &ProbeSet, scenario: Scenario) -> Result<(), Box<dyn std::error::Error>> {
    match scenario {
        Scenario::Direct => probes.repository.run_direct()?,
        Scenario::Transactional => probes.repository.run_transactional()?,
        Scenario::Rollback => probes.repository.run_rollback()?,
    }
    Ok(())
}
