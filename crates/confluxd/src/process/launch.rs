//! Supervises daemon launch sequencing and runtime orchestration.

use tracing::info;

use crate::bootstrap::{
    ConfigLoader, DaemonServices, ManifestFileSource, RegistrationSource, SystemConfigLoader,
    bootstrap_with,
};

use super::PROCESS_TARGET;
use super::errors::LaunchError;
use super::shutdown::{ShutdownSignal, SystemShutdownSignal};

/// Collaborators required to launch the daemon runtime.
pub(crate) struct LaunchPlan<L, R, S> {
    pub(crate) loader: L,
    pub(crate) registrations: R,
    pub(crate) services: DaemonServices,
    pub(crate) shutdown: S,
}

/// Runs the daemon in the foreground until a termination signal arrives.
///
/// # Errors
///
/// Fails if signal handlers cannot be installed, bootstrap fails, or the
/// daemon threads cannot be started or joined.
pub fn run_daemon() -> Result<(), LaunchError> {
    let plan = LaunchPlan {
        loader: SystemConfigLoader,
        registrations: ManifestFileSource,
        services: DaemonServices::production(),
        shutdown: SystemShutdownSignal::install()?,
    };
    run_daemon_with(plan)
}

/// Runs the daemon with injected collaborators.
pub(crate) fn run_daemon_with<L, R, S>(plan: LaunchPlan<L, R, S>) -> Result<(), LaunchError>
where
    L: ConfigLoader,
    R: RegistrationSource,
    S: ShutdownSignal,
{
    let LaunchPlan {
        loader,
        registrations,
        services,
        shutdown,
    } = plan;

    info!(target: PROCESS_TARGET, "starting daemon runtime");
    let mut daemon = bootstrap_with(&loader, &registrations, services)?;
    daemon.runtime_mut().start()?;

    let waited = shutdown.wait();
    info!(target: PROCESS_TARGET, "stopping daemon runtime");
    daemon.runtime_mut().stop()?;
    waited?;
    info!(target: PROCESS_TARGET, "shutdown sequence completed");
    Ok(())
}
