//! Process-level signal handling and the final shutdown sequence.
//!
//! The pipeline stops for one of three reasons: an operator interrupt, a
//! platform termination request, or a service leaving its run loop on its
//! own (the driver hitting the property target surfaces here too). All three
//! funnel into the same drain: signal every service, then wait out the
//! configured shutdown budget.

use crate::services::ServiceResult;
use crate::services::manager::ServiceManager;
use crate::utils::fmt_duration;
use std::process::ExitCode;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};

/// Why the main loop decided to stop.
enum StopCause {
    Interrupt,
    Terminate,
    ServiceExit(String, ServiceResult),
}

/// Run the registered services until something stops them, then drain within
/// `shutdown_timeout`. Returns the process exit code.
pub async fn handle_shutdown_signals(
    mut service_manager: ServiceManager,
    shutdown_timeout: Duration,
) -> ExitCode {
    let cause = tokio::select! {
        (name, result) = service_manager.run() => StopCause::ServiceExit(name, result),
        cause = wait_for_signal() => cause,
    };

    let mut exit_code = match cause {
        StopCause::Interrupt => {
            info!("interrupt received, draining services");
            ExitCode::SUCCESS
        }
        StopCause::Terminate => {
            info!("termination requested, draining services");
            ExitCode::SUCCESS
        }
        StopCause::ServiceExit(name, result) => match result {
            ServiceResult::GracefulShutdown => {
                info!(service = name, "service finished cleanly");
                ExitCode::SUCCESS
            }
            ServiceResult::NormalCompletion => {
                warn!(service = name, "service left its run loop unexpectedly");
                ExitCode::FAILURE
            }
            ServiceResult::Error(e) => {
                error!(service = name, error = ?e, "service failed");
                ExitCode::FAILURE
            }
        },
    };

    match service_manager.shutdown(shutdown_timeout).await {
        Ok(elapsed) => {
            info!(
                spare = fmt_duration(shutdown_timeout.saturating_sub(elapsed)),
                "all services stopped within the shutdown budget"
            );
        }
        Err(stuck) => {
            warn!(
                stuck = ?stuck,
                "shutdown budget of {} elapsed with {} service(s) still running",
                fmt_duration(shutdown_timeout),
                stuck.len()
            );
            exit_code = ExitCode::from(2);
        }
    }

    info!("scraper exited");
    exit_code
}

/// Block until the process receives SIGINT or SIGTERM.
async fn wait_for_signal() -> StopCause {
    let interrupt = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        let mut stream =
            signal(SignalKind::terminate()).expect("Failed to install SIGTERM handler");
        stream.recv().await;
    };

    // SIGTERM does not exist off unix; park that arm forever
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => StopCause::Interrupt,
        _ = terminate => StopCause::Terminate,
    }
}
