use std::sync::Once;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

static INIT: Once = Once::new();

pub const LOG_ENV: &str = "RISK_TRAJECTORY_LOG";
const DEFAULT_FILTER: &str = "tutor_risk_trajectory=info,risk_trajectory=info";

/// Installs the stderr subscriber. Filter comes from `RISK_TRAJECTORY_LOG`,
/// e.g. `RISK_TRAJECTORY_LOG=tutor_risk_trajectory::risk=debug`.
///
/// Safe to call more than once.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
            .with(filter)
            .init();
    });
}
