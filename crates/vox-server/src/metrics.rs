//! Prometheus metrics recorder and `/metrics` rendering.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::info;

pub use vox_recognition::gate::SESSIONS_ACTIVE;
pub use vox_recognition::recognizer::{DURATION_SECONDS, OUTCOMES_TOTAL};

/// HTTP requests total (counter, labels: status).
pub const HTTP_REQUESTS_TOTAL: &str = "http_requests_total";

/// Install the Prometheus metrics recorder (global).
///
/// Returns the handle used to render `/metrics`. Fails if a recorder is
/// already installed.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// Render Prometheus text format from the installed recorder.
pub fn render(handle: &PrometheusHandle) -> String {
    handle.render()
}
