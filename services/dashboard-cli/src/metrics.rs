//! Prometheus snapshot of the pipeline counters
//!
//! The library crates emit through the `metrics` facade:
//!
//! - `api_requests_total` (counter): labels `method`, `status`
//! - `api_request_retries_total` (counter)
//! - `api_token_refresh_total` (counter): label `outcome`
//! - `api_session_terminations_total` (counter)
//!
//! A CLI run is short-lived, so instead of serving `/metrics` the binary
//! renders the recorder once on exit when `--metrics` is given.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder and return a handle for rendering metrics.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_exporter_prometheus::PrometheusRecorder;

    /// Isolated recorder/handle pair: only one global recorder can exist per
    /// process, so tests use a thread-local default instead.
    fn isolated_recorder() -> (PrometheusRecorder, PrometheusHandle) {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        (recorder, handle)
    }

    #[test]
    fn pipeline_counters_render_with_labels() {
        let (recorder, handle) = isolated_recorder();
        let _guard = metrics::set_default_local_recorder(&recorder);

        api_client::metrics::record_request("GET", 200);
        api_client::metrics::record_request("POST", 401);
        api_client::metrics::record_retry();

        let output = handle.render();
        assert!(output.contains("api_requests_total"), "got: {output}");
        assert!(output.contains("method=\"GET\""));
        assert!(output.contains("status=\"401\""));
        assert!(output.contains("api_request_retries_total"));
    }

    #[tokio::test]
    async fn termination_counter_renders() {
        let (recorder, handle) = isolated_recorder();
        let _guard = metrics::set_default_local_recorder(&recorder);

        struct Stay;
        impl session_refresh::Navigator for Stay {
            fn current_location(&self) -> String {
                "/login".into()
            }
            fn navigate(&self, _to: &str) {}
        }

        let tokens = std::sync::Arc::new(session_auth::TokenStore::new(std::sync::Arc::new(
            session_auth::PersistentStore::in_memory(),
        )));
        let terminator =
            session_refresh::SessionTerminator::new(tokens, std::sync::Arc::new(Stay), "/login");
        terminator.terminate().await;

        assert!(handle.render().contains("api_session_terminations_total"));
    }
}
