//! Shared helpers for sitepipe's integration tests.

pub mod builders;
pub mod fake_runner;
pub mod fixtures;

use std::future::Future;
use std::sync::Once;
use std::time::Duration;

use sitepipe::logging::LOG_ENV;
use tracing_subscriber::{fmt, EnvFilter};

/// Upper bound for any single awaited step in a test (a build, a request,
/// a watch run). Generous enough for a cold `spawn_blocking` pool.
pub const STEP_TIMEOUT: Duration = Duration::from_secs(5);

/// Quiet unless asked: sitepipe at warn, dependencies at error.
const TEST_DIRECTIVES: &str = "error,sitepipe=warn,sitepipe_test_utils=warn";

static INIT: Once = Once::new();

/// Install a per-test capturing subscriber once per test binary.
///
/// Reads the same `SITEPIPE_LOG` directives as the binary, e.g.
/// `SITEPIPE_LOG=sitepipe=debug cargo test -- --nocapture`.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = std::env::var(LOG_ENV)
            .ok()
            .and_then(|directives| EnvFilter::try_new(directives.trim()).ok())
            .unwrap_or_else(|| EnvFilter::new(TEST_DIRECTIVES));

        // Another harness may already own the global subscriber.
        let _ = fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .try_init();
    });
}

/// Await `f`, failing the test if it outlives [`STEP_TIMEOUT`].
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: Future<Output = T>,
{
    match tokio::time::timeout(STEP_TIMEOUT, f).await {
        Ok(value) => value,
        Err(_) => panic!("step did not finish within {STEP_TIMEOUT:?}"),
    }
}
