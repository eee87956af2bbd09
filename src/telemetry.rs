//! Telemetry helpers for hosts embedding `draw-rs`.
//!
//! The surface, resource pool and drawing context emit `tracing` events:
//! element creation and pruning at `trace`, gradient and sprite lifecycle at
//! `debug`. Subscribing is opt-in; install your own subscriber or call one of
//! the helpers below with the `telemetry` feature enabled.

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "draw_rs=info";

/// Installs a compact `fmt` subscriber filtered by `RUST_LOG`, falling back
/// to [`DEFAULT_FILTER`].
///
/// Returns `false` when the feature is disabled or a global subscriber is
/// already set.
#[must_use]
pub fn init_default_tracing() -> bool {
    #[cfg(feature = "telemetry")]
    {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_FILTER));
        return install(filter);
    }

    #[cfg(not(feature = "telemetry"))]
    {
        false
    }
}

/// Same as [`init_default_tracing`] with an explicit filter directive such as
/// `"draw_rs::surface=trace"`. Invalid directives are rejected.
#[must_use]
pub fn init_tracing_with_filter(directives: &str) -> bool {
    #[cfg(feature = "telemetry")]
    {
        return match tracing_subscriber::EnvFilter::try_new(directives) {
            Ok(filter) => install(filter),
            Err(_) => false,
        };
    }

    #[cfg(not(feature = "telemetry"))]
    {
        let _ = directives;
        false
    }
}

#[cfg(feature = "telemetry")]
fn install(filter: tracing_subscriber::EnvFilter) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .compact()
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::{init_default_tracing, init_tracing_with_filter};

    #[cfg(not(feature = "telemetry"))]
    #[test]
    fn tracing_init_is_a_no_op_without_feature() {
        assert!(!init_default_tracing());
        assert!(!init_tracing_with_filter("draw_rs=trace"));
    }

    #[cfg(feature = "telemetry")]
    #[test]
    fn second_tracing_init_reports_existing_subscriber() {
        let _ = init_tracing_with_filter("draw_rs::surface=trace");
        assert!(!init_default_tracing());
    }
}
