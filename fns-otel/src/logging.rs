//! Zero-configuration tracing/logging install, adapted from
//! `spark_otel::install` — trimmed to what an FNS process actually needs:
//! a `fmt` + `EnvFilter` subscriber, with OpenTelemetry export behind the
//! optional `otel` feature rather than always-on (spec.md §1 names
//! metrics as a non-goal; structured logging is not, so it stays
//! mandatory while the heavier exporter stays opt-in).

use std::fmt;
use std::sync::OnceLock;

use tracing_subscriber::{layer::SubscriberExt, EnvFilter};

static INSTALLED: OnceLock<()> = OnceLock::new();

#[derive(Debug)]
pub enum Error {
    /// `install` was already called once in this process.
    AlreadyInstalled,
    /// A global `tracing` subscriber was set by someone else first.
    SubscriberAlreadySet,
    SetGlobalDefault(tracing::subscriber::SetGlobalDefaultError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::AlreadyInstalled => write!(f, "fns-otel logging already installed"),
            Error::SubscriberAlreadySet => {
                write!(f, "a global tracing subscriber is already set")
            }
            Error::SetGlobalDefault(err) => write!(f, "failed to set global subscriber: {err}"),
        }
    }
}

impl std::error::Error for Error {}

fn build_env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Installs a `fmt` + `EnvFilter` tracing subscriber as the process-wide
/// default. Idempotent-safe: a second call returns
/// [`Error::AlreadyInstalled`] rather than panicking.
#[cfg(not(feature = "otel"))]
pub fn install() -> Result<(), Error> {
    if INSTALLED.get().is_some() {
        return Err(Error::AlreadyInstalled);
    }
    if tracing::dispatcher::has_been_set() {
        return Err(Error::SubscriberAlreadySet);
    }

    let subscriber = tracing_subscriber::registry()
        .with(build_env_filter())
        .with(tracing_subscriber::fmt::layer());
    tracing::subscriber::set_global_default(subscriber).map_err(Error::SetGlobalDefault)?;

    INSTALLED.set(()).map_err(|_| Error::AlreadyInstalled)
}

/// With the `otel` feature, additionally registers a
/// `tracing-opentelemetry` layer backed by an always-on SDK tracer
/// provider, matching `spark_otel::install_impl`'s layering (fmt + filter
/// + otel) minus the handler-tracer auto-injection `spark-core` offers,
/// which has no FNS equivalent.
#[cfg(feature = "otel")]
pub fn install() -> Result<(), Error> {
    use opentelemetry::{global, trace::TracerProvider as _};
    use opentelemetry_sdk::trace::{self as sdktrace, TracerProvider};

    if INSTALLED.get().is_some() {
        return Err(Error::AlreadyInstalled);
    }
    if tracing::dispatcher::has_been_set() {
        return Err(Error::SubscriberAlreadySet);
    }

    let provider = TracerProvider::builder()
        .with_config(sdktrace::config().with_sampler(sdktrace::Sampler::AlwaysOn))
        .build();
    global::set_tracer_provider(provider.clone());
    let tracer = provider.tracer("fns");

    let subscriber = tracing_subscriber::registry()
        .with(build_env_filter())
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_opentelemetry::layer().with_tracer(tracer));
    tracing::subscriber::set_global_default(subscriber).map_err(Error::SetGlobalDefault)?;

    INSTALLED.set(()).map_err(|_| Error::AlreadyInstalled)
}
