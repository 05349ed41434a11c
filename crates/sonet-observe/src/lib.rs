//! Observability setup for sonet: structured logging and optional
//! OpenTelemetry span export.

pub mod tracing_setup;
