//! HTTP client for the devstack backend.

mod client;

pub use client::{
    ApiClient, ApiInfo, ClientError, Endpoints, ErrorBody, ErrorEnvelope, HealthReport, RootInfo,
    ServiceStatuses, CORRELATION_HEADER,
};
