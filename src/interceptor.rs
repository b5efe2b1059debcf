//! Attributes every DynamoDB call to the transaction that is current when the
//! call is made.
//!
//! ```rust,ignore
//! let config = aws_sdk_dynamodb::config::Builder::from(&sdk_config)
//!     .interceptor(SegmentInterceptor)
//!     .build();
//! ```

use aws_sdk_dynamodb::config::interceptors::{
    BeforeSerializationInterceptorContextRef, BeforeTransmitInterceptorContextRef,
    FinalizerInterceptorContextRef,
};
use aws_sdk_dynamodb::config::{ConfigBag, Intercept, RuntimeComponents};
use aws_sdk_dynamodb::error::BoxError;
use aws_smithy_runtime_api::client::orchestrator::Metadata;
use aws_smithy_types::config_bag::{Storable, StoreReplace};
use tracing::{field, info_span, Span};

/// Opens one external-segment span per SDK operation.
#[derive(Debug, Default, Clone, Copy)]
pub struct SegmentInterceptor;

/// The segment span of the operation in flight, kept in the operation's config bag.
#[derive(Debug)]
struct Segment(Span);

impl Storable for Segment {
    type Storer = StoreReplace<Self>;
}

impl Intercept for SegmentInterceptor {
    fn name(&self) -> &'static str {
        "SegmentInterceptor"
    }

    fn read_before_execution(
        &self,
        _context: &BeforeSerializationInterceptorContextRef<'_>,
        cfg: &mut ConfigBag,
    ) -> Result<(), BoxError> {
        // parented to the current span, i.e. the caller's transaction
        let span = info_span!(
            "external",
            otel.name = field::Empty,
            otel.kind = "client",
            aws.service = field::Empty,
            aws.operation = field::Empty,
            http.method = field::Empty,
            http.url = field::Empty,
            http.status_code = field::Empty,
            otel.status_code = field::Empty,
        );
        cfg.interceptor_state().store_put(Segment(span));
        Ok(())
    }

    fn read_before_transmit(
        &self,
        context: &BeforeTransmitInterceptorContextRef<'_>,
        _runtime_components: &RuntimeComponents,
        cfg: &mut ConfigBag,
    ) -> Result<(), BoxError> {
        let Some(Segment(span)) = cfg.load::<Segment>() else {
            return Ok(());
        };

        // operation metadata is only in the bag once the operation config is applied
        if let Some(metadata) = cfg.load::<Metadata>() {
            span.record(
                "otel.name",
                field::display(format!("{}.{}", metadata.service(), metadata.name())),
            );
            span.record("aws.service", metadata.service());
            span.record("aws.operation", metadata.name());
        }

        let request = context.request();
        span.record("http.method", request.method());
        span.record("http.url", request.uri());
        Ok(())
    }

    fn read_after_execution(
        &self,
        context: &FinalizerInterceptorContextRef<'_>,
        _runtime_components: &RuntimeComponents,
        cfg: &mut ConfigBag,
    ) -> Result<(), BoxError> {
        if let Some(Segment(span)) = cfg.load::<Segment>() {
            if let Some(response) = context.response() {
                span.record("http.status_code", response.status().as_u16());
            }
            let status = match context.output_or_error() {
                Some(Err(_)) => "error",
                _ => "ok",
            };
            span.record("otel.status_code", status);
        }
        Ok(())
    }
}
