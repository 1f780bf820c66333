use crate::error::format_error;
use crate::request::{build_request, RequestOptions};
use crate::{EventError, Handler, ResponseCapture, ResponseWriter};

use aws_lambda_events::apigw::{ApiGatewayV2httpRequest, ApiGatewayV2httpResponse};
use backtrace::Backtrace;
use futures::FutureExt;
use http::StatusCode;
use lambda_runtime::LambdaEvent;
use log::{error, trace};

use std::any::Any;
use std::panic::AssertUnwindSafe;

/// Adapter that runs a generic HTTP [`Handler`] for each Amazon API Gateway HTTP API event
/// (payload format version 2.0).
///
/// Each call to [`invoke`](Adapter::invoke) builds an [`HttpRequest`](crate::HttpRequest) from
/// the event, invokes the handler exactly once with a fresh [`ResponseCapture`], and converts the
/// captured response into an [`ApiGatewayV2httpResponse`]. No state is shared between
/// invocations.
#[derive(Debug)]
pub struct Adapter<H> {
  handler: H,
  request_options: RequestOptions,
}

impl<H> Adapter<H>
where
  H: Handler,
{
  /// Construct an adapter for the specified handler.
  pub fn new(handler: H) -> Self {
    Self {
      handler,
      request_options: RequestOptions::default(),
    }
  }

  /// Append `?` to the request target even when the event's raw query string is empty (e.g.,
  /// `/path?`).
  ///
  /// Disabled by default, in which case the request target is just the raw path. Enable this
  /// only if handlers depend on the exact request target.
  pub fn with_trailing_query_separator(mut self, enabled: bool) -> Self {
    self.request_options.trailing_query_separator = enabled;
    self
  }

  /// Return the wrapped handler.
  pub fn handler(&self) -> &H {
    &self.handler
  }

  /// Handle a single API Gateway event.
  ///
  /// Returns an error without invoking the handler if the request can't be built from the event
  /// (e.g., the body is not valid base64 or the request target is malformed). If the handler
  /// panics with a string message, the panic is logged and a `500 Internal Server Error`
  /// response is returned.
  pub async fn invoke(
    &self,
    event: LambdaEvent<ApiGatewayV2httpRequest>,
  ) -> Result<ApiGatewayV2httpResponse, EventError> {
    let LambdaEvent {
      payload,
      context: lambda_context,
    } = event;

    trace!("Request: {payload:#?}");
    trace!("Lambda context: {lambda_context:#?}");

    let request = build_request(payload, lambda_context, self.request_options)
      .map_err(|err| {
        error!("{}", format_event_error(&err));
        err
      })?;

    let mut response = ResponseCapture::new();
    let handler_result = AssertUnwindSafe(self.handler.serve(&mut response, request))
      .catch_unwind()
      .await;
    if let Err(panic) = handler_result {
      let err = EventError::Panic(
        // If the panic value isn't a String or &str, don't catch it since we can't print it and
        // it's unclear what we should do instead.
        panic_string(panic).unwrap_or_else(|panic| std::panic::resume_unwind(panic)),
        // The panic doesn't give us a stack trace unless we set a panic hook, which might
        // interfere with the user's own error handling. Instead, we just capture a backtrace
        // indicating where we caught the panic.
        Backtrace::new(),
      );
      error!("{}", format_event_error(&err));

      // Discard anything the handler wrote before panicking.
      response = ResponseCapture::new();
      response.set_status(StatusCode::INTERNAL_SERVER_ERROR);
    }

    let apigw_response = response.into_api_gateway_response();
    trace!("Response: {apigw_response:#?}");

    Ok(apigw_response)
  }
}

fn format_event_error(err: &EventError) -> String {
  format_error(
    err,
    Some(&format!("EventError::{}", err.name())),
    err.backtrace(),
  )
}

/// Extract the panic string or error after catching a panic.
fn panic_string(panic: Box<dyn Any + Send>) -> Result<String, Box<dyn Any + Send>> {
  panic
    .downcast::<String>()
    .map(|panic| panic.to_string())
    .or_else(|panic| panic.downcast::<&str>().map(|err| err.to_string()))
}
