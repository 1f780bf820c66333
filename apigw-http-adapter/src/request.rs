use crate::ext::OriginalEvent;
use crate::{EventError, HttpRequest, LambdaContext};

use aws_lambda_events::apigw::ApiGatewayV2httpRequest;
use backtrace::Backtrace;
use base64::Engine as _;
use http::header::{
  AUTHORIZATION, COOKIE, DATE, EXPIRES, HOST, IF_MODIFIED_SINCE, IF_RANGE, IF_UNMODIFIED_SINCE,
  LAST_MODIFIED, PROXY_AUTHORIZATION, RETRY_AFTER, SET_COOKIE, USER_AGENT, WWW_AUTHENTICATE,
};
use http::uri::{Authority, PathAndQuery, Scheme};
use http::{HeaderMap, HeaderName, HeaderValue, Method, Request, Uri};

use std::io::{Cursor, Read};
use std::sync::Arc;

const X_FORWARDED_PROTO: &str = "x-forwarded-proto";

/// Headers whose value syntax permits commas within a single value, so folding them into
/// separate values would corrupt them.
static UNFOLDABLE_HEADERS: [HeaderName; 13] = [
  AUTHORIZATION,
  COOKIE,
  DATE,
  EXPIRES,
  IF_MODIFIED_SINCE,
  IF_RANGE,
  IF_UNMODIFIED_SINCE,
  LAST_MODIFIED,
  PROXY_AUTHORIZATION,
  RETRY_AFTER,
  SET_COOKIE,
  USER_AGENT,
  WWW_AUTHENTICATE,
];

/// Decoded HTTP request body.
///
/// The body is fully buffered in memory and implements [`Read`] so that handlers can consume it
/// as a stream.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RequestBody(Cursor<Vec<u8>>);

impl RequestBody {
  /// Return the full body, regardless of how much has already been read.
  pub fn as_bytes(&self) -> &[u8] {
    self.0.get_ref()
  }

  /// Consume the body and return the underlying bytes.
  pub fn into_bytes(self) -> Vec<u8> {
    self.0.into_inner()
  }

  /// Return `true` if the body contains no bytes.
  pub fn is_empty(&self) -> bool {
    self.0.get_ref().is_empty()
  }
}

impl From<Vec<u8>> for RequestBody {
  fn from(bytes: Vec<u8>) -> Self {
    Self(Cursor::new(bytes))
  }
}

impl From<String> for RequestBody {
  fn from(body: String) -> Self {
    Self::from(body.into_bytes())
  }
}

impl From<&str> for RequestBody {
  fn from(body: &str) -> Self {
    Self::from(body.as_bytes().to_vec())
  }
}

impl Read for RequestBody {
  fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
    self.0.read(buf)
  }
}

/// Options controlling how requests are built from API Gateway events.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct RequestOptions {
  /// Append `?` to the request target even when the raw query string is empty.
  pub trailing_query_separator: bool,
}

/// Build an [`HttpRequest`] from an API Gateway HTTP API event.
///
/// The original event and the Lambda execution context are attached to the request's extensions
/// (see [`RequestExt`](crate::RequestExt)).
pub(crate) fn build_request(
  event: ApiGatewayV2httpRequest,
  lambda_context: LambdaContext,
  options: RequestOptions,
) -> Result<HttpRequest, EventError> {
  let body = decode_body(event.body.as_deref(), event.is_base64_encoded)?;

  let method_str = event.request_context.http.method.as_str().to_ascii_uppercase();
  let method = Method::from_bytes(method_str.as_bytes())
    .map_err(|err| EventError::InvalidMethod(method_str.clone(), Box::new(err), Backtrace::new()))?;

  let uri = request_uri(&event, options)?;

  let mut request = Request::builder()
    .method(method)
    .uri(uri)
    .body(RequestBody::from(body))
    .map_err(|err| EventError::HttpRequest(Box::new(err), Backtrace::new()))?;

  let headers = request.headers_mut();
  fold_headers(&event.headers, headers);

  for cookie in event.cookies.iter().flatten() {
    match HeaderValue::from_str(cookie) {
      Ok(value) => {
        headers.append(COOKIE, value);
      }
      Err(err) => log::warn!("Dropping cookie that is not a valid header value: {err}"),
    }
  }

  if let Some(domain_name) = &event.request_context.domain_name {
    let host = HeaderValue::from_str(domain_name).map_err(|err| {
      EventError::HttpRequest(Box::new(http::Error::from(err)), Backtrace::new())
    })?;
    headers.insert(HOST, host);
  }

  let extensions = request.extensions_mut();
  extensions.insert(OriginalEvent(Arc::new(event)));
  extensions.insert(lambda_context);

  Ok(request)
}

fn decode_body(body: Option<&str>, is_base64_encoded: bool) -> Result<Vec<u8>, EventError> {
  match body {
    None => Ok(Vec::new()),
    Some(body) if is_base64_encoded => base64::engine::general_purpose::STANDARD
      .decode(body.as_bytes())
      // If this fails, it's an internal error since the base64 encoding is done by the API Gateway.
      .map_err(|err| EventError::InvalidBodyBase64(Box::new(err), Backtrace::new())),
    Some(body) => Ok(body.as_bytes().to_vec()),
  }
}

fn request_uri(
  event: &ApiGatewayV2httpRequest,
  options: RequestOptions,
) -> Result<Uri, EventError> {
  let path = match event.raw_path.as_deref() {
    Some(path) if !path.is_empty() => path,
    _ => "/",
  };
  let query = event.raw_query_string.as_deref().unwrap_or_default();
  let target = if !query.is_empty() || options.trailing_query_separator {
    format!("{path}?{query}")
  } else {
    path.to_string()
  };

  let invalid_target = |err: http::Error| EventError::InvalidRequestTarget {
    target: target.clone(),
    source: Box::new(err),
    backtrace: Backtrace::new(),
  };

  let path_and_query = PathAndQuery::try_from(target.as_str())
    .map_err(|err| invalid_target(http::Error::from(err)))?;

  let Some(domain_name) = &event.request_context.domain_name else {
    return Ok(Uri::from(path_and_query));
  };

  let authority = Authority::try_from(domain_name.as_str())
    .map_err(|err| invalid_target(http::Error::from(err)))?;

  let scheme = event
    .headers
    .get(X_FORWARDED_PROTO)
    .and_then(forwarded_scheme)
    // API Gateway HTTP APIs only accept HTTPS connections from clients.
    .unwrap_or(Scheme::HTTPS);

  Uri::builder()
    .scheme(scheme)
    .authority(authority)
    .path_and_query(path_and_query)
    .build()
    .map_err(invalid_target)
}

/// Parse the scheme from the first segment of an `X-Forwarded-Proto` header.
///
/// Unparseable values are ignored rather than failing the request.
fn forwarded_scheme(proto: &HeaderValue) -> Option<Scheme> {
  let first_segment = proto
    .to_str()
    .ok()
    .and_then(|proto| proto.split(',').next())
    .map(str::trim)
    .filter(|segment| !segment.is_empty());

  match first_segment.map(Scheme::try_from) {
    Some(Ok(scheme)) => Some(scheme),
    Some(Err(err)) => {
      log::warn!("Ignoring invalid `{X_FORWARDED_PROTO}` header {proto:?}: {err}");
      None
    }
    None => {
      log::warn!("Ignoring empty or non-UTF-8 `{X_FORWARDED_PROTO}` header {proto:?}");
      None
    }
  }
}

/// Copy each header from the event into `headers`, splitting comma-separated values into
/// independent values.
///
/// API Gateway joins repeated request headers with commas before invoking the function.
fn fold_headers(event_headers: &HeaderMap, headers: &mut HeaderMap) {
  for (name, value) in event_headers {
    let segments = match value.to_str() {
      Ok(value_str) if !UNFOLDABLE_HEADERS.contains(name) => value_str,
      // Non-UTF-8 values and headers that can't be folded are passed through as-is.
      _ => {
        headers.append(name, value.clone());
        continue;
      }
    };

    for segment in segments.split(',') {
      match HeaderValue::from_str(segment.trim()) {
        Ok(segment_value) => {
          headers.append(name, segment_value);
        }
        Err(err) => log::warn!("Dropping invalid segment of header `{name}`: {err}"),
      }
    }
  }
}
