// Until std::error::Backtrace is fully stabilized, we can't embed a type named `Backtrace` within
// a thiserror::Error (see https://github.com/dtolnay/thiserror/issues/204).
use backtrace::Backtrace as _Backtrace;
use itertools::Itertools;
use thiserror::Error;

/// Error that occurred while adapting an Amazon API Gateway event.
///
/// Every variant except [`Panic`](EventError::Panic) occurs before the HTTP handler is invoked
/// and is returned from [`Adapter::invoke`](crate::Adapter::invoke), so a failed invocation never
/// produces a partially-written response.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum EventError {
  /// Failed to assemble the HTTP request from its parts.
  #[error("failed to build HTTP request")]
  HttpRequest(#[source] Box<http::Error>, _Backtrace),
  /// Invalid base64 encoding for request body.
  // The base64 encoding comes from AWS, so this is actually an internal error.
  #[error("invalid base64 encoding for request body")]
  InvalidBodyBase64(#[source] Box<base64::DecodeError>, _Backtrace),
  /// Invalid HTTP method in the request context.
  #[error("invalid HTTP method `{0}`")]
  InvalidMethod(String, #[source] Box<http::method::InvalidMethod>, _Backtrace),
  /// The raw path, query string, or domain name don't form a valid request target.
  #[error("invalid request target `{target}`")]
  InvalidRequestTarget {
    /// Request target that failed to parse.
    target: String,
    /// Underlying error that occurred while parsing the target.
    #[source]
    source: Box<http::Error>,
    /// Stack trace indicating where the error occurred.
    backtrace: _Backtrace,
  },
  /// Request handler panicked.
  ///
  /// [`Adapter::invoke`](crate::Adapter::invoke) never returns this variant: the panic is logged
  /// and answered with a `500 Internal Server Error` response instead.
  #[error("request handler panicked: {0}")]
  Panic(String, _Backtrace),
}

impl EventError {
  /// Return the backtrace associated with the error, if known.
  pub fn backtrace(&self) -> Option<&_Backtrace> {
    match self {
      EventError::HttpRequest(_, backtrace)
      | EventError::InvalidBodyBase64(_, backtrace)
      | EventError::InvalidMethod(_, _, backtrace)
      | EventError::InvalidRequestTarget { backtrace, .. }
      | EventError::Panic(_, backtrace) => Some(backtrace),
    }
  }

  /// Return the name of the error variant (e.g., `InvalidBodyBase64`).
  pub fn name(&self) -> &str {
    match self {
      EventError::HttpRequest(_, _) => "HttpRequest",
      EventError::InvalidBodyBase64(_, _) => "InvalidBodyBase64",
      EventError::InvalidMethod(_, _, _) => "InvalidMethod",
      EventError::InvalidRequestTarget { .. } => "InvalidRequestTarget",
      EventError::Panic(_, _) => "Panic",
    }
  }
}

/// Helper function for formatting an error as a string containing a human-readable chain of causes.
///
/// This function will walk over the chain of causes returned by
/// [`Error::source`](std::error::Error::source) and append each underlying error (using the
/// [`Display`](std::fmt::Display) trait).
///
/// # Arguments
///
/// * `err` - Error to format.
/// * `name` - Optional name of the error type/variant (e.g., `EventError::InvalidBodyBase64`).
/// * `backtrace` - Optional [`Backtrace`](backtrace::Backtrace) indicating where the top-level
///   error occurred.
pub fn format_error(
  err: &(dyn std::error::Error),
  name: Option<&str>,
  backtrace: Option<&_Backtrace>,
) -> String {
  let err_line = name
    .map(|n| format!("{}: {}", n, err))
    .unwrap_or_else(|| err.to_string());

  let top_error = if let Some(bt) = backtrace {
    format!("{err_line}\n  stack trace:\n{}", format_backtrace(bt, 4))
  } else {
    err_line
  };

  let cause_str = ErrorCauseIterator(err.source())
    .map(|cause| format!("  caused by: {cause}"))
    .join("\n");

  if !cause_str.is_empty() {
    format!("{top_error}\n{cause_str}")
  } else {
    top_error
  }
}

struct ErrorCauseIterator<'a>(Option<&'a (dyn std::error::Error + 'static)>);

impl<'a> Iterator for ErrorCauseIterator<'a> {
  type Item = &'a (dyn std::error::Error + 'static);

  fn next(&mut self) -> Option<Self::Item> {
    let current = self.0;
    self.0 = current.and_then(|err| err.source());
    current
  }
}

fn format_backtrace(backtrace: &_Backtrace, indent: usize) -> String {
  let indent_str = " ".repeat(indent);
  format!("{backtrace:?}")
    .lines()
    .map(|line| format!("{indent_str}{line}"))
    .join("\n")
}

#[cfg(test)]
mod tests {
  use super::{format_error, EventError};

  use backtrace::Backtrace;
  use base64::Engine as _;
  use pretty_assertions::assert_eq;

  #[test]
  fn test_format_error_includes_causes() {
    let decode_err = base64::engine::general_purpose::STANDARD
      .decode("not base64!")
      .unwrap_err();
    let err = EventError::InvalidBodyBase64(Box::new(decode_err.clone()), Backtrace::new());

    assert_eq!(err.name(), "InvalidBodyBase64");
    assert!(err.backtrace().is_some());
    assert_eq!(
      format_error(&err, Some("EventError::InvalidBodyBase64"), None),
      format!(
        "EventError::InvalidBodyBase64: invalid base64 encoding for request body\n  caused by: \
         {decode_err}"
      ),
    );
  }

  #[test]
  fn test_format_error_with_backtrace() {
    let err = EventError::Panic("boom".to_string(), Backtrace::new());
    let formatted = format_error(&err, None, err.backtrace());

    assert!(formatted.starts_with("request handler panicked: boom\n  stack trace:\n"));
    assert!(!formatted.contains("caused by"));
  }
}
