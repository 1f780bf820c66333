use aws_lambda_events::apigw::ApiGatewayV2httpResponse;
use aws_lambda_events::encodings::Body;
use http::header::SET_COOKIE;
use http::{HeaderMap, StatusCode};
use log::warn;

/// Response-writing interface passed to a [`Handler`](crate::Handler).
///
/// Handlers set the status code, mutate the response headers, and append body bytes. Nothing is
/// transmitted until the handler returns.
pub trait ResponseWriter: Send {
  /// Return the response headers.
  fn headers(&self) -> &HeaderMap;

  /// Return a mutable reference to the response headers.
  ///
  /// Headers with multiple values (e.g., several `Set-Cookie` headers) should be added with
  /// [`HeaderMap::append`].
  fn headers_mut(&mut self) -> &mut HeaderMap;

  /// Return the response status code, or `None` if no status has been set or implied yet.
  fn status(&self) -> Option<StatusCode>;

  /// Set the response status code.
  ///
  /// Once any part of the body has been written, the status code is final and subsequent calls
  /// are ignored.
  fn set_status(&mut self, status: StatusCode);

  /// Append bytes to the response body.
  ///
  /// If no status code has been set, the first write sets it to `200 OK`.
  fn write_body(&mut self, bytes: &[u8]);
}

/// In-memory [`ResponseWriter`] that captures the handler's response for conversion into an
/// [`ApiGatewayV2httpResponse`].
///
/// The entire body is buffered. No size limit is enforced locally: the API Gateway rejects
/// oversized payloads on its own.
#[derive(Debug, Default)]
pub struct ResponseCapture {
  status: Option<StatusCode>,
  headers: HeaderMap,
  body: Vec<u8>,
  body_started: bool,
}

impl ResponseCapture {
  /// Construct an empty response with no status code.
  pub fn new() -> Self {
    Self::default()
  }

  /// Return the body bytes written so far.
  pub fn body(&self) -> &[u8] {
    &self.body
  }

  /// Convert the captured response into an API Gateway HTTP API response.
  ///
  /// Headers with a single value are returned in `headers`, while those with several values are
  /// returned in `multi_value_headers`. `Set-Cookie` headers are moved into `cookies` in the order
  /// they were added, except for values that are not valid UTF-8, which are dropped. Bodies that
  /// are valid UTF-8 are returned as text; any other body is returned as binary (base64-encoded on
  /// the wire) with `is_base64_encoded` set.
  ///
  /// Binary detection only inspects the body bytes, not the `Content-Type` header. Binary formats
  /// whose content happens to be valid UTF-8 are therefore returned as text.
  pub fn into_api_gateway_response(self) -> ApiGatewayV2httpResponse {
    let status_code = match self.status {
      Some(status) => i64::from(status.as_u16()),
      None => {
        warn!("Handler never set a status code or wrote a body; responding with status 0");
        0
      }
    };

    let mut headers = HeaderMap::new();
    let mut multi_value_headers = HeaderMap::new();
    let mut cookies = Vec::new();

    for name in self.headers.keys() {
      let values = self.headers.get_all(name).iter().collect::<Vec<_>>();

      if *name == SET_COOKIE {
        for value in values {
          match std::str::from_utf8(value.as_bytes()) {
            Ok(cookie) => cookies.push(cookie.to_string()),
            Err(err) => warn!("Dropping `Set-Cookie` header that is not valid UTF-8: {err}"),
          }
        }
        continue;
      }

      if let [value] = values.as_slice() {
        headers.insert(name, (*value).clone());
      } else {
        for value in values {
          multi_value_headers.append(name, value.clone());
        }
      }
    }

    let (body, is_base64_encoded) = match String::from_utf8(self.body) {
      Ok(text) => (Body::Text(text), false),
      Err(err) => (Body::Binary(err.into_bytes()), true),
    };

    ApiGatewayV2httpResponse {
      status_code,
      headers,
      multi_value_headers,
      body: Some(body),
      is_base64_encoded,
      cookies,
    }
  }
}

impl ResponseWriter for ResponseCapture {
  fn headers(&self) -> &HeaderMap {
    &self.headers
  }

  fn headers_mut(&mut self) -> &mut HeaderMap {
    &mut self.headers
  }

  fn status(&self) -> Option<StatusCode> {
    self.status
  }

  fn set_status(&mut self, status: StatusCode) {
    if self.body_started {
      warn!(
        "Ignoring status {status} set after the response body was written (status is {})",
        self.status.unwrap_or(StatusCode::OK)
      );
      return;
    }
    self.status = Some(status);
  }

  fn write_body(&mut self, bytes: &[u8]) {
    self.status.get_or_insert(StatusCode::OK);
    self.body_started = true;
    self.body.extend_from_slice(bytes);
  }
}

impl std::io::Write for ResponseCapture {
  fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
    self.write_body(buf);
    Ok(buf.len())
  }

  fn flush(&mut self) -> std::io::Result<()> {
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::{ResponseCapture, ResponseWriter};

  use aws_lambda_events::encodings::Body;
  use base64::Engine as _;
  use http::header::{CONTENT_TYPE, SET_COOKIE};
  use http::{HeaderValue, StatusCode};
  use pretty_assertions::assert_eq;

  use std::io::Write;

  fn body_text(body: &Option<Body>) -> &str {
    match body {
      Some(Body::Text(text)) => text.as_str(),
      other => panic!("expected text body, got {other:?}"),
    }
  }

  #[test]
  fn test_write_sets_default_status() {
    let mut response = ResponseCapture::new();
    response
      .headers_mut()
      .insert("h1", HeaderValue::from_static("v1"));
    assert_eq!(response.status(), None);

    response.write_body(b"hello");
    assert_eq!(response.status(), Some(StatusCode::OK));
    assert_eq!(response.body(), b"hello");
  }

  #[test]
  fn test_set_status() {
    let mut response = ResponseCapture::new();
    response.set_status(StatusCode::NOT_FOUND);
    response.set_status(StatusCode::GONE);
    assert_eq!(response.status(), Some(StatusCode::GONE));

    response.write_body(b"gone");
    assert_eq!(response.status(), Some(StatusCode::GONE));
  }

  #[test]
  fn test_set_status_after_write_is_ignored() {
    let mut response = ResponseCapture::new();
    write!(response, "partial").unwrap();
    response.set_status(StatusCode::INTERNAL_SERVER_ERROR);

    assert_eq!(response.status(), Some(StatusCode::OK));
    assert_eq!(response.into_api_gateway_response().status_code, 200);
  }

  #[test]
  fn test_unset_status() {
    let response = ResponseCapture::new().into_api_gateway_response();

    assert_eq!(response.status_code, 0);
    assert_eq!(body_text(&response.body), "");
    assert!(!response.is_base64_encoded);
  }

  #[test]
  fn test_header_partition() {
    let mut response = ResponseCapture::new();
    let headers = response.headers_mut();
    headers.insert("h1", HeaderValue::from_static("v1"));
    headers.append("multi", HeaderValue::from_static("v1"));
    headers.append("multi", HeaderValue::from_static("v2"));
    headers.append("multi", HeaderValue::from_static("v3"));
    headers.append(SET_COOKIE, HeaderValue::from_static("c1=val1"));
    headers.append(SET_COOKIE, HeaderValue::from_static("c2=val2"));
    response.write_body(b"hello world");

    let apigw_response = response.into_api_gateway_response();

    assert_eq!(apigw_response.status_code, 200);
    assert!(!apigw_response.is_base64_encoded);
    assert_eq!(body_text(&apigw_response.body), "hello world");

    assert_eq!(apigw_response.headers.len(), 1);
    assert_eq!(apigw_response.headers.get("h1").unwrap(), "v1");
    assert!(!apigw_response.multi_value_headers.contains_key("h1"));

    assert!(!apigw_response.headers.contains_key("multi"));
    assert_eq!(
      apigw_response
        .multi_value_headers
        .get_all("multi")
        .iter()
        .collect::<Vec<_>>(),
      vec!["v1", "v2", "v3"]
    );

    assert!(!apigw_response.headers.contains_key(SET_COOKIE));
    assert!(!apigw_response.multi_value_headers.contains_key(SET_COOKIE));
    assert_eq!(apigw_response.cookies, vec!["c1=val1", "c2=val2"]);
  }

  #[test]
  fn test_single_cookie_is_not_a_header() {
    let mut response = ResponseCapture::new();
    response
      .headers_mut()
      .insert(SET_COOKIE, HeaderValue::from_static("session=abc; HttpOnly"));

    let apigw_response = response.into_api_gateway_response();

    assert!(apigw_response.headers.is_empty());
    assert!(apigw_response.multi_value_headers.is_empty());
    assert_eq!(apigw_response.cookies, vec!["session=abc; HttpOnly"]);
  }

  #[test]
  fn test_non_utf8_cookie_is_dropped() {
    let mut response = ResponseCapture::new();
    let headers = response.headers_mut();
    headers.append(SET_COOKIE, HeaderValue::from_bytes(b"bad=\xff").unwrap());
    headers.append(SET_COOKIE, HeaderValue::from_static("good=1"));
    headers.append(SET_COOKIE, HeaderValue::from_str("caf\u{e9}=ol\u{e9}").unwrap());

    let apigw_response = response.into_api_gateway_response();

    assert!(!apigw_response.headers.contains_key(SET_COOKIE));
    assert!(!apigw_response.multi_value_headers.contains_key(SET_COOKIE));
    assert_eq!(apigw_response.cookies, vec!["good=1", "caf\u{e9}=ol\u{e9}"]);
  }

  #[test]
  fn test_utf8_body() {
    let mut response = ResponseCapture::new();
    response.set_status(StatusCode::CREATED);
    response.write_body("héllo ".as_bytes());
    response.write_body("wörld 🦀".as_bytes());

    let apigw_response = response.into_api_gateway_response();

    assert_eq!(apigw_response.status_code, 201);
    assert!(!apigw_response.is_base64_encoded);
    assert_eq!(body_text(&apigw_response.body).as_bytes(), "héllo wörld 🦀".as_bytes());
  }

  #[test]
  fn test_binary_body() {
    let bytes = [0xff, 0xfe, 0xc3, 0x28];

    let mut response = ResponseCapture::new();
    response
      .headers_mut()
      .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
    response.write_body(&bytes);

    let apigw_response = response.into_api_gateway_response();
    assert!(apigw_response.is_base64_encoded);
    match &apigw_response.body {
      Some(Body::Binary(binary)) => assert_eq!(binary, &bytes.to_vec()),
      other => panic!("expected binary body, got {other:?}"),
    }

    // The body is serialized as base64 on the wire.
    let json = serde_json::to_value(&apigw_response).unwrap();
    let wire_body = json["body"].as_str().unwrap();
    assert_eq!(
      base64::engine::general_purpose::STANDARD
        .decode(wire_body)
        .unwrap(),
      bytes.to_vec()
    );
  }
}
