use crate::LambdaContext;

use aws_lambda_events::apigw::{
  ApiGatewayV2httpRequest, ApiGatewayV2httpRequestContextAuthorizerDescription,
};

use std::sync::Arc;

/// Request extension holding the API Gateway event that produced the request.
#[derive(Clone, Debug)]
pub(crate) struct OriginalEvent(pub Arc<ApiGatewayV2httpRequest>);

/// Access to the Amazon API Gateway and AWS Lambda metadata attached to an HTTP request built by
/// [`Adapter`](crate::Adapter).
///
/// This trait is implemented for both [`http::Request`] and [`http::request::Parts`], so the
/// metadata survives [`Request::into_parts`](http::Request::into_parts) and
/// [`Request::map`](http::Request::map). Requests that were not produced by the adapter (or that
/// were rebuilt without their extensions) return `None` from every method.
pub trait RequestExt {
  /// Return the original API Gateway event, if the request was built from one.
  ///
  /// The event carries gateway-specific metadata that has no place in a generic HTTP request,
  /// such as the stage, route key, and request ID. Note that the event's `body` is the raw
  /// (possibly base64-encoded) body as delivered by the API Gateway.
  fn api_gateway_event(&self) -> Option<&ApiGatewayV2httpRequest>;

  /// Return the Lambda execution context for the current invocation.
  ///
  /// The context's `deadline` should be observed by handlers that perform long-running work.
  fn lambda_context(&self) -> Option<&LambdaContext>;

  /// Return the authorizer description (e.g., JWT claims) attached by the API Gateway.
  fn authorizer(&self) -> Option<&ApiGatewayV2httpRequestContextAuthorizerDescription> {
    self
      .api_gateway_event()
      .and_then(|event| event.request_context.authorizer.as_ref())
  }
}

impl<B> RequestExt for http::Request<B> {
  fn api_gateway_event(&self) -> Option<&ApiGatewayV2httpRequest> {
    self.extensions().api_gateway_event()
  }

  fn lambda_context(&self) -> Option<&LambdaContext> {
    self.extensions().lambda_context()
  }
}

impl RequestExt for http::request::Parts {
  fn api_gateway_event(&self) -> Option<&ApiGatewayV2httpRequest> {
    self.extensions.api_gateway_event()
  }

  fn lambda_context(&self) -> Option<&LambdaContext> {
    self.extensions.lambda_context()
  }
}

impl RequestExt for http::Extensions {
  fn api_gateway_event(&self) -> Option<&ApiGatewayV2httpRequest> {
    self.get::<OriginalEvent>().map(|event| event.0.as_ref())
  }

  fn lambda_context(&self) -> Option<&LambdaContext> {
    self.get::<LambdaContext>()
  }
}

#[cfg(test)]
mod tests {
  use super::{OriginalEvent, RequestExt};
  use crate::LambdaContext;

  use aws_lambda_events::apigw::ApiGatewayV2httpRequest;
  use http::Request;
  use serde_json::json;

  use std::sync::Arc;

  #[test]
  fn test_unrelated_request() {
    let request = Request::builder().uri("/foo").body(()).unwrap();

    assert!(request.api_gateway_event().is_none());
    assert!(request.lambda_context().is_none());
    assert!(request.authorizer().is_none());
  }

  #[test]
  fn test_metadata_survives_into_parts() {
    let event: ApiGatewayV2httpRequest = serde_json::from_value(json!({
      "version": "2.0",
      "routeKey": "GET /foo",
      "rawPath": "/foo",
      "rawQueryString": "",
      "requestContext": {
        "authorizer": {
          "jwt": {
            "claims": { "sub": "user-123" },
            "scopes": ["read"]
          }
        },
        "domainName": "example.com",
        "http": {
          "method": "GET",
          "path": "/foo",
          "protocol": "HTTP/1.1",
          "sourceIp": "192.0.2.1",
          "userAgent": "agent"
        },
        "requestId": "request-id",
        "routeKey": "GET /foo",
        "stage": "$default",
        "timeEpoch": 1583348638390_i64
      },
      "isBase64Encoded": false
    }))
    .unwrap();

    let mut request = Request::builder().uri("/foo").body(()).unwrap();
    request
      .extensions_mut()
      .insert(OriginalEvent(Arc::new(event)));
    request.extensions_mut().insert(LambdaContext::default());

    let (parts, _) = request.into_parts();
    assert_eq!(
      parts
        .api_gateway_event()
        .and_then(|event| event.route_key.as_deref()),
      Some("GET /foo")
    );
    assert!(parts.lambda_context().is_some());

    assert!(parts
      .authorizer()
      .and_then(|authorizer| authorizer.jwt.as_ref())
      .is_some());
  }
}
