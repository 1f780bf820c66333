use apigw_http_adapter::async_trait::async_trait;
use apigw_http_adapter::{
  Handler, HeaderName, HttpRequest, Method, RequestExt, ResponseWriter, StatusCode,
};
use headers::authorization::Bearer;
use headers::{Authorization, ContentType, Header, HeaderMapExt};
use log::{error, info};
use serde_json::json;
use thiserror::Error;

use std::io::Read;

/// Example handler error type.
#[derive(Debug, Error)]
pub enum HandlerError {
  #[error("missing bearer token")]
  BearerTokenRequired,
  #[error("invalid bearer token")]
  InvalidBearerToken,
  #[error("no route for {0} {1}")]
  NotFound(Method, String),
  #[error("failed to read request body")]
  RequestBody(#[source] std::io::Error),
  #[error("failed to parse request header `{0}`")]
  RequestHeaderParse(HeaderName),
}

impl HandlerError {
  fn status(&self) -> StatusCode {
    match self {
      HandlerError::BearerTokenRequired | HandlerError::InvalidBearerToken => {
        StatusCode::UNAUTHORIZED
      }
      HandlerError::NotFound(_, _) => StatusCode::NOT_FOUND,
      HandlerError::RequestBody(_) => StatusCode::INTERNAL_SERVER_ERROR,
      HandlerError::RequestHeaderParse(_) => StatusCode::BAD_REQUEST,
    }
  }

  /// Write a plaintext error response.
  pub fn respond(self, response: &mut dyn ResponseWriter) {
    let status = self.status();
    error!("Responding with error status {status}: {self}");

    response.set_status(status);
    response.headers_mut().typed_insert(ContentType::text());
    response.write_body(self.to_string().as_bytes());
  }
}

/// Example API with three routes:
///  * `GET /whoami` returns the API Gateway request metadata.
///  * `POST /echo` returns the request body (text or binary) and sets each request cookie on the
///    response.
///  * `GET /private` requires a bearer token.
#[derive(Debug, Default)]
pub struct EchoApi {}

impl EchoApi {
  pub fn new() -> Self {
    Self::default()
  }

  fn whoami(
    &self,
    response: &mut dyn ResponseWriter,
    request: &HttpRequest,
  ) -> Result<(), HandlerError> {
    let event = request.api_gateway_event();
    let body = json!({
      "method": request.method().as_str(),
      "uri": request.uri().to_string(),
      "requestId": event.and_then(|event| event.request_context.request_id.as_deref()),
      "stage": event.and_then(|event| event.request_context.stage.as_deref()),
      "authenticated": request.authorizer().and_then(|authorizer| authorizer.jwt.as_ref()).is_some(),
      "lambdaRequestId": request.lambda_context().map(|context| context.request_id.as_str()),
    });

    response.headers_mut().typed_insert(ContentType::json());
    response.write_body(body.to_string().as_bytes());
    Ok(())
  }

  fn echo(
    &self,
    response: &mut dyn ResponseWriter,
    mut request: HttpRequest,
  ) -> Result<(), HandlerError> {
    let mut body = Vec::new();
    request
      .body_mut()
      .read_to_end(&mut body)
      .map_err(HandlerError::RequestBody)?;

    if let Some(content_type) = request.headers().typed_get::<ContentType>() {
      response.headers_mut().typed_insert(content_type);
    }
    for cookie in request.headers().get_all(headers::Cookie::name()) {
      response
        .headers_mut()
        .append(headers::SetCookie::name(), cookie.clone());
    }

    response.write_body(&body);
    Ok(())
  }

  fn private(
    &self,
    response: &mut dyn ResponseWriter,
    request: &HttpRequest,
  ) -> Result<(), HandlerError> {
    let name = Authorization::<Bearer>::name();
    if !request.headers().contains_key(name) {
      return Err(HandlerError::BearerTokenRequired);
    }
    let bearer = request
      .headers()
      .typed_get::<Authorization<Bearer>>()
      .ok_or_else(|| HandlerError::RequestHeaderParse(name.to_owned()))?;

    // PLACEHOLDER ONLY: be sure to parse/validate/lookup the bearer token as appropriate for the
    // type of authentication used for your api.
    if bearer.token() != "foobar" {
      return Err(HandlerError::InvalidBearerToken);
    }

    response.set_status(StatusCode::OK);
    response.headers_mut().typed_insert(ContentType::text());
    response.write_body(b"welcome");
    Ok(())
  }
}

#[async_trait]
impl Handler for EchoApi {
  async fn serve(&self, response: &mut dyn ResponseWriter, request: HttpRequest) {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    info!("{method} {path}");

    let result = match (&method, path.as_str()) {
      (&Method::GET, "/whoami") => self.whoami(response, &request),
      (&Method::POST, "/echo") => self.echo(response, request),
      (&Method::GET, "/private") => self.private(response, &request),
      _ => Err(HandlerError::NotFound(method, path)),
    };

    if let Err(err) = result {
      err.respond(response);
    }
  }
}
