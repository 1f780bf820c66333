use crate::{HttpRequest, ResponseWriter};

use async_trait::async_trait;

/// Generic HTTP request handler.
///
/// A handler receives the request built from the API Gateway event along with a
/// [`ResponseWriter`], and produces its response by writing to it. The adapter awaits
/// [`serve`](Handler::serve) to completion before converting the response, so handlers must
/// not retain the writer or continue writing in the background after returning.
///
/// This trait is intended to be used with the [`#[async_trait]`](async_trait::async_trait)
/// attribute. Synchronous handlers can simply be closures, which implement this trait:
///
/// ```rust
/// use apigw_http_adapter::{Adapter, HttpRequest, ResponseWriter, StatusCode};
///
/// let _adapter = Adapter::new(|response: &mut dyn ResponseWriter, request: HttpRequest| {
///   response.set_status(StatusCode::OK);
///   response.write_body(request.uri().path().as_bytes());
/// });
/// ```
#[async_trait]
pub trait Handler: Send + Sync {
  /// Handle a single request.
  async fn serve(&self, response: &mut dyn ResponseWriter, request: HttpRequest);
}

#[async_trait]
impl<F> Handler for F
where
  F: Fn(&mut dyn ResponseWriter, HttpRequest) + Send + Sync,
{
  async fn serve(&self, response: &mut dyn ResponseWriter, request: HttpRequest) {
    self(response, request)
  }
}
