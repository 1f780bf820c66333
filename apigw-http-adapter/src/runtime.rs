use crate::{Adapter, Handler};

use lambda_runtime::service_fn;

/// Start the Lambda runtime to handle API Gateway HTTP API events using the specified handler.
///
/// # Example
///
/// ```rust,ignore
/// use apigw_http_adapter::{run_lambda, HttpRequest, ResponseWriter};
///
/// #[tokio::main]
/// pub async fn main() {
///   env_logger::init();
///
///   run_lambda(|response: &mut dyn ResponseWriter, _request: HttpRequest| {
///     response.write_body(b"Hello, world!");
///   })
///   .await
/// }
/// ```
pub async fn run_lambda<H>(handler: H)
where
  H: Handler,
{
  run_adapter(Adapter::new(handler)).await
}

/// Start the Lambda runtime using a pre-configured [`Adapter`].
pub async fn run_adapter<H>(adapter: Adapter<H>)
where
  H: Handler,
{
  let adapter = &adapter;
  lambda_runtime::run(service_fn(move |event| adapter.invoke(event)))
    .await
    .expect("Lambda run loop should never exit")
}
