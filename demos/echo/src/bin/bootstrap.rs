use apigw_http_adapter::run_lambda;
use echo::EchoApi;

#[tokio::main]
pub async fn main() {
  // TIP: Use the `log4rs` crate for more fine-grained control over logging.
  env_logger::init();

  run_lambda(EchoApi::new()).await
}
