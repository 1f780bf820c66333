#![doc = include_str!("../../README.md")]
#![warn(missing_docs)]

// These are documented public exports since handlers and the `RequestExt` trait depend on them.
pub use async_trait;
pub use aws_lambda_events::apigw::{
  ApiGatewayV2httpRequest, ApiGatewayV2httpRequestContextAuthorizerDescription,
  ApiGatewayV2httpResponse,
};
pub use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
pub use lambda_runtime::{Context as LambdaContext, LambdaEvent};

mod adapter;

pub use adapter::Adapter;

/// Error handling.
pub mod error;

pub use error::EventError;

mod ext;

pub use ext::RequestExt;

mod handler;

pub use handler::Handler;

mod request;

pub use request::RequestBody;

mod response;

pub use response::{ResponseCapture, ResponseWriter};

mod runtime;

pub use runtime::{run_adapter, run_lambda};

/// HTTP request passed to a [`Handler`].
pub type HttpRequest = http::Request<RequestBody>;
