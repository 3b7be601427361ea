//! Inference client adapter implementations.

mod http_client;
pub mod mock_inference;

pub use http_client::HttpInferenceClient;
pub use mock_inference::{MockInference, MockOp};
