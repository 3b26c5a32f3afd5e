//! # MedVision Foundation
//!
//! Foundation layer for the MedVision assistant. The crate currently
//! provides the [`dispatch`] module: the upstream model dispatcher that
//! resolves one chat-completion request into one normalized reply across
//! several interchangeable, unreliable model endpoints, via ordered
//! sequential fallback or all-at-once racing.
//!
//! ## Getting Started
//!
//! Set your API key in the `OPENROUTER_API_KEY` environment variable.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use medvision_foundation::dispatch::{
//!     ChatMessage, DispatchRequest, DispatchStrategy, Dispatcher, EndpointSet,
//!     OpenRouterExecutor,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let executor = Arc::new(OpenRouterExecutor::try_from_env()?);
//! let dispatcher = Dispatcher::new(
//!     executor,
//!     EndpointSet::openrouter_free_tier(),
//!     DispatchStrategy::from_env(),
//! );
//!
//! let request = DispatchRequest::new(vec![
//!     ChatMessage::system("You are a helpful medical information assistant."),
//!     ChatMessage::user("What is hypertension?"),
//! ]);
//! let reply = dispatcher.dispatch(&request).await?;
//! println!("{:?}", reply);
//! # Ok(())
//! # }
//! ```

pub mod dispatch;

pub use dispatch::{DispatchError, DispatchResult, Dispatcher, NormalizedReply};
