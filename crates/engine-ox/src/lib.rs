//! Thin client for an OpenAI-compatible inference API
//!
//! This crate provides:
//! - A resource request dispatcher with async and blocking flavors
//! - Typed response objects that keep every server field reachable
//! - Streaming chat completions as lazy object streams
//! - Automatic retries while a model warms up
//! - Chat completion, moderation, fine-tune and file facades
//! - Syncing finished fine-tune jobs into an experiment tracker
//!
//! # Example
//!
//! ```rust,no_run
//! use engine_ox::{Client, RequestOptions};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::from_env()?;
//!
//!     let completion = client
//!         .chat_completions()
//!         .create(
//!             &json!({
//!                 "model": "gpt-3.5-turbo",
//!                 "messages": [{"role": "user", "content": "Hello, world!"}]
//!             }),
//!             &RequestOptions::default(),
//!         )
//!         .await?;
//!
//!     if let Some(chat) = completion.as_chat_completion() {
//!         println!("{}", chat.content().unwrap_or("No content"));
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod fine_tune_sync;
pub mod object;
pub mod resource;
pub mod resources;
pub mod retry;
pub mod stream;

pub use client::Client;
pub use config::{ApiType, Credentials, RequestOptions};
pub use fine_tune_sync::{
    ExistingRun, FileContent, FineTuneRun, FineTuneSync, JobOutcome, RunTracker, SkipReason,
    SyncError, SyncOptions, SyncReport,
};
pub use object::{ApiObject, ApiValue, ObjectKind, TransportMeta};
pub use resource::{EngineSegment, Params, ResourceDescriptor};
pub use resources::{ChatCompletion, File, FineTune, Moderation, ModerationInput, ModerationModel};
pub use retry::{Clock, SystemClock, WarmupRetry};
pub use stream::{BlockingObjectStream, ObjectStream};

// Re-export shared types from engine-ox-common
pub use engine_ox_common::{ApiErrorInfo, ErrorKind, HttpMethod, MultipartForm, RequestError};
