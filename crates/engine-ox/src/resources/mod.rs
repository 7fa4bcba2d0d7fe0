//! Resource facades.
//!
//! Each facade borrows a [`crate::Client`] and fixes the resource path,
//! engine placement and object tag for its calls.

mod chat_completion;
mod file;
mod fine_tune;
mod moderation;

pub use chat_completion::ChatCompletion;
pub use file::File;
pub use fine_tune::FineTune;
pub use moderation::{Moderation, ModerationInput, ModerationModel};
