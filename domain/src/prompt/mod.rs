//! Prompt templates for each council stage

mod template;

pub use template::{Prompt, PromptTemplate};
