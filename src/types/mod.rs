//! # Types Module
//!
//! Call parameters for the two backends.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`DispatchTarget`] | Primary or alternate backend, resolved once per call |
//! | [`PrimaryParams`] | Model, instructions, input, tools and reasoning for the responses API |
//! | [`AlternateParams`] | Path and opaque payload for the local model API |
//! | [`ToolChoice`] | Validated `tool_choice` value |
//! | [`ReasoningConfig`] | Reasoning effort and summary mode |

pub mod reasoning;
pub mod target;
pub mod tool;

pub use reasoning::{ReasoningConfig, ENCRYPTED_REASONING_INCLUDE};
pub use target::{AlternateParams, DispatchTarget, PrimaryParams, TargetKind};
pub use tool::ToolChoice;
