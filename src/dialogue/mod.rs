//! Dialogue engine: conversation state, intent rules, button actions,
//! fixtures, and the orchestrator that turns input into scripts.

pub mod action;
pub mod fixtures;
pub mod intent;
pub mod orchestrator;
pub mod script;
pub mod state;

pub use action::ButtonAction;
pub use fixtures::Fixtures;
pub use intent::{Intent, IntentRules};
pub use orchestrator::Orchestrator;
pub use script::{Script, ScriptStep, StepAction};
pub use state::{CardBrand, ConversationState, PendingAction, Step};
