//! Conversation state machine: menus, link checks and program lookups.

pub mod engine;
pub mod input;
pub mod machine;
pub mod prompts;

pub use engine::{ConversationEngine, Outbound, TurnPlan, plan_turn};
pub use input::InputClass;
pub use machine::{Action, Transition, transition};
