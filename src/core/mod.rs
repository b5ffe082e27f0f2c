//! Conversation core: the system prompt and the per-turn dispatch loop.

pub mod agent;
pub mod dispatch;
