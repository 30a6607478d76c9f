//! The chat bot that runs behind the leader lock: transport, conversation
//! handling, activity bookkeeping, and the update loop that only runs while
//! this process holds leadership.

pub mod activity;
pub mod conversation;
pub mod dispatcher;
pub mod messages;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;
