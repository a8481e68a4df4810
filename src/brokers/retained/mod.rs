pub mod topic;
pub mod trie;
pub mod errors;
pub mod store;
pub mod snapshot;
pub mod summary;
pub mod state_machine;

pub use errors::RetainedError;
pub use store::RetainedStore;
pub use state_machine::{RetainedMsgStateMachine, NULL_PAYLOAD};
pub use trie::TopicTrie;
