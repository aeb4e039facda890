//! Poll lifecycle: registry, store, scheduler, conclusion and recovery.

pub mod conclusion;
pub mod record;
pub mod recovery;
pub mod registry;
pub mod scheduler;
pub mod store;

pub use conclusion::{ConclusionEngine, VoteReactions};
pub use record::{PollOutcome, PollRecord, Tally};
pub use recovery::{Recovery, RecoveryReport};
pub use registry::PollRegistry;
pub use scheduler::{ExpiryHandler, PollScheduler};
pub use store::{PollStore, StoredPolls};
