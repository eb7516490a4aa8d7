// Policy store implementations.

pub mod in_memory;
pub mod sqlite_policy_store;
pub mod unconfigured;

pub use in_memory::InMemoryPolicyStore;
pub use sqlite_policy_store::SqlitePolicyStore;
pub use unconfigured::UnconfiguredPolicyStore;
