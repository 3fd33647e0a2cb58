/// RPC capability set: HTTP client trait plus pubsub reconnect supervisor
/// (SPEC_FULL.md §4.2, C2).
pub mod backoff;
pub mod client;
pub mod pubsub;

pub use backoff::BackoffPolicy;
pub use client::{PageResult, RawTokenAccount, RpcApi, SolanaRpcClient};
pub use pubsub::{
    run_account_subscription, run_logs_subscription, run_slot_subscription, NoopObserver,
    PubsubEvent, SupervisorObserver,
};
