/// Process-wide singletons for chain and wallet state (SPEC_FULL.md §4.1, C1).
///
/// These live outside the HUD snapshot because they are shared with
/// collaborators that never see the HUD store directly (the wallet manager's
/// log consumer, health reporting). Each singleton exposes narrow `update*`
/// writers and a single `get` reader, following the "typed singletons with
/// narrow writers" guidance in §9.
pub mod chain_state;
pub mod wallet_state;

pub use chain_state::{ChainState, ChainStateView};
pub use wallet_state::{TokenStateUpdate, WalletState, WalletStateView};
