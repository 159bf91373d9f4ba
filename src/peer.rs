//! Peer manager contract (consumed, optional) — the core only uses this as
//! a hint; every operation must succeed even when no peer manager is wired
//! (spec §6).

use crate::context::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionStrategy {
    Random,
    ClosestLatency,
    MostReliable,
}

#[derive(Debug, Clone)]
pub struct PeerSelectionCriteria {
    pub count: usize,
    pub prefer_randomizers: bool,
    pub strategy: SelectionStrategy,
}

impl Default for PeerSelectionCriteria {
    fn default() -> Self {
        Self { count: 1, prefer_randomizers: false, strategy: SelectionStrategy::Random }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PeerId(pub String);

/// An opaque "select peers matching criteria" service (spec §1, §6). The
/// core consumes this trait only; no implementation lives in this crate.
pub trait PeerManager: Send + Sync {
    fn select_peers(
        &self,
        ctx: &CancellationToken,
        purpose: &str,
        criteria: &PeerSelectionCriteria,
    ) -> Result<Vec<PeerId>, crate::error::Cancelled>;
}

/// The no-op manager used when none is configured; always returns an empty
/// peer list without error (spec §6: "operation must succeed even when no
/// peer manager is wired").
#[derive(Default)]
pub struct NoPeerManager;

impl PeerManager for NoPeerManager {
    fn select_peers(
        &self,
        ctx: &CancellationToken,
        _purpose: &str,
        _criteria: &PeerSelectionCriteria,
    ) -> Result<Vec<PeerId>, crate::error::Cancelled> {
        ctx.check()?;
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_peer_manager_returns_empty_list() {
        let manager = NoPeerManager;
        let ctx = CancellationToken::none();
        let peers = manager.select_peers(&ctx, "randomizer-fetch", &PeerSelectionCriteria::default()).unwrap();
        assert!(peers.is_empty());
    }
}
