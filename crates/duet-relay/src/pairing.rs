//! Pair table: who streams to whom.
//!
//! The table itself is not synchronized; the lobby keeps it behind a single
//! lock so that whole pairing operations are serialized.

use duet_common::PlayerId;
use tracing::debug;

use crate::registry::Registry;

/// Two matched players, or one player waiting for a partner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pair {
    pub first: PlayerId,
    pub second: Option<PlayerId>,
}

impl Pair {
    pub fn singleton(player: PlayerId) -> Self {
        Self {
            first: player,
            second: None,
        }
    }

    pub fn contains(&self, player: PlayerId) -> bool {
        self.first == player || self.second == Some(player)
    }

    /// The co-member of `player`, if `player` is in this pair.
    pub fn partner_of(&self, player: PlayerId) -> Option<PlayerId> {
        if self.first == player {
            self.second
        } else if self.second == Some(player) {
            Some(self.first)
        } else {
            None
        }
    }
}

/// Which member of an open pair gets replaced by the newcomer.
enum OpenSlot {
    First,
    Second,
}

#[derive(Debug, Default)]
pub struct PairTable {
    pairs: Vec<Pair>,
}

impl PairTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pairs(&self) -> &[Pair] {
        &self.pairs
    }

    /// Put `player` into the first open pair, or into a new singleton group.
    /// Returns whether a partner was found.
    ///
    /// A pair is open when exactly one member is active and the other slot is
    /// empty or holds an inactive player. Members are locked in ascending
    /// identity order while their activity is read.
    pub async fn assign_partner(&mut self, registry: &Registry, player: PlayerId) -> bool {
        self.detach(player);

        for pair in &mut self.pairs {
            let slot = match pair.second {
                None => registry.is_active(pair.first).await.then_some(OpenSlot::Second),
                Some(second) => match registry.lock_both(pair.first, second).await {
                    Some((first, second)) => match (first.active, second.active) {
                        (true, false) => Some(OpenSlot::Second),
                        (false, true) => Some(OpenSlot::First),
                        _ => None,
                    },
                    None => None,
                },
            };

            match slot {
                Some(OpenSlot::Second) => {
                    debug!(player = %player, partner = %pair.first, "Filled open pair");
                    pair.second = Some(player);
                    return true;
                }
                Some(OpenSlot::First) => {
                    // `second` is the active member; keep it first.
                    pair.first = pair.second.take().unwrap_or(player);
                    pair.second = Some(player);
                    debug!(player = %player, partner = %pair.first, "Filled open pair");
                    return true;
                }
                None => {}
            }
        }

        self.pairs.push(Pair::singleton(player));
        false
    }

    /// Linear scan for the co-member of `player`.
    pub fn get_partner(&self, player: PlayerId) -> Option<PlayerId> {
        self.pairs.iter().find_map(|pair| pair.partner_of(player))
    }

    /// Whether `player` is recorded in any pair.
    pub fn contains(&self, player: PlayerId) -> bool {
        self.pairs.iter().any(|pair| pair.contains(player))
    }

    /// Remove `player` from its pair, returning the former partner. A partner
    /// left behind becomes a singleton group; a pair left empty is dropped.
    pub fn detach(&mut self, player: PlayerId) -> Option<PlayerId> {
        let index = self.pairs.iter().position(|pair| pair.contains(player))?;
        let pair = &mut self.pairs[index];
        let partner = pair.partner_of(player);

        if pair.second == Some(player) {
            pair.second = None;
        } else if let Some(second) = pair.second.take() {
            pair.first = second;
        } else {
            self.pairs.remove(index);
        }
        partner
    }

    #[cfg(test)]
    pub(crate) fn from_pairs(pairs: Vec<Pair>) -> Self {
        Self { pairs }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn registry_with_active(capacity: u32, active: u32) -> Registry {
        let registry = Registry::new(capacity);
        for _ in 0..active {
            registry.acquire_free_slot().await.unwrap();
        }
        registry
    }

    #[tokio::test]
    async fn two_joins_are_paired() {
        let registry = registry_with_active(2, 2).await;
        let mut table = PairTable::new();

        assert!(!table.assign_partner(&registry, PlayerId(1)).await);
        assert!(table.assign_partner(&registry, PlayerId(2)).await);

        assert_eq!(table.get_partner(PlayerId(1)), Some(PlayerId(2)));
        assert_eq!(table.get_partner(PlayerId(2)), Some(PlayerId(1)));
        assert_eq!(table.pairs().len(), 1);
    }

    #[tokio::test]
    async fn partner_relation_is_symmetric() {
        let registry = registry_with_active(6, 6).await;
        let mut table = PairTable::new();
        for id in 1..=5 {
            table.assign_partner(&registry, PlayerId(id)).await;
        }

        for a in 1..=6 {
            for b in 1..=6 {
                let a = PlayerId(a);
                let b = PlayerId(b);
                assert_eq!(
                    table.get_partner(a) == Some(b),
                    table.get_partner(b) == Some(a)
                );
            }
        }
        assert_eq!(table.get_partner(PlayerId(5)), None);
        assert!(table.contains(PlayerId(5)));
        assert!(!table.contains(PlayerId(6)));
    }

    #[tokio::test]
    async fn first_fit_prefers_older_group() {
        let registry = registry_with_active(3, 3).await;
        let mut table = PairTable::from_pairs(vec![
            Pair::singleton(PlayerId(1)),
            Pair::singleton(PlayerId(2)),
        ]);

        assert!(table.assign_partner(&registry, PlayerId(3)).await);
        assert_eq!(table.get_partner(PlayerId(3)), Some(PlayerId(1)));
        assert_eq!(table.get_partner(PlayerId(2)), None);
    }

    #[tokio::test]
    async fn inactive_member_makes_pair_open() {
        let registry = registry_with_active(4, 3).await;
        registry.release(PlayerId(1)).await.unwrap();
        // 1 went away without being detached; 2 is waiting alone.
        let mut table = PairTable::from_pairs(vec![Pair {
            first: PlayerId(1),
            second: Some(PlayerId(2)),
        }]);

        assert!(table.assign_partner(&registry, PlayerId(3)).await);
        assert_eq!(
            table.pairs(),
            &[Pair {
                first: PlayerId(2),
                second: Some(PlayerId(3)),
            }]
        );
        assert!(!table.contains(PlayerId(1)));
    }

    #[tokio::test]
    async fn full_pairs_are_skipped() {
        let registry = registry_with_active(3, 3).await;
        let mut table = PairTable::new();
        table.assign_partner(&registry, PlayerId(1)).await;
        table.assign_partner(&registry, PlayerId(2)).await;

        assert!(!table.assign_partner(&registry, PlayerId(3)).await);
        assert_eq!(table.pairs().len(), 2);
        assert_eq!(table.pairs()[1], Pair::singleton(PlayerId(3)));
    }

    #[tokio::test]
    async fn singleton_with_inactive_member_is_not_open() {
        let registry = registry_with_active(2, 2).await;
        registry.release(PlayerId(1)).await.unwrap();
        let mut table = PairTable::from_pairs(vec![Pair::singleton(PlayerId(1))]);

        assert!(!table.assign_partner(&registry, PlayerId(2)).await);
        assert_eq!(table.pairs().len(), 2);
    }

    #[tokio::test]
    async fn rejoining_slot_is_never_in_two_pairs() {
        let registry = registry_with_active(2, 2).await;
        let mut table = PairTable::new();
        table.assign_partner(&registry, PlayerId(1)).await;
        table.assign_partner(&registry, PlayerId(2)).await;

        // Slot 1 is recycled and assigned again while still recorded.
        registry.release(PlayerId(1)).await.unwrap();
        registry.acquire_free_slot().await.unwrap();
        assert!(table.assign_partner(&registry, PlayerId(1)).await);

        let memberships = table
            .pairs()
            .iter()
            .filter(|pair| pair.contains(PlayerId(1)))
            .count();
        assert_eq!(memberships, 1);
        assert_eq!(table.get_partner(PlayerId(1)), Some(PlayerId(2)));
    }

    #[test]
    fn detach_promotes_remaining_member() {
        let mut table = PairTable::from_pairs(vec![Pair {
            first: PlayerId(1),
            second: Some(PlayerId(2)),
        }]);

        assert_eq!(table.detach(PlayerId(1)), Some(PlayerId(2)));
        assert_eq!(table.pairs(), &[Pair::singleton(PlayerId(2))]);

        assert_eq!(table.detach(PlayerId(2)), None);
        assert!(table.pairs().is_empty());

        assert_eq!(table.detach(PlayerId(3)), None);
    }

    #[test]
    fn pair_partner_lookup() {
        let pair = Pair {
            first: PlayerId(4),
            second: Some(PlayerId(7)),
        };
        assert_eq!(pair.partner_of(PlayerId(4)), Some(PlayerId(7)));
        assert_eq!(pair.partner_of(PlayerId(7)), Some(PlayerId(4)));
        assert_eq!(pair.partner_of(PlayerId(1)), None);
        assert_eq!(Pair::singleton(PlayerId(4)).partner_of(PlayerId(4)), None);
    }
}
