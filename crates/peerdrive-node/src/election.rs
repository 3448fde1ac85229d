//! Master election.
//!
//! Every device of a user computes the master from its own directory snapshot
//! with no messages exchanged: the smallest address wins. Devices holding the
//! same snapshot therefore always agree.

use peerdrive_dht::PeerAddress;

/// Pick the master among `candidates`. `None` for an empty set.
pub fn elect_master<'a>(candidates: impl IntoIterator<Item = &'a PeerAddress>) -> Option<&'a PeerAddress> {
    candidates.into_iter().min()
}

/// Whether `own` wins the election among `candidates`.
pub fn is_master<'a>(own: &PeerAddress, candidates: impl IntoIterator<Item = &'a PeerAddress>) -> bool {
    elect_master(candidates) == Some(own)
}

#[cfg(test)]
mod tests {
    use super::*;
    use peerdrive_dht::PeerId;
    use proptest::prelude::*;

    fn addr(id: u8, port: u16) -> PeerAddress {
        PeerAddress::new(
            PeerId::from_bytes([id; 32]),
            format!("10.0.0.1:{port}").parse().unwrap(),
        )
    }

    #[test]
    fn test_empty_has_no_master() {
        let none: [PeerAddress; 0] = [];
        assert!(elect_master(&none).is_none());
        assert!(!is_master(&addr(1, 1), &none));
    }

    #[test]
    fn test_peer_id_decides_before_socket() {
        let candidates = [addr(2, 1), addr(1, 9000)];
        assert_eq!(elect_master(&candidates), Some(&addr(1, 9000)));
    }

    #[test]
    fn test_same_id_falls_back_to_socket() {
        let candidates = [addr(1, 9001), addr(1, 9000)];
        assert!(is_master(&addr(1, 9000), &candidates));
    }

    proptest! {
        #[test]
        fn prop_order_independent(ids in proptest::collection::vec(any::<u8>(), 1..16), rotate in 0usize..16) {
            let forward: Vec<PeerAddress> = ids.iter().map(|id| addr(*id, 9400)).collect();
            let mut rotated = forward.clone();
            let len = rotated.len();
            rotated.rotate_left(rotate % len);
            rotated.reverse();

            prop_assert_eq!(elect_master(&forward), elect_master(&rotated));
        }

        #[test]
        fn prop_exactly_one_master(ids in proptest::collection::btree_set(any::<u8>(), 1..16)) {
            let candidates: Vec<PeerAddress> = ids.iter().map(|id| addr(*id, 9400)).collect();
            let masters = candidates.iter().filter(|c| is_master(c, &candidates)).count();
            prop_assert_eq!(masters, 1);
        }
    }
}
