/// Lifecycle of one object part in the cache.
///
/// Missing → Requested → Decoding → Resident. A failed fetch or decode goes
/// back to Missing so the next reconcile asks for it again.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ResidencyState {
    Missing,
    Requested,
    Decoding,
    Resident,
}

/// Slot holding one part. In-flight states carry the generation of the fetch
/// that owns them; results from any other generation are stale.
#[derive(Debug)]
pub enum PartSlot<P> {
    Missing,
    Requested { generation: u64 },
    Decoding { generation: u64 },
    Resident(P),
}

impl<P> PartSlot<P> {
    pub fn state(&self) -> ResidencyState {
        match self {
            PartSlot::Missing => ResidencyState::Missing,
            PartSlot::Requested { .. } => ResidencyState::Requested,
            PartSlot::Decoding { .. } => ResidencyState::Decoding,
            PartSlot::Resident(_) => ResidencyState::Resident,
        }
    }

    /// Generation of the fetch currently owning this slot, if any.
    pub fn in_flight_generation(&self) -> Option<u64> {
        match self {
            PartSlot::Requested { generation } | PartSlot::Decoding { generation } => {
                Some(*generation)
            }
            PartSlot::Missing | PartSlot::Resident(_) => None,
        }
    }

    pub fn resident(&self) -> Option<&P> {
        match self {
            PartSlot::Resident(p) => Some(p),
            _ => None,
        }
    }

    pub fn into_resident(self) -> Option<P> {
        match self {
            PartSlot::Resident(p) => Some(p),
            _ => None,
        }
    }
}

impl<P> Default for PartSlot<P> {
    fn default() -> Self {
        PartSlot::Missing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_flight_generation_only_for_pending_slots() {
        assert_eq!(PartSlot::<u8>::Requested { generation: 3 }.in_flight_generation(), Some(3));
        assert_eq!(PartSlot::<u8>::Decoding { generation: 4 }.in_flight_generation(), Some(4));
        assert_eq!(PartSlot::Resident(1u8).in_flight_generation(), None);
        assert_eq!(PartSlot::<u8>::default().state(), ResidencyState::Missing);
    }
}
