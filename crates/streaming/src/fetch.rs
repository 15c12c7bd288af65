use formats::ObjectKey;

/// Identifies one outstanding part fetch.
///
/// `generation` is unique per request; a result is only accepted while the
/// cache slot it targets is still owned by the same generation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FetchToken {
    pub key: ObjectKey,
    pub part: u32,
    pub generation: u64,
}

impl FetchToken {
    pub fn id(&self) -> &str {
        &self.key.id
    }

    pub fn md5(&self) -> &str {
        &self.key.md5
    }
}

impl std::fmt::Display for FetchToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{} (gen {})", self.key, self.part, self.generation)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub token: FetchToken,
    pub layer: usize,
}

impl FetchRequest {
    /// Queue priority (smaller runs first): the interactive layer decodes first.
    pub fn priority(&self) -> i32 {
        self.layer.min(i32::MAX as usize) as i32
    }
}

/// What became of a fetch result handed back to the cache.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Accepted,
    StaleFetchDiscard,
}
