//! Table-alias allocation: every layer of the composed query gets a fresh,
//! stable, predictable alias so generated SQL is deterministic across runs.

pub struct AliasAllocator {
    next: usize,
}

impl AliasAllocator {
    pub fn new() -> Self {
        AliasAllocator { next: 0 }
    }

    /// Returns the next `___t<n>` alias and advances the counter.
    pub fn next(&mut self) -> String {
        let alias = format!("___t{}", self.next);
        self.next += 1;
        alias
    }
}

impl Default for AliasAllocator {
    fn default() -> Self {
        Self::new()
    }
}
