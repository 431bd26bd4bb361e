//! Order-insensitive digests of record sets.
//!
//! A background query captures the fingerprint of the live table before it
//! starts; its result is applied only if the live table still has the same
//! fingerprint when the update reaches the consumer.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Summary of a record set: count plus a wrapping sum and an xor of per-record
/// 64-bit digests. Both combiners are commutative, so iteration order does not
/// matter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Fingerprint {
    count: usize,
    sum: u64,
    xor: u64,
}

impl Fingerprint {
    /// Fingerprint of `(path, owner)` pairs.
    pub fn of_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        Self::from_digests(pairs.into_iter().map(|(path, owner)| {
            let mut hasher = DefaultHasher::new();
            path.hash(&mut hasher);
            owner.hash(&mut hasher);
            hasher.finish()
        }))
    }

    /// Fingerprint of a path set.
    pub fn of_paths<'a, I>(paths: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        Self::from_digests(paths.into_iter().map(|path| {
            let mut hasher = DefaultHasher::new();
            path.hash(&mut hasher);
            hasher.finish()
        }))
    }

    fn from_digests(digests: impl Iterator<Item = u64>) -> Self {
        digests.fold(Self::default(), |acc, digest| Self {
            count: acc.count + 1,
            sum: acc.sum.wrapping_add(digest),
            xor: acc.xor ^ digest,
        })
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}
