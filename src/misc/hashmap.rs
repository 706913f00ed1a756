use std::collections::HashMap as OriginalHashMap;
use std::hash::BuildHasherDefault;
use twox_hash::XxHash64;
use nohash_hasher::IntMap;

/// Arbitrary HashMap using more performant hashing algorithm.
/// Used for structural keys such as node pairs and `(solution, scale)` tuples.
pub type FullHashMap<K, V> = OriginalHashMap<K, V, BuildHasherDefault<XxHash64>>;

/// HashMap for surrogate id types (`SolutionId`, `ColumnId`), hashed by identity
pub type HashMap<K, V> = IntMap<K, V>;
