mod hashmap;

pub use hashmap::*;
