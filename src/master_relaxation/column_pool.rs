use std::slice::Iter;

use crate::instance::Tree;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct ColumnId(pub u32);

impl std::hash::Hash for ColumnId {
    fn hash<H: std::hash::Hasher>(&self, hasher: &mut H) {
        hasher.write_u32(self.0)
    }
}

impl nohash_hasher::IsEnabled for ColumnId {}

/// A tree generated for one request
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TreeColumn {
    pub request: usize,
    pub tree: Tree,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Column<ColumnType> {
    pub id: ColumnId,
    pub data: ColumnType,
}

/// Holds all columns generated so far.
/// The pool only grows; identical columns get distinct ids.
pub struct ColumnPool<ColumnType> {
    local_column_counter: u32,
    columns: Vec<Column<ColumnType>>,
}

impl<ColumnType> Default for ColumnPool<ColumnType> {
    fn default() -> Self {
        ColumnPool::new()
    }
}

impl<ColumnType> ColumnPool<ColumnType> {
    pub fn new() -> Self {
        ColumnPool {
            local_column_counter: 0,
            columns: Vec::new(),
        }
    }

    /// Total number of columns in pool
    pub fn count(&self) -> usize {
        self.columns.len()
    }

    /// Returns a specific column from the pool
    pub fn get_column(&self, id: ColumnId) -> &Column<ColumnType> {
        let column_at_index = &self.columns[id.0 as usize];

        // ids are handed out densely, so index and id must agree
        debug_assert_eq!(column_at_index.id.0, id.0);

        column_at_index
    }

    pub fn get_all_columns(&self) -> Iter<Column<ColumnType>> {
        self.columns.iter()
    }

    /// Adds a column to the column pool and returns its id
    pub fn add_column(&mut self, column_data: ColumnType) -> ColumnId {
        let id = ColumnId(self.local_column_counter);
        self.local_column_counter += 1;
        self.columns.push(Column { id, data: column_data });
        id
    }
}

impl ColumnPool<TreeColumn> {
    pub fn columns_for(&self, request: usize) -> impl Iterator<Item = &Column<TreeColumn>> {
        self.columns.iter().filter(move |c| c.data.request == request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicates_get_fresh_ids() {
        let mut pool = ColumnPool::new();
        let a = pool.add_column(TreeColumn { request: 0, tree: Tree::empty() });
        let b = pool.add_column(TreeColumn { request: 0, tree: Tree::empty() });
        let c = pool.add_column(TreeColumn { request: 1, tree: Tree::empty() });

        assert_ne!(a, b);
        assert_eq!(pool.count(), 3);
        assert_eq!(pool.get_column(c).data.request, 1);
        assert_eq!(pool.columns_for(0).count(), 2);
    }
}
