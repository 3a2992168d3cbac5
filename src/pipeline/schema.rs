//! Append-only column schema for one run

use indexmap::IndexSet;

/// Ordered set of distinct column names.
///
/// Columns are appended the first time they are observed and keep their
/// position for the rest of the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaAccumulator {
    columns: IndexSet<String>,
}

impl SchemaAccumulator {
    /// Start a schema whose first column is the reserved host column
    pub fn new(host_column: &str) -> Self {
        let mut columns = IndexSet::new();
        columns.insert(host_column.to_string());
        Self { columns }
    }

    /// Append each unseen name; seen names are left in place
    pub fn observe<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for name in names {
            let name = name.as_ref();
            if !self.columns.contains(name) {
                self.columns.insert(name.to_string());
            }
        }
    }

    /// Position of a column, observing it first if unseen
    pub fn resolve(&mut self, name: &str) -> usize {
        match self.columns.get_index_of(name) {
            Some(index) => index,
            None => self.columns.insert_full(name.to_string()).0,
        }
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.get_index_of(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.columns.contains(name)
    }

    /// Column names in position order
    pub fn current_order(&self) -> Vec<String> {
        self.columns.iter().cloned().collect()
    }

    /// Number of columns observed so far
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn into_header(self) -> Vec<String> {
        self.columns.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_with_host_column() {
        let schema = SchemaAccumulator::new("Input Host");
        assert_eq!(schema.current_order(), vec!["Input Host"]);
        assert_eq!(schema.width(), 1);
    }

    #[test]
    fn observe_appends_only_unseen() {
        let mut schema = SchemaAccumulator::new("Input Host");
        schema.observe(["A", "B"]);
        schema.observe(["B", "C", "A"]);

        assert_eq!(schema.current_order(), vec!["Input Host", "A", "B", "C"]);
    }

    #[test]
    fn positions_never_move() {
        let mut schema = SchemaAccumulator::new("Input Host");
        schema.observe(["A", "B"]);
        let before: Vec<_> = ["A", "B"].iter().map(|c| schema.position(c)).collect();

        for i in 0..50 {
            schema.observe([format!("extra {i}"), "A".to_string()]);
        }

        let after: Vec<_> = ["A", "B"].iter().map(|c| schema.position(c)).collect();
        assert_eq!(before, after);
        assert_eq!(schema.position("extra 49"), Some(52));
    }

    #[test]
    fn resolve_appends_unknown_column() {
        let mut schema = SchemaAccumulator::new("Input Host");
        schema.observe(["A"]);

        assert_eq!(schema.resolve("A"), 1);
        assert_eq!(schema.resolve("Late"), 2);
        assert!(schema.contains("Late"));
        assert_eq!(schema.width(), 3);
    }
}
