//! Overload Matrix
//!
//! The ordered data set a template iterates over: one group per operation, each
//! holding the overloads of the operation's comparison operator. Group order is
//! the order operations were declared in, and overload order is table order, so
//! the generated file's section order never changes between runs.

use serde::ser::SerializeSeq;
use serde::{Serialize, Serializer};

use crate::overload::{Operation, Overload, OverloadTable};

/// One operation with its applicable overloads
#[derive(Debug, Clone)]
pub struct OverloadGroup {
    pub operation: Operation,
    pub overloads: Vec<Overload>,
}

/// Ordered sequence of overload groups
#[derive(Debug, Clone, Default)]
pub struct OverloadMatrix {
    groups: Vec<OverloadGroup>,
}

impl OverloadMatrix {
    /// Cross `operations` with their overloads from `table`
    pub fn build(operations: &[Operation], table: &OverloadTable) -> Self {
        let groups = operations
            .iter()
            .map(|op| OverloadGroup {
                operation: op.clone(),
                overloads: table.get(op.cmp).to_vec(),
            })
            .collect();
        Self { groups }
    }

    pub fn groups(&self) -> &[OverloadGroup] {
        &self.groups
    }

    /// Number of per-overload sections a template iterating the matrix renders
    pub fn section_count(&self) -> usize {
        self.groups.iter().map(|g| g.overloads.len()).sum()
    }
}

/// Template view of a group
#[derive(Serialize)]
struct GroupRecord<'a> {
    agg: &'a str,
    overloads: Vec<OverloadRecord<'a>>,
}

/// Template view of an overload; carries the operation name so `agg` resolves
/// inside the overload loop as well
#[derive(Serialize)]
struct OverloadRecord<'a> {
    agg: &'a str,
    #[serde(flatten)]
    overload: &'a Overload,
}

impl Serialize for OverloadMatrix {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.groups.len()))?;
        for group in &self.groups {
            let agg = group.operation.name.as_str();
            seq.serialize_element(&GroupRecord {
                agg,
                overloads: group
                    .overloads
                    .iter()
                    .map(|overload| OverloadRecord { agg, overload })
                    .collect(),
            })?;
        }
        seq.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overload::{CmpOp, TypeFamily};

    #[test]
    fn test_groups_follow_declared_order() {
        let table = OverloadTable::same_type_comparisons();
        let matrix = OverloadMatrix::build(&[Operation::max(), Operation::min()], &table);

        let names: Vec<&str> = matrix
            .groups()
            .iter()
            .map(|g| g.operation.name.as_str())
            .collect();
        assert_eq!(names, vec!["MAX", "MIN"]);
        assert!(matrix.groups()[0]
            .overloads
            .iter()
            .all(|o| o.cmp == CmpOp::Gt));
    }

    #[test]
    fn test_section_count_is_sum_of_overloads() {
        let table = OverloadTable::same_type_comparisons();
        let ops = [Operation::min(), Operation::max()];
        let matrix = OverloadMatrix::build(&ops, &table);

        let expected: usize = ops.iter().map(|op| table.get(op.cmp).len()).sum();
        assert_eq!(matrix.section_count(), expected);
    }

    #[test]
    fn test_missing_operator_gives_empty_group() {
        let matrix = OverloadMatrix::build(&[Operation::min()], &OverloadTable::new());
        assert_eq!(matrix.groups().len(), 1);
        assert_eq!(matrix.section_count(), 0);
    }

    #[test]
    fn test_serialized_view() {
        let mut table = OverloadTable::new();
        table.insert(Overload::new(CmpOp::Lt, TypeFamily::Int, Some(64)).unwrap());
        let matrix = OverloadMatrix::build(&[Operation::min()], &table);

        let json = serde_json::to_value(&matrix).unwrap();
        assert_eq!(json[0]["agg"], "MIN");
        assert_eq!(json[0]["overloads"][0]["agg"], "MIN");
        assert_eq!(json[0]["overloads"][0]["rust_type"], "i64");
        assert_eq!(json[0]["overloads"][0]["family"], "Int");
        assert_eq!(json[0]["overloads"][0]["width"], 64);
    }
}
