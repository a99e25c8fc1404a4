//! Packing of argument lists into nested tuples.
//!
//! Accessors accept their arguments either as a flat slice or as a single tuple value. Tuples
//! hold at most [`TUPLE_CHUNK`] items plus one trailing "rest" slot, which carries another
//! tuple with the remaining items. A ten-argument call therefore packs as
//! `(a0, .., a6, (a7, a8, a9))`.

use std::sync::Arc;

use crate::value::Value;

/// Number of items a single tuple level holds before nesting the rest
pub const TUPLE_CHUNK: usize = 7;

/// Packs a flat argument list into (possibly nested) tuple form
#[must_use]
pub fn pack(values: Vec<Value>) -> Value {
    if values.len() <= TUPLE_CHUNK {
        return Value::Tuple(Arc::from(values));
    }

    let mut head = values;
    let rest = head.split_off(TUPLE_CHUNK);
    head.push(pack(rest));
    Value::Tuple(Arc::from(head))
}

/// Flattens a packed tuple back into its argument list.
///
/// Returns `None` if `value` is not a tuple.
#[must_use]
pub fn unpack(value: &Value) -> Option<Vec<Value>> {
    let Value::Tuple(items) = value else {
        return None;
    };

    if items.len() <= TUPLE_CHUNK {
        return Some(items.to_vec());
    }

    let mut flat: Vec<Value> = items[..TUPLE_CHUNK].to_vec();
    flat.extend(unpack(&items[TUPLE_CHUNK])?);
    Some(flat)
}

/// The path of tuple indices leading to the flat argument `position`.
///
/// Every index but the last is the rest slot [`TUPLE_CHUNK`].
#[must_use]
pub fn path(position: usize) -> Vec<usize> {
    let depth = position / TUPLE_CHUNK;
    let mut path = vec![TUPLE_CHUNK; depth];
    path.push(position % TUPLE_CHUNK);
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ints(count: i32) -> Vec<Value> {
        (0..count).map(Value::I4).collect()
    }

    #[test]
    fn test_pack_small() {
        let packed = pack(ints(3));
        let Value::Tuple(items) = &packed else {
            panic!("expected tuple");
        };
        assert_eq!(items.len(), 3);
        assert_eq!(unpack(&packed).unwrap(), ints(3));
    }

    #[test]
    fn test_pack_nests_after_seven() {
        let packed = pack(ints(10));
        let Value::Tuple(items) = &packed else {
            panic!("expected tuple");
        };
        assert_eq!(items.len(), 8);

        let Value::Tuple(rest) = &items[7] else {
            panic!("expected rest tuple");
        };
        assert_eq!(rest.len(), 3);
        assert_eq!(rest[0], Value::I4(7));
    }

    #[test]
    fn test_exactly_eight_items() {
        let packed = pack(ints(8));
        assert_eq!(unpack(&packed).unwrap(), ints(8));
    }

    #[test]
    fn test_paths() {
        assert_eq!(path(0), vec![0]);
        assert_eq!(path(6), vec![6]);
        assert_eq!(path(7), vec![7, 0]);
        assert_eq!(path(15), vec![7, 7, 1]);
    }

    #[test]
    fn test_unpack_non_tuple() {
        assert!(unpack(&Value::I4(1)).is_none());
    }
}
