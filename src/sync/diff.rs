// src/sync/diff.rs

use std::collections::HashSet;
use std::hash::Hash;

/// Элементы `ours`, ключа которых нет в `theirs`. Порядок `ours` сохраняется.
pub fn diff_by_key<'a, T, K, F>(ours: &'a [T], theirs: &[T], key: F) -> Vec<&'a T>
where
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    diff_by(ours, theirs, &key, &key)
}

/// То же для разнотипных снимков (например, строки хранилища против DN каталога)
pub fn diff_by<'a, A, B, K>(
    ours: &'a [A],
    theirs: &[B],
    our_key: impl Fn(&A) -> K,
    their_key: impl Fn(&B) -> K,
) -> Vec<&'a A>
where
    K: Eq + Hash,
{
    let present: HashSet<K> = theirs.iter().map(their_key).collect();
    ours.iter().filter(|item| !present.contains(&our_key(*item))).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Row {
        id: u32,
        dn: &'static str,
    }

    fn rows() -> Vec<Row> {
        vec![
            Row { id: 1, dn: "cn=root" },
            Row { id: 2, dn: "cn=eng,cn=root" },
            Row { id: 3, dn: "cn=ops,cn=root" },
        ]
    }

    #[test]
    fn returns_missing_in_input_order() {
        let ours = rows();
        let theirs = vec![Row { id: 9, dn: "cn=eng,cn=root" }];
        let missing = diff_by_key(&ours, &theirs, |r| r.dn);
        assert_eq!(missing.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 3]);
    }

    #[test]
    fn diff_with_itself_is_empty() {
        let ours = rows();
        assert!(diff_by_key(&ours, &ours, |r| r.dn).is_empty());
    }

    #[test]
    fn diff_with_empty_is_everything() {
        let ours = rows();
        let missing = diff_by_key(&ours, &[], |r| r.dn);
        assert_eq!(missing, ours.iter().collect::<Vec<_>>());
    }

    #[test]
    fn mixed_types_compare_by_derived_key() {
        let ours = rows();
        let theirs = vec!["CN=ROOT".to_string(), "cn=ops,cn=root".to_string()];
        let missing = diff_by(&ours, &theirs, |r| r.dn.to_lowercase(), |dn| dn.to_lowercase());
        assert_eq!(missing, vec![&ours[1]]);
    }
}
