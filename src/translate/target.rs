//! Dotted Graphite targets to Prometheus label identities and back.
//!
//! A metric stored as `h.v1.v2` lives in the backend as the series
//! `h{__h_g1__="v1", __h_g2__="v2"}`. Hyphens in the head are mapped to
//! underscores first, since `-` is not a legal label-name rune.

use std::collections::HashMap;

use super::glob::{glob_to_regex, GlobError};
use crate::mateql::{LabelFilter, NAME_LABEL};

/// Synthetic label carrying the value of the i-th Graphite segment.
pub fn label_name(head: &str, i: usize) -> String {
    format!("__{head}_g{i}__")
}

fn transliterate(segment: &str) -> String {
    segment.replace('-', "_")
}

/// Convert a dotted target into its head and label filters.
///
/// Plain segments become equality filters, glob segments regex filters and
/// `*` segments no filter at all. With `terminal` set, a trailing
/// `__h_gN__=""` fence pins the series depth to exactly N groups, which
/// render needs and find must avoid (it enumerates children).
pub fn convert_target(
    query: &str,
    terminal: bool,
) -> Result<(String, Vec<LabelFilter>), GlobError> {
    let segments: Vec<&str> = query.split('.').collect();
    let head = transliterate(segments[0]);

    let mut filters = Vec::with_capacity(segments.len());
    for (i, segment) in segments.iter().enumerate().skip(1) {
        if *segment == "*" {
            continue;
        }
        let (value, is_regex) = glob_to_regex(segment)?;
        filters.push(if is_regex {
            LabelFilter::regexp(label_name(&head, i), value)
        } else {
            LabelFilter::equal(label_name(&head, i), value)
        });
    }
    if terminal {
        filters.push(LabelFilter::equal(label_name(&head, segments.len()), ""));
    }

    Ok((head, filters))
}

/// Render `{__name__="head",f1,f2,…}` for the backend. Values are written
/// raw; they are regex bodies or plain segments, never quoted content.
pub fn build_selector(head: &str, filters: &[LabelFilter]) -> String {
    let mut selector = String::with_capacity(64);
    selector.push_str("{__name__=\"");
    selector.push_str(head);
    selector.push('"');
    for filter in filters {
        selector.push(',');
        selector.push_str(&filter.label);
        if filter.is_regexp {
            selector.push_str("=~\"");
        } else if filter.is_negative {
            selector.push_str("!=\"");
        } else {
            selector.push_str("=\"");
        }
        selector.push_str(&filter.value);
        selector.push('"');
    }
    selector.push('}');
    selector
}

/// Locate the label whose distinct values enumerate the next hierarchy
/// level of a find target. Returns (prefix, label, fast); `fast` means a
/// one-segment prefix, where the backend can list label values without a
/// match selector.
pub fn next_level(query: &str) -> (String, String, bool) {
    let segments: Vec<&str> = query.split('.').collect();
    let head = transliterate(segments[0]);

    let mut prefix = head.clone();
    for segment in segments.iter().take(segments.len() - 1).skip(1) {
        prefix.push('.');
        prefix.push_str(segment);
    }
    prefix.push('.');

    (
        prefix,
        label_name(&head, segments.len() - 1),
        segments.len() == 2,
    )
}

/// Rebuild the dotted name from a returned label set.
///
/// A `__name__` that disagrees with the expected head marks a backend
/// error reply; the empty string tells the caller to drop the series.
pub fn metric_to_target(head: &str, metric: &HashMap<String, String>) -> String {
    if let Some(name) = metric.get(NAME_LABEL) {
        if name != head {
            return String::new();
        }
    }

    let mut target = String::from(head);
    let mut i = 1;
    while let Some(value) = metric.get(&label_name(head, i)) {
        target.push('.');
        target.push_str(value);
        i += 1;
    }
    target
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn plain_target() {
        let (head, filters) = convert_target("a.b.c", false).unwrap();
        assert_eq!(head, "a");
        assert_eq!(
            filters,
            vec![
                LabelFilter::equal("__a_g1__", "b"),
                LabelFilter::equal("__a_g2__", "c"),
            ]
        );
    }

    #[test]
    fn terminal_fence() {
        let (head, filters) = convert_target("a.b.c", true).unwrap();
        assert_eq!(head, "a");
        assert_eq!(
            filters,
            vec![
                LabelFilter::equal("__a_g1__", "b"),
                LabelFilter::equal("__a_g2__", "c"),
                LabelFilter::equal("__a_g3__", ""),
            ]
        );
    }

    #[test]
    fn wildcard_omits_filter() {
        let (head, filters) = convert_target("a.*.c", false).unwrap();
        assert_eq!(head, "a");
        assert_eq!(filters, vec![LabelFilter::equal("__a_g2__", "c")]);
    }

    #[test]
    fn hyphenated_head_transliterates() {
        let (head, filters) = convert_target("a-a.*.c", false).unwrap();
        assert_eq!(head, "a_a");
        assert_eq!(filters, vec![LabelFilter::equal("__a_a_g2__", "c")]);
    }

    #[test]
    fn glob_segment_becomes_regex_filter() {
        let (_, filters) = convert_target("a.host{1,2}.c", false).unwrap();
        assert_eq!(
            filters,
            vec![
                LabelFilter::regexp("__a_g1__", "host(1|2)"),
                LabelFilter::equal("__a_g2__", "c"),
            ]
        );
    }

    #[test]
    fn bad_glob_is_an_error() {
        assert!(convert_target("a.host{1,2", false).is_err());
    }

    #[test]
    fn selector_rendering() {
        let filters = vec![
            LabelFilter::equal("g1", "v1"),
            LabelFilter::regexp("g2", "v2"),
            LabelFilter {
                label: "g3".to_string(),
                value: "v3".to_string(),
                is_regexp: false,
                is_negative: true,
            },
        ];
        assert_eq!(
            build_selector("name", &filters),
            r#"{__name__="name",g1="v1",g2=~"v2",g3!="v3"}"#
        );
    }

    #[test]
    fn next_level_slow_path() {
        let (prefix, label, fast) = next_level("a.b.*");
        assert_eq!(prefix, "a.b.");
        assert_eq!(label, "__a_g2__");
        assert!(!fast);
    }

    #[test]
    fn next_level_fast_path() {
        let (prefix, label, fast) = next_level("a.*");
        assert_eq!(prefix, "a.");
        assert_eq!(label, "__a_g1__");
        assert!(fast);
    }

    #[test]
    fn reconstruction() {
        let mut metric = HashMap::new();
        metric.insert("__a_g1__".to_string(), "b".to_string());
        metric.insert("__a_g2__".to_string(), "c".to_string());
        assert_eq!(metric_to_target("a", &metric), "a.b.c");

        metric.insert("__name__".to_string(), "unknown".to_string());
        assert_eq!(metric_to_target("a", &metric), "");
    }

    #[test]
    fn reconstruction_stops_at_gap() {
        let mut metric = HashMap::new();
        metric.insert("__a_g1__".to_string(), "b".to_string());
        metric.insert("__a_g3__".to_string(), "d".to_string());
        assert_eq!(metric_to_target("a", &metric), "a.b");
    }

    #[test]
    fn label_names() {
        assert_eq!(label_name("a", 1), "__a_g1__");
    }

    proptest! {
        // Storing h.v1.….vK and reading the returned label set back must
        // reproduce the original name.
        #[test]
        fn round_trip(
            head in "[a-z][a-z0-9_]{0,8}",
            values in proptest::collection::vec("[a-z0-9_]{1,8}", 1..6),
        ) {
            let name = format!("{}.{}", head, values.join("."));
            let (converted_head, filters) = convert_target(&name, false).unwrap();
            prop_assert_eq!(&converted_head, &head);

            let metric: HashMap<String, String> = filters
                .iter()
                .map(|f| (f.label.clone(), f.value.clone()))
                .collect();
            prop_assert_eq!(metric_to_target(&converted_head, &metric), name);
        }
    }
}
