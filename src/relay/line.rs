//! Carbon line rewriting.
//!
//! `a.b.c 1 1` becomes `a;__a_g1__=b;__a_g2__=c 1 1\n`: the head stays the
//! metric name and every further segment rides along as a tagged label,
//! which the backend's Graphite ingest turns into real Prometheus labels.

/// Rewrite one carbon line into `out`. Returns false (leaving `out` in an
/// unspecified state) when the line is not `name value timestamp` with a
/// name of at least two segments.
pub fn convert_line(line: &[u8], out: &mut Vec<u8>) -> bool {
    let Some(i1) = line.iter().position(|&b| b == b' ') else {
        return false;
    };
    let rest = &line[i1 + 1..];
    let Some(i2) = rest.iter().position(|&b| b == b' ') else {
        return false;
    };
    let value = &rest[..i2];
    let timestamp = &rest[i2 + 1..];
    if timestamp.contains(&b' ') {
        return false;
    }

    let segments: Vec<&[u8]> = line[..i1].split(|&b| b == b'.').collect();
    if segments.len() < 2 {
        return false;
    }

    // `-` is not a legal label-name rune, so the head is transliterated;
    // segment values go through untouched.
    let head: Vec<u8> = segments[0]
        .iter()
        .map(|&b| if b == b'-' { b'_' } else { b })
        .collect();

    out.extend_from_slice(&head);
    for (i, segment) in segments.iter().enumerate().skip(1) {
        out.extend_from_slice(b";__");
        out.extend_from_slice(&head);
        out.extend_from_slice(b"_g");
        out.extend_from_slice(i.to_string().as_bytes());
        out.extend_from_slice(b"__=");
        out.extend_from_slice(segment);
    }
    out.push(b' ');
    out.extend_from_slice(value);
    out.push(b' ');
    out.extend_from_slice(timestamp);
    out.push(b'\n');

    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn convert(line: &str) -> Option<String> {
        let mut out = Vec::new();
        if convert_line(line.as_bytes(), &mut out) {
            Some(String::from_utf8(out).unwrap())
        } else {
            None
        }
    }

    #[test]
    fn rejects_single_segment_name() {
        assert_eq!(convert("a 1 1"), None);
    }

    #[test]
    fn rejects_missing_field() {
        assert_eq!(convert("a.b.c 11"), None);
    }

    #[test]
    fn rejects_extra_field() {
        assert_eq!(convert("a.b.c 1 1 1"), None);
    }

    #[test]
    fn rewrites_segments_as_labels() {
        assert_eq!(
            convert("a.b.c 1 1").as_deref(),
            Some("a;__a_g1__=b;__a_g2__=c 1 1\n")
        );
    }

    #[test]
    fn transliterates_head_only() {
        assert_eq!(
            convert("a-b.c-d 2 1590249600").as_deref(),
            Some("a_b;__a_b_g1__=c-d 2 1590249600\n")
        );
    }
}
