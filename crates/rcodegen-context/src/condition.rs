//! A total boolean condition evaluator: `AND` binds tighter than `OR`, both
//! left-associative, with `!(...)`/`(...)` grouping and a small set of
//! comparison operators. Never fails — malformed input evaluates to `false`.

/// Evaluate a condition expression (after variable substitution has already
/// happened). An empty expression is vacuously true.
pub fn evaluate_condition(expr: &str) -> bool {
    let trimmed = expr.trim();
    if trimmed.is_empty() {
        return true;
    }
    eval_or(trimmed)
}

fn eval_or(s: &str) -> bool {
    split_top_level(s, "OR").iter().any(|part| eval_and(part))
}

fn eval_and(s: &str) -> bool {
    split_top_level(s, "AND").iter().all(|part| eval_leaf(part))
}

fn eval_leaf(s: &str) -> bool {
    let s = s.trim();

    if let Some(inner) = s.strip_prefix("!(").and_then(|r| r.strip_suffix(')')) {
        return !evaluate_condition(inner);
    }
    if s.starts_with('(') && s.ends_with(')') && s.len() >= 2 {
        return evaluate_condition(&s[1..s.len() - 1]);
    }

    if s.is_empty() {
        return true;
    }
    if s.eq_ignore_ascii_case("true") {
        return true;
    }
    if s.eq_ignore_ascii_case("false") {
        return false;
    }

    if let Some((idx, op)) = find_operator(s) {
        let lhs = strip_quotes(s[..idx].trim());
        let rhs = strip_quotes(s[idx + op.len()..].trim());
        return apply_operator(op, lhs, rhs);
    }

    // Bare (non-comparison) leaf: truthy unless empty, "false", or "0".
    let lower = s.to_ascii_lowercase();
    !lower.is_empty() && lower != "false" && lower != "0"
}

/// Operators checked in priority order so two-character operators are never
/// mistaken for their one-character prefix (`<=` before `<`, etc).
const OPERATORS: &[&str] = &["!=", "==", "<=", ">=", "contains", "<", ">"];

fn find_operator(s: &str) -> Option<(usize, &'static str)> {
    OPERATORS.iter().find_map(|op| s.find(op).map(|idx| (idx, *op)))
}

fn apply_operator(op: &str, lhs: &str, rhs: &str) -> bool {
    match op {
        "==" => lhs == rhs,
        "!=" => lhs != rhs,
        "contains" => lhs.contains(rhs),
        "<" | "<=" | ">" | ">=" => {
            let (Some(l), Some(r)) = (lhs.parse::<f64>().ok(), rhs.parse::<f64>().ok()) else {
                return false;
            };
            match op {
                "<" => l < r,
                "<=" => l <= r,
                ">" => l > r,
                ">=" => l >= r,
                _ => unreachable!(),
            }
        }
        _ => false,
    }
}

fn strip_quotes(s: &str) -> &str {
    let bytes = s.as_bytes();
    if bytes.len() >= 2 {
        let first = bytes[0];
        let last = bytes[bytes.len() - 1];
        if (first == b'"' && last == b'"') || (first == b'\'' && last == b'\'') {
            return &s[1..s.len() - 1];
        }
    }
    s
}

/// Split `s` on top-level (paren-depth-0) occurrences of ` {keyword} `.
fn split_top_level<'a>(s: &'a str, keyword: &str) -> Vec<&'a str> {
    let pattern = format!(" {keyword} ");
    let mut depth = 0i32;
    let mut start = 0usize;
    let mut parts = Vec::new();

    let mut it = s.char_indices().peekable();
    while let Some((i, c)) = it.next() {
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            _ => {}
        }
        if depth == 0 && s[i..].starts_with(&pattern) {
            parts.push(&s[start..i]);
            let new_pos = i + pattern.len();
            while let Some(&(ni, _)) = it.peek() {
                if ni < new_pos {
                    it.next();
                } else {
                    break;
                }
            }
            start = new_pos;
        }
    }
    parts.push(&s[start..]);
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_is_true() {
        assert!(evaluate_condition(""));
        assert!(evaluate_condition("   "));
    }

    #[test]
    fn literals() {
        assert!(evaluate_condition("true"));
        assert!(!evaluate_condition("false"));
    }

    #[test]
    fn or_has_lower_precedence_than_and() {
        assert!(evaluate_condition("true OR false AND false"));
        assert!(!evaluate_condition("false OR false AND true"));
    }

    #[test]
    fn and_short_circuits_correctly() {
        assert!(!evaluate_condition("true AND false"));
        assert!(evaluate_condition("true AND true"));
    }

    #[test]
    fn parens_group_explicitly() {
        assert!(evaluate_condition("(true OR false) AND true"));
        assert!(!evaluate_condition("(true OR false) AND false"));
    }

    #[test]
    fn negation() {
        assert!(evaluate_condition("!(false)"));
        assert!(!evaluate_condition("!(true)"));
        assert!(evaluate_condition("!(true AND false)"));
    }

    #[test]
    fn equality_and_inequality() {
        assert!(evaluate_condition("yes == yes"));
        assert!(!evaluate_condition("yes == no"));
        assert!(evaluate_condition("yes != no"));
    }

    #[test]
    fn quotes_are_stripped_from_operands() {
        assert!(evaluate_condition("\"yes\" == yes"));
        assert!(evaluate_condition("'yes' == 'yes'"));
    }

    #[test]
    fn contains_checks_substring() {
        assert!(evaluate_condition("hello world contains world"));
        assert!(!evaluate_condition("hello contains world"));
    }

    #[test]
    fn numeric_comparisons() {
        assert!(evaluate_condition("3 > 2"));
        assert!(evaluate_condition("2 <= 2"));
        assert!(!evaluate_condition("2 > 3"));
    }

    #[test]
    fn non_numeric_comparison_is_false_not_error() {
        assert!(!evaluate_condition("abc > 2"));
        assert!(!evaluate_condition("abc < def"));
    }

    #[test]
    fn bare_nonempty_value_is_truthy() {
        assert!(evaluate_condition("yes"));
        assert!(!evaluate_condition("0"));
    }

    #[test]
    fn evaluator_never_panics_on_malformed_input() {
        for input in ["((((", "!(", ")))", "AND AND AND", "== == =="] {
            let _ = evaluate_condition(input);
        }
    }

    #[test]
    fn conjunction_before_disjunction_exhaustive() {
        // (1,1) style table mirrors the majority-vote boolean table shape.
        assert_eq!(evaluate_condition("true AND true OR false"), true);
        assert_eq!(evaluate_condition("false AND true OR false"), false);
    }
}
