/// Replace `${ENV_VAR}` placeholders in the raw config text.
///
/// Unresolvable variables are left as-is.
#[must_use]
pub fn substitute_env(input: &str) -> String {
    substitute_env_with(input, |name| std::env::var(name).ok())
}

/// Implementation with an injectable lookup, so tests never touch the
/// process environment.
fn substitute_env_with(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut result = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) if end > 0 => {
                let name = &after[..end];
                match lookup(name) {
                    Some(value) => result.push_str(&value),
                    None => {
                        result.push_str("${");
                        result.push_str(name);
                        result.push('}');
                    },
                }
                rest = &after[end + 1..];
            },
            _ => {
                // Unterminated or empty placeholder: keep the literal text.
                result.push_str(&rest[start..]);
                return result;
            },
        }
    }
    result.push_str(rest);
    result
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(name: &str) -> Option<String> {
        match name {
            "CHATLOOM_TEST_TOKEN" => Some("sekrit".to_string()),
            _ => None,
        }
    }

    #[test]
    fn substitutes_known_vars() {
        assert_eq!(
            substitute_env_with("token = \"${CHATLOOM_TEST_TOKEN}\"", lookup),
            "token = \"sekrit\""
        );
    }

    #[test]
    fn leaves_unknown_vars_in_place() {
        assert_eq!(
            substitute_env_with("${CHATLOOM_MISSING}", lookup),
            "${CHATLOOM_MISSING}"
        );
    }

    #[test]
    fn keeps_malformed_placeholders_literal() {
        assert_eq!(substitute_env_with("tail ${OPEN", lookup), "tail ${OPEN");
        assert_eq!(substitute_env_with("empty ${}", lookup), "empty ${}");
    }

    #[test]
    fn substitutes_multiple_occurrences() {
        assert_eq!(
            substitute_env_with(
                "${CHATLOOM_TEST_TOKEN} and ${CHATLOOM_TEST_TOKEN}",
                lookup
            ),
            "sekrit and sekrit"
        );
    }
}
