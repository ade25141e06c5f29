// Declaration naming conventions.

use once_cell::sync::Lazy;
use regex::Regex;

static TYPE_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z]").unwrap());
static VALUE_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z]").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameKind {
    /// struct, enum
    Type,
    /// field, enumerant, const, annotation
    Value,
}

/// Style problems with `name`, in the order they should be reported.
pub fn check_name(name: &str, kind: NameKind) -> Vec<&'static str> {
    let mut problems = Vec::new();
    match kind {
        NameKind::Type if !TYPE_NAME.is_match(name) => {
            problems.push("Type names must begin with a capital letter.");
        }
        NameKind::Value if !VALUE_NAME.is_match(name) => {
            problems.push("Non-type names must begin with a lower-case letter.");
        }
        _ => {}
    }
    if name.contains('_') {
        problems.push(
            "Cap'n Proto declaration names should use camelCase and must not contain \
             underscores. (Code generators may convert names to the appropriate style for \
             the target language.)",
        );
    }
    problems
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_formed_names_pass() {
        assert!(check_name("PersonInfo", NameKind::Type).is_empty());
        assert!(check_name("phoneNumber", NameKind::Value).is_empty());
    }

    #[test]
    fn case_and_underscores_are_flagged() {
        assert_eq!(
            check_name("person", NameKind::Type),
            vec!["Type names must begin with a capital letter."]
        );
        let problems = check_name("Phone_number", NameKind::Value);
        assert_eq!(problems.len(), 2);
        assert_eq!(problems[0], "Non-type names must begin with a lower-case letter.");
        assert!(problems[1].starts_with("Cap'n Proto declaration names should use camelCase"));
    }
}
