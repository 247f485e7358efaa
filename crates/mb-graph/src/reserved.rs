use std::sync::OnceLock;

use regex::Regex;

/// Names the script binder injects into every script scope.
pub const BUILTIN_NAMES: &[&str] = &["mbox", "Me", "print", "debug"];

/// Rhai keywords and reserved words.
pub const RESERVED_NAMES: &[&str] = &[
    "true", "false", "let", "const", "if", "else", "switch", "do", "while", "loop", "until",
    "for", "in", "continue", "break", "return", "throw", "try", "catch", "import", "export",
    "as", "global", "Fn", "call", "curry", "this", "type_of", "eval", "is_def_var",
    "is_def_fn", "is_shared", "fn", "private", "var", "static", "shared", "goto", "exit",
    "match", "case", "public", "protected", "new", "use", "with", "module", "package",
    "super", "spawn", "thread", "go", "sync", "async", "await", "yield", "default", "void",
    "null", "nil", "is", "_",
];

fn identifier_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier regex"))
}

pub fn is_valid_identifier(name: &str) -> bool {
    identifier_regex().is_match(name)
}

pub fn is_reserved_name(name: &str) -> bool {
    BUILTIN_NAMES.contains(&name) || RESERVED_NAMES.contains(&name)
}

#[cfg(test)]
mod reserved_tests {
    use super::*;

    #[test]
    fn identifier_rules() {
        assert!(is_valid_identifier("Tank_1"));
        assert!(is_valid_identifier("_hidden"));
        assert!(!is_valid_identifier("1st"));
        assert!(!is_valid_identifier("two words"));
        assert!(!is_valid_identifier(""));
        assert!(!is_valid_identifier("a.b"));
    }

    #[test]
    fn builtins_and_keywords_are_reserved() {
        assert!(is_reserved_name("mbox"));
        assert!(is_reserved_name("Me"));
        assert!(is_reserved_name("while"));
        assert!(is_reserved_name("Fn"));
        assert!(is_reserved_name("is"));
        assert!(is_reserved_name("_"));
        assert!(!is_reserved_name("Healer"));
    }
}
