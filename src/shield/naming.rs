//! Attribute-name visibility by convention.

pub const PRIVACY_MARKER: char = '_';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Public,
    /// Protected or private; readable and writable only by the owning instance.
    Restricted,
}

/// Dunder-style names (`__init__`, `__x__`) are public even though they start
/// with the marker.
pub fn classify(name: &str) -> Visibility {
    if !name.starts_with(PRIVACY_MARKER) || is_dunder(name) {
        Visibility::Public
    } else {
        Visibility::Restricted
    }
}

#[inline]
pub fn is_public(name: &str) -> bool {
    classify(name) == Visibility::Public
}

fn is_dunder(name: &str) -> bool {
    name.starts_with(PRIVACY_MARKER) && name.ends_with(PRIVACY_MARKER) && name.chars().count() >= 4
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("balance", Visibility::Public)]
    #[case("__init__", Visibility::Public)]
    #[case("__x__", Visibility::Public)]
    #[case("_balance", Visibility::Restricted)]
    #[case("__secret", Visibility::Restricted)]
    #[case("__", Visibility::Restricted)]
    #[case("_a_", Visibility::Restricted)]
    #[case("_é_", Visibility::Restricted)]
    #[case("_éé_", Visibility::Public)]
    #[case("", Visibility::Public)]
    fn test_classify(#[case] name: &str, #[case] expected: Visibility) {
        assert_eq!(classify(name), expected);
    }
}
