use std::borrow::Cow;

use heck::{ToLowerCamelCase, ToSnakeCase, ToTitleCase, ToUpperCamelCase};
use serde::{Deserialize, Serialize};

/// Letter-case rewrites available to the `format` transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextCase {
    Upper,
    Lower,
    Snake,
    Camel,
    Pascal,
    Title,
}

impl TextCase {
    pub fn apply<'a>(&self, input: &'a str) -> Cow<'a, str> {
        match self {
            TextCase::Upper => uppercase(input),
            TextCase::Lower => lowercase(input),
            TextCase::Snake => reuse_if_unchanged(input, input.to_snake_case()),
            TextCase::Camel => reuse_if_unchanged(input, input.to_lower_camel_case()),
            TextCase::Pascal => reuse_if_unchanged(input, input.to_upper_camel_case()),
            TextCase::Title => reuse_if_unchanged(input, input.to_title_case()),
        }
    }
}

/// Returns a lowercase representation, reusing the original string if already lowercase.
pub fn lowercase(input: &str) -> Cow<'_, str> {
    if input.chars().all(|ch| !ch.is_uppercase()) {
        Cow::Borrowed(input)
    } else {
        Cow::Owned(input.to_lowercase())
    }
}

/// Returns an uppercase representation, avoiding allocation when unnecessary.
pub fn uppercase(input: &str) -> Cow<'_, str> {
    if input.chars().all(|ch| !ch.is_lowercase()) {
        Cow::Borrowed(input)
    } else {
        Cow::Owned(input.to_uppercase())
    }
}

fn reuse_if_unchanged(input: &str, converted: String) -> Cow<'_, str> {
    if converted == input {
        Cow::Borrowed(input)
    } else {
        Cow::Owned(converted)
    }
}

/// Splits an identifier-like name into lowercase words on case boundaries,
/// underscores, hyphens, and spaces.
pub fn name_tokens(input: &str) -> Vec<String> {
    input
        .to_snake_case()
        .split('_')
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cases_convert_identifiers() {
        assert_eq!(TextCase::Snake.apply("Foo Bar"), "foo_bar");
        assert_eq!(TextCase::Camel.apply("foo-bar baz"), "fooBarBaz");
        assert_eq!(TextCase::Pascal.apply("HTTP_STATUS"), "HttpStatus");
        assert_eq!(TextCase::Title.apply("north_east"), "North East");
        assert!(matches!(TextCase::Lower.apply("done"), Cow::Borrowed(_)));
    }

    #[test]
    fn name_tokens_split_on_case_and_separators() {
        assert_eq!(name_tokens("totalRevenue"), vec!["total", "revenue"]);
        assert_eq!(name_tokens("Sales_Amount-USD"), vec!["sales", "amount", "usd"]);
        assert_eq!(name_tokens("HTTPStatus"), vec!["http", "status"]);
    }
}
