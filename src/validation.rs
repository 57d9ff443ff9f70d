use uuid::Uuid;

/// Provides subscription identifier validation functionality
pub struct SubscriptionValidator;

impl SubscriptionValidator {
    /// Creates a new SubscriptionValidator instance
    pub fn new() -> Self {
        Self {}
    }

    /// Checks that an identifier can be placed in an ARM request path
    ///
    /// The identifier must:
    /// - Not be empty or exceed 128 characters
    /// - Not contain path, query or fragment delimiters (`/`, `?`, `#`, `%`)
    /// - Not contain whitespace or control characters
    pub fn validate_format(&self, subscription_id: &str) -> bool {
        if subscription_id.is_empty() || subscription_id.len() > 128 {
            return false;
        }

        subscription_id
            .chars()
            .all(|c| !c.is_whitespace() && !c.is_control() && !matches!(c, '/' | '?' | '#' | '%'))
    }

    /// Returns true for the canonical hyphenated GUID form Azure uses
    pub fn is_guid(&self, subscription_id: &str) -> bool {
        subscription_id.len() == 36 && Uuid::parse_str(subscription_id).is_ok()
    }
}

impl Default for SubscriptionValidator {
    fn default() -> Self {
        Self::new()
    }
}

/// Validates a subscription id and returns a validation error message if unusable
pub fn validate_subscription_id(subscription_id: &str) -> Result<(), String> {
    let validator = SubscriptionValidator::new();

    if !validator.validate_format(subscription_id) {
        return Err(format!("Invalid subscription ID: {:?}", subscription_id));
    }

    Ok(())
}

/// Splits a delimiter-separated list of subscription ids
///
/// Commas, semicolons and any whitespace separate entries; empty entries
/// are dropped and the input order is kept.
///
/// # Examples
///
/// ```
/// use tierscout::validation::parse_subscription_list;
///
/// assert_eq!(parse_subscription_list("a, b;c\td"), vec!["a", "b", "c", "d"]);
/// ```
pub fn parse_subscription_list(input: &str) -> Vec<String> {
    input
        .split(|c: char| c == ',' || c == ';' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Maps the raw `--limit` value to a budget; absent or non-positive is unbounded
pub fn effective_limit(limit: Option<i64>) -> Option<usize> {
    limit
        .filter(|&l| l > 0)
        .map(|l| usize::try_from(l).unwrap_or(usize::MAX))
}
