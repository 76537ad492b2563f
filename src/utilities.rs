use chrono::{DateTime, TimeZone, Utc};
use log::warn;
use regex::{NoExpand, Regex};

lazy_static! {
    static ref PLACEHOLDER: Regex = Regex::new(r"\$\{(.*?)\}").expect("Failed to create regex");
}

const ENV_PREFIX: &str = "env:";

pub fn millis_to_datetime(millis: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .unwrap_or_default()
}

pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// True when `text` contains exactly one `${...}` placeholder.
pub fn contains_placeholder_exactly_once(text: &str) -> bool {
    let mut matches = PLACEHOLDER.find_iter(text);
    matches.next().is_some() && matches.next().is_none()
}

/// Returns the inside of the first `${...}` placeholder, if any.
pub fn extract_placeholder(text: &str) -> Option<&str> {
    PLACEHOLDER
        .captures(text)
        .and_then(|captures| captures.get(1))
        .map(|inner| inner.as_str())
}

/// Substitutes a single `${env:VAR}` placeholder with the value of `VAR`.
///
/// Anything else (no placeholder, several of them, another prefix or an unset
/// variable) comes back verbatim.
pub fn resolve_env_placeholder(text: &str) -> String {
    resolve_placeholder_with(text, |name| std::env::var(name).ok())
}

pub(crate) fn resolve_placeholder_with<F>(text: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    if !contains_placeholder_exactly_once(text) {
        return text.to_string();
    }

    let variable = match extract_placeholder(text).and_then(|inner| inner.strip_prefix(ENV_PREFIX)) {
        Some(variable) if !variable.is_empty() => variable,
        _ => return text.to_string(),
    };

    match lookup(variable) {
        Some(value) => PLACEHOLDER.replace(text, NoExpand(&value)).into_owned(),
        None => {
            warn!("Environment variable '{}' is not set, keeping '{}' as is", variable, text);
            text.to_string()
        }
    }
}
