pub mod commute;
pub mod critic;
pub mod email;
pub mod flight;
pub mod knowledge;
pub mod memory;
pub mod notification;
pub mod wellness;

use std::sync::Arc;

use crate::config::AppConfig;
use crate::registry::ProviderSpec;
use crate::store::{NotificationStore, PreferenceStore};

/// Specs for the full default provider set. Each one loads independently;
/// a broken integration costs exactly one registry entry.
pub fn default_specs(config: &AppConfig) -> Vec<ProviderSpec> {
    let preferences = Arc::new(PreferenceStore::new(config.data_dir.join("preferences.json")));
    let notifications = Arc::new(NotificationStore::new(
        config.data_dir.join("notifications.json"),
    ));

    vec![
        knowledge::spec(),
        email::spec(config.mail.clone()),
        commute::spec(config.maps.clone()),
        flight::spec(config.flight.clone()),
        memory::spec(preferences),
        notification::spec(notifications),
        wellness::spec(),
        critic::spec(),
    ]
}

/// Pull "from X to Y" endpoints out of a free-text request.
pub(crate) fn parse_route(request: &str) -> (Option<String>, Option<String>) {
    let mut origin = None;
    let mut destination = None;
    let mut words = request.split_whitespace().peekable();
    while let Some(word) = words.next() {
        match word.to_lowercase().as_str() {
            "from" if origin.is_none() => {
                origin = words.peek().map(|w| clean_token(w)).filter(|w| !w.is_empty());
            }
            "to" if destination.is_none() => {
                destination = words.peek().map(|w| clean_token(w)).filter(|w| !w.is_empty());
            }
            _ => {}
        }
    }
    (origin, destination)
}

/// First `YYYY-MM-DD` token in a free-text request.
pub(crate) fn parse_date(request: &str) -> Option<String> {
    request
        .split_whitespace()
        .map(clean_token)
        .find(|token| looks_like_date(token))
}

fn looks_like_date(token: &str) -> bool {
    let bytes = token.as_bytes();
    bytes.len() == 10
        && bytes[4] == b'-'
        && bytes[7] == b'-'
        && bytes
            .iter()
            .enumerate()
            .all(|(i, b)| matches!(i, 4 | 7) || b.is_ascii_digit())
}

fn clean_token(word: &str) -> String {
    word.trim_matches(|c: char| !c.is_ascii_alphanumeric() && c != '-')
        .to_string()
}
