//! Prompt enrichment
//!
//! Checks live typing against a fixed keyword table and produces advisory messages.
//! Matching is plain lowercase containment on the first content-change fragment of
//! each edit event; there is no debouncing and no per-session suppression, so the
//! same advisory can fire again on the next keystroke.

const PROMPT_HINTS: &[(&str, &str)] = &[
    (
        "connect to database",
        "Ensure secure connection (TLS, no hardcoded credentials).",
    ),
    (
        "login",
        "Always enforce authentication and role-based access control.",
    ),
    (
        "auth",
        "Include authorization checks, not just authentication.",
    ),
    (
        "api key",
        "Store API keys in environment variables, not in code.",
    ),
];

/// Returns one formatted advisory per keyword contained in `fragment`,
/// in table order.
pub fn advisories_for_fragment(fragment: &str) -> Vec<String> {
    let lowered = fragment.to_lowercase();

    PROMPT_HINTS
        .iter()
        .filter(|(keyword, _)| lowered.contains(keyword))
        .map(|(_, message)| format!("[Prompt Enrichment] {message}"))
        .collect()
}
