//! Shared utility functions used across the codebase.

/// Number of leading token characters kept when a token is logged.
const VISIBLE_TOKEN_CHARS: usize = 10;

/// Mask a credential for logging, keeping its first 10 characters.
pub fn mask_token(token: &str) -> String {
    let visible: String = token.chars().take(VISIBLE_TOKEN_CHARS).collect();
    format!("{}...", visible)
}
