use anyhow::{anyhow, Result};
use regex::Regex;

/// Decides whether a message counts as a partner invite.
///
/// This is a text match only.  Nothing checks that the invite actually resolves.
pub struct InviteFinder {
    invite_regex: Regex,
}

impl InviteFinder {
    pub fn new(pattern: &str) -> Result<Self> {
        let invite_regex = Regex::new(pattern)
            .map_err(|e| anyhow!("Invalid invite pattern `{}`: {}", pattern, e))?;
        Ok(Self { invite_regex })
    }

    pub fn is_invite(&self, text: &str) -> bool {
        self.invite_regex.is_match(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_INVITE_PATTERN;

    #[test]
    fn default_pattern_matches_invites() {
        let finder = InviteFinder::new(DEFAULT_INVITE_PATTERN).unwrap();
        assert!(finder.is_invite("join us https://discord.gg/invite/abc123"));
        assert!(finder.is_invite("DISCORD.COM/INVITE/Xyz"));
        assert!(finder.is_invite("discord.gg/abcdef"));
    }

    #[test]
    fn default_pattern_is_permissive() {
        let finder = InviteFinder::new(DEFAULT_INVITE_PATTERN).unwrap();
        assert!(finder.is_invite("hello there"));
        assert!(!finder.is_invite(""));
        assert!(!finder.is_invite("!"));
        assert!(!finder.is_invite("a ."));
    }

    #[test]
    fn accented_letters_are_word_boundaries() {
        let finder = InviteFinder::new(DEFAULT_INVITE_PATTERN).unwrap();
        assert!(finder.is_invite("çok"));
        assert!(finder.is_invite("ğüzel çşö"));
        assert!(!finder.is_invite("ç ş ö"));
    }

    #[test]
    fn strict_pattern() {
        let finder = InviteFinder::new(r"(?:https?://)?discord\.gg/(\w+)").unwrap();
        assert!(finder.is_invite("https://discord.gg/abc"));
        assert!(!finder.is_invite("hello there"));
    }

    #[test]
    fn invalid_pattern_is_an_error() {
        assert!(InviteFinder::new("(unclosed").is_err());
    }
}
