//! Redaction of identity-bearing text
//!
//! Crash reports are delivered to a third party, so nothing that identifies
//! the machine or the person running it may be transmitted as-is. The
//! server name is always replaced wholesale; free text (panic messages,
//! stack traces) has home directory, user name and host name scrubbed.

use crashline_core::config::AnonymizeConfig;

/// Placeholder transmitted instead of any raw identity string.
pub const REDACTED: &str = "<redacted>";

/// Map a raw identity string (hostname, server name) to its transmissible
/// form. Always returns [`REDACTED`].
pub fn redact_identity(_raw: &str) -> String {
    REDACTED.to_string()
}

const MIN_HOSTNAME_LEN: usize = 4;

/// Returns the local host name, or an empty string if it cannot be read.
pub fn local_hostname() -> String {
    std::fs::read_to_string("/proc/sys/kernel/hostname")
        .map(|s| s.trim().to_string())
        .ok()
        .filter(|s| !s.is_empty())
        .or_else(|| std::env::var("HOSTNAME").ok())
        .unwrap_or_default()
}

/// Scrubs free text based on the provided configuration.
#[derive(Debug, Clone)]
pub struct Redactor {
    strip_paths: bool,
    strip_usernames: bool,
    home_dir: String,
    username: String,
    hostname: String,
}

impl Redactor {
    /// Creates a new `Redactor` from configuration.
    pub fn new(config: &AnonymizeConfig) -> Self {
        let home_dir = dirs::home_dir()
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_default();
        let username = std::env::var("USER")
            .or_else(|_| std::env::var("LOGNAME"))
            .unwrap_or_default();

        Self {
            strip_paths: config.strip_paths,
            strip_usernames: config.strip_usernames,
            home_dir,
            username,
            hostname: local_hostname(),
        }
    }

    /// Scrub `text`. The host name is always removed; home directory and
    /// user name only when configured.
    pub fn scrub(&self, text: &str) -> String {
        let mut result = text.to_string();

        // Home directory first: it usually contains the user name.
        if self.strip_paths && self.home_dir.len() > 1 {
            result = result.replace(&self.home_dir, "<HOME>");
        }

        if self.strip_usernames && !self.username.is_empty() {
            result = replace_token(&result, &self.username, "<USER>");
        }

        // Very short host names would mangle ordinary words.
        if self.hostname.len() >= MIN_HOSTNAME_LEN {
            result = replace_token(&result, &self.hostname, REDACTED);
        }

        result
    }
}

/// Replace whole-token occurrences of `needle`. A match counts only when
/// it is not glued to other alphanumeric characters, so `alice` is replaced
/// in `/home/alice/x` but not in `malice`.
fn replace_token(text: &str, needle: &str, replacement: &str) -> String {
    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    let mut result = String::with_capacity(text.len());
    let mut last = 0;

    for (start, _) in text.match_indices(needle) {
        if start < last {
            continue;
        }
        let end = start + needle.len();
        let before_ok = !text[..start].chars().next_back().is_some_and(is_word);
        let after_ok = !text[end..].chars().next().is_some_and(is_word);
        if before_ok && after_ok {
            result.push_str(&text[last..start]);
            result.push_str(replacement);
            last = end;
        }
    }

    result.push_str(&text[last..]);
    result
}

impl Default for Redactor {
    fn default() -> Self {
        Self::new(&AnonymizeConfig::default())
    }
}
