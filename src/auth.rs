use std::collections::HashSet;

/// Outcome of checking an inbound Telegram identity against the allow-list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    /// Authorized; carries the normalized handle.
    Granted(String),
    /// The account has no username set, so it can never match the list.
    NoUsername,
    Denied,
}

/// Normalize a raw handle the way operators tend to paste them:
/// profile links, `@`-prefixed mentions and mixed case all collapse
/// to the bare lowercase username.
pub fn normalize_handle(raw: &str) -> String {
    let s = raw.trim();
    let s = s.strip_prefix("https://t.me/").unwrap_or(s);
    let s = s.strip_prefix('@').unwrap_or(s);
    s.to_lowercase()
}

/// The static set of operator handles allowed to read lead data.
/// Loaded once from configuration and passed explicitly to the bot.
#[derive(Debug, Clone)]
pub struct AllowList {
    handles: HashSet<String>,
}

impl AllowList {
    /// Parse a comma-separated list of handles; empty entries are dropped.
    pub fn parse(raw: &str) -> Self {
        let handles = raw
            .split(',')
            .map(normalize_handle)
            .filter(|h| !h.is_empty())
            .collect();
        Self { handles }
    }

    pub fn check(&self, username: Option<&str>) -> Access {
        let Some(username) = username else {
            return Access::NoUsername;
        };
        let normalized = normalize_handle(username);
        if normalized.is_empty() {
            return Access::NoUsername;
        }
        if self.handles.contains(&normalized) {
            Access::Granted(normalized)
        } else {
            Access::Denied
        }
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }
}
