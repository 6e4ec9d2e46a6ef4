use std::fmt::Display;

use serde::Deserialize;

/// A moderator decision requested through a comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Deny,
    Accept,
    Stale,
}

impl Intent {
    /// When several commands appear in the same comment, the first one in this list wins.
    pub const PRIORITY: [Intent; 3] = [Intent::Deny, Intent::Accept, Intent::Stale];
}

impl Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Intent::Deny => "deny",
            Intent::Accept => "accept",
            Intent::Stale => "stale",
        };
        f.write_str(name)
    }
}

/// The literal substrings that trigger each [`Intent`].
///
/// Matching is case-sensitive and looks for the trigger anywhere in the comment body. An empty
/// list disables the corresponding intent.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CommandSet {
    pub deny: Vec<String>,
    pub accept: Vec<String>,
    pub stale: Vec<String>,
}

impl Default for CommandSet {
    fn default() -> Self {
        Self {
            deny: vec!["/deny".into(), "/reject".into()],
            accept: vec!["/accept".into()],
            stale: vec!["/stale".into(), "/idle".into(), "/zzz".into()],
        }
    }
}

impl CommandSet {
    pub fn triggers(&self, intent: Intent) -> &[String] {
        match intent {
            Intent::Deny => &self.deny,
            Intent::Accept => &self.accept,
            Intent::Stale => &self.stale,
        }
    }

    /// Returns the highest priority intent whose triggers appear in `body`.
    pub fn match_intent(&self, body: &str) -> Option<Intent> {
        Intent::PRIORITY.into_iter().find(|&intent| {
            self.triggers(intent)
                .iter()
                .any(|trigger| body.contains(trigger.as_str()))
        })
    }

    /// Returns the first intent that has an empty trigger, which would match every comment.
    pub(crate) fn find_empty_trigger(&self) -> Option<Intent> {
        Intent::PRIORITY
            .into_iter()
            .find(|&intent| self.triggers(intent).iter().any(String::is_empty))
    }
}
