use url::Url;

use crate::bot::commands::Intent;

const CONSENSUS_REACHED: &str =
    "Some time has passed since this issue was opened and the group appears to have reached a consensus.";
const DISCUSSION_DIED_DOWN: &str =
    "Some time has passed since this issue was opened and the discussion appears to have died down.";
const CLOSING_NOTICE: &str = "This issue will now be closed. If you feel this was an error, feel free to continue the discussion and a moderator will re-open the issue.";

/// Accumulates a GitHub flavored markdown comment.
#[derive(Default)]
pub struct MessageBuilder {
    markdown: String,
}

impl MessageBuilder {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn build(self) -> String {
        self.markdown
    }

    pub fn bullet(&mut self, text: &str) {
        self.markdown.push_str("* ");
        self.markdown.push_str(text);
        self.markdown.push('\n');
    }

    pub fn blank_line(&mut self) {
        self.markdown.push('\n');
    }

    pub fn link(&mut self, text: &str, href: &Url) {
        self.markdown.push_str(&format!("[{}]({})", text, href));
    }

    pub fn text(&mut self, text: &str) {
        self.markdown.push_str(text);
    }
}

/// Composes the comment posted right before closing an issue.
///
/// The text only depends on `intent` and on the documentation link; nothing from the triggering
/// comment is interpolated.
pub fn closing_message(intent: Intent, documentation_url: &Url) -> String {
    let mut msg = MessageBuilder::new();

    match intent {
        Intent::Deny => {
            msg.bullet(CONSENSUS_REACHED);
            msg.bullet(
                "❌ This change will **not** be integrated into the official reference document.",
            );
        }
        Intent::Accept => {
            msg.bullet(CONSENSUS_REACHED);
            msg.bullet("✔️ This change will be integrated into the official reference document.");
        }
        Intent::Stale => {
            msg.bullet(DISCUSSION_DIED_DOWN);
            msg.bullet(
                "💤 Either the document has already been updated or no additional changes need to be made.",
            );
        }
    }

    msg.bullet(CLOSING_NOTICE);
    msg.blank_line();
    msg.text("(For more information on how consensus is determined, please read the ");
    msg.link("Convention Changes document", documentation_url);
    msg.text(".)");

    msg.build()
}
