use serde::Serialize;

use crate::models::message::Message;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedTurn {
    pub speaker: Speaker,
    pub text: String,
}

const USER_TEMPLATE: &str = r#"<div class="chat-message user"><div class="avatar">You</div><div class="message">{{MSG}}</div></div>"#;
const BOT_TEMPLATE: &str = r#"<div class="chat-message bot"><div class="avatar">CV</div><div class="message">{{MSG}}</div></div>"#;

/// Assigns speakers by position: even index is the user, odd is the assistant.
/// Holds because every exchange appends exactly one user then one assistant message.
pub fn render_turns(history: &[Message]) -> Vec<RenderedTurn> {
    history
        .iter()
        .enumerate()
        .map(|(i, message)| RenderedTurn {
            speaker: if i % 2 == 0 {
                Speaker::User
            } else {
                Speaker::Assistant
            },
            text: message.content.clone(),
        })
        .collect()
}

/// Message bubbles for the chat pane, oldest first.
pub fn render_html(turns: &[RenderedTurn]) -> String {
    turns
        .iter()
        .map(|turn| {
            let template = match turn.speaker {
                Speaker::User => USER_TEMPLATE,
                Speaker::Assistant => BOT_TEMPLATE,
            };
            template.replace("{{MSG}}", &escape_html(&turn.text))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            '\n' => out.push_str("<br>"),
            _ => out.push(c),
        }
    }
    out
}
