use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::core::error::{FeedError, FeedResult};
use crate::core::models::{ItemAction, Notification, RenderedNotification};

/// Turns one notification into display markup.
#[async_trait]
pub trait TemplateRenderer: Send + Sync {
    async fn render(&self, notification: &Notification) -> FeedResult<RenderedNotification>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderFormat {
    /// Sanitized HTML fragment for web views.
    Html,
    /// Plain text for the desktop panel.
    #[default]
    Text,
}

/// Renders the notification menu item.
#[derive(Debug, Clone, Default)]
pub struct MenuItemRenderer {
    format: RenderFormat,
}

impl MenuItemRenderer {
    pub fn new(format: RenderFormat) -> Self {
        MenuItemRenderer { format }
    }

    fn render_now(&self, n: &Notification, now: DateTime<Utc>) -> FeedResult<RenderedNotification> {
        if n.subject.trim().is_empty() {
            return Err(FeedError::Render {
                id: n.id,
                reason: "empty subject".into(),
            });
        }

        let when = relative_time(n.time_created, now);
        let sender = n
            .user_from
            .as_ref()
            .map(|u| u.full_name.as_str())
            .unwrap_or("System");

        let markup = match self.format {
            RenderFormat::Html => render_html(n, sender, &when),
            RenderFormat::Text => render_text(n, sender, &when),
        };

        Ok(RenderedNotification {
            id: n.id,
            unread: !n.read,
            markup,
            behavior: n.context_url.clone().map(ItemAction::OpenUrl),
        })
    }
}

#[async_trait]
impl TemplateRenderer for MenuItemRenderer {
    async fn render(&self, notification: &Notification) -> FeedResult<RenderedNotification> {
        self.render_now(notification, Utc::now())
    }
}

fn render_html(n: &Notification, sender: &str, when: &str) -> String {
    let body = match &n.full_message_html {
        Some(html) => clean_body_html(html),
        None => ammonia::clean_text(&n.full_message),
    };
    let class = if n.read {
        "menu-content-item-container"
    } else {
        "menu-content-item-container unread"
    };
    format!(
        "<div class=\"{class}\" data-id=\"{id}\">\
         <div class=\"subject\">{subject}</div>\
         <div class=\"meta\">{sender} · {when}</div>\
         <div class=\"body\">{body}</div>\
         </div>",
        id = n.id,
        subject = ammonia::clean_text(&n.subject),
        sender = ammonia::clean_text(sender),
        when = when,
    )
}

/// Keep only inline formatting and links; the menu item supplies the layout.
fn clean_body_html(html: &str) -> String {
    let tags: HashSet<&str> = [
        "p", "br", "b", "strong", "i", "em", "code", "u", "small", "ul", "ol", "li", "a",
    ]
    .into_iter()
    .collect();

    ammonia::Builder::new().tags(tags).clean(html).to_string()
}

fn render_text(n: &Notification, sender: &str, when: &str) -> String {
    let body = match &n.full_message_html {
        Some(html) => html2text::from_read(html.as_bytes(), 80).unwrap_or_default(),
        None => n.full_message.clone(),
    };
    format!("{}\n{} · {}\n{}", n.subject, sender, when, body.trim_end())
}

/// "just now", "5 minutes ago", "3 days ago"...
fn relative_time(timestamp: i64, now: DateTime<Utc>) -> String {
    let Some(then) = DateTime::<Utc>::from_timestamp(timestamp, 0) else {
        return String::new();
    };
    let secs = (now - then).num_seconds().max(0);
    let (n, unit) = match secs {
        0..=59 => return "just now".to_string(),
        60..=3599 => (secs / 60, "minute"),
        3600..=86_399 => (secs / 3600, "hour"),
        86_400..=2_591_999 => (secs / 86_400, "day"),
        _ => return then.format("%Y-%m-%d").to_string(),
    };
    if n == 1 {
        format!("1 {unit} ago")
    } else {
        format!("{n} {unit}s ago")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::UserSummary;

    fn sample() -> Notification {
        Notification {
            id: 9,
            user_id_from: 2,
            user_id_to: 3,
            subject: "Quiz <closes> soon".into(),
            full_message: "Submit before Friday".into(),
            full_message_html: Some("<p>Submit <b>before</b> Friday<script>x()</script></p>".into()),
            small_message: "Quiz closes soon".into(),
            context_url: Some("https://lms.example.org/mod/quiz/view.php?id=4".into()),
            read: false,
            time_created: 1_700_000_000,
            user_from: Some(UserSummary {
                id: 2,
                full_name: "Ada Lovelace".into(),
                profile_image_url: None,
            }),
            user_to: None,
        }
    }

    fn now() -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_700_000_000 + 7200, 0).unwrap()
    }

    #[test]
    fn html_escapes_subject_and_strips_scripts() {
        let out = MenuItemRenderer::new(RenderFormat::Html)
            .render_now(&sample(), now())
            .unwrap();
        assert!(out.markup.contains("&lt;closes&gt;"));
        assert!(!out.markup.contains("<closes>"));
        assert!(!out.markup.contains("<script>"));
        assert!(out.markup.contains("<b>before</b>"));
        assert!(out.markup.contains("unread"));
        assert!(out.markup.contains("2 hours ago"));
        assert!(out.unread);
    }

    #[test]
    fn html_escapes_plain_body_and_sender() {
        let mut n = sample();
        n.full_message_html = None;
        n.full_message = "Marks <b>posted</b>".into();
        if let Some(user) = n.user_from.as_mut() {
            user.full_name = "O'Brien & Co".into();
        }
        let out = MenuItemRenderer::new(RenderFormat::Html)
            .render_now(&n, now())
            .unwrap();
        assert!(!out.markup.contains("<b>posted</b>"));
        assert!(out.markup.contains("&lt;b&gt;"));
        assert!(!out.markup.contains("O'Brien & Co"));
        assert!(out.markup.contains("&amp;"));
    }

    #[test]
    fn text_format_uses_sender_and_context_link() {
        let out = MenuItemRenderer::new(RenderFormat::Text)
            .render_now(&sample(), now())
            .unwrap();
        assert!(out.markup.starts_with("Quiz <closes> soon\nAda Lovelace · 2 hours ago\n"));
        assert_eq!(
            out.behavior,
            Some(ItemAction::OpenUrl(
                "https://lms.example.org/mod/quiz/view.php?id=4".into()
            ))
        );
    }

    #[test]
    fn empty_subject_is_a_render_failure() {
        let mut n = sample();
        n.subject = "  ".into();
        let err = MenuItemRenderer::default().render_now(&n, now()).unwrap_err();
        assert!(matches!(err, FeedError::Render { id: 9, .. }));
    }

    #[test]
    fn relative_time_units() {
        let base = now().timestamp();
        assert_eq!(relative_time(base - 10, now()), "just now");
        assert_eq!(relative_time(base - 60, now()), "1 minute ago");
        assert_eq!(relative_time(base - 3 * 86_400, now()), "3 days ago");
    }
}
