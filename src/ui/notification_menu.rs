use std::collections::HashSet;

use cosmic::iced::widget::scrollable::Viewport;
use cosmic::iced::Length;
use cosmic::widget;
use cosmic::Element;

use crate::app::panel::PanelModel;
use crate::app::Message;
use notifeed::core::models::{ItemAction, RenderedNotification, ScrollMetrics, ViewMode};

fn scroll_metrics(viewport: Viewport) -> ScrollMetrics {
    ScrollMetrics {
        scroll_top: viewport.absolute_offset().y,
        inner_height: viewport.bounds().height,
        scroll_height: viewport.content_bounds().height,
    }
}

fn bell_label(badge: Option<u32>) -> String {
    match badge {
        Some(n) if n > 99 => "🔔 99+".to_string(),
        Some(n) => format!("🔔 {n}"),
        None => "🔔".to_string(),
    }
}

fn item_view<'a>(item: &'a RenderedNotification, expanded: bool) -> Element<'a, Message> {
    let mut lines = item.markup.lines();
    let subject = lines.next().unwrap_or_default();
    let meta = lines.next().unwrap_or_default();

    let unread = if item.unread { "● " } else { "" };
    let mut col = widget::column()
        .spacing(2)
        .push(widget::text::body(format!("{unread}{subject}")))
        .push(widget::text::caption(meta));

    if expanded {
        let body = lines.collect::<Vec<_>>().join("\n");
        if !body.is_empty() {
            col = col.push(widget::text::body(body));
        }
        if let Some(ItemAction::OpenUrl(url)) = &item.behavior {
            col = col.push(
                widget::button::text("Open")
                    .on_press(Message::OpenLink(url.clone())),
            );
        }
    }

    widget::button::custom(widget::container(col).padding([4, 8]))
        .on_press(Message::ToggleExpanded(item.id))
        .width(Length::Fill)
        .into()
}

/// Render the bell button and, when open, the notification dropdown.
pub fn view<'a>(
    model: &'a PanelModel,
    expanded: &HashSet<i64>,
    status_message: &'a str,
) -> Element<'a, Message> {
    let mut col = widget::column().spacing(4).padding(8);

    let mut bell = widget::button::text(bell_label(model.badge)).on_press(Message::ToggleMenu);
    if model.open {
        bell = bell.class(cosmic::theme::Button::Suggested);
    }
    col = col.push(bell);

    if model.open {
        let mode_label = match model.mode {
            ViewMode::All => "Show unread only",
            ViewMode::Unread => "Show all",
        };
        let header = widget::row()
            .spacing(8)
            .align_y(cosmic::iced::Alignment::Center)
            .push(
                widget::text::heading("Notifications").width(Length::Fill),
            )
            .push(widget::button::text(mode_label).on_press(Message::ToggleMode))
            .push(widget::button::text("Mark all as read").on_press(Message::MarkAllRead));
        col = col.push(header);

        let items = model.visible_items();
        let mut list = widget::column().spacing(2);
        if items.is_empty() && !model.loading {
            let empty = match model.mode {
                ViewMode::All => "You have no notifications",
                ViewMode::Unread => "You have no unread notifications",
            };
            list = list.push(widget::text::body(empty));
        }
        for item in items {
            list = list.push(item_view(item, expanded.contains(&item.id)));
        }
        if model.loading {
            list = list.push(widget::text::caption("Loading..."));
        }

        col = col.push(
            widget::scrollable(list)
                .on_scroll(|viewport| Message::Scrolled(scroll_metrics(viewport)))
                .height(Length::Fill),
        );
    }

    if let Some(status) = &model.status {
        col = col.push(widget::text::caption(status.as_str()));
    }
    if !status_message.is_empty() {
        col = col.push(widget::text::caption(status_message));
    }

    widget::container(col)
        .width(Length::Fill)
        .height(Length::Fill)
        .into()
}
