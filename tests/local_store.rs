use std::sync::Arc;

use notifeed::core::feed::{FeedOptions, LoadOutcome, NotificationFeedController};
use notifeed::core::models::{
    CountUnreadRequest, FetchRequest, MarkAllReadRequest, RenderedNotification, UserSummary,
    ViewMode,
};
use notifeed::core::render::{MenuItemRenderer, RenderFormat};
use notifeed::core::repository::NotificationRepository;
use notifeed::core::store::{LocalStore, NewNotification};
use notifeed::core::view::{ErrorReporter, MenuView};
use notifeed::core::error::FeedError;

const RECIPIENT: i64 = 3;

async fn seeded_store(dir: &tempfile::TempDir, count: i64) -> LocalStore {
    let store = LocalStore::open_at(&dir.path().join("notifications.db")).unwrap();
    store
        .save_user(UserSummary {
            id: 9,
            full_name: "Grace Admin".into(),
            profile_image_url: None,
        })
        .await
        .unwrap();
    for i in 0..count {
        store
            .insert(NewNotification {
                user_id_from: 9,
                user_id_to: RECIPIENT,
                subject: format!("Assignment {i} graded"),
                full_message: "See feedback".into(),
                full_message_html: None,
                small_message: String::new(),
                context_url: Some(format!("https://school.example/mod/assign/view.php?id={i}")),
                time_created: 1_700_000_000 + i,
            })
            .await
            .unwrap();
    }
    // Another recipient's notification never shows up.
    store
        .insert(NewNotification {
            user_id_from: 9,
            user_id_to: RECIPIENT + 1,
            subject: "Not yours".into(),
            full_message: String::new(),
            full_message_html: None,
            small_message: String::new(),
            context_url: None,
            time_created: 1_800_000_000,
        })
        .await
        .unwrap();
    store
}

fn request(mode: ViewMode, limit: u32, offset: u32) -> FetchRequest {
    FetchRequest {
        limit,
        offset,
        recipient_id: RECIPIENT,
        mark_as_read: true,
        mode,
        embed_user_from: true,
        embed_user_to: false,
    }
}

async fn unread(store: &LocalStore) -> u32 {
    store
        .count_unread(&CountUnreadRequest {
            recipient_id: RECIPIENT,
        })
        .await
        .unwrap()
}

#[tokio::test]
async fn unread_fetch_consumes_what_it_returns() {
    let dir = tempfile::tempdir().unwrap();
    let store = seeded_store(&dir, 5).await;
    assert_eq!(unread(&store).await, 5);

    let first = store.query(&request(ViewMode::Unread, 2, 0)).await.unwrap();
    let ids: Vec<i64> = first.notifications.iter().map(|n| n.id).collect();
    assert_eq!(ids, vec![5, 4]);
    assert!(first.notifications.iter().all(|n| !n.read));
    assert_eq!(first.unread_count, 3);

    // Offset zero again yields the next unread page.
    let second = store.query(&request(ViewMode::Unread, 2, 0)).await.unwrap();
    let ids: Vec<i64> = second.notifications.iter().map(|n| n.id).collect();
    assert_eq!(ids, vec![3, 2]);
    assert_eq!(second.unread_count, 1);
}

#[tokio::test]
async fn all_mode_pages_by_offset_newest_first() {
    let dir = tempfile::tempdir().unwrap();
    let store = seeded_store(&dir, 5).await;

    store.query(&request(ViewMode::Unread, 1, 0)).await.unwrap();
    let page = store.query(&request(ViewMode::All, 3, 0)).await.unwrap();
    let flags: Vec<(i64, bool)> = page.notifications.iter().map(|n| (n.id, n.read)).collect();
    assert_eq!(flags, vec![(5, true), (4, false), (3, false)]);

    let rest = store.query(&request(ViewMode::All, 3, 3)).await.unwrap();
    let ids: Vec<i64> = rest.notifications.iter().map(|n| n.id).collect();
    assert_eq!(ids, vec![2, 1]);
    assert_eq!(rest.unread_count, 0);
}

#[tokio::test]
async fn embeds_sender_when_asked() {
    let dir = tempfile::tempdir().unwrap();
    let store = seeded_store(&dir, 1).await;

    let mut req = request(ViewMode::All, 5, 0);
    req.mark_as_read = false;
    let page = store.query(&req).await.unwrap();
    let sender = page.notifications[0].user_from.as_ref().unwrap();
    assert_eq!(sender.full_name, "Grace Admin");
    assert!(page.notifications[0].user_to.is_none());
    assert_eq!(unread(&store).await, 1);

    req.embed_user_from = false;
    let page = store.query(&req).await.unwrap();
    assert!(page.notifications[0].user_from.is_none());
}

#[tokio::test]
async fn mark_all_read_only_touches_the_recipient() {
    let dir = tempfile::tempdir().unwrap();
    let store = seeded_store(&dir, 4).await;

    let response = store
        .mark_all_read(&MarkAllReadRequest {
            recipient_id: RECIPIENT,
        })
        .await
        .unwrap();
    assert!(response.success);
    assert_eq!(unread(&store).await, 0);

    let other = store
        .count_unread(&CountUnreadRequest {
            recipient_id: RECIPIENT + 1,
        })
        .await
        .unwrap();
    assert_eq!(other, 1);
}

#[derive(Default)]
struct Sink {
    items: std::sync::Mutex<Vec<RenderedNotification>>,
}

impl MenuView for Sink {
    fn set_open(&self, _open: bool) {}
    fn set_loading(&self, _loading: bool) {}
    fn show_unread_count(&self, _count: Option<u32>) {}
    fn show_mode(&self, _mode: ViewMode) {}
    fn append(&self, _mode: ViewMode, item: RenderedNotification) {
        self.items.lock().unwrap().push(item);
    }
    fn clear(&self, _mode: ViewMode) {}
}

impl ErrorReporter for Sink {
    fn report(&self, error: &FeedError) {
        panic!("unexpected error: {error}");
    }
}

#[tokio::test]
async fn controller_drains_unread_feed_from_store() {
    let dir = tempfile::tempdir().unwrap();
    let store = seeded_store(&dir, 5).await;
    let sink = Arc::new(Sink::default());

    let mut options = FeedOptions::new(RECIPIENT);
    options.page_size = 2;
    let feed = NotificationFeedController::new(
        store.clone(),
        MenuItemRenderer::new(RenderFormat::Text),
        sink.clone(),
        sink.clone(),
        options,
    );

    let mut outcomes = Vec::new();
    loop {
        let outcome = feed.load_more(ViewMode::Unread).await.unwrap();
        if let LoadOutcome::Loaded { exhausted: true, .. } = outcome {
            outcomes.push(outcome);
            break;
        }
        outcomes.push(outcome);
    }

    assert_eq!(outcomes.len(), 3);
    let ids: Vec<i64> = sink.items.lock().unwrap().iter().map(|i| i.id).collect();
    assert_eq!(ids, vec![5, 4, 3, 2, 1]);
    assert_eq!(feed.snapshot().menu.unread_count, 0);
    assert_eq!(feed.snapshot().cursor(ViewMode::Unread).unwrap().offset, 0);
    assert!(sink.items.lock().unwrap()[0].markup.starts_with("Assignment 4 graded"));
}
