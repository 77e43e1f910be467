use tokio::sync::broadcast;

/// Событие стора. Несёт только идентификаторы: подписки сами перечитывают
/// состояние и рассылают самодостаточные снапшоты, поэтому потерянное
/// (lagged) событие стоит лишь свежести, но не корректности.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StoreEvent {
    PostCreated { post_id: i64 },
    PostUpdated { post_id: i64 },
    PostDeleted { post_id: i64 },
    LikeToggled { post_id: i64 },
    CommentAdded { post_id: i64 },
    ProfileUpdated { user_id: i64 },
}

impl StoreEvent {
    pub(crate) fn touches_feed(&self) -> bool {
        matches!(
            self,
            StoreEvent::PostCreated { .. }
                | StoreEvent::PostUpdated { .. }
                | StoreEvent::PostDeleted { .. }
                | StoreEvent::LikeToggled { .. }
        )
    }
}

/// Явная замена realtime-подписок внешнего стора: внутрипроцессная шина
/// поверх broadcast-канала.
#[derive(Debug)]
pub(crate) struct ChangeFeed {
    tx: broadcast::Sender<StoreEvent>,
}

impl ChangeFeed {
    pub(crate) fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub(crate) fn publish(&self, event: StoreEvent) {
        // Ошибка отправки означает лишь отсутствие подписчиков.
        let _ = self.tx.send(event);
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.tx.subscribe()
    }

    #[cfg(test)]
    pub(crate) fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::{ChangeFeed, StoreEvent};

    #[tokio::test]
    async fn subscriber_receives_published_event() {
        let feed = ChangeFeed::new(16);
        let mut rx = feed.subscribe();

        feed.publish(StoreEvent::PostCreated { post_id: 1 });

        let event = rx.recv().await.expect("event must be delivered");
        assert_eq!(event, StoreEvent::PostCreated { post_id: 1 });
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_not_an_error() {
        let feed = ChangeFeed::new(16);
        feed.publish(StoreEvent::PostDeleted { post_id: 1 });
    }

    #[tokio::test]
    async fn dropping_receiver_detaches_subscription() {
        let feed = ChangeFeed::new(16);
        let rx = feed.subscribe();
        assert_eq!(feed.receiver_count(), 1);

        drop(rx);
        assert_eq!(feed.receiver_count(), 0);
    }

    #[test]
    fn comment_and_profile_events_do_not_touch_feed() {
        assert!(StoreEvent::LikeToggled { post_id: 1 }.touches_feed());
        assert!(!StoreEvent::CommentAdded { post_id: 1 }.touches_feed());
        assert!(!StoreEvent::ProfileUpdated { user_id: 1 }.touches_feed());
    }
}
