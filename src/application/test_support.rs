//! 应用层测试用的内存夹具

use crate::domain::{Event, EventStatus, Money, Seat, Venue};
use crate::infrastructure::InMemoryTicketingStore;
use crate::ports::{TicketingStorePort, TicketingTx};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

pub struct Fixture {
    pub store: Arc<InMemoryTicketingStore>,
    pub venue: Venue,
    pub event: Event,
    pub seat_ids: Vec<Uuid>,
}

/// 票价150、每人限购5张、一周后举行的活动
pub async fn fixture(seat_count: u32) -> Fixture {
    fixture_with(Money::from_units(150), 5, seat_count).await
}

pub async fn fixture_with(price: Money, max_tickets_per_user: u32, seat_count: u32) -> Fixture {
    let store = Arc::new(InMemoryTicketingStore::new(Duration::from_millis(500)));
    let venue = Venue::new(
        "City Arena".to_string(),
        "Bengaluru".to_string(),
        "12 MG Road".to_string(),
        100,
    )
    .unwrap();
    let event = Event::new(
        venue.id,
        "Rock Night".to_string(),
        "concert".to_string(),
        Utc::now() + ChronoDuration::days(7),
        price,
        max_tickets_per_user,
    )
    .unwrap();
    let seats: Vec<Seat> = (1..=seat_count)
        .map(|n| Seat::new(event.id, format!("S-{}", n)))
        .collect();

    let mut tx = store.begin().await.unwrap();
    tx.insert_venue(&venue).await.unwrap();
    tx.insert_event(&event).await.unwrap();
    tx.insert_seats(&seats).await.unwrap();
    tx.commit().await.unwrap();

    let mut seat_ids: Vec<Uuid> = seats.iter().map(|seat| seat.id).collect();
    seat_ids.sort();

    Fixture {
        store,
        venue,
        event,
        seat_ids,
    }
}

/// 直接改写活动时间，模拟活动已经举行
pub async fn set_event_date(store: &InMemoryTicketingStore, event_id: Uuid, date: DateTime<Utc>) {
    let mut tx = store.begin().await.unwrap();
    let mut event = tx.lock_event(event_id).await.unwrap().unwrap();
    event.event_date = date;
    tx.update_event(&event).await.unwrap();
    tx.commit().await.unwrap();
}

pub async fn set_event_status(store: &InMemoryTicketingStore, event_id: Uuid, status: EventStatus) {
    let mut tx = store.begin().await.unwrap();
    let mut event = tx.lock_event(event_id).await.unwrap().unwrap();
    event.status = status;
    tx.update_event(&event).await.unwrap();
    tx.commit().await.unwrap();
}
