//! "Recent open orders" feed for the register's order picker.

use std::cmp::Reverse;

use chrono::{DateTime, Duration, Utc};

use forgepos_core::{DomainResult, ShopId};

use crate::order::{Order, OrderState};
use crate::ports::{Directory, SalesLedger};
use crate::view::{OrderSummary, order_summary};

pub const DEFAULT_RECENT_WINDOW_DAYS: i64 = 5;

/// Filter and rank `orders` for the feed of `shop`.
///
/// Keeps draft orders of the shop whose header or any line was written or
/// created within `window` before `now`. Ranked by the most recent line
/// activity, then header `updated_at`, then header `created_at`, all
/// descending. Orders without lines rank after orders with lines on equal
/// header keys.
pub fn select_recent(
    orders: Vec<Order>,
    shop: ShopId,
    now: DateTime<Utc>,
    window: Duration,
) -> Vec<Order> {
    let since = now - window;
    let mut selected: Vec<Order> = orders
        .into_iter()
        .filter(|o| o.shop_id() == shop && o.state() == OrderState::Draft)
        .filter(|o| is_fresh(o, since))
        .collect();

    selected.sort_by_key(|o| {
        (
            Reverse((o.latest_line_activity(), o.updated_at(), o.created_at())),
            o.id_typed(),
        )
    });
    selected
}

fn is_fresh(order: &Order, since: DateTime<Utc>) -> bool {
    order.updated_at() >= since
        || order.created_at() >= since
        || order
            .lines()
            .iter()
            .any(|l| l.updated_at >= since || l.created_at >= since)
}

pub fn recent_open_orders<L, D>(
    ledger: &L,
    directory: &D,
    shop: ShopId,
    now: DateTime<Utc>,
    window: Duration,
) -> DomainResult<Vec<OrderSummary>>
where
    L: SalesLedger + ?Sized,
    D: Directory + ?Sized,
{
    let orders = ledger.shop_orders(shop)?;
    let selected = select_recent(orders, shop, now, window);
    tracing::debug!(shop_id = %shop, count = selected.len(), "recent open orders selected");

    selected
        .iter()
        .map(|order| order_summary(order, directory))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::FulfillmentMode;
    use crate::testing::{Book, at};

    const DAY: i64 = 86_400;

    fn window() -> Duration {
        Duration::days(DEFAULT_RECENT_WINDOW_DAYS)
    }

    #[test]
    fn four_staggered_orders_rank_by_latest_activity() {
        let book = Book::new();
        let p = book.product(100, vec![]);
        let now = at(10 * DAY);

        // a: created first, but its line was touched last.
        let a = book.open_order(at(6 * DAY));
        let a_line = book.seed_line(a, p, FulfillmentMode::PickUp, 1);
        book.touch_line(a_line, at(9 * DAY));
        // b: line created mid-window.
        let b = book.open_order(at(7 * DAY));
        let b_line = book.seed_line(b, p, FulfillmentMode::Ship, 1);
        book.touch_line(b_line, at(8 * DAY));
        // c: newest header but no lines.
        let c = book.open_order(at(9 * DAY + 100));
        // d: line touched earlier than b's.
        let d = book.open_order(at(6 * DAY + 10));
        let d_line = book.seed_line(d, p, FulfillmentMode::PickUp, 2);
        book.touch_line(d_line, at(7 * DAY));

        let feed = recent_open_orders(&book, &book, book.shop.id, now, window()).unwrap();
        let ids: Vec<_> = feed.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![a, b, d, c]);
        assert_eq!(feed[0].party.name, "Walk-in");
    }

    #[test]
    fn stale_foreign_and_confirmed_orders_are_excluded() {
        let book = Book::new();
        let p = book.product(100, vec![]);
        let now = at(20 * DAY);

        let fresh = book.open_order(at(18 * DAY));
        let _stale = book.open_order(at(DAY));
        let _foreign = book.open_order_in(ShopId::new(), at(19 * DAY));
        let confirmed = book.open_order(at(19 * DAY));
        book.seed_line(confirmed, p, FulfillmentMode::PickUp, 1);
        book.confirm(confirmed);

        let feed = recent_open_orders(&book, &book, book.shop.id, now, window()).unwrap();
        assert_eq!(feed.len(), 1);
        assert_eq!(feed[0].id, fresh);
    }

    #[test]
    fn old_header_with_fresh_line_is_kept() {
        let book = Book::new();
        let p = book.product(100, vec![]);
        let old = book.open_order(at(0));
        let line = book.seed_line(old, p, FulfillmentMode::PickUp, 1);
        book.touch_line(line, at(30 * DAY));

        let feed = recent_open_orders(&book, &book, book.shop.id, at(31 * DAY), window()).unwrap();
        assert_eq!(feed.len(), 1);
        assert_eq!(feed[0].id, old);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 100,
                ..ProptestConfig::default()
            })]

            /// Property: the feed is sorted by activity and never holds a stale order.
            #[test]
            fn feed_is_sorted_and_fresh(offsets in prop::collection::vec(0i64..(10 * DAY), 1..10)) {
                let book = Book::new();
                let now = at(10 * DAY);
                for off in &offsets {
                    book.open_order(at(*off));
                }

                let orders = book.shop_orders(book.shop.id).unwrap();
                let selected = select_recent(orders, book.shop.id, now, window());
                let since = now - window();
                for pair in selected.windows(2) {
                    prop_assert!(pair[0].updated_at() >= pair[1].updated_at());
                }
                for o in &selected {
                    prop_assert!(o.created_at() >= since);
                }
                let expected = offsets.iter().filter(|o| at(**o) >= since).count();
                prop_assert_eq!(selected.len(), expected);
            }
        }
    }
}
