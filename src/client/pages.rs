//! Page-by-page collection of list endpoints.

use std::time::Duration;

use tracing::{info, warn};

use super::request::{RequestExecutor, Sleeper};
use super::session::Transport;
use crate::model::{PageEnvelope, Record};

/// Walks a paginated listing endpoint front to back, accumulating the
/// items of every page. The first page's envelope tells it how many
/// pages exist; a failed page ends the walk with whatever was collected
/// up to that point.
pub struct Paginator<'a, T: Transport, S: Sleeper> {
    executor: &'a mut RequestExecutor<T, S>,
    page_delay: Duration,
}

impl<'a, T: Transport, S: Sleeper> Paginator<'a, T, S> {
    pub fn new(executor: &'a mut RequestExecutor<T, S>, page_delay: Duration) -> Self {
        Self {
            executor,
            page_delay,
        }
    }

    pub fn collect_all(&mut self, path: &str, label: &str, page_size: u32) -> Vec<Record> {
        let mut collected: Vec<Record> = Vec::new();
        let mut page: u64 = 1;
        let mut last_page: u64 = 1;
        loop {
            let query = [
                ("page", page.to_string()),
                ("pageSize", page_size.to_string()),
            ];
            let value = match self.executor.execute(path, &query) {
                Some(value) => value,
                None => {
                    warn!(
                        "failed to fetch page {} of {}; keeping {} items collected so far",
                        page,
                        label,
                        collected.len()
                    );
                    break;
                }
            };
            let envelope = PageEnvelope::from_value(value);
            if page == 1 {
                last_page = envelope.last_page;
                info!(
                    "{}: {} records across {} pages",
                    label, envelope.total_count, last_page
                );
                if envelope.total_count == 0 {
                    break;
                }
            }
            info!(
                "page {}/{}: {} items",
                page,
                last_page,
                envelope.items.len()
            );
            collected.extend(envelope.items);
            if page >= last_page {
                break;
            }
            page += 1;
            self.executor.pause(self.page_delay);
        }
        info!("collected {} {}", collected.len(), label);
        collected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::testing::{response, RecordingSleeper, StubTransport};

    fn page_body(total: u64, last: u64, page: u64, ids: &[u64]) -> String {
        let items: Vec<String> = ids
            .iter()
            .map(|id| format!(r#"{{"id": {}, "title": "item {}"}}"#, id, id))
            .collect();
        format!(
            r#"{{"items": [{}], "totalCount": {}, "lastPage": {}, "page": {}}}"#,
            items.join(", "),
            total,
            last,
            page
        )
    }

    fn executor(
        transport: StubTransport,
        sleeper: RecordingSleeper,
    ) -> RequestExecutor<StubTransport, RecordingSleeper> {
        let mut transport = transport;
        transport.set_csrf_token("t0ken".to_string());
        RequestExecutor::new(transport, None, 1, sleeper)
    }

    #[test]
    fn walks_every_page_in_order() {
        let transport = StubTransport::new().on_get(
            "/things",
            vec![
                Ok(response(200, &page_body(5, 3, 1, &[1, 2]))),
                Ok(response(200, &page_body(5, 3, 2, &[3, 4]))),
                Ok(response(200, &page_body(5, 3, 3, &[5]))),
            ],
        );
        let sleeper = RecordingSleeper::default();
        let mut executor = executor(transport, sleeper.clone());
        let records =
            Paginator::new(&mut executor, Duration::from_millis(10)).collect_all("/things", "things", 2);
        assert_eq!(records.len(), 5);
        let ids: Vec<u64> = records
            .iter()
            .filter_map(|r| r.get("id").and_then(|v| v.as_u64()))
            .collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
        assert_eq!(executor.transport().get_count("/things"), 3);
        let first_query = &executor.transport().calls[0].query;
        assert_eq!(
            *first_query,
            vec![
                ("page".to_string(), "1".to_string()),
                ("pageSize".to_string(), "2".to_string()),
            ]
        );
    }

    #[test]
    fn empty_dataset_stops_after_first_page() {
        let transport = StubTransport::new()
            .on_get("/things", vec![Ok(response(200, &page_body(0, 1, 1, &[])))]);
        let mut executor = executor(transport, RecordingSleeper::default());
        let records =
            Paginator::new(&mut executor, Duration::ZERO).collect_all("/things", "things", 20);
        assert!(records.is_empty());
        assert_eq!(executor.transport().get_count("/things"), 1);
    }

    #[test]
    fn later_page_failure_keeps_earlier_items() {
        let transport = StubTransport::new().on_get(
            "/things",
            vec![
                Ok(response(200, &page_body(6, 3, 1, &[1, 2]))),
                Ok(response(500, "")),
            ],
        );
        let mut executor = executor(transport, RecordingSleeper::default());
        let records =
            Paginator::new(&mut executor, Duration::ZERO).collect_all("/things", "things", 2);
        assert_eq!(records.len(), 2);
        assert_eq!(executor.errors(), 1);
    }

    #[test]
    fn pauses_between_pages_but_not_after_last() {
        let transport = StubTransport::new().on_get(
            "/things",
            vec![
                Ok(response(200, &page_body(4, 2, 1, &[1, 2]))),
                Ok(response(200, &page_body(4, 2, 2, &[3, 4]))),
            ],
        );
        let sleeper = RecordingSleeper::default();
        let mut executor = executor(transport, sleeper.clone());
        Paginator::new(&mut executor, Duration::from_millis(250)).collect_all("/things", "things", 2);
        assert_eq!(sleeper.delays(), vec![Duration::from_millis(250)]);
    }
}
