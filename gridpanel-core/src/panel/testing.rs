//! Scripted transport shared by the panel and tab tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{Error, Result};

use super::transport::{DetailPayload, DetailTransport, TabPayload};

#[derive(Default)]
struct Script {
    detail_delays: HashMap<i64, u64>,
    tab_delays: HashMap<String, u64>,
    failing_records: HashSet<i64>,
    failing_tabs: HashSet<String>,
    detail_calls: Vec<i64>,
    tab_calls: Vec<(i64, String)>,
}

/// Answers after a configurable delay; records every call.
#[derive(Default)]
pub(crate) struct FakeTransport {
    script: Mutex<Script>,
}

impl FakeTransport {
    pub(crate) const DEFAULT_DELAY_MS: u64 = 20;

    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn detail_delay(self, record_id: i64, ms: u64) -> Self {
        self.script.lock().unwrap().detail_delays.insert(record_id, ms);
        self
    }

    pub(crate) fn tab_delay(self, tab: &str, ms: u64) -> Self {
        self.script.lock().unwrap().tab_delays.insert(tab.to_string(), ms);
        self
    }

    pub(crate) fn fail_record(self, record_id: i64) -> Self {
        self.script.lock().unwrap().failing_records.insert(record_id);
        self
    }

    pub(crate) fn set_tab_failing(&self, tab: &str, failing: bool) {
        let mut script = self.script.lock().unwrap();
        if failing {
            script.failing_tabs.insert(tab.to_string());
        } else {
            script.failing_tabs.remove(tab);
        }
    }

    pub(crate) fn detail_calls(&self) -> Vec<i64> {
        self.script.lock().unwrap().detail_calls.clone()
    }

    pub(crate) fn tab_calls(&self, tab: &str) -> usize {
        self.script
            .lock()
            .unwrap()
            .tab_calls
            .iter()
            .filter(|(_, t)| t == tab)
            .count()
    }
}

#[async_trait]
impl DetailTransport for FakeTransport {
    async fn fetch_detail(&self, entity: &str, record_id: i64) -> Result<DetailPayload> {
        let (delay, fails) = {
            let mut script = self.script.lock().unwrap();
            script.detail_calls.push(record_id);
            (
                script
                    .detail_delays
                    .get(&record_id)
                    .copied()
                    .unwrap_or(Self::DEFAULT_DELAY_MS),
                script.failing_records.contains(&record_id),
            )
        };
        tokio::time::sleep(Duration::from_millis(delay)).await;
        if fails {
            return Err(Error::transport(format!("{} {} unavailable", entity, record_id)));
        }
        Ok(DetailPayload::new(format!("Widget {}", record_id))
            .with_tab("overview", format!("<p>overview {}</p>", record_id)))
    }

    async fn fetch_tab(&self, _entity: &str, record_id: i64, tab: &str) -> Result<TabPayload> {
        let (delay, fails) = {
            let mut script = self.script.lock().unwrap();
            script.tab_calls.push((record_id, tab.to_string()));
            (
                script
                    .tab_delays
                    .get(tab)
                    .copied()
                    .unwrap_or(Self::DEFAULT_DELAY_MS),
                script.failing_tabs.contains(tab),
            )
        };
        tokio::time::sleep(Duration::from_millis(delay)).await;
        if fails {
            return Err(Error::transport(format!("tab {} unavailable", tab)));
        }
        Ok(TabPayload::new(format!("<p>{} {}</p>", tab, record_id)))
    }
}
