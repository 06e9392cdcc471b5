//! In-memory doubles for DNS providers and resolvers

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::time::Instant;

use crate::errors::DnsError;
use crate::provider::{DnsProvider, TxtRecord, TxtRecordRequest};
use crate::resolver::TxtResolver;

const PROVIDER_NAME: &str = "in-memory";

/// A zone held in memory. Failures can be injected per operation.
#[derive(Default)]
pub struct InMemoryDnsProvider {
    records: Mutex<Vec<TxtRecord>>,
    next_id: AtomicU64,
    list_failure: Mutex<Option<String>>,
    create_failure: Mutex<Option<String>>,
    delete_failure: Mutex<Option<String>>,
    list_calls: AtomicUsize,
    create_calls: AtomicUsize,
    delete_calls: AtomicUsize,
}

impl InMemoryDnsProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an existing record, e.g. one left over by a previous run.
    pub fn with_record(self, name: &str, content: &str) -> Self {
        let id = self.allocate_id();
        self.lock_records().push(TxtRecord {
            id,
            name: name.to_string(),
            content: content.to_string(),
            ttl: 300,
        });
        self
    }

    pub fn fail_list_with(&self, message: &str) {
        *self.list_failure.lock().unwrap() = Some(message.to_string());
    }

    pub fn fail_create_with(&self, message: &str) {
        *self.create_failure.lock().unwrap() = Some(message.to_string());
    }

    pub fn fail_delete_with(&self, message: &str) {
        *self.delete_failure.lock().unwrap() = Some(message.to_string());
    }

    pub fn clear_failures(&self) {
        *self.list_failure.lock().unwrap() = None;
        *self.create_failure.lock().unwrap() = None;
        *self.delete_failure.lock().unwrap() = None;
    }

    pub fn records_named(&self, name: &str) -> Vec<TxtRecord> {
        self.lock_records()
            .iter()
            .filter(|r| r.name == name)
            .cloned()
            .collect()
    }

    pub fn all_records(&self) -> Vec<TxtRecord> {
        self.lock_records().clone()
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    fn allocate_id(&self) -> String {
        format!("rec-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn lock_records(&self) -> std::sync::MutexGuard<'_, Vec<TxtRecord>> {
        self.records.lock().unwrap()
    }

    fn injected(slot: &Mutex<Option<String>>) -> Result<(), DnsError> {
        match slot.lock().unwrap().as_ref() {
            Some(message) => Err(DnsError::api(PROVIDER_NAME, message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl DnsProvider for InMemoryDnsProvider {
    fn provider_name(&self) -> &'static str {
        PROVIDER_NAME
    }

    async fn list_txt_records(&self, name: &str) -> Result<Vec<TxtRecord>, DnsError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        Self::injected(&self.list_failure)?;
        Ok(self.records_named(name))
    }

    async fn create_txt_record(&self, request: &TxtRecordRequest) -> Result<TxtRecord, DnsError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        Self::injected(&self.create_failure)?;

        let record = TxtRecord {
            id: self.allocate_id(),
            name: request.name.clone(),
            content: request.content.clone(),
            ttl: request.ttl,
        };
        self.lock_records().push(record.clone());
        Ok(record)
    }

    async fn delete_record(&self, record_id: &str) -> Result<(), DnsError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        Self::injected(&self.delete_failure)?;

        let mut records = self.lock_records();
        let before = records.len();
        records.retain(|r| r.id != record_id);
        if records.len() == before {
            return Err(DnsError::api(
                PROVIDER_NAME,
                format!("record {} not found", record_id),
            ));
        }
        Ok(())
    }
}

/// Resolver that plays back a fixed sequence of answers.
///
/// Once the script runs out every lookup returns the fallback answer.
#[derive(Default)]
pub struct ScriptedResolver {
    script: Mutex<VecDeque<Result<Vec<String>, String>>>,
    fallback: Vec<String>,
    polls: Mutex<Vec<(String, Instant)>>,
}

impl ScriptedResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then_answer(self, values: Vec<String>) -> Self {
        self.script.lock().unwrap().push_back(Ok(values));
        self
    }

    pub fn then_error(self, message: &str) -> Self {
        self.script
            .lock()
            .unwrap()
            .push_back(Err(message.to_string()));
        self
    }

    pub fn otherwise(mut self, values: Vec<String>) -> Self {
        self.fallback = values;
        self
    }

    pub fn call_count(&self) -> usize {
        self.polls.lock().unwrap().len()
    }

    /// Instants (on the tokio clock) at which lookups happened.
    pub fn poll_times(&self) -> Vec<Instant> {
        self.polls.lock().unwrap().iter().map(|(_, at)| *at).collect()
    }

    pub fn queried_names(&self) -> Vec<String> {
        self.polls
            .lock()
            .unwrap()
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }
}

#[async_trait]
impl TxtResolver for ScriptedResolver {
    async fn resolve_txt(&self, name: &str) -> Result<Vec<String>, DnsError> {
        self.polls
            .lock()
            .unwrap()
            .push((name.to_string(), Instant::now()));

        match self.script.lock().unwrap().pop_front() {
            Some(Ok(values)) => Ok(values),
            Some(Err(message)) => Err(DnsError::Resolver(message)),
            None => Ok(self.fallback.clone()),
        }
    }
}
