//! Behaviour every [`Store`] must share.
//!
//! Only built for this crate's tests or with the `conformance` feature.
//! Backend crates enable it from their dev-dependencies and call [`run_all`]
//! with a fresh store factory. Each check panics on failure, like an ordinary
//! test assertion.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::debug;

use crate::client::Client;
use crate::context::Context;
use crate::path::{Path, PathConfig};
use crate::record::{KeyValue, KeyValueList, kv};
use crate::traits::Store;

type Check = fn(Client);

const CHECKS: &[(&str, Check)] = &[
    ("put_then_fetch", put_then_fetch),
    ("prefix_excludes_siblings", prefix_excludes_siblings),
    ("exact_path_over_matches", exact_path_over_matches),
    ("delete_scoping", delete_scoping),
    ("delete_is_idempotent", delete_is_idempotent),
    ("append_keeps_duplicates", append_keeps_duplicates),
    ("upsert_replaces", upsert_replaces),
    ("cancelled_writes_leave_nothing", cancelled_writes_leave_nothing),
    ("expired_delete_leaves_records", expired_delete_leaves_records),
    ("concurrent_appends", concurrent_appends),
];

/// Run every check, each against a fresh store from `new_store`.
pub fn run_all<S, F>(mut new_store: F)
where
    S: Store + 'static,
    F: FnMut() -> S,
{
    for (name, check) in CHECKS {
        let client = Client::with_config(Arc::new(new_store()), PathConfig::default());
        debug!("conformance check: {}", name);
        check(client);
    }
}

fn ctx() -> Context {
    Context::background()
}

fn path(raw: &str) -> Path {
    Path::parse(raw).expect("valid path")
}

pub fn put_then_fetch(client: Client) {
    client.put(&ctx(), &kv(&["users/1", "my user here"]).unwrap()).unwrap();
    let got = client.fetch(&ctx(), &path("users/1")).unwrap();
    assert!(got.contains(&KeyValue::new("users/1", "my user here")));
}

pub fn prefix_excludes_siblings(client: Client) {
    client
        .put(&ctx(), &kv(&["users/1", "a", "users/2", "b", "admins/1", "c"]).unwrap())
        .unwrap();
    let got = client.fetch(&ctx(), &path("users/*")).unwrap();
    assert_eq!(got.paths().collect::<Vec<_>>(), vec!["users/1", "users/2"]);
}

pub fn exact_path_over_matches(client: Client) {
    client
        .put(&ctx(), &kv(&["users", "root", "users1", "other"]).unwrap())
        .unwrap();
    let got = client.fetch(&ctx(), &path("users")).unwrap();
    assert_eq!(got.len(), 2);
    assert!(client.fetch(&ctx(), &path("nobody/*")).unwrap().is_empty());
}

pub fn delete_scoping(client: Client) {
    client
        .put(
            &ctx(),
            &kv(&["users/1", "a", "users/2", "b", "users/3", "c", "admins/1", "d"]).unwrap(),
        )
        .unwrap();
    assert_eq!(client.fetch(&ctx(), &path("users/*")).unwrap().len(), 3);

    assert_eq!(client.delete(&ctx(), &path("users/*")).unwrap(), 3);
    assert!(client.fetch(&ctx(), &path("users/*")).unwrap().is_empty());
    assert_eq!(client.fetch(&ctx(), &path("admins/*")).unwrap().len(), 1);
}

pub fn delete_is_idempotent(client: Client) {
    client.put(&ctx(), &kv(&["users/1", "a"]).unwrap()).unwrap();
    assert_eq!(client.delete(&ctx(), &path("users/*")).unwrap(), 1);
    assert_eq!(client.delete(&ctx(), &path("users/*")).unwrap(), 0);
    assert_eq!(client.delete(&ctx(), &path("never/*")).unwrap(), 0);
}

pub fn append_keeps_duplicates(client: Client) {
    client.put(&ctx(), &kv(&["k", "1"]).unwrap()).unwrap();
    client.put(&ctx(), &kv(&["k", "2"]).unwrap()).unwrap();
    let got = client.fetch(&ctx(), &path("k")).unwrap();
    assert_eq!(
        got.into_inner(),
        vec![KeyValue::new("k", "1"), KeyValue::new("k", "2")]
    );
}

pub fn upsert_replaces(client: Client) {
    client.append(&ctx(), &kv(&["k", "1", "k", "2"]).unwrap()).unwrap();
    client.upsert(&ctx(), &kv(&["k", "3", "j", "x", "k", "4"]).unwrap()).unwrap();
    let got = client.fetch(&ctx(), &path("*")).unwrap();
    assert_eq!(
        got.into_inner(),
        vec![KeyValue::new("j", "x"), KeyValue::new("k", "4")]
    );
}

pub fn cancelled_writes_leave_nothing(client: Client) {
    let cancelled = ctx();
    cancelled.cancel();
    let batch = kv(&["a/1", "x", "a/2", "y"]).unwrap();

    assert!(client.append(&cancelled, &batch).unwrap_err().is_cancellation());
    assert!(client.upsert(&cancelled, &batch).unwrap_err().is_cancellation());
    assert!(client.fetch(&ctx(), &path("*")).unwrap().is_empty());
}

pub fn expired_delete_leaves_records(client: Client) {
    client.put(&ctx(), &kv(&["a/1", "x"]).unwrap()).unwrap();
    let expired = ctx().with_timeout(Duration::ZERO);

    assert!(client.delete(&expired, &path("a/*")).unwrap_err().is_cancellation());
    assert_eq!(client.fetch(&ctx(), &path("a/*")).unwrap().len(), 1);
}

pub fn concurrent_appends(client: Client) {
    let handles: Vec<_> = (0..4)
        .map(|t| {
            let client = client.clone();
            thread::spawn(move || {
                for i in 0..25 {
                    let batch = KeyValueList::from_pairs([(format!("t{}/{:02}", t, i), "v")]);
                    client.put(&ctx(), &batch).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(client.fetch(&ctx(), &path("t*")).unwrap().len(), 100);
    assert_eq!(client.fetch(&ctx(), &path("t2/*")).unwrap().len(), 25);
}
