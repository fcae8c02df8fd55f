use crate::domain_port::{
    ChangeBatch, ChangeKind, CollectionListener, CollectionPath, CollectionQuery, Document,
    DocumentChange, DocumentListener, DocumentStore, Fields, Listener, OrderDirection, StoreError,
};
use dashmap::DashMap;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, PoisonError};
use tokio::sync::mpsc::{self, UnboundedSender};

type CollectionSender = UnboundedSender<Result<ChangeBatch, StoreError>>;
type DocumentSender = UnboundedSender<Result<Option<Fields>, StoreError>>;
type DocumentKey = (CollectionPath, String);

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum WriteOp {
    Set,
    Update,
    Delete,
}

/// One attempted write, successful or not.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct WriteRecord {
    pub op: WriteOp,
    pub path: CollectionPath,
    pub document_id: String,
    pub succeeded: bool,
}

/// Process-local document store with realtime listeners.
///
/// Writes to one collection and the notifications they produce are
/// serialized by the collection's map shard, so every listener observes the
/// collection's changes in write order. Failures can be scripted per
/// operation and collection with [`InMemoryDocumentStore::fail_next`], and
/// every attempted write is kept in a log.
#[derive(Default)]
pub struct InMemoryDocumentStore {
    collections: DashMap<CollectionPath, BTreeMap<String, Fields>>,
    listeners: DashMap<CollectionPath, Vec<CollectionSender>>,
    document_listeners: DashMap<DocumentKey, Vec<DocumentSender>>,
    faults: DashMap<(WriteOp, CollectionPath), VecDeque<StoreError>>,
    write_log: Mutex<Vec<WriteRecord>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `op` on `path` fail with `error`. Faults queue up.
    pub fn fail_next(&self, op: WriteOp, path: CollectionPath, error: StoreError) {
        self.faults.entry((op, path)).or_default().push_back(error);
    }

    /// Deliver `error` to every listener of `path` (collection and document
    /// listeners alike) and close them. Returns how many were closed.
    pub fn break_listeners(&self, path: &CollectionPath, error: StoreError) -> usize {
        let mut count = 0;
        if let Some((_, senders)) = self.listeners.remove(path) {
            for sender in senders {
                let _ = sender.send(Err(error.clone()));
                count += 1;
            }
        }
        for sender in self.take_document_listeners(path) {
            let _ = sender.send(Err(error.clone()));
            count += 1;
        }
        count
    }

    /// Close every listener of `path` without an error, as a store does when
    /// it shuts a listener down. Returns how many were closed.
    pub fn close_listeners(&self, path: &CollectionPath) -> usize {
        let collection = self
            .listeners
            .remove(path)
            .map(|(_, senders)| senders.len())
            .unwrap_or(0);
        collection + self.take_document_listeners(path).len()
    }

    /// Live collection listeners of `path`. Listeners whose receiving end was
    /// dropped are pruned here.
    pub fn listener_count(&self, path: &CollectionPath) -> usize {
        let count = match self.listeners.get_mut(path) {
            Some(mut senders) => {
                senders.retain(|sender| !sender.is_closed());
                senders.len()
            }
            None => 0,
        };
        if count == 0 {
            self.listeners.remove_if(path, |_, senders| senders.is_empty());
        }
        count
    }

    /// Live listeners of the single document `path/id`, pruned like
    /// [`InMemoryDocumentStore::listener_count`].
    pub fn document_listener_count(&self, path: &CollectionPath, id: &str) -> usize {
        let key = (path.clone(), id.to_owned());
        let count = match self.document_listeners.get_mut(&key) {
            Some(mut senders) => {
                senders.retain(|sender| !sender.is_closed());
                senders.len()
            }
            None => 0,
        };
        if count == 0 {
            self.document_listeners
                .remove_if(&key, |_, senders| senders.is_empty());
        }
        count
    }

    pub fn write_log(&self) -> Vec<WriteRecord> {
        self.write_log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn take_fault(&self, op: WriteOp, path: &CollectionPath) -> Option<StoreError> {
        let mut queue = self.faults.get_mut(&(op, path.clone()))?;
        queue.pop_front()
    }

    fn take_document_listeners(&self, path: &CollectionPath) -> Vec<DocumentSender> {
        let keys: Vec<DocumentKey> = self
            .document_listeners
            .iter()
            .filter(|entry| &entry.key().0 == path)
            .map(|entry| entry.key().clone())
            .collect();
        keys.iter()
            .filter_map(|key| self.document_listeners.remove(key))
            .flat_map(|(_, senders)| senders)
            .collect()
    }

    fn record(&self, op: WriteOp, path: &CollectionPath, id: &str, succeeded: bool) {
        self.write_log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(WriteRecord {
                op,
                path: path.clone(),
                document_id: id.to_owned(),
                succeeded,
            });
    }

    fn check_fault(&self, op: WriteOp, path: &CollectionPath, id: &str) -> Result<(), StoreError> {
        match self.take_fault(op, path) {
            Some(error) => {
                tracing::trace!(%path, id, ?op, %error, "scripted store failure");
                self.record(op, path, id, false);
                Err(error)
            }
            None => Ok(()),
        }
    }

    // Callers hold the collection's guard so that notifications keep write order.
    fn notify(&self, path: &CollectionPath, change: DocumentChange) {
        let key = (path.clone(), change.document_id.clone());
        let content = match change.kind {
            ChangeKind::Removed => None,
            ChangeKind::Added | ChangeKind::Modified => Some(change.fields.clone()),
        };

        let emptied = match self.document_listeners.get_mut(&key) {
            Some(mut senders) => {
                senders.retain(|sender| sender.send(Ok(content.clone())).is_ok());
                senders.is_empty()
            }
            None => false,
        };
        if emptied {
            self.document_listeners
                .remove_if(&key, |_, senders| senders.is_empty());
        }

        let batch = ChangeBatch {
            initial: false,
            changes: vec![change],
        };
        let emptied = match self.listeners.get_mut(path) {
            Some(mut senders) => {
                senders.retain(|sender| sender.send(Ok(batch.clone())).is_ok());
                senders.is_empty()
            }
            None => false,
        };
        if emptied {
            self.listeners.remove_if(path, |_, senders| senders.is_empty());
        }
    }
}

#[async_trait::async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn set_document(
        &self,
        path: &CollectionPath,
        id: &str,
        fields: Fields,
    ) -> Result<(), StoreError> {
        self.check_fault(WriteOp::Set, path, id)?;

        let mut collection = self.collections.entry(path.clone()).or_default();
        let kind = match collection.insert(id.to_owned(), fields.clone()) {
            Some(_) => ChangeKind::Modified,
            None => ChangeKind::Added,
        };
        self.notify(
            path,
            DocumentChange {
                kind,
                document_id: id.to_owned(),
                fields,
            },
        );
        drop(collection);

        self.record(WriteOp::Set, path, id, true);
        Ok(())
    }

    async fn update_document(
        &self,
        path: &CollectionPath,
        id: &str,
        fields: Fields,
    ) -> Result<(), StoreError> {
        self.check_fault(WriteOp::Update, path, id)?;

        let updated = match self.collections.get_mut(path) {
            Some(mut collection) => match collection.get_mut(id) {
                Some(document) => {
                    document.extend(fields);
                    let current = document.clone();
                    self.notify(
                        path,
                        DocumentChange {
                            kind: ChangeKind::Modified,
                            document_id: id.to_owned(),
                            fields: current,
                        },
                    );
                    true
                }
                None => false,
            },
            None => false,
        };

        self.record(WriteOp::Update, path, id, updated);
        if updated {
            Ok(())
        } else {
            Err(StoreError::NotFound(format!("{path}/{id}")))
        }
    }

    async fn delete_document(&self, path: &CollectionPath, id: &str) -> Result<(), StoreError> {
        self.check_fault(WriteOp::Delete, path, id)?;

        if let Some(mut collection) = self.collections.get_mut(path) {
            if let Some(fields) = collection.remove(id) {
                self.notify(
                    path,
                    DocumentChange {
                        kind: ChangeKind::Removed,
                        document_id: id.to_owned(),
                        fields,
                    },
                );
            }
        }

        self.record(WriteOp::Delete, path, id, true);
        Ok(())
    }

    async fn get_document(
        &self,
        path: &CollectionPath,
        id: &str,
    ) -> Result<Option<Fields>, StoreError> {
        Ok(self
            .collections
            .get(path)
            .and_then(|collection| collection.get(id).cloned()))
    }

    async fn list_documents(
        &self,
        path: &CollectionPath,
        query: &CollectionQuery,
    ) -> Result<Vec<Document>, StoreError> {
        let sort_value = |fields: &Fields| match &query.order_by {
            Some((field, _)) => fields.get(field).cloned().unwrap_or(Value::Null),
            None => Value::Null,
        };

        let mut keyed: Vec<(Value, Document)> = match self.collections.get(path) {
            Some(collection) => collection
                .iter()
                .map(|(id, fields)| {
                    (
                        sort_value(fields),
                        Document {
                            id: id.clone(),
                            fields: fields.clone(),
                        },
                    )
                })
                .collect(),
            None => Vec::new(),
        };

        if query.order_by.is_some() {
            keyed.retain(|(value, _)| !value.is_null());
        }
        keyed.sort_by(|(a, x), (b, y)| {
            query_order(&query.order_by, (a, x.id.as_str()), (b, y.id.as_str()))
        });

        if let Some(cursor) = &query.start_after {
            keyed.retain(|(value, document)| {
                query_order(
                    &query.order_by,
                    (value, document.id.as_str()),
                    (&cursor.value, cursor.document_id.as_str()),
                ) == Ordering::Greater
            });
        }

        if let Some(limit) = query.limit {
            keyed.truncate(limit);
        }

        Ok(keyed.into_iter().map(|(_, document)| document).collect())
    }

    async fn listen_collection(
        &self,
        path: &CollectionPath,
    ) -> Result<CollectionListener, StoreError> {
        let (sender, receiver) = mpsc::unbounded_channel();

        // Hold the collection while registering so no write slips between
        // the snapshot and the first live notification.
        let collection = self.collections.entry(path.clone()).or_default();
        let initial = ChangeBatch {
            initial: true,
            changes: collection
                .iter()
                .map(|(id, fields)| DocumentChange {
                    kind: ChangeKind::Added,
                    document_id: id.clone(),
                    fields: fields.clone(),
                })
                .collect(),
        };
        sender
            .send(Ok(initial))
            .map_err(|e| StoreError::Internal(format!("listener closed during registration: {e}")))?;
        self.listeners.entry(path.clone()).or_default().push(sender);
        drop(collection);

        tracing::trace!(%path, "listener registered");
        Ok(Listener::new(receiver))
    }

    async fn listen_document(
        &self,
        path: &CollectionPath,
        id: &str,
    ) -> Result<DocumentListener, StoreError> {
        let (sender, receiver) = mpsc::unbounded_channel();

        let collection = self.collections.entry(path.clone()).or_default();
        sender
            .send(Ok(collection.get(id).cloned()))
            .map_err(|e| StoreError::Internal(format!("listener closed during registration: {e}")))?;
        self.document_listeners
            .entry((path.clone(), id.to_owned()))
            .or_default()
            .push(sender);
        drop(collection);

        tracing::trace!(%path, id, "document listener registered");
        Ok(Listener::new(receiver))
    }
}

fn query_order(
    order_by: &Option<(String, OrderDirection)>,
    (a, a_id): (&Value, &str),
    (b, b_id): (&Value, &str),
) -> Ordering {
    match order_by {
        Some((_, direction)) => {
            let ord = compare_values(a, b).then_with(|| a_id.cmp(b_id));
            match direction {
                OrderDirection::Ascending => ord,
                OrderDirection::Descending => ord.reverse(),
            }
        }
        None => a_id.cmp(b_id),
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain_port::QueryCursor;
    use serde_json::json;

    fn fields(value: Value) -> Fields {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    fn path(name: &str) -> CollectionPath {
        CollectionPath::user_collection(&"u1".parse().unwrap(), name)
    }

    fn ids(documents: &[Document]) -> Vec<&str> {
        documents.iter().map(|d| d.id.as_str()).collect()
    }

    #[tokio::test]
    async fn set_overwrites_and_delete_is_idempotent() {
        let store = InMemoryDocumentStore::new();
        let p = path("friendIDs");

        store.set_document(&p, "u2", fields(json!({"friendID": "u2"}))).await.unwrap();
        store.set_document(&p, "u2", fields(json!({"friendID": "u2"}))).await.unwrap();
        assert_eq!(store.list_document_ids(&p).await.unwrap(), vec!["u2"]);

        store.delete_document(&p, "u2").await.unwrap();
        store.delete_document(&p, "u2").await.unwrap();
        assert!(store.list_document_ids(&p).await.unwrap().is_empty());
        assert_eq!(store.write_log().len(), 4);
    }

    #[tokio::test]
    async fn listener_sees_snapshot_then_changes_in_order() {
        let store = InMemoryDocumentStore::new();
        let p = path("waitingUsers");
        store.set_document(&p, "a", fields(json!({"userID": "a"}))).await.unwrap();

        let mut listener = store.listen_collection(&p).await.unwrap();
        store.set_document(&p, "b", Fields::new()).await.unwrap();
        store.set_document(&p, "b", Fields::new()).await.unwrap();
        store.delete_document(&p, "a").await.unwrap();
        store.delete_document(&p, "missing").await.unwrap();

        let initial = listener.next().await.unwrap().unwrap();
        assert!(initial.initial);
        assert_eq!(initial.changes[0].document_id, "a");
        assert_eq!(initial.changes[0].fields["userID"], "a");

        let batches = [
            listener.next().await.unwrap().unwrap(),
            listener.next().await.unwrap().unwrap(),
            listener.next().await.unwrap().unwrap(),
        ];
        let kinds: Vec<_> = batches
            .iter()
            .map(|batch| (batch.changes[0].kind, batch.changes[0].document_id.clone()))
            .collect();
        assert_eq!(
            kinds,
            vec![
                (ChangeKind::Added, "b".to_owned()),
                (ChangeKind::Modified, "b".to_owned()),
                (ChangeKind::Removed, "a".to_owned()),
            ]
        );
        // a removal carries the content the document had
        assert_eq!(batches[2].changes[0].fields["userID"], "a");
    }

    #[tokio::test]
    async fn dropped_listener_is_pruned_on_next_write() {
        let store = InMemoryDocumentStore::new();
        let p = path("friendIDs");
        let listener = store.listen_collection(&p).await.unwrap();
        assert_eq!(store.listener_count(&p), 1);

        drop(listener);
        store.set_document(&p, "x", Fields::new()).await.unwrap();
        assert!(store.listeners.get(&p).is_none());
    }

    #[tokio::test]
    async fn counting_prunes_dropped_listeners_without_a_write() {
        let store = InMemoryDocumentStore::new();
        let p = path("friendIDs");
        let kept = store.listen_collection(&p).await.unwrap();
        let dropped = store.listen_collection(&p).await.unwrap();
        drop(dropped);

        assert_eq!(store.listener_count(&p), 1);
        assert_eq!(store.listeners.get(&p).map(|s| s.len()), Some(1));

        drop(kept);
        assert_eq!(store.listener_count(&p), 0);
        assert!(store.listeners.get(&p).is_none());
    }

    #[tokio::test]
    async fn scripted_fault_fails_once_and_is_logged() {
        let store = InMemoryDocumentStore::new();
        let p = path("blocked");
        store.fail_next(WriteOp::Set, p.clone(), StoreError::Unavailable("offline".into()));

        let err = store.set_document(&p, "x", Fields::new()).await.unwrap_err();
        assert_eq!(err, StoreError::Unavailable("offline".into()));
        store.set_document(&p, "x", Fields::new()).await.unwrap();

        let log = store.write_log();
        assert!(!log[0].succeeded);
        assert!(log[1].succeeded);
    }

    #[tokio::test]
    async fn write_log_survives_a_poisoned_lock() {
        let store = std::sync::Arc::new(InMemoryDocumentStore::new());
        let p = path("blocked");
        store.set_document(&p, "x", Fields::new()).await.unwrap();

        let poisoner = store.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.write_log.lock().unwrap();
            panic!("poison the write log");
        })
        .join();
        assert!(store.write_log.is_poisoned());

        store.set_document(&p, "y", Fields::new()).await.unwrap();
        let log = store.write_log();
        assert_eq!(log.len(), 2);
        assert_eq!(log[1].document_id, "y");
    }

    #[tokio::test]
    async fn update_requires_existing_document() {
        let store = InMemoryDocumentStore::new();
        let users = CollectionPath::users();

        let err = store
            .update_document(&users, "u1", fields(json!({"online": true})))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));

        store.set_document(&users, "u1", fields(json!({"online": false, "city": "x"}))).await.unwrap();
        store.update_document(&users, "u1", fields(json!({"online": true}))).await.unwrap();
        let doc = store.get_document(&users, "u1").await.unwrap().unwrap();
        assert_eq!(doc["online"], true);
        assert_eq!(doc["city"], "x");
    }

    #[tokio::test]
    async fn ordered_query_pages_after_cursor_key() {
        let store = InMemoryDocumentStore::new();
        let users = CollectionPath::users();
        for (id, at) in [("a", json!(1)), ("b", json!(3)), ("c", json!(2)), ("d", Value::Null)] {
            store
                .set_document(&users, id, fields(json!({"lastActivity": at})))
                .await
                .unwrap();
        }

        let query = CollectionQuery {
            order_by: Some(("lastActivity".into(), OrderDirection::Descending)),
            start_after: None,
            limit: Some(2),
        };
        let first = store.list_documents(&users, &query).await.unwrap();
        assert_eq!(ids(&first), ["b", "c"]);

        let next = CollectionQuery {
            start_after: Some(QueryCursor {
                value: json!(2),
                document_id: "c".into(),
            }),
            ..query.clone()
        };
        // the cursor document moving or vanishing does not shift the page
        store
            .update_document(&users, "c", fields(json!({"lastActivity": 9})))
            .await
            .unwrap();
        let second = store.list_documents(&users, &next).await.unwrap();
        assert_eq!(ids(&second), ["a"]);

        store.delete_document(&users, "c").await.unwrap();
        let second = store.list_documents(&users, &next).await.unwrap();
        assert_eq!(ids(&second), ["a"]);
    }

    #[tokio::test]
    async fn equal_sort_values_break_ties_on_document_id() {
        let store = InMemoryDocumentStore::new();
        let users = CollectionPath::users();
        for id in ["x", "y", "z"] {
            store
                .set_document(&users, id, fields(json!({"lastActivity": 5})))
                .await
                .unwrap();
        }

        let query = CollectionQuery {
            order_by: Some(("lastActivity".into(), OrderDirection::Descending)),
            start_after: Some(QueryCursor {
                value: json!(5),
                document_id: "y".into(),
            }),
            limit: None,
        };
        assert_eq!(ids(&store.list_documents(&users, &query).await.unwrap()), ["x"]);
    }

    #[tokio::test]
    async fn broken_listeners_receive_the_error() {
        let store = InMemoryDocumentStore::new();
        let p = path("friendIDs");
        let mut listener = store.listen_collection(&p).await.unwrap();
        let _ = listener.next().await;

        assert_eq!(store.break_listeners(&p, StoreError::PermissionDenied("revoked".into())), 1);
        assert!(listener.next().await.unwrap().is_err());
        assert!(listener.next().await.is_none());
    }

    #[tokio::test]
    async fn closed_listeners_end_without_an_error() {
        let store = InMemoryDocumentStore::new();
        let p = path("friendIDs");
        let mut listener = store.listen_collection(&p).await.unwrap();
        let mut document = store.listen_document(&p, "u2").await.unwrap();
        let _ = listener.next().await;
        let _ = document.next().await;

        assert_eq!(store.close_listeners(&p), 2);
        assert!(listener.next().await.is_none());
        assert!(document.next().await.is_none());
        assert_eq!(store.listener_count(&p), 0);
    }

    #[tokio::test]
    async fn document_listener_follows_one_document() {
        let store = InMemoryDocumentStore::new();
        let users = CollectionPath::users();
        let mut listener = store.listen_document(&users, "u1").await.unwrap();

        store.set_document(&users, "u2", fields(json!({"online": true}))).await.unwrap();
        store.set_document(&users, "u1", fields(json!({"online": true}))).await.unwrap();
        store.update_document(&users, "u1", fields(json!({"online": false}))).await.unwrap();
        store.delete_document(&users, "u1").await.unwrap();

        assert_eq!(listener.next().await.unwrap().unwrap(), None);
        let created = listener.next().await.unwrap().unwrap().unwrap();
        assert_eq!(created["online"], true);
        let updated = listener.next().await.unwrap().unwrap().unwrap();
        assert_eq!(updated["online"], false);
        assert_eq!(listener.next().await.unwrap().unwrap(), None);
        assert_eq!(store.document_listener_count(&users, "u1"), 1);

        drop(listener);
        assert_eq!(store.document_listener_count(&users, "u1"), 0);
    }
}
