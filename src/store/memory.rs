//! In-memory ledger store for tests and local runs.

use std::collections::BTreeMap;

use dashmap::DashMap;
use serde_json::Value;

use super::{keys, Document, IndexName, LedgerStore, QueryOptions, StoreError};

/// [`LedgerStore`] backed by per-partition ordered maps, so prefix queries
/// behave like a real range scan. Maintains the `material_id` secondary index
/// over transaction records.
#[derive(Debug, Default)]
pub struct MemoryLedgerStore {
    partitions: DashMap<String, BTreeMap<String, Document>>,
    // material_id -> (sort_key + partition_key) -> base-table keys
    material_index: DashMap<String, BTreeMap<String, (String, String)>>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn index_if_transaction(&self, partition_key: &str, sort_key: &str, record: &Document) {
        if !sort_key.starts_with(keys::TRANSACTION_PREFIX) {
            return;
        }
        if let Some(Value::String(material_id)) = record.get("material_id") {
            self.material_index.entry(material_id.clone()).or_default().insert(
                format!("{sort_key}#{partition_key}"),
                (partition_key.to_string(), sort_key.to_string()),
            );
        }
    }

    fn apply_options(mut records: Vec<Document>, options: &QueryOptions) -> Vec<Document> {
        if options.descending {
            records.reverse();
        }
        if let Some(limit) = options.limit {
            records.truncate(limit);
        }
        records
    }
}

#[async_trait::async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn get(
        &self,
        partition_key: &str,
        sort_key: &str,
    ) -> Result<Option<Document>, StoreError> {
        Ok(self
            .partitions
            .get(partition_key)
            .and_then(|partition| partition.get(sort_key).cloned()))
    }

    async fn put(
        &self,
        partition_key: &str,
        sort_key: &str,
        record: Document,
    ) -> Result<(), StoreError> {
        self.index_if_transaction(partition_key, sort_key, &record);
        self.partitions
            .entry(partition_key.to_string())
            .or_default()
            .insert(sort_key.to_string(), record);
        Ok(())
    }

    async fn update(
        &self,
        partition_key: &str,
        sort_key: &str,
        delta: Document,
    ) -> Result<Document, StoreError> {
        let mut partition = self.partitions.entry(partition_key.to_string()).or_default();
        let record = partition.entry(sort_key.to_string()).or_default();
        for (field, value) in delta {
            record.insert(field, value);
        }
        let merged = record.clone();
        drop(partition);
        self.index_if_transaction(partition_key, sort_key, &merged);
        Ok(merged)
    }

    async fn query_prefix(
        &self,
        partition_key: &str,
        sort_key_prefix: &str,
        options: QueryOptions,
    ) -> Result<Vec<Document>, StoreError> {
        let records = match options.index {
            Some(IndexName::Material) => {
                let Some(entries) = self.material_index.get(partition_key) else {
                    return Ok(Vec::new());
                };
                let mut out = Vec::new();
                for (pk, sk) in entries
                    .range(sort_key_prefix.to_string()..)
                    .take_while(|(key, _)| key.starts_with(sort_key_prefix))
                    .map(|(_, keys)| keys)
                {
                    if let Some(record) =
                        self.partitions.get(pk).and_then(|p| p.get(sk).cloned())
                    {
                        out.push(record);
                    }
                }
                out
            }
            None => match self.partitions.get(partition_key) {
                Some(partition) => partition
                    .range(sort_key_prefix.to_string()..)
                    .take_while(|(key, _)| key.starts_with(sort_key_prefix))
                    .map(|(_, record)| record.clone())
                    .collect(),
                None => Vec::new(),
            },
        };
        Ok(Self::apply_options(records, &options))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let store = MemoryLedgerStore::new();
        store
            .put("vehicle#v1", "INVENTORY#M1", doc(json!({"current_quantity": "7"})))
            .await
            .unwrap();
        let fetched = store.get("vehicle#v1", "INVENTORY#M1").await.unwrap().unwrap();
        assert_eq!(fetched["current_quantity"], "7");
        assert!(store.get("vehicle#v1", "INVENTORY#M2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_merges_fields_and_creates_when_absent() {
        let store = MemoryLedgerStore::new();
        store
            .put("case#c1", "INVENTORY#M1", doc(json!({"a": 1, "b": 2})))
            .await
            .unwrap();
        let merged = store
            .update("case#c1", "INVENTORY#M1", doc(json!({"b": 3, "c": 4})))
            .await
            .unwrap();
        assert_eq!(merged["a"], 1);
        assert_eq!(merged["b"], 3);
        assert_eq!(merged["c"], 4);

        let created = store
            .update("case#c1", "INVENTORY#M9", doc(json!({"x": true})))
            .await
            .unwrap();
        assert_eq!(created["x"], true);
    }

    #[tokio::test]
    async fn prefix_query_is_ordered_and_bounded() {
        let store = MemoryLedgerStore::new();
        for (sk, n) in [
            ("TRANSACTION#000000000000001#a", 1),
            ("TRANSACTION#000000000000003#c", 3),
            ("TRANSACTION#000000000000002#b", 2),
            ("INVENTORY#M1", 0),
        ] {
            store
                .put("vehicle#v1", sk, doc(json!({"n": n})))
                .await
                .unwrap();
        }

        let ascending = store
            .query_prefix("vehicle#v1", "TRANSACTION#", QueryOptions::default())
            .await
            .unwrap();
        let order: Vec<i64> = ascending.iter().map(|d| d["n"].as_i64().unwrap()).collect();
        assert_eq!(order, vec![1, 2, 3]);

        let latest = store
            .query_prefix(
                "vehicle#v1",
                "TRANSACTION#",
                QueryOptions {
                    limit: Some(1),
                    descending: true,
                    index: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(latest[0]["n"], 3);
    }

    #[tokio::test]
    async fn material_index_spans_locations() {
        let store = MemoryLedgerStore::new();
        store
            .put(
                "vehicle#v1",
                "TRANSACTION#000000000000001#a",
                doc(json!({"material_id": "M1", "n": 1})),
            )
            .await
            .unwrap();
        store
            .put(
                "case#c7",
                "TRANSACTION#000000000000002#b",
                doc(json!({"material_id": "M1", "n": 2})),
            )
            .await
            .unwrap();
        store
            .put(
                "vehicle#v1",
                "TRANSACTION#000000000000003#c",
                doc(json!({"material_id": "M2", "n": 3})),
            )
            .await
            .unwrap();

        let m1 = store
            .query_prefix(
                "M1",
                "TRANSACTION#",
                QueryOptions::on_index(IndexName::Material),
            )
            .await
            .unwrap();
        let order: Vec<i64> = m1.iter().map(|d| d["n"].as_i64().unwrap()).collect();
        assert_eq!(order, vec![1, 2]);
    }
}
