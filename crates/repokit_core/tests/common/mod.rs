#![allow(dead_code)]

use repokit_core::{
    Column, ColumnValue, Entity, EntityKey, EntityRef, RowMeta, SqliteSession, StoreConfig,
    TimeStamped, TimeStamps,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MockItem {
    pub id: i64,
    pub name: String,
    pub value: i64,
}

impl MockItem {
    pub fn new(id: i64, name: &str, value: i64) -> Self {
        Self {
            id,
            name: name.to_string(),
            value,
        }
    }
}

impl Entity for MockItem {
    const ENTITY_NAME: &'static str = "mock_item";

    fn key(&self) -> EntityKey {
        self.id.to_string()
    }

    fn columns() -> Vec<Column<Self>> {
        vec![
            Column::new("id", |item| ColumnValue::Integer(item.id)),
            Column::new("name", |item| ColumnValue::Text(item.name.clone())),
            Column::new("value", |item| ColumnValue::Integer(item.value)),
        ]
    }
}

/// Entity whose `id` column is not its identity, so ids may repeat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Score {
    pub uuid: Uuid,
    pub id: i64,
    pub name: String,
    pub value: i64,
}

impl Score {
    pub fn new(id: i64, name: &str, value: i64) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            id,
            name: name.to_string(),
            value,
        }
    }
}

impl Entity for Score {
    const ENTITY_NAME: &'static str = "score";

    fn key(&self) -> EntityKey {
        self.uuid.to_string()
    }

    fn columns() -> Vec<Column<Self>> {
        vec![
            Column::new("id", |score| ColumnValue::Integer(score.id)),
            Column::new("name", |score| ColumnValue::Text(score.name.clone())),
            Column::new("value", |score| ColumnValue::Integer(score.value)),
        ]
    }
}

/// Entity that receives the store row id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub code: String,
    #[serde(skip)]
    pub row_id: Option<i64>,
    pub stamps: TimeStamps,
}

impl Ticket {
    pub fn new(code: &str) -> Self {
        Self {
            code: code.to_string(),
            row_id: None,
            stamps: TimeStamps::now(),
        }
    }
}

impl Entity for Ticket {
    const ENTITY_NAME: &'static str = "ticket";

    fn key(&self) -> EntityKey {
        self.code.clone()
    }

    fn columns() -> Vec<Column<Self>> {
        vec![
            Column::new("code", |ticket| ColumnValue::Text(ticket.code.clone())),
            Column::new("created_at", |ticket| ticket.stamps.created_column()),
            Column::new("modified_at", |ticket| ticket.stamps.modified_column()),
        ]
    }

    fn apply_row_meta(&mut self, meta: &RowMeta) {
        self.row_id = Some(meta.row_id);
    }
}

impl TimeStamped for Ticket {
    fn timestamps(&self) -> &TimeStamps {
        &self.stamps
    }

    fn timestamps_mut(&mut self) -> &mut TimeStamps {
        &mut self.stamps
    }
}

pub fn open_session() -> SqliteSession {
    SqliteSession::open_in_memory(StoreConfig::default()).unwrap()
}

/// Session preloaded with items 1..=5 in id order.
pub fn seeded_session() -> SqliteSession {
    let session = open_session();
    seed(&session, (1..=5).map(|id| MockItem::new(id, &format!("item-{id}"), id * 10)));
    session
}

pub fn seed<T: Entity>(session: &SqliteSession, entities: impl IntoIterator<Item = T>) {
    let repo = repokit_core::Repository::<T>::new(session);
    for entity in entities {
        repo.add(Some(entity)).unwrap();
    }
}

pub fn ids(items: &[EntityRef<MockItem>]) -> Vec<i64> {
    items.iter().map(|item| item.borrow().id).collect()
}

pub fn row_count(session: &SqliteSession, entity: &str) -> i64 {
    session
        .connection()
        .query_row(
            "SELECT COUNT(*) FROM entity_rows WHERE entity = ?1;",
            [entity],
            |row| row.get(0),
        )
        .unwrap()
}
