//! Recreates a deployed environment's tables and buckets on local emulated
//! endpoints, then seeds the fixture user.
//!
//! Every step is idempotent: resources that already exist locally are left
//! alone and reported as [`Provisioned::AlreadyExists`]. Anything else that
//! goes wrong aborts the run; nothing is rolled back.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_dynamodb::error::BuildError;
use aws_sdk_dynamodb::types::AttributeValue;
use chrono::{SecondsFormat, Utc};

#[cfg(test)]
use mockall::automock;

use crate::resources::{builtin_buckets, builtin_tables, ResourceNames, TableDescriptor};

pub type Item = HashMap<String, AttributeValue>;

pub const BOOTSTRAP_USER_ID: &str = "local-user";

/// Throughput given to every local table and index.
pub const LOCAL_CAPACITY: Capacity = Capacity { read: 5, write: 5 };

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum Error {
    #[error("Table {0} not found")]
    TableNotFound(String),

    #[error("Table {0} has no partition key")]
    MissingHashKey(String),

    #[error("Invalid request for {resource}: {reason}")]
    InvalidRequest { resource: String, reason: String },

    #[error("Table {0} did not become active in time")]
    NotActive(String),

    #[error("Service error ocurred for {resource}: {reason}")]
    ServiceError { resource: String, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capacity {
    pub read: i64,
    pub write: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provisioned {
    Created,
    AlreadyExists,
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait TableBackend: Send + Sync {
    async fn describe_table(&self, table_name: &str) -> Result<TableDescriptor, Error>;

    /// Reports `AlreadyExists` instead of failing when the table is present.
    async fn create_table(
        &self,
        table: &TableDescriptor,
        capacity: Capacity,
    ) -> Result<Provisioned, Error>;

    async fn wait_until_active(&self, table_name: &str) -> Result<(), Error>;

    async fn get_item(&self, table_name: &str, key: Item) -> Result<Option<Item>, Error>;

    async fn put_item(&self, table_name: &str, item: Item) -> Result<(), Error>;
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait BucketBackend: Send + Sync {
    /// Reports `AlreadyExists` instead of failing when the bucket is present.
    async fn create_bucket(&self, bucket_name: &str) -> Result<Provisioned, Error>;
}

pub async fn provision_table(
    local: &dyn TableBackend,
    table: &TableDescriptor,
) -> Result<Provisioned, Error> {
    tracing::info!(table = %table.table_name, "creating local DynamoDB table");
    let provisioned = local.create_table(table, LOCAL_CAPACITY).await?;

    match provisioned {
        Provisioned::Created => {
            local.wait_until_active(&table.table_name).await?;
            tracing::info!(table = %table.table_name, "created local DynamoDB table");
        }
        Provisioned::AlreadyExists => {
            tracing::info!(table = %table.table_name, "table already exists locally, skipping");
        }
    }

    return Ok(provisioned);
}

/// Mirrors each named cloud table onto the local endpoint.
pub async fn provision_tables(
    cloud: &dyn TableBackend,
    local: &dyn TableBackend,
    table_names: &[String],
) -> Result<Vec<Provisioned>, Error> {
    let mut results = Vec::with_capacity(table_names.len());
    for table_name in table_names {
        let descriptor = cloud.describe_table(table_name).await?;
        results.push(provision_table(local, &descriptor).await?);
    }

    return Ok(results);
}

pub async fn provision_buckets(
    local: &dyn BucketBackend,
    bucket_names: &[String],
) -> Result<Vec<Provisioned>, Error> {
    let mut results = Vec::with_capacity(bucket_names.len());
    for bucket_name in bucket_names {
        tracing::info!(bucket = %bucket_name, "creating local S3 bucket");
        let provisioned = local.create_bucket(bucket_name).await?;
        match provisioned {
            Provisioned::Created => tracing::info!(bucket = %bucket_name, "created local S3 bucket"),
            Provisioned::AlreadyExists => {
                tracing::info!(bucket = %bucket_name, "bucket already exists locally, skipping")
            }
        }
        results.push(provisioned);
    }

    return Ok(results);
}

/// Inserts the fixture user unless it is already there. The key attribute is
/// taken from the table's partition key.
pub async fn seed_bootstrap_user(
    local: &dyn TableBackend,
    table_name: &str,
) -> Result<Provisioned, Error> {
    let table = local.describe_table(table_name).await?;
    let hash_key = table
        .hash_key()
        .ok_or_else(|| Error::MissingHashKey(table_name.to_string()))?
        .to_string();

    let key = Item::from([(
        hash_key.clone(),
        AttributeValue::S(BOOTSTRAP_USER_ID.to_string()),
    )]);
    if local.get_item(table_name, key).await?.is_some() {
        tracing::info!(table = table_name, "bootstrap user already exists, skipping");
        return Ok(Provisioned::AlreadyExists);
    }

    tracing::info!(table = table_name, "creating bootstrap user");
    local.put_item(table_name, bootstrap_user(&hash_key)).await?;
    return Ok(Provisioned::Created);
}

/// Where the local tables come from.
pub enum TableSource<'a> {
    /// Describe each named table in the cloud and recreate it.
    Mirror {
        cloud: &'a dyn TableBackend,
        table_names: Vec<String>,
    },
    Descriptors(Vec<TableDescriptor>),
}

impl TableSource<'_> {
    fn contains(&self, table_name: &str) -> bool {
        return match self {
            TableSource::Mirror { table_names, .. } => {
                table_names.iter().any(|name| name == table_name)
            }
            TableSource::Descriptors(tables) => {
                tables.iter().any(|table| table.table_name == table_name)
            }
        };
    }
}

pub struct Plan<'a> {
    pub tables: TableSource<'a>,
    pub users_table: String,
    pub buckets: Vec<String>,
}

impl Plan<'_> {
    /// The application's own schema under `names`, without a deployed stack.
    pub fn builtin(names: &ResourceNames) -> Result<Self, BuildError> {
        return Ok(Self {
            tables: TableSource::Descriptors(builtin_tables(names)?),
            users_table: names.users_table.clone(),
            buckets: builtin_buckets(names),
        });
    }
}

/// Tables first, then the fixture user, then buckets.
pub async fn run(
    local_tables: &dyn TableBackend,
    local_buckets: &dyn BucketBackend,
    plan: Plan<'_>,
) -> Result<(), Error> {
    let seed = plan.tables.contains(&plan.users_table);

    match &plan.tables {
        TableSource::Mirror { cloud, table_names } => {
            provision_tables(*cloud, local_tables, table_names).await?;
        }
        TableSource::Descriptors(tables) => {
            for table in tables {
                provision_table(local_tables, table).await?;
            }
        }
    }

    if seed {
        seed_bootstrap_user(local_tables, &plan.users_table).await?;
    } else {
        tracing::warn!(table = %plan.users_table, "users table not provisioned, skipping bootstrap user");
    }

    provision_buckets(local_buckets, &plan.buckets).await?;
    return Ok(());
}

fn bootstrap_user(hash_key: &str) -> Item {
    let created_at = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);
    return [
        (hash_key, BOOTSTRAP_USER_ID.to_string()),
        ("firstName", String::from("Hello")),
        ("lastName", String::from("World")),
        ("email", String::from("hello@world.com")),
        ("createdAt", created_at),
    ]
    .into_iter()
    .map(|(name, value)| (name.to_string(), AttributeValue::S(value)))
    .collect();
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, BTreeSet};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use aws_sdk_dynamodb::types::AttributeValue;
    use mockall::predicate::eq;

    use super::{
        provision_buckets, provision_table, provision_tables, run, seed_bootstrap_user,
        BucketBackend, Capacity, Error, Item, MockBucketBackend, MockTableBackend, Plan,
        Provisioned, TableBackend, TableSource, BOOTSTRAP_USER_ID, LOCAL_CAPACITY,
    };
    use crate::config::Naming;
    use crate::resources::{builtin_tables, ResourceNames, TableDescriptor};

    /// In-memory stand-in for the emulated endpoints.
    #[derive(Default)]
    struct MemoryStore {
        tables: Mutex<BTreeMap<String, (TableDescriptor, Vec<Item>)>>,
        buckets: Mutex<BTreeSet<String>>,
    }

    impl MemoryStore {
        fn item_count(&self, table_name: &str) -> usize {
            self.tables.lock().unwrap()[table_name].1.len()
        }
    }

    #[async_trait]
    impl TableBackend for MemoryStore {
        async fn describe_table(&self, table_name: &str) -> Result<TableDescriptor, Error> {
            return self
                .tables
                .lock()
                .unwrap()
                .get(table_name)
                .map(|(descriptor, _)| descriptor.clone())
                .ok_or_else(|| Error::TableNotFound(table_name.to_string()));
        }

        async fn create_table(
            &self,
            table: &TableDescriptor,
            _capacity: Capacity,
        ) -> Result<Provisioned, Error> {
            let mut tables = self.tables.lock().unwrap();
            if tables.contains_key(&table.table_name) {
                return Ok(Provisioned::AlreadyExists);
            }
            tables.insert(table.table_name.clone(), (table.clone(), vec![]));
            return Ok(Provisioned::Created);
        }

        async fn wait_until_active(&self, _table_name: &str) -> Result<(), Error> {
            return Ok(());
        }

        async fn get_item(&self, table_name: &str, key: Item) -> Result<Option<Item>, Error> {
            let tables = self.tables.lock().unwrap();
            let (_, items) = tables
                .get(table_name)
                .ok_or_else(|| Error::TableNotFound(table_name.to_string()))?;
            return Ok(items
                .iter()
                .find(|item| key.iter().all(|(name, value)| item.get(name) == Some(value)))
                .cloned());
        }

        async fn put_item(&self, table_name: &str, item: Item) -> Result<(), Error> {
            let mut tables = self.tables.lock().unwrap();
            let (_, items) = tables
                .get_mut(table_name)
                .ok_or_else(|| Error::TableNotFound(table_name.to_string()))?;
            items.push(item);
            return Ok(());
        }
    }

    #[async_trait]
    impl BucketBackend for MemoryStore {
        async fn create_bucket(&self, bucket_name: &str) -> Result<Provisioned, Error> {
            if self.buckets.lock().unwrap().insert(bucket_name.to_string()) {
                return Ok(Provisioned::Created);
            }
            return Ok(Provisioned::AlreadyExists);
        }
    }

    fn dev_tables() -> Vec<TableDescriptor> {
        builtin_tables(&ResourceNames::from_naming(&Naming::new("shop", "dev"))).unwrap()
    }

    fn users_table() -> TableDescriptor {
        dev_tables().remove(0)
    }

    fn cloud_with(table: TableDescriptor) -> MockTableBackend {
        let mut cloud = MockTableBackend::new();
        cloud
            .expect_describe_table()
            .returning(move |_| Ok(table.clone()));
        cloud
    }

    #[tokio::test]
    async fn provisioning_twice_leaves_one_table() {
        let mut table = users_table();
        table.table_name = String::from("t1");
        let cloud = cloud_with(table);
        let local = MemoryStore::default();
        let names = vec![String::from("t1")];

        let first = provision_tables(&cloud, &local, &names).await.unwrap();
        let second = provision_tables(&cloud, &local, &names).await.unwrap();

        assert_eq!(vec![Provisioned::Created], first);
        assert_eq!(vec![Provisioned::AlreadyExists], second);
        let tables = local.tables.lock().unwrap();
        assert_eq!(vec!["t1"], tables.keys().collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn recreates_with_fixed_capacity_and_waits_for_the_new_table() {
        let table = dev_tables().remove(1);
        let expected = table.clone();
        let mut local = MockTableBackend::new();
        local
            .expect_create_table()
            .with(eq(expected), eq(LOCAL_CAPACITY))
            .times(1)
            .returning(|_, _| Ok(Provisioned::Created));
        local
            .expect_wait_until_active()
            .with(eq("shop-dev-media-table"))
            .times(1)
            .returning(|_| Ok(()));

        assert_eq!(
            Provisioned::Created,
            provision_table(&local, &table).await.unwrap()
        );
        assert_eq!(Capacity { read: 5, write: 5 }, LOCAL_CAPACITY);
    }

    #[tokio::test]
    async fn existing_tables_are_not_waited_for() {
        let mut local = MockTableBackend::new();
        local
            .expect_create_table()
            .returning(|_, _| Ok(Provisioned::AlreadyExists));
        local.expect_wait_until_active().never();

        let result = provision_table(&local, &users_table()).await;

        assert_eq!(Ok(Provisioned::AlreadyExists), result);
    }

    #[tokio::test]
    async fn other_failures_abort_the_run() {
        let cloud = cloud_with(users_table());
        let mut local = MockTableBackend::new();
        local.expect_create_table().times(1).returning(|table, _| {
            Err(Error::ServiceError {
                resource: table.table_name.clone(),
                reason: String::from("access denied"),
            })
        });
        let names = vec![String::from("a"), String::from("b")];

        let result = provision_tables(&cloud, &local, &names).await;

        assert!(matches!(result, Err(Error::ServiceError { .. })));
    }

    #[tokio::test]
    async fn unknown_cloud_table_fails() {
        let cloud = MemoryStore::default();
        let local = MemoryStore::default();

        let result = provision_tables(&cloud, &local, &[String::from("missing")]).await;

        assert_eq!(Err(Error::TableNotFound(String::from("missing"))), result);
    }

    #[tokio::test]
    async fn buckets_are_idempotent() {
        let local = MemoryStore::default();
        let names = vec![String::from("shop-dev-media-bucket")];

        assert_eq!(
            vec![Provisioned::Created],
            provision_buckets(&local, &names).await.unwrap()
        );
        assert_eq!(
            vec![Provisioned::AlreadyExists],
            provision_buckets(&local, &names).await.unwrap()
        );
        assert_eq!(1, local.buckets.lock().unwrap().len());
    }

    #[tokio::test]
    async fn bucket_failures_propagate() {
        let mut local = MockBucketBackend::new();
        local.expect_create_bucket().returning(|name| {
            Err(Error::ServiceError {
                resource: name.to_string(),
                reason: String::from("boom"),
            })
        });

        let result = provision_buckets(&local, &[String::from("b")]).await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn seeds_the_bootstrap_user_once() {
        let local = MemoryStore::default();
        let table = users_table();
        provision_table(&local, &table).await.unwrap();

        let first = seed_bootstrap_user(&local, &table.table_name).await.unwrap();
        let second = seed_bootstrap_user(&local, &table.table_name).await.unwrap();

        assert_eq!(Provisioned::Created, first);
        assert_eq!(Provisioned::AlreadyExists, second);
        assert_eq!(1, local.item_count(&table.table_name));

        let tables = local.tables.lock().unwrap();
        let user = &tables[&table.table_name].1[0];
        assert_eq!(
            Some(&AttributeValue::S(BOOTSTRAP_USER_ID.to_string())),
            user.get("userId")
        );
        assert_eq!(
            Some(&AttributeValue::S(String::from("hello@world.com"))),
            user.get("email")
        );
        match user.get("createdAt") {
            Some(AttributeValue::S(created_at)) => assert!(created_at.ends_with('Z')),
            other => panic!("Expected a string timestamp, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn seeding_requires_the_table() {
        let local = MemoryStore::default();

        let result = seed_bootstrap_user(&local, "shop-dev-users-table").await;

        assert_eq!(
            Err(Error::TableNotFound(String::from("shop-dev-users-table"))),
            result
        );
    }

    #[tokio::test]
    async fn builtin_plan_creates_everything_and_seeds_the_user() {
        let local = MemoryStore::default();
        let names = ResourceNames::from_naming(&Naming::new("shop", "local"));
        let plan = || Plan::builtin(&names).unwrap();

        run(&local, &local, plan()).await.unwrap();
        run(&local, &local, plan()).await.unwrap();

        assert_eq!(2, local.tables.lock().unwrap().len());
        assert_eq!(1, local.item_count("shop-local-users-table"));
        assert_eq!(0, local.item_count("shop-local-media-table"));
        assert_eq!(1, local.buckets.lock().unwrap().len());
    }

    #[tokio::test]
    async fn mirrored_plan_uses_the_cloud_key_schema() {
        let mut users = users_table();
        users.key_schema = vec![aws_sdk_dynamodb::types::KeySchemaElement::builder()
            .attribute_name("id")
            .key_type(aws_sdk_dynamodb::types::KeyType::Hash)
            .build()
            .unwrap()];
        let cloud = cloud_with(users);
        let local = MemoryStore::default();

        run(
            &local,
            &local,
            Plan {
                tables: TableSource::Mirror {
                    cloud: &cloud,
                    table_names: vec![String::from("shop-dev-users-table")],
                },
                users_table: String::from("shop-dev-users-table"),
                buckets: vec![],
            },
        )
        .await
        .unwrap();

        let tables = local.tables.lock().unwrap();
        let user = &tables["shop-dev-users-table"].1[0];
        assert_eq!(
            Some(&AttributeValue::S(BOOTSTRAP_USER_ID.to_string())),
            user.get("id")
        );
    }

    #[tokio::test]
    async fn skips_seeding_when_the_users_table_is_not_planned() {
        let mut local = MockTableBackend::new();
        local.expect_describe_table().never();
        local.expect_get_item().never();
        let mut buckets = MockBucketBackend::new();
        buckets
            .expect_create_bucket()
            .times(1)
            .returning(|_| Ok(Provisioned::Created));

        let result = run(
            &local,
            &buckets,
            Plan {
                tables: TableSource::Descriptors(vec![]),
                users_table: String::from("shop-dev-users-table"),
                buckets: vec![String::from("shop-dev-media-bucket")],
            },
        )
        .await;

        assert_eq!(Ok(()), result);
    }
}
