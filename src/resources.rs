use aws_sdk_dynamodb::error::BuildError;
use aws_sdk_dynamodb::types::{
    AttributeDefinition, KeySchemaElement, KeyType, Projection, ProjectionType,
    ScalarAttributeType, TableDescription,
};

use crate::config::Naming;

pub const STORAGE_STACK: &str = "storage-stack";
pub const USERS_TABLE: &str = "users-table";
pub const MEDIA_TABLE: &str = "media-table";
pub const MEDIA_BUCKET: &str = "media-bucket";
pub const MEDIA_BY_SOURCE_INDEX: &str = "bySource";

pub const USERS_TABLE_NAME_KEY: &str = "USERS_TABLE_NAME";
pub const MEDIA_TABLE_NAME_KEY: &str = "MEDIA_TABLE_NAME";
pub const MEDIA_BUCKET_NAME_KEY: &str = "MEDIA_BUCKET_NAME";

/// Names of the application's own tables and bucket, as the app reads them
/// from the environment file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceNames {
    pub users_table: String,
    pub media_table: String,
    pub media_bucket: String,
}

impl ResourceNames {
    pub fn from_naming(naming: &Naming) -> Self {
        return Self {
            users_table: naming.resource(USERS_TABLE),
            media_table: naming.resource(MEDIA_TABLE),
            media_bucket: naming.resource(MEDIA_BUCKET),
        };
    }

    /// Names already present in the environment win over `naming`, so local
    /// resources match what `sync` wrote.
    pub fn resolve<F>(naming: &Naming, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::from_naming(naming);
        let pick = |key: &str, default: String| {
            lookup(key)
                .filter(|value| !value.is_empty())
                .unwrap_or(default)
        };

        return Self {
            users_table: pick(USERS_TABLE_NAME_KEY, defaults.users_table),
            media_table: pick(MEDIA_TABLE_NAME_KEY, defaults.media_table),
            media_bucket: pick(MEDIA_BUCKET_NAME_KEY, defaults.media_bucket),
        };
    }

    pub fn as_env(&self) -> [(&'static str, String); 3] {
        return [
            (USERS_TABLE_NAME_KEY, self.users_table.clone()),
            (MEDIA_TABLE_NAME_KEY, self.media_table.clone()),
            (MEDIA_BUCKET_NAME_KEY, self.media_bucket.clone()),
        ];
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableDescriptor {
    pub table_name: String,
    pub key_schema: Vec<KeySchemaElement>,
    pub attribute_definitions: Vec<AttributeDefinition>,
    pub secondary_indexes: Vec<IndexDescriptor>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexDescriptor {
    pub index_name: String,
    pub key_schema: Vec<KeySchemaElement>,
    pub projection: Option<Projection>,
}

impl TableDescriptor {
    /// Keeps the parts of a live table needed to recreate it elsewhere.
    pub fn from_description(table_name: &str, description: &TableDescription) -> Self {
        let secondary_indexes = description
            .global_secondary_indexes()
            .iter()
            .filter_map(|index| {
                Some(IndexDescriptor {
                    index_name: index.index_name()?.to_string(),
                    key_schema: index.key_schema().to_vec(),
                    projection: index.projection().cloned(),
                })
            })
            .collect();

        return Self {
            table_name: description
                .table_name()
                .unwrap_or(table_name)
                .to_string(),
            key_schema: description.key_schema().to_vec(),
            attribute_definitions: description.attribute_definitions().to_vec(),
            secondary_indexes,
        };
    }

    pub fn hash_key(&self) -> Option<&str> {
        return self
            .key_schema
            .iter()
            .find(|element| element.key_type() == &KeyType::Hash)
            .map(|element| element.attribute_name());
    }
}

fn key(name: &str, key_type: KeyType) -> Result<KeySchemaElement, BuildError> {
    return KeySchemaElement::builder()
        .attribute_name(name)
        .key_type(key_type)
        .build();
}

fn string_attribute(name: &str) -> Result<AttributeDefinition, BuildError> {
    return AttributeDefinition::builder()
        .attribute_name(name)
        .attribute_type(ScalarAttributeType::S)
        .build();
}

/// Users and media tables the application expects, for runs that do not
/// mirror a deployed storage stack.
pub fn builtin_tables(names: &ResourceNames) -> Result<Vec<TableDescriptor>, BuildError> {
    let users = TableDescriptor {
        table_name: names.users_table.clone(),
        key_schema: vec![key("userId", KeyType::Hash)?],
        attribute_definitions: vec![string_attribute("userId")?],
        secondary_indexes: vec![],
    };

    let source_key = "sourceName#sourceId#usage";
    let media = TableDescriptor {
        table_name: names.media_table.clone(),
        key_schema: vec![key("mediaId", KeyType::Hash)?],
        attribute_definitions: vec![string_attribute("mediaId")?, string_attribute(source_key)?],
        secondary_indexes: vec![IndexDescriptor {
            index_name: MEDIA_BY_SOURCE_INDEX.to_string(),
            key_schema: vec![key(source_key, KeyType::Hash)?, key("mediaId", KeyType::Range)?],
            projection: Some(
                Projection::builder()
                    .projection_type(ProjectionType::All)
                    .build(),
            ),
        }],
    };

    return Ok(vec![users, media]);
}

pub fn builtin_buckets(names: &ResourceNames) -> Vec<String> {
    return vec![names.media_bucket.clone()];
}
