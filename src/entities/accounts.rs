use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "accounts")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// `user` or `admin`
    pub role: String,

    /// Immutable after creation
    #[sea_orm(unique)]
    pub login: String,

    /// Argon2id PHC string (salt and cost parameters embedded)
    #[sea_orm(column_type = "Text")]
    pub password_hash: String,

    pub name: String,

    /// RFC 3339 UTC, set at insert
    pub register_time: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
