//! SeaORM storage backend
//!
//! The counter lives in the single-row `visitor_count` table and visitor
//! records in `visitor_info`, on SQLite, MySQL/MariaDB or PostgreSQL.

mod connection;

use async_trait::async_trait;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveValue::{NotSet, Set},
    ColumnTrait, DatabaseConnection, EntityTrait, ExprTrait, QueryFilter, TransactionTrait,
};
use tracing::{debug, info, warn};

use super::retry::{self, RetryConfig};
use super::{COUNTER_ID, CounterStore, VisitorRecord};
use crate::config::DatabaseConfig;
use crate::errors::{CounterError, Result};

use migration::entities::{visitor_count, visitor_info};

pub use connection::{connect_generic, connect_sqlite, run_migrations};

/// 从数据库 URL 推断数据库类型
pub fn infer_backend_from_url(database_url: &str) -> Result<&'static str> {
    if database_url.starts_with("sqlite:")
        || database_url.ends_with(".db")
        || database_url.ends_with(".sqlite")
    {
        Ok("sqlite")
    } else if database_url.starts_with("mysql://") || database_url.starts_with("mariadb://") {
        Ok("mysql")
    } else if database_url.starts_with("postgres://") || database_url.starts_with("postgresql://") {
        Ok("postgres")
    } else {
        Err(CounterError::configuration(format!(
            "无法从 URL 推断数据库类型: {}. 支持的 URL 格式: sqlite://, mysql://, mariadb://, postgres://",
            database_url
        )))
    }
}

/// sqlx 只认 mysql:// 方案
fn normalize_database_url(database_url: &str) -> String {
    match database_url.strip_prefix("mariadb://") {
        Some(rest) => format!("mysql://{}", rest),
        None => database_url.to_string(),
    }
}

fn to_count(raw: i64) -> Result<u64> {
    u64::try_from(raw)
        .map_err(|_| CounterError::malformed_state(format!("stored count is negative: {}", raw)))
}

/// SeaORM-based counter store
#[derive(Clone)]
pub struct SeaOrmStorage {
    db: DatabaseConnection,
    backend_name: &'static str,
    retry_config: RetryConfig,
}

impl SeaOrmStorage {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        if config.url.trim().is_empty() {
            return Err(CounterError::configuration("database url is not set"));
        }

        let backend_name = infer_backend_from_url(&config.url)?;
        let url = normalize_database_url(&config.url);

        let db = if backend_name == "sqlite" {
            connect_sqlite(&url).await?
        } else {
            connect_generic(&url, backend_name, config).await?
        };

        info!("{} storage connected", backend_name.to_uppercase());
        Ok(Self {
            db,
            backend_name,
            retry_config: RetryConfig::from(config),
        })
    }

    /// 获取数据库连接
    pub fn get_db(&self) -> &DatabaseConnection {
        &self.db
    }

    async fn find_counter(&self) -> Result<Option<visitor_count::Model>> {
        let db = &self.db;
        let row = retry::with_retry("read_count", self.retry_config, || async move {
            visitor_count::Entity::find_by_id(COUNTER_ID).one(db).await
        })
        .await?;
        Ok(row)
    }
}

#[async_trait]
impl CounterStore for SeaOrmStorage {
    async fn ensure_initialized(&self) -> Result<()> {
        run_migrations(&self.db).await?;

        if let Some(existing) = self.find_counter().await? {
            debug!("Counter row already present (count = {})", existing.count);
            return Ok(());
        }

        let seed = visitor_count::ActiveModel {
            id: Set(COUNTER_ID),
            count: Set(0),
        };

        match visitor_count::Entity::insert(seed).exec(&self.db).await {
            Ok(_) => {
                info!("Counter row created with count = 0");
                Ok(())
            }
            Err(e) => {
                // 另一个实例可能刚好插入了同一行
                if self.find_counter().await?.is_some() {
                    warn!("Counter row was seeded concurrently: {}", e);
                    Ok(())
                } else {
                    Err(e.into())
                }
            }
        }
    }

    async fn read_count(&self) -> Result<u64> {
        match self.find_counter().await? {
            Some(row) => to_count(row.count),
            None => Err(CounterError::not_initialized(
                "visitor_count row is missing; run initialization first",
            )),
        }
    }

    async fn increment(&self) -> Result<u64> {
        let db = &self.db;
        let updated = retry::with_retry("increment", self.retry_config, || async move {
            let txn = db.begin().await?;

            let result = visitor_count::Entity::update_many()
                .col_expr(
                    visitor_count::Column::Count,
                    Expr::col(visitor_count::Column::Count).add(1i64),
                )
                .filter(visitor_count::Column::Id.eq(COUNTER_ID))
                .filter(visitor_count::Column::Count.lt(i64::MAX))
                .exec(&txn)
                .await?;

            if result.rows_affected == 0 {
                txn.rollback().await?;
                return Ok(None);
            }

            let row = visitor_count::Entity::find_by_id(COUNTER_ID)
                .one(&txn)
                .await?;
            txn.commit().await?;
            Ok(row)
        })
        .await?;

        match updated {
            Some(row) => to_count(row.count),
            // 没有更新任何行：要么行不存在，要么已到 BIGINT 上限
            None => match self.find_counter().await? {
                Some(row) => Err(CounterError::malformed_state(format!(
                    "count {} cannot be incremented further",
                    row.count
                ))),
                None => Err(CounterError::not_initialized(
                    "visitor_count row is missing; nothing to increment",
                )),
            },
        }
    }

    async fn append_visitor(&self, record: &VisitorRecord) -> Result<()> {
        let model = visitor_info::ActiveModel {
            id: NotSet,
            ip_address: Set(record.ip_address.clone()),
            city: Set(record.city.clone()),
            region: Set(record.region.clone()),
            country: Set(record.country.clone()),
            timestamp: Set(record.timestamp),
        };

        let db = &self.db;
        retry::with_retry("append_visitor", self.retry_config, || {
            let model = model.clone();
            async move { visitor_info::Entity::insert(model).exec(db).await }
        })
        .await?;

        debug!("Visitor record stored for {}", record.ip_address);
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        self.backend_name
    }
}
