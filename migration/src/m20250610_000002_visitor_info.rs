//! 访客日志表迁移
//!
//! 创建 visitor_info 表，只追加写入：
//! - IP 地址
//! - 地理位置信息 (city, region, country)
//! - 时间戳

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(VisitorInfo::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(VisitorInfo::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(VisitorInfo::IpAddress)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(ColumnDef::new(VisitorInfo::City).string_len(255).null())
                    .col(ColumnDef::new(VisitorInfo::Region).string_len(255).null())
                    .col(ColumnDef::new(VisitorInfo::Country).string_len(255).null())
                    .col(
                        ColumnDef::new(VisitorInfo::Timestamp)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // 按时间范围查询
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_visitor_info_timestamp")
                    .table(VisitorInfo::Table)
                    .col(VisitorInfo::Timestamp)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("idx_visitor_info_timestamp").to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(VisitorInfo::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum VisitorInfo {
    #[sea_orm(iden = "visitor_info")]
    Table,
    Id,
    IpAddress,
    City,
    Region,
    Country,
    Timestamp,
}
