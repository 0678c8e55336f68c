use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // 单行计数表，id 固定为 1
        manager
            .create_table(
                Table::create()
                    .table(VisitorCount::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(VisitorCount::Id)
                            .integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(VisitorCount::Count)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(VisitorCount::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum VisitorCount {
    #[sea_orm(iden = "visitor_count")]
    Table,
    Id,
    Count,
}
