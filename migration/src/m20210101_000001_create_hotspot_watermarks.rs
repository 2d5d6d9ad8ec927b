use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // One row per tracked hotspot; processed_at is the resumption point
        manager
            .create_table(
                Table::create()
                    .table(HotspotWatermarks::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(HotspotWatermarks::Address)
                            .string_len(128)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(HotspotWatermarks::Name).string().not_null())
                    .col(
                        ColumnDef::new(HotspotWatermarks::BornAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(HotspotWatermarks::ProcessedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(HotspotWatermarks::ActivityCount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(HotspotWatermarks::UpdatedAt)
                            .timestamp_with_time_zone()
                            .default(SimpleExpr::Keyword(Keyword::CurrentTimestamp)),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(HotspotWatermarks::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum HotspotWatermarks {
    Table,
    Address,
    Name,
    BornAt,
    ProcessedAt,
    ActivityCount,
    UpdatedAt,
}
