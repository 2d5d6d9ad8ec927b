use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Half-open day range [earliest_date, latest_date) of stored coin history
        manager
            .create_table(
                Table::create()
                    .table(CoinCoverage::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CoinCoverage::CoinId)
                            .string_len(100)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(CoinCoverage::EarliestDate).date().not_null())
                    .col(ColumnDef::new(CoinCoverage::LatestDate).date().not_null())
                    .col(
                        ColumnDef::new(CoinCoverage::UpdatedAt)
                            .timestamp_with_time_zone()
                            .default(SimpleExpr::Keyword(Keyword::CurrentTimestamp)),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(CoinCoverage::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum CoinCoverage {
    Table,
    CoinId,
    EarliestDate,
    LatestDate,
    UpdatedAt,
}
