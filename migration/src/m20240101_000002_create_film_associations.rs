use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(FilmActor::Table)
                    .if_not_exists()
                    .col(integer(FilmActor::ActorId))
                    .col(integer(FilmActor::FilmId))
                    .col(date_time(FilmActor::LastUpdate).default(Expr::current_timestamp()))
                    .primary_key(Index::create().col(FilmActor::ActorId).col(FilmActor::FilmId))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_film_actor_film_id")
                    .table(FilmActor::Table)
                    .col(FilmActor::FilmId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(FilmCategory::Table)
                    .if_not_exists()
                    .col(integer(FilmCategory::FilmId))
                    .col(integer(FilmCategory::CategoryId))
                    .col(date_time(FilmCategory::LastUpdate).default(Expr::current_timestamp()))
                    .primary_key(
                        Index::create().col(FilmCategory::FilmId).col(FilmCategory::CategoryId),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_film_category_category_id")
                    .table(FilmCategory::Table)
                    .col(FilmCategory::CategoryId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(FilmCategory::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(FilmActor::Table).to_owned()).await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum FilmActor {
    Table,
    ActorId,
    FilmId,
    LastUpdate,
}

#[derive(DeriveIden)]
enum FilmCategory {
    Table,
    FilmId,
    CategoryId,
    LastUpdate,
}
