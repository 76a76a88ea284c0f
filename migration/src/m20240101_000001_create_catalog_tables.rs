use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Film::Table)
                    .if_not_exists()
                    .col(pk_auto(Film::FilmId))
                    .col(string_len(Film::Title, 128))
                    .col(text_null(Film::Description))
                    .col(integer_null(Film::ReleaseYear))
                    .col(integer(Film::LanguageId))
                    .col(integer_null(Film::OriginalLanguageId))
                    .col(integer(Film::RentalDuration).default(3))
                    .col(decimal_len(Film::RentalRate, 4, 2).default(4.99))
                    .col(integer_null(Film::Length))
                    .col(decimal_len(Film::ReplacementCost, 5, 2).default(19.99))
                    .col(string_len_null(Film::Rating, 8))
                    .col(string_null(Film::SpecialFeatures))
                    .col(date_time(Film::LastUpdate).default(Expr::current_timestamp()))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_film_title")
                    .table(Film::Table)
                    .col(Film::Title)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Actor::Table)
                    .if_not_exists()
                    .col(pk_auto(Actor::ActorId))
                    .col(string_len(Actor::FirstName, 45))
                    .col(string_len(Actor::LastName, 45))
                    .col(date_time(Actor::LastUpdate).default(Expr::current_timestamp()))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Category::Table)
                    .if_not_exists()
                    .col(pk_auto(Category::CategoryId))
                    .col(string_len(Category::Name, 25))
                    .col(date_time(Category::LastUpdate).default(Expr::current_timestamp()))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_category_name")
                    .table(Category::Table)
                    .col(Category::Name)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(Category::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Actor::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Film::Table).to_owned()).await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Film {
    Table,
    FilmId,
    Title,
    Description,
    ReleaseYear,
    LanguageId,
    OriginalLanguageId,
    RentalDuration,
    RentalRate,
    Length,
    ReplacementCost,
    Rating,
    SpecialFeatures,
    LastUpdate,
}

#[derive(DeriveIden)]
enum Actor {
    Table,
    ActorId,
    FirstName,
    LastName,
    LastUpdate,
}

#[derive(DeriveIden)]
enum Category {
    Table,
    CategoryId,
    Name,
    LastUpdate,
}
