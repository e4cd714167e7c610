//! SeaORM implementation of BookRepository

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};

use crate::domain::{
    BookFilter, BookInput, BookRepository, DomainError, Paginated, Trashed, page_params,
};
use crate::models::book::{ActiveModel, Book, Column, CoverType, Entity as BookEntity, Model};
use crate::utils::format_timestamp;

/// SeaORM-based implementation of BookRepository
pub struct SeaOrmBookRepository {
    db: DatabaseConnection,
}

impl SeaOrmBookRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn load(&self, id: i32) -> Result<Model, DomainError> {
        BookEntity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(DomainError::NotFound("book"))
    }
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Available copies after the owned count moves from `old_total` to `new_total`.
/// Outstanding loans keep their copies; the result stays within `[0, new_total]`.
pub(crate) fn rebalance_available(old_total: i32, old_available: i32, new_total: i32) -> i32 {
    let on_loan = (old_total - old_available).max(0);
    (new_total - on_loan).clamp(0, new_total.max(0))
}

#[async_trait]
impl BookRepository for SeaOrmBookRepository {
    async fn find_all(&self, filter: BookFilter) -> Result<Paginated<Book>, DomainError> {
        let mut query = BookEntity::find();

        query = match filter.trashed {
            Trashed::Without => query.filter(Column::DeletedAt.is_null()),
            Trashed::Only => query.filter(Column::DeletedAt.is_not_null()),
            Trashed::With => query,
        };

        if let Some(q) = &filter.query
            && !q.trim().is_empty()
        {
            let q = q.trim();
            let cond = Condition::any()
                .add(Column::Title.contains(q))
                .add(Column::Author.contains(q))
                .add(Column::Publisher.contains(q))
                .add(Column::Isbn.contains(q))
                .add(Column::Category.contains(q));
            query = query.filter(cond);
        }

        if let Some(category) = &filter.category
            && !category.trim().is_empty()
        {
            query = query.filter(Column::Category.contains(category.trim()));
        }

        if filter.only_available {
            query = query.filter(Column::AvailableCopies.gt(0));
        }

        query = match filter.sort.as_deref() {
            Some("title_desc") => query.order_by_desc(Column::Title),
            Some("recent") => query.order_by_desc(Column::CreatedAt),
            Some("year_desc") => query.order_by_desc(Column::PublicationYear),
            _ => query.order_by_asc(Column::Title),
        };
        query = query.order_by_asc(Column::Id);

        let (page, per_page) = page_params(filter.page, filter.per_page);
        let paginator = query.paginate(&self.db, per_page);
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page - 1).await?;

        Ok(Paginated::new(
            items.into_iter().map(Book::from).collect(),
            total,
            page,
            per_page,
        ))
    }

    async fn find_by_id(&self, id: i32) -> Result<Option<Model>, DomainError> {
        Ok(BookEntity::find_by_id(id).one(&self.db).await?)
    }

    async fn all_ids(&self) -> Result<Vec<i32>, DomainError> {
        let ids = BookEntity::find()
            .select_only()
            .column(Column::Id)
            .filter(Column::DeletedAt.is_null())
            .order_by_asc(Column::Id)
            .into_tuple::<i32>()
            .all(&self.db)
            .await?;
        Ok(ids)
    }

    async fn create(&self, input: BookInput) -> Result<Book, DomainError> {
        input.validate()?;
        let now = format_timestamp(Utc::now());
        let total = input.total_copies.unwrap_or(0);
        let available = input.available_copies.unwrap_or(total);

        let new_book = ActiveModel {
            title: Set(input.title.trim().to_string()),
            author: Set(trimmed(input.author)),
            publisher: Set(trimmed(input.publisher)),
            publication_year: Set(input.publication_year),
            isbn: Set(trimmed(input.isbn)),
            call_number: Set(trimmed(input.call_number)),
            collection_origin: Set(trimmed(input.collection_origin)),
            publication_city: Set(trimmed(input.publication_city)),
            location: Set(trimmed(input.location)),
            description: Set(trimmed(input.description)),
            category: Set(trimmed(input.category)),
            total_copies: Set(total),
            available_copies: Set(available),
            cover: Set(trimmed(input.cover)),
            cover_type: Set(input.cover_type.unwrap_or_default()),
            deleted_at: Set(None),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        };

        let result = new_book.insert(&self.db).await?;
        tracing::info!(book_id = result.id, title = %result.title, "book created");
        Ok(Book::from(result))
    }

    async fn update(&self, id: i32, input: BookInput) -> Result<Book, DomainError> {
        input.validate()?;
        let existing = self.load(id).await?;
        let now = format_timestamp(Utc::now());

        let new_total = input.total_copies.unwrap_or(existing.total_copies);
        let new_available = match input.available_copies {
            Some(available) if available <= new_total => available,
            Some(_) => {
                return Err(DomainError::Validation(
                    "available_copies must be between 0 and total_copies".to_string(),
                ));
            }
            None => rebalance_available(
                existing.total_copies,
                existing.available_copies,
                new_total,
            ),
        };

        let mut active: ActiveModel = existing.into();
        active.title = Set(input.title.trim().to_string());
        active.author = Set(trimmed(input.author));
        active.publisher = Set(trimmed(input.publisher));
        active.publication_year = Set(input.publication_year);
        active.isbn = Set(trimmed(input.isbn));
        active.call_number = Set(trimmed(input.call_number));
        active.collection_origin = Set(trimmed(input.collection_origin));
        active.publication_city = Set(trimmed(input.publication_city));
        active.location = Set(trimmed(input.location));
        active.description = Set(trimmed(input.description));
        active.category = Set(trimmed(input.category));
        active.total_copies = Set(new_total);
        active.available_copies = Set(new_available);
        if let Some(cover_type) = input.cover_type {
            active.cover = Set(trimmed(input.cover));
            active.cover_type = Set(cover_type);
        }
        active.updated_at = Set(now);

        let result = active.update(&self.db).await?;
        Ok(Book::from(result))
    }

    async fn set_cover(
        &self,
        id: i32,
        cover: Option<String>,
        cover_type: CoverType,
    ) -> Result<Book, DomainError> {
        let existing = self.load(id).await?;
        let mut active: ActiveModel = existing.into();
        active.cover = Set(cover);
        active.cover_type = Set(cover_type);
        active.updated_at = Set(format_timestamp(Utc::now()));
        Ok(Book::from(active.update(&self.db).await?))
    }

    async fn soft_delete(&self, id: i32) -> Result<(), DomainError> {
        let now = format_timestamp(Utc::now());
        let result = BookEntity::update_many()
            .col_expr(Column::DeletedAt, Expr::value(now.clone()))
            .col_expr(Column::UpdatedAt, Expr::value(now))
            .filter(Column::Id.eq(id))
            .filter(Column::DeletedAt.is_null())
            .exec(&self.db)
            .await?;

        if result.rows_affected == 0 {
            return Err(DomainError::NotFound("book"));
        }

        Ok(())
    }

    async fn restore(&self, id: i32) -> Result<Book, DomainError> {
        let existing = self.load(id).await?;
        if existing.deleted_at.is_none() {
            return Ok(Book::from(existing));
        }
        let mut active: ActiveModel = existing.into();
        active.deleted_at = Set(None);
        active.updated_at = Set(format_timestamp(Utc::now()));
        Ok(Book::from(active.update(&self.db).await?))
    }

    async fn soft_delete_many(&self, ids: &[i32]) -> Result<u64, DomainError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let now = format_timestamp(Utc::now());
        let result = BookEntity::update_many()
            .col_expr(Column::DeletedAt, Expr::value(now.clone()))
            .col_expr(Column::UpdatedAt, Expr::value(now))
            .filter(Column::Id.is_in(ids.iter().copied()))
            .filter(Column::DeletedAt.is_null())
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }

    async fn update_stock_many(
        &self,
        ids: &[i32],
        total_copies: i32,
    ) -> Result<u64, DomainError> {
        if total_copies < 0 {
            return Err(DomainError::Validation(
                "total_copies cannot be negative".to_string(),
            ));
        }
        if ids.is_empty() {
            return Ok(0);
        }
        // A fresh inventory count: outstanding loans are not subtracted.
        let result = BookEntity::update_many()
            .col_expr(Column::TotalCopies, Expr::value(total_copies))
            .col_expr(Column::AvailableCopies, Expr::value(total_copies))
            .col_expr(Column::UpdatedAt, Expr::value(format_timestamp(Utc::now())))
            .filter(Column::Id.is_in(ids.iter().copied()))
            .exec(&self.db)
            .await?;
        tracing::info!(
            rows = result.rows_affected,
            total_copies,
            "bulk stock update reset availability"
        );
        Ok(result.rows_affected)
    }
}

#[cfg(test)]
mod tests {
    use super::rebalance_available;

    #[test]
    fn rebalance_keeps_copies_on_loan() {
        // 5 owned, 2 out on loan
        assert_eq!(rebalance_available(5, 3, 7), 5);
        assert_eq!(rebalance_available(5, 3, 2), 0);
        assert_eq!(rebalance_available(5, 5, 1), 1);
        assert_eq!(rebalance_available(0, 0, 0), 0);
    }
}
