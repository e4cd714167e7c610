//! SeaORM implementation of UserRepository

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, Statement, TransactionTrait,
};

use crate::domain::{
    DomainError, NewUser, Paginated, Trashed, UserFilter, UserRepository, UserUpdate, page_params,
};
use crate::models::member_sequence;
use crate::models::user::{ActiveModel, Column, Entity as UserEntity, Model, User};
use crate::utils::format_timestamp;

pub fn format_member_code(year: i32, seq: i32) -> String {
    format!("{}{:03}", year, seq)
}

/// Hands out the next member code for `year`.
///
/// The counter row is bumped with a single upsert, so two allocations for
/// the same year can never observe the same sequence number.
pub async fn allocate_member_code<C>(conn: &C, year: i32) -> Result<String, DomainError>
where
    C: ConnectionTrait,
{
    conn.execute(Statement::from_sql_and_values(
        conn.get_database_backend(),
        r#"
        INSERT INTO member_sequences (year, last_seq) VALUES (?, 1)
        ON CONFLICT(year) DO UPDATE SET last_seq = last_seq + 1
        "#,
        [year.into()],
    ))
    .await?;

    let sequence = member_sequence::Entity::find_by_id(year)
        .one(conn)
        .await?
        .ok_or_else(|| DomainError::Internal(format!("member sequence for {} missing", year)))?;

    Ok(format_member_code(year, sequence.last_seq))
}

/// SeaORM-based implementation of UserRepository
pub struct SeaOrmUserRepository {
    db: DatabaseConnection,
}

impl SeaOrmUserRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn load(&self, id: i32) -> Result<Model, DomainError> {
        UserEntity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(DomainError::NotFound("user"))
    }
}

/// Names the unique column behind a conflict; SQLite reports it as
/// `UNIQUE constraint failed: users.<column>`.
fn username_conflict(err: DomainError) -> DomainError {
    match err {
        DomainError::Conflict(detail) if detail.contains("users.username") => {
            DomainError::Conflict("username is already taken".to_string())
        }
        DomainError::Conflict(detail) if detail.contains("users.member_code") => {
            DomainError::Conflict("member code is already in use".to_string())
        }
        other => other,
    }
}

#[async_trait]
impl UserRepository for SeaOrmUserRepository {
    async fn find_all(&self, filter: UserFilter) -> Result<Paginated<User>, DomainError> {
        let mut query = UserEntity::find();

        query = match filter.trashed {
            Trashed::Without => query.filter(Column::DeletedAt.is_null()),
            Trashed::Only => query.filter(Column::DeletedAt.is_not_null()),
            Trashed::With => query,
        };

        if let Some(q) = &filter.query
            && !q.trim().is_empty()
        {
            let q = q.trim();
            query = query.filter(
                Condition::any()
                    .add(Column::Name.contains(q))
                    .add(Column::Username.contains(q))
                    .add(Column::MemberCode.contains(q)),
            );
        }

        if let Some(role) = filter.role {
            query = query.filter(Column::Role.eq(role));
        }

        let (page, per_page) = page_params(filter.page, filter.per_page);
        let paginator = query
            .order_by_asc(Column::Name)
            .order_by_asc(Column::Id)
            .paginate(&self.db, per_page);
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page - 1).await?;

        Ok(Paginated::new(
            items.into_iter().map(User::from).collect(),
            total,
            page,
            per_page,
        ))
    }

    async fn find_by_id(&self, id: i32) -> Result<Option<Model>, DomainError> {
        Ok(UserEntity::find_by_id(id).one(&self.db).await?)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<Model>, DomainError> {
        Ok(UserEntity::find()
            .filter(Column::Username.eq(username))
            .filter(Column::DeletedAt.is_null())
            .one(&self.db)
            .await?)
    }

    async fn create(&self, input: NewUser, password_hash: String) -> Result<User, DomainError> {
        input.validate()?;
        let now = format_timestamp(Utc::now());

        let txn = self.db.begin().await?;
        let member_code = allocate_member_code(&txn, input.enrollment_year).await?;

        let user = ActiveModel {
            member_code: Set(member_code),
            name: Set(input.name.trim().to_string()),
            username: Set(input.username.trim().to_string()),
            password_hash: Set(password_hash),
            role: Set(input.role),
            enrollment_year: Set(input.enrollment_year),
            gender: Set(input.gender),
            major: Set(input.major),
            phone: Set(input.phone),
            photo: Set(input.photo),
            deleted_at: Set(None),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        };

        let saved = user
            .insert(&txn)
            .await
            .map_err(|e| username_conflict(e.into()))?;
        txn.commit().await?;

        tracing::info!(
            user_id = saved.id,
            member_code = %saved.member_code,
            role = saved.role.as_str(),
            "user created"
        );
        Ok(User::from(saved))
    }

    async fn update(
        &self,
        id: i32,
        input: UserUpdate,
        password_hash: Option<String>,
    ) -> Result<User, DomainError> {
        input.validate()?;

        let txn = self.db.begin().await?;
        let existing = UserEntity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or(DomainError::NotFound("user"))?;

        let year_changed = input
            .enrollment_year
            .is_some_and(|year| year != existing.enrollment_year);
        let old_code = existing.member_code.clone();

        let mut active: ActiveModel = existing.into();
        if let Some(name) = input.name {
            active.name = Set(name.trim().to_string());
        }
        if let Some(username) = input.username {
            active.username = Set(username.trim().to_string());
        }
        if let Some(hash) = password_hash {
            active.password_hash = Set(hash);
        }
        if let Some(role) = input.role {
            active.role = Set(role);
        }
        if input.gender.is_some() {
            active.gender = Set(input.gender);
        }
        if input.major.is_some() {
            active.major = Set(input.major);
        }
        if input.phone.is_some() {
            active.phone = Set(input.phone);
        }
        if input.photo.is_some() {
            active.photo = Set(input.photo);
        }
        if let Some(year) = input.enrollment_year
            && year_changed
        {
            // Loans point at the surrogate id, so only the code moves.
            active.enrollment_year = Set(year);
            active.member_code = Set(allocate_member_code(&txn, year).await?);
        }
        active.updated_at = Set(format_timestamp(Utc::now()));

        let saved = active
            .update(&txn)
            .await
            .map_err(|e| username_conflict(e.into()))?;
        txn.commit().await?;

        if year_changed {
            tracing::info!(
                user_id = saved.id,
                from = %old_code,
                to = %saved.member_code,
                "member code reallocated after enrollment year change"
            );
        }
        Ok(User::from(saved))
    }

    async fn soft_delete(&self, id: i32) -> Result<(), DomainError> {
        let now = format_timestamp(Utc::now());
        let result = UserEntity::update_many()
            .col_expr(Column::DeletedAt, Expr::value(now.clone()))
            .col_expr(Column::UpdatedAt, Expr::value(now))
            .filter(Column::Id.eq(id))
            .filter(Column::DeletedAt.is_null())
            .exec(&self.db)
            .await?;

        if result.rows_affected == 0 {
            return Err(DomainError::NotFound("user"));
        }
        Ok(())
    }

    async fn restore(&self, id: i32) -> Result<User, DomainError> {
        let existing = self.load(id).await?;
        if existing.deleted_at.is_none() {
            return Ok(User::from(existing));
        }
        let mut active: ActiveModel = existing.into();
        active.deleted_at = Set(None);
        active.updated_at = Set(format_timestamp(Utc::now()));
        let saved = active
            .update(&self.db)
            .await
            .map_err(|e| username_conflict(e.into()))?;
        Ok(User::from(saved))
    }
}
