//! Repository pattern implementation for data access
//!
//! Repositories wrap the [`DatabaseManager`] and expose the operations the
//! handlers need. Ratings live in their own table with a
//! `UNIQUE(book_id, user_id)` constraint; the book's average is recomputed
//! in the same transaction as every rating insert.

use crate::core::error::{ApiError, Result};
use crate::db::manager::DatabaseManager;
use crate::db::models::{Book, Rating, User};
use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension};
use std::sync::Arc;

/// Generic repository trait for CRUD operations
#[async_trait]
pub trait Repository<T>: Send + Sync {
    /// Find an entity by its ID
    async fn find_by_id(&self, id: &str) -> Result<Option<T>>;

    /// Find all entities
    async fn find_all(&self) -> Result<Vec<T>>;

    /// Create a new entity
    async fn create(&self, entity: &T) -> Result<()>;

    /// Update an existing entity
    async fn update(&self, entity: &T) -> Result<()>;

    /// Delete an entity by its ID
    async fn delete(&self, id: &str) -> Result<()>;
}

/// Round to one decimal place, standard rounding
pub fn round_average(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err.sqlite_error_code(),
        Some(rusqlite::ErrorCode::ConstraintViolation)
    )
}

/// Repository for User entities
pub struct UserRepository {
    db: Arc<DatabaseManager>,
}

impl UserRepository {
    /// Create a new UserRepository
    pub fn new(db: Arc<DatabaseManager>) -> Self {
        Self { db }
    }

    /// Find a user by email
    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let email = email.to_string();
        self.db
            .execute(move |conn| {
                conn.query_row(
                    "SELECT id, email, password_hash, created_at FROM users WHERE email = ?",
                    [&email],
                    |row| {
                        Ok(User {
                            id: row.get(0)?,
                            email: row.get(1)?,
                            password_hash: row.get(2)?,
                            created_at: row.get(3)?,
                        })
                    },
                )
                .optional()
                .map_err(ApiError::Database)
            })
            .await
    }

    /// Find a user by id
    pub async fn find_by_id(&self, id: &str) -> Result<Option<User>> {
        let id = id.to_string();
        self.db
            .execute(move |conn| {
                conn.query_row(
                    "SELECT id, email, password_hash, created_at FROM users WHERE id = ?",
                    [&id],
                    |row| {
                        Ok(User {
                            id: row.get(0)?,
                            email: row.get(1)?,
                            password_hash: row.get(2)?,
                            created_at: row.get(3)?,
                        })
                    },
                )
                .optional()
                .map_err(ApiError::Database)
            })
            .await
    }

    /// Create a user; a duplicate email maps to Conflict
    pub async fn create(&self, user: &User) -> Result<()> {
        let user = user.clone();
        self.db
            .execute(move |conn| {
                conn.execute(
                    "INSERT INTO users (id, email, password_hash, created_at) VALUES (?, ?, ?, ?)",
                    [&user.id, &user.email, &user.password_hash, &user.created_at],
                )
                .map_err(|e| {
                    if is_unique_violation(&e) {
                        ApiError::Conflict("Email already in use".to_string())
                    } else {
                        ApiError::Database(e)
                    }
                })?;
                Ok(())
            })
            .await
    }
}

/// Repository for Book entities
pub struct BookRepository {
    db: Arc<DatabaseManager>,
}

const BOOK_COLUMNS: &str =
    "id, user_id, title, author, year, genre, image_url, average_rating, created_at";

fn book_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Book> {
    Ok(Book {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        author: row.get(3)?,
        year: row.get(4)?,
        genre: row.get(5)?,
        image_url: row.get(6)?,
        ratings: Vec::new(),
        average_rating: row.get(7)?,
        created_at: row.get(8)?,
    })
}

fn load_ratings(conn: &Connection, book_id: &str) -> Result<Vec<Rating>> {
    let mut stmt = conn
        .prepare("SELECT user_id, grade FROM ratings WHERE book_id = ? ORDER BY rowid")
        .map_err(ApiError::Database)?;

    let ratings = stmt
        .query_map([book_id], |row| {
            Ok(Rating {
                user_id: row.get(0)?,
                grade: row.get(1)?,
            })
        })
        .map_err(ApiError::Database)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(ApiError::Database)?;

    Ok(ratings)
}

fn get_book(conn: &Connection, id: &str) -> Result<Option<Book>> {
    let book = conn
        .query_row(
            &format!("SELECT {} FROM books WHERE id = ?", BOOK_COLUMNS),
            [id],
            book_from_row,
        )
        .optional()
        .map_err(ApiError::Database)?;

    match book {
        Some(mut book) => {
            book.ratings = load_ratings(conn, &book.id)?;
            Ok(Some(book))
        }
        None => Ok(None),
    }
}

impl BookRepository {
    /// Create a new BookRepository
    pub fn new(db: Arc<DatabaseManager>) -> Self {
        Self { db }
    }

    /// The n highest-rated books, descending by average.
    ///
    /// Ties keep the store's scan order (insertion order); no further
    /// tiebreak is defined.
    pub async fn top_rated(&self, n: usize) -> Result<Vec<Book>> {
        self.db
            .execute(move |conn| {
                let mut stmt = conn
                    .prepare(&format!(
                        "SELECT {} FROM books ORDER BY average_rating DESC LIMIT ?",
                        BOOK_COLUMNS
                    ))
                    .map_err(ApiError::Database)?;

                let mut books = stmt
                    .query_map([n as i64], book_from_row)
                    .map_err(ApiError::Database)?
                    .collect::<std::result::Result<Vec<_>, _>>()
                    .map_err(ApiError::Database)?;

                for book in &mut books {
                    book.ratings = load_ratings(conn, &book.id)?;
                }

                Ok(books)
            })
            .await
    }

    /// Append a rating and recompute the book's average, atomically.
    ///
    /// Returns the updated book. The UNIQUE(book_id, user_id) constraint
    /// backs up the in-transaction duplicate check, so two concurrent votes
    /// from the same user cannot both land.
    pub async fn add_rating(&self, book_id: &str, user_id: &str, grade: f64) -> Result<Book> {
        let book_id = book_id.to_string();
        let user_id = user_id.to_string();
        self.db
            .transaction(move |tx| {
                let exists: bool = tx
                    .query_row(
                        "SELECT EXISTS(SELECT 1 FROM ratings WHERE book_id = ? AND user_id = ?)",
                        [&book_id, &user_id],
                        |row| row.get(0),
                    )
                    .map_err(ApiError::Database)?;

                if exists {
                    return Err(ApiError::Validation(
                        "You have already rated this book".to_string(),
                    ));
                }

                tx.execute(
                    "INSERT INTO ratings (book_id, user_id, grade) VALUES (?, ?, ?)",
                    rusqlite::params![&book_id, &user_id, grade],
                )
                .map_err(|e| {
                    if is_unique_violation(&e) {
                        ApiError::Validation("You have already rated this book".to_string())
                    } else {
                        ApiError::Database(e)
                    }
                })?;

                let mean: f64 = tx
                    .query_row(
                        "SELECT AVG(grade) FROM ratings WHERE book_id = ?",
                        [&book_id],
                        |row| row.get(0),
                    )
                    .map_err(ApiError::Database)?;

                tx.execute(
                    "UPDATE books SET average_rating = ? WHERE id = ?",
                    rusqlite::params![round_average(mean), &book_id],
                )
                .map_err(ApiError::Database)?;

                get_book(tx, &book_id)?
                    .ok_or_else(|| ApiError::NotFound("Book not found".to_string()))
            })
            .await
    }
}

#[async_trait]
impl Repository<Book> for BookRepository {
    async fn find_by_id(&self, id: &str) -> Result<Option<Book>> {
        let id = id.to_string();
        self.db.execute(move |conn| get_book(conn, &id)).await
    }

    async fn find_all(&self) -> Result<Vec<Book>> {
        self.db
            .execute(|conn| {
                let mut stmt = conn
                    .prepare(&format!(
                        "SELECT {} FROM books ORDER BY created_at DESC",
                        BOOK_COLUMNS
                    ))
                    .map_err(ApiError::Database)?;

                let mut books = stmt
                    .query_map([], book_from_row)
                    .map_err(ApiError::Database)?
                    .collect::<std::result::Result<Vec<_>, _>>()
                    .map_err(ApiError::Database)?;

                for book in &mut books {
                    book.ratings = load_ratings(conn, &book.id)?;
                }

                Ok(books)
            })
            .await
    }

    async fn create(&self, book: &Book) -> Result<()> {
        let book = book.clone();
        self.db
            .execute(move |conn| {
                conn.execute(
                    "INSERT INTO books (id, user_id, title, author, year, genre, image_url, average_rating, created_at) \
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
                    rusqlite::params![
                        &book.id,
                        &book.user_id,
                        &book.title,
                        &book.author,
                        book.year,
                        &book.genre,
                        &book.image_url,
                        book.average_rating,
                        &book.created_at,
                    ],
                )
                .map_err(ApiError::Database)?;
                Ok(())
            })
            .await
    }

    async fn update(&self, book: &Book) -> Result<()> {
        let book = book.clone();
        self.db
            .execute(move |conn| {
                conn.execute(
                    "UPDATE books SET title = ?, author = ?, year = ?, genre = ?, image_url = ? \
                     WHERE id = ?",
                    rusqlite::params![
                        &book.title,
                        &book.author,
                        book.year,
                        &book.genre,
                        &book.image_url,
                        &book.id,
                    ],
                )
                .map_err(ApiError::Database)?;
                Ok(())
            })
            .await
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let id = id.to_string();
        self.db
            .execute(move |conn| {
                conn.execute("DELETE FROM books WHERE id = ?", [&id])
                    .map_err(ApiError::Database)?;
                Ok(())
            })
            .await
    }
}
