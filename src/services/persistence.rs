//! Element persistence: the durable store behind a board.
//!
//! DESIGN
//! ======
//! Sessions only see the [`ElementStore`] trait. Ids are assigned by the
//! store at creation time, and the initial snapshot comes back in creation
//! order. Two implementations ship:
//!
//! - [`MemoryStore`]: process-local, with failure injection for tests.
//! - [`PgElementStore`]: Postgres via SQLx, table `board_elements`.
//!
//! ERROR HANDLING
//! ==============
//! Every failure is a [`StoreError`]. Callers report it; nothing in this
//! module retries.

#[cfg(test)]
#[path = "persistence_test.rs"]
mod tests;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use canvas::camera::Point;
use canvas::doc::{ActorId, BoardId, Element, ElementDraft, ElementId, ElementKind, ElementPatch, Size};
use sqlx::PgPool;
use uuid::Uuid;

use crate::event::ErrorCode;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("element not found: {0}")]
    NotFound(ElementId),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("invalid stored element {id}: {reason}")]
    InvalidRow { id: ElementId, reason: String },
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl ErrorCode for StoreError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "E_ELEMENT_NOT_FOUND",
            Self::Database(_) => "E_DATABASE",
            Self::InvalidRow { .. } => "E_INVALID_ROW",
            Self::Unavailable(_) => "E_STORE_UNAVAILABLE",
        }
    }
}

/// Creation request as handed to the store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewElement {
    pub board_id: BoardId,
    pub draft: ElementDraft,
    pub owner_id: ActorId,
    pub owner_name: String,
}

/// Durable element storage for boards.
#[async_trait]
pub trait ElementStore: Send + Sync {
    /// All elements of a board, oldest first.
    async fn fetch_elements(&self, board_id: BoardId) -> Result<Vec<Element>, StoreError>;

    /// Persist a new element and return it with its assigned id.
    async fn create_element(&self, data: NewElement) -> Result<Element, StoreError>;

    /// Overwrite the fields present in `fields` and return the stored result.
    async fn update_element(&self, id: ElementId, fields: &ElementPatch) -> Result<Element, StoreError>;

    async fn delete_element(&self, id: ElementId) -> Result<(), StoreError>;
}

// =============================================================================
// MEMORY
// =============================================================================

/// In-memory store. Elements are kept in creation order across all boards.
#[derive(Debug, Default)]
pub struct MemoryStore {
    elements: Mutex<Vec<Element>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with `elements`, in the given order.
    #[must_use]
    pub fn with_elements(elements: Vec<Element>) -> Self {
        Self { elements: Mutex::new(elements), ..Self::default() }
    }

    /// Make `fetch_elements` fail until turned off.
    pub fn fail_reads(&self, on: bool) {
        self.fail_reads.store(on, Ordering::SeqCst);
    }

    /// Make create/update/delete fail until turned off.
    pub fn fail_writes(&self, on: bool) {
        self.fail_writes.store(on, Ordering::SeqCst);
    }

    #[must_use]
    pub fn get(&self, id: ElementId) -> Option<Element> {
        self.lock().iter().find(|e| e.id == id).cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Element>> {
        self.elements.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check(flag: &AtomicBool, op: &str) -> Result<(), StoreError> {
        if flag.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(format!("{op} disabled")));
        }
        Ok(())
    }
}

#[async_trait]
impl ElementStore for MemoryStore {
    async fn fetch_elements(&self, board_id: BoardId) -> Result<Vec<Element>, StoreError> {
        Self::check(&self.fail_reads, "fetch")?;
        Ok(self.lock().iter().filter(|e| e.board_id == board_id).cloned().collect())
    }

    async fn create_element(&self, data: NewElement) -> Result<Element, StoreError> {
        Self::check(&self.fail_writes, "create")?;
        let element = data.draft.into_element(Uuid::new_v4(), data.board_id, data.owner_id, data.owner_name);
        self.lock().push(element.clone());
        Ok(element)
    }

    async fn update_element(&self, id: ElementId, fields: &ElementPatch) -> Result<Element, StoreError> {
        Self::check(&self.fail_writes, "update")?;
        let mut elements = self.lock();
        let element = elements.iter_mut().find(|e| e.id == id).ok_or(StoreError::NotFound(id))?;
        fields.apply_to(element);
        Ok(element.clone())
    }

    async fn delete_element(&self, id: ElementId) -> Result<(), StoreError> {
        Self::check(&self.fail_writes, "delete")?;
        let mut elements = self.lock();
        let before = elements.len();
        elements.retain(|e| e.id != id);
        if elements.len() == before {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }
}

// =============================================================================
// POSTGRES
// =============================================================================

type ElementRow = (
    Uuid,
    Uuid,
    String,
    f64,
    f64,
    f64,
    f64,
    String,
    Option<String>,
    Option<String>,
    String,
    String,
);

const ELEMENT_COLUMNS: &str =
    "id, board_id, kind, x, y, width, height, content, color, image_ref, owner_id, owner_name";

fn row_to_element(row: ElementRow) -> Result<Element, StoreError> {
    let (id, board_id, kind, x, y, width, height, content, color, image_ref, owner_id, owner_name) = row;
    let kind = ElementKind::parse(&kind).ok_or_else(|| StoreError::InvalidRow { id, reason: format!("kind `{kind}`") })?;
    Ok(Element {
        id,
        board_id,
        kind,
        position: Point::new(x, y),
        size: Size::new(width, height),
        content,
        color,
        image_ref,
        owner_id,
        owner_name,
    })
}

/// Postgres-backed store.
#[derive(Clone)]
pub struct PgElementStore {
    pool: PgPool,
}

impl PgElementStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ElementStore for PgElementStore {
    async fn fetch_elements(&self, board_id: BoardId) -> Result<Vec<Element>, StoreError> {
        let sql = format!("SELECT {ELEMENT_COLUMNS} FROM board_elements WHERE board_id = $1 ORDER BY created_at, seq");
        let rows = sqlx::query_as::<_, ElementRow>(&sql).bind(board_id).fetch_all(&self.pool).await?;
        rows.into_iter().map(row_to_element).collect()
    }

    async fn create_element(&self, data: NewElement) -> Result<Element, StoreError> {
        let NewElement { board_id, draft, owner_id, owner_name } = data;
        let sql = format!(
            "INSERT INTO board_elements ({ELEMENT_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
             RETURNING {ELEMENT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, ElementRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(board_id)
            .bind(draft.kind.as_str())
            .bind(draft.position.x)
            .bind(draft.position.y)
            .bind(draft.size.w)
            .bind(draft.size.h)
            .bind(&draft.content)
            .bind(draft.color.as_deref())
            .bind(draft.image_ref.as_deref())
            .bind(&owner_id)
            .bind(&owner_name)
            .fetch_one(&self.pool)
            .await?;
        row_to_element(row)
    }

    async fn update_element(&self, id: ElementId, fields: &ElementPatch) -> Result<Element, StoreError> {
        let sql = format!(
            "UPDATE board_elements SET \
               x = COALESCE($2, x), y = COALESCE($3, y), \
               width = COALESCE($4, width), height = COALESCE($5, height), \
               content = COALESCE($6, content), color = COALESCE($7, color), \
               image_ref = COALESCE($8, image_ref), updated_at = now() \
             WHERE id = $1 RETURNING {ELEMENT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, ElementRow>(&sql)
            .bind(id)
            .bind(fields.position.map(|p| p.x))
            .bind(fields.position.map(|p| p.y))
            .bind(fields.size.map(|s| s.w))
            .bind(fields.size.map(|s| s.h))
            .bind(fields.content.as_deref())
            .bind(fields.color.as_deref())
            .bind(fields.image_ref.as_deref())
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound(id))?;
        row_to_element(row)
    }

    async fn delete_element(&self, id: ElementId) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM board_elements WHERE id = $1").bind(id).execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }
}
