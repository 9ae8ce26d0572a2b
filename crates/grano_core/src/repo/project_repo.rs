//! Project repository contracts and SQLite implementation.

use crate::model::project::Project;
use crate::repo::{ensure_connection_ready, is_unique_violation, RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension};

/// Repository interface for project records.
pub trait ProjectRepository {
    /// Creates one project. Fails with `DuplicateProject` when the slug exists.
    fn create_project(&self, slug: &str, label: &str) -> RepoResult<Project>;
    /// Loads one project by slug.
    fn get_project(&self, slug: &str) -> RepoResult<Option<Project>>;
    /// Bumps the project's last-modified timestamp.
    fn touch_project(&self, slug: &str) -> RepoResult<()>;
}

/// SQLite-backed project repository.
pub struct SqliteProjectRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteProjectRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["projects"])?;
        Ok(Self { conn })
    }
}

impl ProjectRepository for SqliteProjectRepository<'_> {
    fn create_project(&self, slug: &str, label: &str) -> RepoResult<Project> {
        let inserted = self.conn.execute(
            "INSERT INTO projects (slug, label) VALUES (?1, ?2);",
            params![slug, label],
        );
        match inserted {
            Ok(_) => {}
            Err(err) if is_unique_violation(&err) => {
                return Err(RepoError::DuplicateProject(slug.to_string()));
            }
            Err(err) => return Err(err.into()),
        }
        self.get_project(slug)?
            .ok_or_else(|| RepoError::ProjectNotFound(slug.to_string()))
    }

    fn get_project(&self, slug: &str) -> RepoResult<Option<Project>> {
        let project = self
            .conn
            .query_row(
                "SELECT slug, label, created_at, updated_at
                 FROM projects
                 WHERE slug = ?1;",
                [slug],
                |row| {
                    Ok(Project {
                        slug: row.get("slug")?,
                        label: row.get("label")?,
                        created_at: row.get("created_at")?,
                        updated_at: row.get("updated_at")?,
                    })
                },
            )
            .optional()?;
        Ok(project)
    }

    fn touch_project(&self, slug: &str) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE projects
             SET updated_at = (strftime('%s', 'now') * 1000)
             WHERE slug = ?1;",
            [slug],
        )?;
        if changed == 0 {
            return Err(RepoError::ProjectNotFound(slug.to_string()));
        }
        Ok(())
    }
}
