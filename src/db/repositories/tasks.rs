use anyhow::{anyhow, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::db::{
    connection::Database,
    helpers::{parse_datetime, to_u32},
    models::{Subtask, Task},
};

fn row_to_task(row: &Row) -> Result<Task> {
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;
    let pomodoro_completed: i64 = row.get("pomodoro_completed")?;

    Ok(Task {
        id: row.get("id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        is_completed: row.get("is_completed")?,
        pomodoro_completed: to_u32(pomodoro_completed, "pomodoro_completed")?,
        created_at: parse_datetime(&created_at, "created_at")?,
        updated_at: parse_datetime(&updated_at, "updated_at")?,
    })
}

fn row_to_subtask(row: &Row) -> Result<Subtask> {
    let created_at: String = row.get("created_at")?;

    Ok(Subtask {
        id: row.get("id")?,
        task_id: row.get("task_id")?,
        title: row.get("title")?,
        is_completed: row.get("is_completed")?,
        order_index: row.get("order_index")?,
        created_at: parse_datetime(&created_at, "created_at")?,
    })
}

pub(crate) fn query_task(conn: &Connection, task_id: &str) -> Result<Option<Task>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, description, is_completed, pomodoro_completed, created_at, updated_at
         FROM tasks
         WHERE id = ?1",
    )?;

    let mut rows = stmt.query(params![task_id])?;
    let task = match rows.next()? {
        Some(row) => Some(row_to_task(row)?),
        None => None,
    };
    Ok(task)
}

pub(crate) fn query_subtasks(conn: &Connection, task_id: &str) -> Result<Vec<Subtask>> {
    let mut stmt = conn.prepare(
        "SELECT id, task_id, title, is_completed, order_index, created_at
         FROM subtasks
         WHERE task_id = ?1
         ORDER BY order_index ASC, created_at ASC",
    )?;

    let mut rows = stmt.query(params![task_id])?;
    let mut subtasks = Vec::new();
    while let Some(row) = rows.next()? {
        subtasks.push(row_to_subtask(row)?);
    }
    Ok(subtasks)
}

pub(crate) fn count_subtasks(conn: &Connection, task_id: &str) -> Result<i64> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM subtasks WHERE task_id = ?1",
        params![task_id],
        |row| row.get(0),
    )?)
}

impl Database {
    pub async fn create_task(&self, name: String, description: Option<String>) -> Result<Task> {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(anyhow!("task name must not be empty"));
        }

        self.execute(move |conn| {
            let now = Utc::now();
            let id = Uuid::new_v4().to_string();
            conn.execute(
                "INSERT INTO tasks (id, name, description, is_completed, pomodoro_completed, created_at, updated_at)
                 VALUES (?1, ?2, ?3, 0, 0, ?4, ?5)",
                params![id, name, description, now.to_rfc3339(), now.to_rfc3339()],
            )?;

            query_task(conn, &id)?.ok_or_else(|| anyhow!("Task not found after insert"))
        })
        .await
    }

    pub async fn get_task(&self, task_id: &str) -> Result<Option<Task>> {
        let task_id = task_id.to_string();
        self.execute(move |conn| query_task(conn, &task_id)).await
    }

    /// Delete a task. Subtasks go with it via ON DELETE CASCADE.
    pub async fn delete_task(&self, task_id: &str) -> Result<()> {
        let task_id = task_id.to_string();
        self.execute(move |conn| {
            conn.execute("DELETE FROM tasks WHERE id = ?1", params![task_id])?;
            Ok(())
        })
        .await
    }

    /// Record how many pomodoro iterations were finished for a task.
    pub async fn mark_task_pomodoro_completed(&self, task_id: &str, count: u32) -> Result<()> {
        let task_id = task_id.to_string();
        self.execute(move |conn| {
            let rows_affected = conn.execute(
                "UPDATE tasks
                 SET pomodoro_completed = ?1,
                     updated_at = ?2
                 WHERE id = ?3",
                params![count, Utc::now().to_rfc3339(), task_id],
            )?;

            if rows_affected == 0 {
                return Err(anyhow!("Task not found"));
            }
            Ok(())
        })
        .await
    }

    /// Append a subtask at the end of the task's ordered list.
    pub async fn create_subtask(&self, task_id: &str, title: String) -> Result<Subtask> {
        let task_id = task_id.to_string();
        self.execute(move |conn| {
            let exists: Option<String> = conn
                .query_row(
                    "SELECT id FROM tasks WHERE id = ?1",
                    params![task_id],
                    |row| row.get(0),
                )
                .optional()?;
            if exists.is_none() {
                return Err(anyhow!("Task not found"));
            }

            let next_index: i64 = conn.query_row(
                "SELECT COALESCE(MAX(order_index) + 1, 0) FROM subtasks WHERE task_id = ?1",
                params![task_id],
                |row| row.get(0),
            )?;

            let id = Uuid::new_v4().to_string();
            let now = Utc::now();
            conn.execute(
                "INSERT INTO subtasks (id, task_id, title, is_completed, order_index, created_at)
                 VALUES (?1, ?2, ?3, 0, ?4, ?5)",
                params![id, task_id, title, next_index, now.to_rfc3339()],
            )?;

            Ok(Subtask {
                id,
                task_id,
                title,
                is_completed: false,
                order_index: next_index,
                created_at: now,
            })
        })
        .await
    }

    pub async fn get_subtasks_for_task(&self, task_id: &str) -> Result<Vec<Subtask>> {
        let task_id = task_id.to_string();
        self.execute(move |conn| query_subtasks(conn, &task_id)).await
    }

    pub async fn mark_subtask_completed(&self, subtask_id: &str) -> Result<()> {
        let subtask_id = subtask_id.to_string();
        self.execute(move |conn| {
            let rows_affected = conn.execute(
                "UPDATE subtasks SET is_completed = 1 WHERE id = ?1",
                params![subtask_id],
            )?;

            if rows_affected == 0 {
                return Err(anyhow!("Subtask not found"));
            }
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use crate::db::test_database;

    #[tokio::test]
    async fn create_and_get_task_roundtrip() {
        let (_dir, db) = test_database();

        let created = db
            .create_task("Write report".to_string(), Some("quarterly".to_string()))
            .await
            .expect("create task");
        let fetched = db.get_task(&created.id).await.expect("get task");

        assert_eq!(fetched, Some(created.clone()));
        assert_eq!(created.pomodoro_completed, 0);
        assert!(!created.is_completed);
    }

    #[tokio::test]
    async fn create_task_rejects_blank_name() {
        let (_dir, db) = test_database();
        assert!(db.create_task("   ".to_string(), None).await.is_err());
    }

    #[tokio::test]
    async fn subtasks_are_ordered_by_insertion() {
        let (_dir, db) = test_database();
        let task = db.create_task("Task".to_string(), None).await.unwrap();

        let first = db.create_subtask(&task.id, "one".to_string()).await.unwrap();
        let second = db.create_subtask(&task.id, "two".to_string()).await.unwrap();
        assert_eq!(first.order_index, 0);
        assert_eq!(second.order_index, 1);

        let titles: Vec<String> = db
            .get_subtasks_for_task(&task.id)
            .await
            .unwrap()
            .into_iter()
            .map(|subtask| subtask.title)
            .collect();
        assert_eq!(titles, vec!["one".to_string(), "two".to_string()]);
    }

    #[tokio::test]
    async fn create_subtask_requires_existing_task() {
        let (_dir, db) = test_database();
        assert!(db.create_subtask("missing", "x".to_string()).await.is_err());
    }

    #[tokio::test]
    async fn mark_subtask_and_pomodoro_counts() {
        let (_dir, db) = test_database();
        let task = db.create_task("Task".to_string(), None).await.unwrap();
        let subtask = db.create_subtask(&task.id, "one".to_string()).await.unwrap();

        db.mark_subtask_completed(&subtask.id).await.unwrap();
        db.mark_task_pomodoro_completed(&task.id, 3).await.unwrap();

        let subtasks = db.get_subtasks_for_task(&task.id).await.unwrap();
        assert!(subtasks[0].is_completed);
        let task = db.get_task(&task.id).await.unwrap().unwrap();
        assert_eq!(task.pomodoro_completed, 3);

        assert!(db.mark_subtask_completed("missing").await.is_err());
        assert!(db.mark_task_pomodoro_completed("missing", 1).await.is_err());
    }

    #[tokio::test]
    async fn deleting_task_removes_subtasks() {
        let (_dir, db) = test_database();
        let task = db.create_task("Task".to_string(), None).await.unwrap();
        db.create_subtask(&task.id, "one".to_string()).await.unwrap();

        db.delete_task(&task.id).await.unwrap();

        assert_eq!(db.get_task(&task.id).await.unwrap(), None);
        assert!(db.get_subtasks_for_task(&task.id).await.unwrap().is_empty());
    }
}
