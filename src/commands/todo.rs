//! Todo Commands
//!
//! CRUD on the `todos` collection.

use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use tracing::debug;

use super::{check_status, PocketBaseClient, TodoRepository};
use crate::error::RemoteResult;
use crate::models::{NewTodo, Todo, TodoPatch};

const RECORDS_PATH: &str = "collections/todos/records";
/// Page size used when walking the full list
const PAGE_SIZE: u32 = 500;

/// One page of a list response
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListPage {
    page: u32,
    #[serde(default)]
    total_pages: u32,
    items: Vec<Todo>,
}

/// Filter expression selecting the todos of one owner
pub fn owner_filter(owner_id: &str) -> String {
    let escaped = owner_id.replace('\\', "\\\\").replace('"', "\\\"");
    format!("user = \"{}\"", escaped)
}

#[async_trait]
impl TodoRepository for PocketBaseClient {
    async fn list_todos(&self, owner_id: &str) -> RemoteResult<Vec<Todo>> {
        let filter = owner_filter(owner_id);
        let mut todos = Vec::new();
        let mut page = 1u32;

        loop {
            let response = self
                .request(Method::GET, RECORDS_PATH)
                .query(&[
                    ("page", page.to_string()),
                    ("perPage", PAGE_SIZE.to_string()),
                    ("filter", filter.clone()),
                ])
                .send()
                .await?;
            let body: ListPage = check_status(response).await?.json().await?;
            let fetched = body.items.len();
            todos.extend(body.items);

            if body.page >= body.total_pages || fetched == 0 {
                break;
            }
            page += 1;
        }

        debug!(count = todos.len(), "Listed todos");
        Ok(todos)
    }

    async fn create_todo(&self, fields: &NewTodo) -> RemoteResult<Todo> {
        let response = self
            .request(Method::POST, RECORDS_PATH)
            .json(fields)
            .send()
            .await?;
        Ok(check_status(response).await?.json().await?)
    }

    async fn update_todo(&self, id: &str, patch: &TodoPatch) -> RemoteResult<()> {
        let response = self
            .request(Method::PATCH, &format!("{}/{}", RECORDS_PATH, id))
            .json(patch)
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    async fn delete_todo(&self, id: &str) -> RemoteResult<()> {
        let response = self
            .request(Method::DELETE, &format!("{}/{}", RECORDS_PATH, id))
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }
}
