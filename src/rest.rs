// Generic REST table access: filter builder plus typed table helpers

use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Display;
use std::sync::Arc;

use crate::error::{ClientError, Result};
use crate::http_client::BackendClient;

const REST_PREFIX: &str = "/rest/v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Asc,
    Desc,
}

/// Query-string filters in the backend's `column=op.value` syntax
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    params: Vec<(String, String)>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(mut self, key: &str, value: String) -> Self {
        self.params.push((key.to_string(), value));
        self
    }

    pub fn select(self, columns: &str) -> Self {
        self.push("select", columns.to_string())
    }

    pub fn eq(self, column: &str, value: impl Display) -> Self {
        self.push(column, format!("eq.{}", value))
    }

    pub fn neq(self, column: &str, value: impl Display) -> Self {
        self.push(column, format!("neq.{}", value))
    }

    pub fn in_list<T: Display>(self, column: &str, values: &[T]) -> Self {
        let joined = values
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(",");
        self.push(column, format!("in.({})", joined))
    }

    /// Case-insensitive substring match
    pub fn ilike(self, column: &str, needle: &str) -> Self {
        // `*` is the wildcard; commas and parens would break the filter grammar
        let cleaned: String = needle
            .chars()
            .filter(|c| !matches!(c, '*' | ',' | '(' | ')'))
            .collect();
        self.push(column, format!("ilike.*{}*", cleaned))
    }

    pub fn is_null(self, column: &str) -> Self {
        self.push(column, "is.null".to_string())
    }

    pub fn order(self, column: &str, order: Order) -> Self {
        let dir = match order {
            Order::Asc => "asc",
            Order::Desc => "desc",
        };
        self.push("order", format!("{}.{}", column, dir))
    }

    pub fn limit(self, limit: u32) -> Self {
        self.push("limit", limit.to_string())
    }

    pub fn offset(self, offset: u32) -> Self {
        self.push("offset", offset.to_string())
    }

    pub fn on_conflict(self, columns: &str) -> Self {
        self.push("on_conflict", columns.to_string())
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.params
    }
}

/// Typed access to REST tables and RPC functions
#[derive(Clone)]
pub struct Rest {
    http: Arc<BackendClient>,
}

impl Rest {
    pub fn new(http: Arc<BackendClient>) -> Self {
        Self { http }
    }

    fn table(&self, method: Method, table: &str, query: &Query) -> RequestBuilder {
        self.http
            .request(method, &format!("{}/{}", REST_PREFIX, table))
            .query(query.pairs())
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response> {
        let request = builder.build()?;
        let response = self.http.execute(request).await?;

        if response.status().is_success() {
            Ok(response)
        } else {
            Err(ClientError::from_response(response).await)
        }
    }

    pub async fn select<T: DeserializeOwned>(&self, table: &str, query: &Query) -> Result<Vec<T>> {
        let response = self.send(self.table(Method::GET, table, query)).await?;
        Ok(response.json().await?)
    }

    /// First matching row, if any
    pub async fn select_one<T: DeserializeOwned>(
        &self,
        table: &str,
        query: Query,
    ) -> Result<Option<T>> {
        let rows: Vec<T> = self.select(table, &query.limit(1)).await?;
        Ok(rows.into_iter().next())
    }

    pub async fn insert<B, T>(&self, table: &str, body: &B) -> Result<Vec<T>>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let builder = self
            .table(Method::POST, table, &Query::new())
            .header("Prefer", "return=representation")
            .json(body);
        let response = self.send(builder).await?;
        Ok(response.json().await?)
    }

    pub async fn upsert<B: Serialize + ?Sized>(
        &self,
        table: &str,
        on_conflict: &str,
        body: &B,
    ) -> Result<()> {
        let builder = self
            .table(Method::POST, table, &Query::new().on_conflict(on_conflict))
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(body);
        self.send(builder).await?;
        Ok(())
    }

    pub async fn update<B, T>(&self, table: &str, query: &Query, body: &B) -> Result<Vec<T>>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let builder = self
            .table(Method::PATCH, table, query)
            .header("Prefer", "return=representation")
            .json(body);
        let response = self.send(builder).await?;
        Ok(response.json().await?)
    }

    pub async fn delete(&self, table: &str, query: &Query) -> Result<()> {
        self.send(self.table(Method::DELETE, table, query)).await?;
        Ok(())
    }

    /// Call a server-side function
    pub async fn rpc<B, T>(&self, function: &str, args: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let builder = self
            .http
            .request(Method::POST, &format!("{}/rpc/{}", REST_PREFIX, function))
            .json(args);
        let response = self.send(builder).await?;
        Ok(response.json().await?)
    }
}
