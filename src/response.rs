//! Standard response envelope helpers.

use axum::{http::StatusCode, Json};
use serde::Serialize;
use serde_json::{Map, Value};

#[derive(Serialize)]
pub struct SuccessOne<T> {
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Map<String, Value>>,
}

#[derive(Serialize)]
pub struct SuccessMany<T, M> {
    pub data: Vec<T>,
    pub meta: M,
}

/// Page-numbered lists (site views, admin changelist).
#[derive(Debug, PartialEq, Serialize)]
pub struct PageMeta {
    pub count: i64,
    pub page: u32,
    pub page_size: u32,
    pub num_pages: u32,
}

impl PageMeta {
    pub fn new(count: i64, page: u32, page_size: u32) -> Self {
        let size = i64::from(page_size.max(1));
        let num_pages = ((count.max(0) + size - 1) / size).max(1);
        PageMeta {
            count,
            page,
            page_size,
            num_pages: u32::try_from(num_pages).unwrap_or(u32::MAX),
        }
    }
}

/// Limit/offset lists (REST).
#[derive(Debug, PartialEq, Serialize)]
pub struct WindowMeta {
    pub count: i64,
    pub limit: u32,
    pub offset: u32,
}

pub fn success_one<T: Serialize>(data: T) -> (StatusCode, Json<SuccessOne<T>>) {
    success_one_with(StatusCode::CREATED, data, None)
}

pub fn success_one_ok<T: Serialize>(data: T) -> (StatusCode, Json<SuccessOne<T>>) {
    success_one_with(StatusCode::OK, data, None)
}

pub fn success_one_with<T: Serialize>(
    status: StatusCode,
    data: T,
    meta: Option<Map<String, Value>>,
) -> (StatusCode, Json<SuccessOne<T>>) {
    (status, Json(SuccessOne { data, meta }))
}

pub fn success_many<T: Serialize, M: Serialize>(data: Vec<T>, meta: M) -> (StatusCode, Json<SuccessMany<T, M>>) {
    (StatusCode::OK, Json(SuccessMany { data, meta }))
}
