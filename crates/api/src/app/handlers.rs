//! Generic CRUD handlers, parametrized over the document type.
//!
//! Each resource route delegates here for its plain list/read/create/update/
//! delete behavior; anything entity-specific (population, aggregates, auth
//! flows) stays in the route files.

use std::collections::HashMap;

use axum::http::StatusCode;
use axum::response::Response;
use uuid::Uuid;

use trekly_core::{DomainError, DomainResult};
use trekly_store::{Collection, Document, Predicate, QueryFeatures};

use crate::app::{dto, errors};
use crate::config::Environment;

/// List with a fixed scope (default exclusions, parent filters) plus the
/// request's own query features.
pub fn list_documents<T: Document>(
    collection: &Collection<T>,
    scope: &[Predicate],
    params: &HashMap<String, String>,
    key: &str,
) -> Response {
    let features = QueryFeatures::from_params(params);
    dto::success_list(key, collection.query(scope, &features))
}

pub fn read_document<T: Document>(
    environment: Environment,
    collection: &Collection<T>,
    raw_id: &str,
    key: &str,
) -> Response {
    match parse_id(raw_id).and_then(|id| collection.require(id)) {
        Ok(doc) => dto::success_doc(environment, StatusCode::OK, key, &doc),
        Err(err) => errors::domain_error_to_response(environment, err),
    }
}

pub fn create_document<T: Document>(
    environment: Environment,
    collection: &Collection<T>,
    doc: DomainResult<T>,
    key: &str,
) -> Response {
    match doc.and_then(|d| collection.insert(d)) {
        Ok(created) => dto::success_doc(environment, StatusCode::CREATED, key, &created),
        Err(err) => errors::domain_error_to_response(environment, err),
    }
}

pub fn update_document<T: Document>(
    environment: Environment,
    collection: &Collection<T>,
    raw_id: &str,
    patch: &serde_json::Map<String, serde_json::Value>,
    key: &str,
) -> Response {
    match parse_id(raw_id).and_then(|id| collection.update(id, patch)) {
        Ok(updated) => dto::success_doc(environment, StatusCode::OK, key, &updated),
        Err(err) => errors::domain_error_to_response(environment, err),
    }
}

pub fn delete_document<T: Document>(
    environment: Environment,
    collection: &Collection<T>,
    raw_id: &str,
) -> Response {
    match parse_id(raw_id).and_then(|id| collection.remove(id)) {
        Ok(()) => dto::no_content(),
        Err(err) => errors::domain_error_to_response(environment, err),
    }
}

pub fn parse_id(raw: &str) -> DomainResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| DomainError::InvalidId(raw.to_string()))
}
