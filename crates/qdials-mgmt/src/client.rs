//! Synchronous management client: READ, DELETE and paginated QUERY.
//!
//! Every failure is reported here at the point it happens (`error!` for a
//! broken transport, `warn!` for a rejected operation) and then returned, so
//! callers only decide whether to keep going.

use serde_json::{Map, Value};

use crate::channel::ManagementChannel;
use crate::error::MgmtError;
use crate::message::{Operation, Request, Response};

/// One entity as attribute name -> value.
pub type AttributeMap = Map<String, Value>;

/// Rows per QUERY page. Larger responses overflow the transport's message
/// size limit, so pages are never requested uncapped.
pub const MAX_BATCH: usize = 500;

/// Management client bound to one channel for its whole lifetime.
///
/// Dropping the client closes the channel.
pub struct MgmtClient<C: ManagementChannel> {
    channel: C,
    page_size: usize,
    closed: bool,
}

impl<C: ManagementChannel> MgmtClient<C> {
    pub fn new(channel: C) -> Self {
        Self {
            channel,
            page_size: MAX_BATCH,
            closed: false,
        }
    }

    /// Override the QUERY page size, clamped to `1..=MAX_BATCH`.
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.clamp(1, MAX_BATCH);
        self
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    /// Return the entity `identity` of `entity_type` as an attribute map.
    pub fn read(&mut self, entity_type: &str, identity: &str) -> Result<AttributeMap, MgmtError> {
        let response = self
            .exchange(&Request::read(entity_type, identity))
            .inspect_err(|e| tracing::error!("read of {entity_type} {identity} failed: {e}"))?;

        if !response.is_ok() {
            tracing::warn!(
                "management read of type {entity_type} id {identity} failed: {:?}",
                response.properties
            );
            return Err(operation_error(Operation::Read, &response));
        }

        match response.body {
            Value::Object(map) => Ok(map),
            other => {
                tracing::warn!("management read of type {entity_type} id {identity} returned non-map body");
                Err(MgmtError::MalformedResponse(format!(
                    "READ body is not a map: {other}"
                )))
            }
        }
    }

    /// Delete the entity `identity` of `entity_type`. Only `204` confirms it.
    pub fn delete(&mut self, entity_type: &str, identity: &str) -> Result<(), MgmtError> {
        let response = self
            .exchange(&Request::delete(entity_type, identity))
            .inspect_err(|e| tracing::error!("delete of {entity_type} {identity} failed: {e}"))?;

        if !response.is_no_content() {
            tracing::warn!(
                "management delete of type {entity_type} id {identity} failed: {:?}",
                response.properties
            );
            return Err(operation_error(Operation::Delete, &response));
        }
        Ok(())
    }

    /// Fetch every entity of `entity_type`, projected to `attribute_names`.
    ///
    /// Pages of `page_size` rows are requested at increasing offsets until a
    /// page comes back short. Any failed page fails the whole query and the
    /// rows gathered so far are dropped. Row order is whatever the router
    /// returned.
    pub fn query(
        &mut self,
        entity_type: &str,
        attribute_names: &[&str],
    ) -> Result<QueryRows, MgmtError> {
        let mut names: Vec<String> = Vec::new();
        let mut rows: Vec<Vec<Value>> = Vec::new();
        let mut offset = 0usize;

        loop {
            let request = Request::query(entity_type, attribute_names, offset, self.page_size);
            let response = self
                .exchange(&request)
                .inspect_err(|e| tracing::error!("query of {entity_type} failed: {e}"))?;

            if !response.is_ok() {
                tracing::warn!(
                    "management query for type {entity_type} failed: {:?}",
                    response.properties
                );
                return Err(operation_error(Operation::Query, &response));
            }

            let (page_names, page_rows) = parse_page(response.body)
                .inspect_err(|e| tracing::warn!("query for type {entity_type}: {e}"))?;

            // Header is assumed stable across pages.
            if names.is_empty() {
                names = page_names;
            }

            let fetched = page_rows.len();
            rows.extend(page_rows);
            tracing::debug!("query {entity_type}: offset {offset} returned {fetched} rows");

            if fetched < self.page_size {
                break;
            }
            offset += self.page_size;
        }

        Ok(QueryRows {
            attribute_names: names,
            rows,
        })
    }

    /// Release the channel. Safe to call more than once.
    pub fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.channel.close();
        }
    }

    fn exchange(&mut self, request: &Request) -> Result<Response, MgmtError> {
        if self.closed {
            return Err(MgmtError::Transport("client is closed".to_string()));
        }
        self.channel.call(request)
    }
}

impl<C: ManagementChannel> Drop for MgmtClient<C> {
    fn drop(&mut self) {
        self.close();
    }
}

fn operation_error(operation: Operation, response: &Response) -> MgmtError {
    MgmtError::Operation {
        operation,
        status_code: response.status_code().unwrap_or(-1),
        status_description: response
            .status_description()
            .unwrap_or("<missing status>")
            .to_string(),
    }
}

fn parse_page(body: Value) -> Result<(Vec<String>, Vec<Vec<Value>>), MgmtError> {
    let Value::Object(mut body) = body else {
        return Err(MgmtError::MalformedResponse("QUERY body is not a map".into()));
    };

    let names = match body.remove("attributeNames") {
        Some(Value::Array(items)) => items
            .into_iter()
            .map(|v| match v {
                Value::String(s) => Ok(s),
                other => Err(MgmtError::MalformedResponse(format!(
                    "attribute name is not a string: {other}"
                ))),
            })
            .collect::<Result<Vec<_>, _>>()?,
        _ => {
            return Err(MgmtError::MalformedResponse(
                "QUERY body has no attributeNames list".into(),
            ));
        }
    };

    let rows = match body.remove("results") {
        Some(Value::Array(items)) => items
            .into_iter()
            .map(|v| match v {
                Value::Array(row) => Ok(row),
                other => Err(MgmtError::MalformedResponse(format!(
                    "result row is not a list: {other}"
                ))),
            })
            .collect::<Result<Vec<_>, _>>()?,
        _ => {
            return Err(MgmtError::MalformedResponse(
                "QUERY body has no results list".into(),
            ));
        }
    };

    Ok((names, rows))
}

/// All rows of a completed QUERY.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryRows {
    attribute_names: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl QueryRows {
    pub fn attribute_names(&self) -> &[String] {
        &self.attribute_names
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl IntoIterator for QueryRows {
    type Item = AttributeMap;
    type IntoIter = QueryRowsIter;

    fn into_iter(self) -> Self::IntoIter {
        QueryRowsIter {
            names: self.attribute_names,
            rows: self.rows.into_iter(),
        }
    }
}

/// Yields each row zipped with the attribute header, in server order.
pub struct QueryRowsIter {
    names: Vec<String>,
    rows: std::vec::IntoIter<Vec<Value>>,
}

impl Iterator for QueryRowsIter {
    type Item = AttributeMap;

    fn next(&mut self) -> Option<Self::Item> {
        let row = self.rows.next()?;
        Some(self.names.iter().cloned().zip(row).collect())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.rows.size_hint()
    }
}

impl ExactSizeIterator for QueryRowsIter {}
