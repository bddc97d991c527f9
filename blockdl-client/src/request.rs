//! Stream request parameters.

use crate::error::ClientError;

/// Identifies one table stream.
///
/// Bounds are inclusive and filter on the sequence key (block number). They
/// select which bytes the server sends; the decoder never looks at them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRequest {
    /// Chain identifier, e.g. `eth`.
    pub chain: String,
    /// Table identifier, e.g. `blocks`.
    pub table: String,
    /// Inclusive lower bound.
    pub from: Option<u32>,
    /// Inclusive upper bound.
    pub until: Option<u32>,
}

impl StreamRequest {
    pub fn new(chain: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            chain: chain.into(),
            table: table.into(),
            from: None,
            until: None,
        }
    }

    pub fn with_from(mut self, from: u32) -> Self {
        self.from = Some(from);
        self
    }

    pub fn with_until(mut self, until: u32) -> Self {
        self.until = Some(until);
        self
    }

    /// Returns a request that picks up after `sequence_key`.
    ///
    /// Used to re-open a stream after a failure without replaying records
    /// that were already consumed. Returns `None` if `sequence_key` was the
    /// last one the request could produce.
    pub fn resume_after(&self, sequence_key: u32) -> Option<Self> {
        let next = sequence_key.checked_add(1)?;
        if matches!(self.until, Some(until) if next > until) {
            return None;
        }
        Some(Self {
            from: Some(next),
            ..self.clone()
        })
    }

    /// Validates the request.
    pub fn validate(&self) -> Result<(), ClientError> {
        validate_segment("chain", &self.chain)?;
        validate_segment("table", &self.table)?;

        if let (Some(from), Some(until)) = (self.from, self.until) {
            if from > until {
                return Err(ClientError::InvalidRequest(format!(
                    "lower bound {} is above upper bound {}",
                    from, until
                )));
            }
        }

        Ok(())
    }

    /// Returns the stream URL under `base_url`.
    pub fn url(&self, base_url: &str) -> String {
        format!(
            "{}/{}/{}",
            base_url.trim_end_matches('/'),
            self.chain,
            self.table
        )
    }

    /// Returns the query parameters, credential first.
    pub fn query(&self, api_key: &str) -> Vec<(&'static str, String)> {
        let mut params = vec![("apikey", api_key.to_string())];
        if let Some(from) = self.from {
            params.push(("gte:block_number", from.to_string()));
        }
        if let Some(until) = self.until {
            params.push(("lte:block_number", until.to_string()));
        }
        params
    }
}

fn validate_segment(name: &str, value: &str) -> Result<(), ClientError> {
    if value.is_empty() {
        return Err(ClientError::InvalidRequest(format!("{} is empty", name)));
    }
    let valid = value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if !valid {
        return Err(ClientError::InvalidRequest(format!(
            "{} contains invalid characters: {:?}",
            name, value
        )));
    }
    Ok(())
}
