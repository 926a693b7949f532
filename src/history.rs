// src/history.rs
use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::codec;
use crate::error::HistoryError;
use crate::tag::TagHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IdFormat {
    Hex,
    ReversedHex,
    Decimal,
    ReversedDecimal,
}

impl IdFormat {
    /// One ID, hex forms without separators.
    pub fn render(self, id: &[u8]) -> String {
        match self {
            IdFormat::Hex => codec::compact(&codec::to_hex(id)),
            IdFormat::ReversedHex => codec::compact(&codec::to_reversed_hex(id)),
            IdFormat::Decimal => codec::to_decimal(id).to_string(),
            IdFormat::ReversedDecimal => codec::to_reversed_decimal(id).to_string(),
        }
    }
}

/// IDs of the tags scanned in this session, oldest first.
#[derive(Debug, Clone, Default)]
pub struct ScanHistory {
    ids: VecDeque<Vec<u8>>,
    limit: Option<usize>,
}

impl ScanHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps at most `limit` entries, dropping the oldest. Zero keeps none.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            ids: VecDeque::new(),
            limit: Some(limit),
        }
    }

    pub fn record(&mut self, tag: &TagHandle) {
        self.ids.push_back(tag.id().to_vec());
        if let Some(limit) = self.limit {
            while self.ids.len() > limit {
                self.ids.pop_front();
            }
        }
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// All IDs in one format, one per line.
    pub fn export(&self, format: IdFormat) -> Result<String, HistoryError> {
        if self.ids.is_empty() {
            return Err(HistoryError::Empty);
        }
        Ok(self
            .ids
            .iter()
            .map(|id| format.render(id))
            .collect::<Vec<_>>()
            .join("\n"))
    }
}
