use std::collections::HashMap;
use thiserror::Error;

/// Request-validation failures. The `Display` text is what the client sees;
/// none of these close the connection or count against the rate limit.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteError {
    /// The request was not exactly two space-separated tokens.
    #[error("Invalid format. Use: [Currency1] [Currency2]")]
    BadFormat,
    /// One of the symbols is not in the rate table.
    #[error("Unknown currency.")]
    UnknownSymbol,
}

/// Currency → baseline-value table, read-only after construction.
///
/// A quote for `A B` is `value[B] / value[A]`, i.e. how many units of B one
/// unit of A buys, with all baselines expressed against a common anchor.
#[derive(Debug, Clone)]
pub struct RateTable {
    rates: HashMap<String, f64>,
}

impl RateTable {
    /// Build a table from symbol → baseline value entries. Symbols are
    /// normalized to uppercase so lookups are case-insensitive.
    #[must_use]
    pub fn new(rates: HashMap<String, f64>) -> Self {
        let rates = rates
            .into_iter()
            .map(|(symbol, value)| (symbol.to_uppercase(), value))
            .collect();
        Self { rates }
    }

    /// Number of known symbols.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rates.len()
    }

    /// Returns `true` if the table has no symbols.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    /// Process one request frame into a response line.
    ///
    /// The request must be exactly two tokens separated by a single space;
    /// consecutive spaces produce empty tokens and are rejected, matching the
    /// wire protocol's strict format.
    ///
    /// # Errors
    ///
    /// Returns [`QuoteError::BadFormat`] on a malformed request and
    /// [`QuoteError::UnknownSymbol`] if either symbol is absent.
    pub fn quote(&self, request: &str) -> Result<String, QuoteError> {
        let tokens: Vec<&str> = request.split(' ').collect();
        let [from, to] = tokens[..] else {
            return Err(QuoteError::BadFormat);
        };

        let from = from.to_uppercase();
        let to = to.to_uppercase();

        let base = self.rates.get(&from).ok_or(QuoteError::UnknownSymbol)?;
        let target = self.rates.get(&to).ok_or(QuoteError::UnknownSymbol)?;

        let rate = target / base;
        Ok(format!("Exchange rate {from}/{to}: {rate}"))
    }
}
