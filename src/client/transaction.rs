use crate::{Error, Result, TID_EPSILON};

/// Outstanding command transaction ids.
///
/// An id can only be issued again once its response (or the step's
/// timeout) has resolved it.
#[derive(Debug, Default)]
pub struct TransactionTable {
    outstanding: Vec<f64>,
}

impl TransactionTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn position(&self, transaction_id: f64) -> Option<usize> {
        self.outstanding
            .iter()
            .position(|id| (id - transaction_id).abs() < TID_EPSILON)
    }

    /// Mark `transaction_id` as sent
    pub fn register(&mut self, transaction_id: f64) -> Result<()> {
        if self.is_outstanding(transaction_id) {
            return Err(Error::invalid_state(format!(
                "Transaction {} is still outstanding",
                transaction_id
            )));
        }
        self.outstanding.push(transaction_id);
        Ok(())
    }

    pub fn is_outstanding(&self, transaction_id: f64) -> bool {
        self.position(transaction_id).is_some()
    }

    /// Remove `transaction_id`; false if it wasn't outstanding
    pub fn resolve(&mut self, transaction_id: f64) -> bool {
        match self.position(transaction_id) {
            Some(index) => {
                self.outstanding.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn outstanding(&self) -> &[f64] {
        &self.outstanding
    }

    pub fn clear(&mut self) {
        self.outstanding.clear();
    }
}
