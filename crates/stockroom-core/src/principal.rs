//! The staff member on whose behalf an operation runs.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{FulfillmentError, Result};

/// Authenticated staff principal, passed explicitly into every mutating
/// operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Principal {
    staff_id: String,
}

impl Principal {
    pub fn new(staff_id: impl Into<String>) -> Result<Self> {
        let staff_id = staff_id.into().trim().to_string();
        if staff_id.is_empty() {
            return Err(FulfillmentError::Unauthorized(
                "staff id must not be empty".to_string(),
            ));
        }
        Ok(Self { staff_id })
    }

    pub fn staff_id(&self) -> &str {
        &self.staff_id
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.staff_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_principal_trims_and_rejects_empty() {
        assert_eq!(Principal::new(" ana ").unwrap().staff_id(), "ana");
        assert!(matches!(
            Principal::new("   "),
            Err(FulfillmentError::Unauthorized(_))
        ));
    }
}
