//! Result type alias
//!
//! This module provides a convenient Result type alias that uses CapacityError
//! as the error type.

use super::errors::CapacityError;

/// Result type alias for pipeline operations
///
/// # Examples
///
/// ```
/// use capacity_mapping::domain::result::Result;
/// use capacity_mapping::domain::errors::CapacityError;
///
/// fn example_function() -> Result<String> {
///     Ok("success".to_string())
/// }
///
/// fn failing_function() -> Result<()> {
///     Err(CapacityError::Configuration("Invalid input".to_string()))
/// }
/// ```
pub type Result<T> = std::result::Result<T, CapacityError>;
