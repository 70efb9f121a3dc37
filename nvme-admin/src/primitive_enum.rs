//! utilites for the `U8Enum` derive macro

/// Error type used to denote that a given value is invalid for the operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidValue<T> {
    /// the invalid value
    pub value: T,
}
