//! Value objects: compared by value, never by identity.

/// Marker for immutable values such as a VAT rate, a cart line or a RUC.
///
/// Two value objects holding the same attributes are interchangeable; to
/// "change" one, build a new one.
///
/// ```ignore
/// #[derive(Debug, Clone, PartialEq, Eq)]
/// struct Price { amount: Decimal }
///
/// impl ValueObject for Price {}
/// ```
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
