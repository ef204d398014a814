//! Macro for implementing string conversions on lifecycle enums
//!
//! Phases, stages and reason codes all round-trip through a stable lowercase
//! string: in storage columns, in error payloads and in log fields. The macro
//! keeps that mapping in one place per enum.
//!
//! # Example
//!
//! ```rust
//! use dealflow_domain::impl_domain_status_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum Temperature {
//!     Cold,
//!     Warm,
//!     Hot,
//! }
//!
//! impl_domain_status_conversions!(Temperature {
//!     Cold => "cold",
//!     Warm => "warm",
//!     Hot => "hot",
//! });
//!
//! assert_eq!(Temperature::ALL.len(), 3);
//! assert_eq!(Temperature::Warm.as_str(), "warm");
//! assert_eq!("HOT".parse::<Temperature>(), Ok(Temperature::Hot));
//! ```

/// Implements `as_str`, `ALL`, `Display` and `FromStr` for a fieldless enum
///
/// This macro generates:
/// - `as_str`: the canonical lowercase string for a variant
/// - `ALL`: every variant in declaration order, for exhaustive table checks
/// - Display trait: writes `as_str`
/// - FromStr trait: parses case-insensitive strings to enum variants
#[macro_export]
macro_rules! impl_domain_status_conversions {
    ($enum_name:ident { $($variant:ident => $str:expr),+ $(,)? }) => {
        impl $enum_name {
            /// Every variant in declaration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// Canonical lowercase representation.
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $str,)+
                }
            }
        }

        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = String;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
                    $($str => Ok(Self::$variant),)+
                    _ => Err(format!("Invalid {}: {}", stringify!($enum_name), s)),
                }
            }
        }
    };
}
