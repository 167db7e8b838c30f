//! Closed string enums used at the wire boundary.

use std::fmt;

/// A string that does not name any variant of a closed enum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant {
    /// Enum being parsed, e.g. `ElementType`.
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
    /// Accepted spellings.
    pub expected: &'static [&'static str],
}

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown {} '{}', expected one of: {}",
            self.kind,
            self.value,
            self.expected.join(", ")
        )
    }
}

impl std::error::Error for UnknownVariant {}

/// Declare a closed enum with fixed wire spellings.
///
/// Parsing is case-insensitive; serialization always uses the listed spelling.
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $wire:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord,
            serde::Serialize, serde::Deserialize,
        )]
        #[serde(try_from = "String", into = "String")]
        $vis enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            const SPELLINGS: &'static [&'static str] = &[$($wire),+];

            /// The wire spelling of this variant.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $( Self::$variant => $wire ),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::wire::UnknownVariant;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                Self::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str().eq_ignore_ascii_case(s.trim()))
                    .ok_or_else(|| $crate::wire::UnknownVariant {
                        kind: stringify!($name),
                        value: s.to_string(),
                        expected: Self::SPELLINGS,
                    })
            }
        }

        impl TryFrom<String> for $name {
            type Error = $crate::wire::UnknownVariant;

            fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
                value.parse()
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.as_str().to_string()
            }
        }
    };
}

#[cfg(test)]
mod tests {
    wire_enum! {
        enum Color {
            Red => "red",
            DarkBlue => "DARK_BLUE",
        }
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("RED".parse::<Color>().unwrap(), Color::Red);
        assert_eq!("dark_blue".parse::<Color>().unwrap(), Color::DarkBlue);
    }

    #[test]
    fn test_unknown_lists_spellings() {
        let err = "green".parse::<Color>().unwrap_err();
        assert_eq!(err.kind, "Color");
        let msg = err.to_string();
        assert!(msg.contains("'green'"));
        assert!(msg.contains("red, DARK_BLUE"));
    }

    #[test]
    fn test_serde_uses_wire_spelling() {
        let json = serde_json::to_string(&Color::DarkBlue).unwrap();
        assert_eq!(json, "\"DARK_BLUE\"");
        let back: Color = serde_json::from_str("\"Red\"").unwrap();
        assert_eq!(back, Color::Red);
        assert!(serde_json::from_str::<Color>("\"pink\"").is_err());
    }
}
