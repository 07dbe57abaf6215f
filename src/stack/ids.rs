/// Declares a string-keyed id enum with an open `Custom` variant.
///
/// Each variant lists its canonical name followed by accepted aliases.
/// Parsing is case-insensitive; unknown names become `Custom(lowercased)`,
/// which lets registries accept kinds added at runtime.
#[macro_export]
macro_rules! define_kind_enum {
    (
        $(#[$enum_meta:meta])*
        $enum_name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident => $canonical:literal $( | $alias:literal )*
            ),* $(,)?
        }
    ) => {
        $(#[$enum_meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $enum_name {
            $(
                $(#[$variant_meta])*
                $variant,
            )*
            Custom(String),
        }

        impl $enum_name {
            pub fn as_str(&self) -> &str {
                match self {
                    $( Self::$variant => $canonical, )*
                    Self::Custom(name) => name.as_str(),
                }
            }

            /// Built-in variant for `name` or one of its aliases.
            pub fn from_name(name: &str) -> Option<Self> {
                match name.trim().to_lowercase().as_str() {
                    $( $canonical $( | $alias )* => Some(Self::$variant), )*
                    _ => None,
                }
            }

            /// Like [`Self::from_name`], falling back to `Custom`.
            pub fn parse(name: &str) -> Self {
                Self::from_name(name).unwrap_or_else(|| Self::Custom(name.trim().to_lowercase()))
            }

            pub fn is_builtin(&self) -> bool {
                !matches!(self, Self::Custom(_))
            }

            pub fn builtin_variants() -> &'static [Self] {
                &[ $( Self::$variant, )* ]
            }
        }

        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = std::convert::Infallible;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self::parse(s))
            }
        }

        impl serde::Serialize for $enum_name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> serde::Deserialize<'de> for $enum_name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let s = String::deserialize(deserializer)?;
                Ok(Self::parse(&s))
            }
        }
    };
}

define_kind_enum! {
    /// Data-store kind an adapter is bound to.
    DataStoreKind {
        PostgreSql => "postgresql" | "postgres" | "pg" | "pgvector",
        MongoDb => "mongodb" | "mongo",
        MySql => "mysql",
        ClickHouse => "clickhouse",
        Redis => "redis",
        Elasticsearch => "elasticsearch" | "elastic" | "es",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yare::parameterized;

    #[parameterized(
        canonical = { "postgresql", DataStoreKind::PostgreSql },
        alias = { "postgres", DataStoreKind::PostgreSql },
        upper = { "MongoDB", DataStoreKind::MongoDb },
        padded = { "  redis ", DataStoreKind::Redis },
        es_alias = { "es", DataStoreKind::Elasticsearch },
    )]
    fn test_parse_builtin(input: &str, expected: DataStoreKind) {
        assert_eq!(DataStoreKind::parse(input), expected);
        assert!(expected.is_builtin());
    }

    #[test]
    fn test_unknown_kind_is_custom() {
        let kind = DataStoreKind::parse("CockroachDB");
        assert_eq!(kind, DataStoreKind::Custom("cockroachdb".to_string()));
        assert!(!kind.is_builtin());
        assert_eq!(kind.to_string(), "cockroachdb");
        assert!(DataStoreKind::from_name("cockroachdb").is_none());
    }

    #[test]
    fn test_serde_uses_canonical_name() {
        let json = serde_json::to_string(&DataStoreKind::PostgreSql).unwrap();
        assert_eq!(json, "\"postgresql\"");

        let kind: DataStoreKind = serde_json::from_str("\"pg\"").unwrap();
        assert_eq!(kind, DataStoreKind::PostgreSql);
    }

    #[test]
    fn test_builtin_variants() {
        assert_eq!(DataStoreKind::builtin_variants().len(), 6);
    }
}
