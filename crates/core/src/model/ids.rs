use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Wraps an existing UUID.
            #[must_use]
            pub fn new(id: Uuid) -> Self {
                Self(id)
            }

            /// Generates a fresh random identifier.
            #[must_use]
            pub fn random() -> Self {
                Self(Uuid::new_v4())
            }

            /// Returns the underlying UUID.
            #[must_use]
            pub fn value(&self) -> Uuid {
                self.0
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s.trim())
                    .map(Self)
                    .map_err(|_| ParseIdError {
                        kind: stringify!($name),
                    })
            }
        }
    };
}

uuid_id!(
    /// Identifier of a platform user (the learner watching a lesson).
    UserId
);
uuid_id!(
    /// Identifier of a course.
    CourseId
);
uuid_id!(
    /// Identifier of a single lesson (one video) within a course.
    LessonId
);
uuid_id!(
    /// Identifier of a persisted bookmark.
    BookmarkId
);

// ─── FromStr Error ─────────────────────────────────────────────────────────────

/// Error type for parsing an ID from a string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    kind: &'static str,
}

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to parse {} from string", self.kind)
    }
}

impl std::error::Error for ParseIdError {}

// ─── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const RAW: &str = "6f1c1f9e-3f0a-4c53-9a55-2b1f7d6a9e10";

    #[test]
    fn lesson_id_parses_and_displays() {
        let id: LessonId = RAW.parse().unwrap();
        assert_eq!(id.to_string(), RAW);
    }

    #[test]
    fn parsing_trims_whitespace() {
        let id: UserId = format!("  {RAW}\n").parse().unwrap();
        assert_eq!(id.value(), Uuid::parse_str(RAW).unwrap());
    }

    #[test]
    fn invalid_id_names_the_kind() {
        let err = "not-a-uuid".parse::<CourseId>().unwrap_err();
        assert_eq!(err.to_string(), "failed to parse CourseId from string");
    }

    #[test]
    fn debug_includes_type_name() {
        let id = BookmarkId::new(Uuid::parse_str(RAW).unwrap());
        assert_eq!(format!("{id:?}"), format!("BookmarkId({RAW})"));
    }

    #[test]
    fn random_ids_differ() {
        assert_ne!(BookmarkId::random(), BookmarkId::random());
    }
}
