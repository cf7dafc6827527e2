//! Typed identifiers for workspace documents
//!
//! Every tab in the workspace is keyed by a [`FileRef`]. Its string form
//! (`core-Bootstrap`, `blade-auth-login`, `model-Order-migration`) is what the
//! widget uses as a model URI and what the tab strip displays, so parsing and
//! formatting must round-trip exactly.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Separator between the kind, the name and the model action
const DELIMITER: char = '-';

/// Errors produced while parsing a file identifier
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FileRefError {
    #[error("empty file identifier")]
    Empty,

    #[error("unknown file kind '{0}'")]
    UnknownKind(String),

    #[error("missing name in file identifier '{0}'")]
    MissingName(String),

    #[error("empty model action in file identifier '{0}'")]
    EmptyAction(String),
}

/// Kind of a remote file, the first segment of an identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    Core,
    Blade,
    Js,
    Model,
}

impl FileKind {
    /// Identifier prefix for this kind
    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Core => "core",
            FileKind::Blade => "blade",
            FileKind::Js => "js",
            FileKind::Model => "model",
        }
    }

    /// Widget language id used when creating a backing model
    pub fn language(&self) -> &'static str {
        match self {
            FileKind::Core | FileKind::Model => "php",
            FileKind::Blade => "html",
            FileKind::Js => "javascript",
        }
    }

    fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "core" => Some(FileKind::Core),
            "blade" => Some(FileKind::Blade),
            "js" => Some(FileKind::Js),
            "model" => Some(FileKind::Model),
            _ => None,
        }
    }
}

/// Derived document generated by the backend for a model
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ModelAction {
    Migration,
    Alter,
    Basic,
    Custom,
    /// Any other action name, kept verbatim so the identifier round-trips
    Other(String),
}

impl ModelAction {
    /// Parse an action suffix
    pub fn parse(s: &str) -> Self {
        match s {
            "migration" => ModelAction::Migration,
            "alter" => ModelAction::Alter,
            "basic" => ModelAction::Basic,
            "custom" => ModelAction::Custom,
            other => ModelAction::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ModelAction::Migration => "migration",
            ModelAction::Alter => "alter",
            ModelAction::Basic => "basic",
            ModelAction::Custom => "custom",
            ModelAction::Other(s) => s.as_str(),
        }
    }
}

/// Identifier of a document that can be opened in a tab
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FileRef {
    Core(String),
    Blade(String),
    Js(String),
    Model {
        name: String,
        action: Option<ModelAction>,
    },
}

impl FileRef {
    /// Parse an identifier such as `blade-login` or `model-Order-alter`.
    ///
    /// Only the first segment is treated as the kind. For core, blade and js
    /// files the remainder is the name even when it contains the delimiter.
    /// For models the action is the text after the last delimiter, since model
    /// class names never contain one.
    pub fn parse(s: &str) -> Result<Self, FileRefError> {
        if s.is_empty() {
            return Err(FileRefError::Empty);
        }

        let Some((prefix, rest)) = s.split_once(DELIMITER) else {
            return match FileKind::from_prefix(s) {
                Some(_) => Err(FileRefError::MissingName(s.to_string())),
                None => Err(FileRefError::UnknownKind(s.to_string())),
            };
        };

        let kind = FileKind::from_prefix(prefix)
            .ok_or_else(|| FileRefError::UnknownKind(prefix.to_string()))?;

        if rest.is_empty() || rest.starts_with(DELIMITER) {
            return Err(FileRefError::MissingName(s.to_string()));
        }

        match kind {
            FileKind::Core => Ok(FileRef::Core(rest.to_string())),
            FileKind::Blade => Ok(FileRef::Blade(rest.to_string())),
            FileKind::Js => Ok(FileRef::Js(rest.to_string())),
            FileKind::Model => match rest.rsplit_once(DELIMITER) {
                Some((_, "")) => Err(FileRefError::EmptyAction(s.to_string())),
                Some((name, action)) => Ok(FileRef::Model {
                    name: name.to_string(),
                    action: Some(ModelAction::parse(action)),
                }),
                None => Ok(FileRef::Model {
                    name: rest.to_string(),
                    action: None,
                }),
            },
        }
    }

    pub fn core(name: impl Into<String>) -> Self {
        FileRef::Core(name.into())
    }

    pub fn blade(name: impl Into<String>) -> Self {
        FileRef::Blade(name.into())
    }

    pub fn js(name: impl Into<String>) -> Self {
        FileRef::Js(name.into())
    }

    /// A model's derived document, e.g. its migration
    pub fn model_action(name: impl Into<String>, action: ModelAction) -> Self {
        FileRef::Model {
            name: name.into(),
            action: Some(action),
        }
    }

    pub fn kind(&self) -> FileKind {
        match self {
            FileRef::Core(_) => FileKind::Core,
            FileRef::Blade(_) => FileKind::Blade,
            FileRef::Js(_) => FileKind::Js,
            FileRef::Model { .. } => FileKind::Model,
        }
    }

    /// File or model name without kind and action
    pub fn name(&self) -> &str {
        match self {
            FileRef::Core(name) | FileRef::Blade(name) | FileRef::Js(name) => name,
            FileRef::Model { name, .. } => name,
        }
    }

    pub fn model_action_kind(&self) -> Option<&ModelAction> {
        match self {
            FileRef::Model { action, .. } => action.as_ref(),
            _ => None,
        }
    }

    pub fn language(&self) -> &'static str {
        self.kind().language()
    }

    /// Name shown in the tab strip
    pub fn display_name(&self) -> String {
        match self {
            FileRef::Core(name) => format!("{name}.php"),
            FileRef::Blade(name) => format!("{name}.blade.php"),
            FileRef::Js(name) => format!("{name}.js"),
            FileRef::Model {
                name,
                action: Some(action),
            } => format!("{name} ({})", action.as_str()),
            FileRef::Model { name, action: None } => format!("{name}.php"),
        }
    }
}

impl fmt::Display for FileRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileRef::Model {
                name,
                action: Some(action),
            } => write!(
                f,
                "{}{DELIMITER}{name}{DELIMITER}{}",
                FileKind::Model.as_str(),
                action.as_str()
            ),
            other => write!(f, "{}{DELIMITER}{}", other.kind().as_str(), other.name()),
        }
    }
}

impl FromStr for FileRef {
    type Err = FileRefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FileRef::parse(s)
    }
}

/// Strip a known extension from a listed file name
pub fn strip_extension(kind: FileKind, file_name: &str) -> &str {
    let suffix = match kind {
        FileKind::Blade => ".blade.php",
        FileKind::Js => ".js",
        FileKind::Core | FileKind::Model => ".php",
    };
    file_name.strip_suffix(suffix).unwrap_or(file_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_plain_kinds() {
        assert_eq!(
            FileRef::parse("core-Bootstrap").unwrap(),
            FileRef::core("Bootstrap")
        );
        assert_eq!(FileRef::parse("blade-login").unwrap(), FileRef::blade("login"));
        assert_eq!(
            FileRef::parse("js-dashboard").unwrap(),
            FileRef::js("dashboard")
        );
    }

    #[test]
    fn test_parse_name_with_delimiter() {
        let parsed = FileRef::parse("blade-auth-reset-password").unwrap();
        assert_eq!(parsed, FileRef::blade("auth-reset-password"));
        assert_eq!(parsed.to_string(), "blade-auth-reset-password");
    }

    #[test]
    fn test_parse_model_actions() {
        let migration = FileRef::parse("model-Order-migration").unwrap();
        assert_eq!(
            migration,
            FileRef::model_action("Order", ModelAction::Migration)
        );
        assert_eq!(migration.name(), "Order");
        assert_eq!(migration.kind(), FileKind::Model);

        let alter = FileRef::parse("model-Order-alter").unwrap();
        assert_eq!(alter.model_action_kind(), Some(&ModelAction::Alter));

        let bare = FileRef::parse("model-Order").unwrap();
        assert_eq!(
            bare,
            FileRef::Model {
                name: "Order".to_string(),
                action: None
            }
        );
    }

    #[test]
    fn test_parse_unknown_action_round_trips() {
        let parsed = FileRef::parse("model-Order-test").unwrap();
        assert_eq!(
            parsed.model_action_kind(),
            Some(&ModelAction::Other("test".to_string()))
        );
        assert_eq!(parsed.to_string(), "model-Order-test");
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(FileRef::parse(""), Err(FileRefError::Empty));
        assert_eq!(
            FileRef::parse("css-site"),
            Err(FileRefError::UnknownKind("css".to_string()))
        );
        assert_eq!(
            FileRef::parse("core"),
            Err(FileRefError::MissingName("core".to_string()))
        );
        assert_eq!(
            FileRef::parse("core-"),
            Err(FileRefError::MissingName("core-".to_string()))
        );
        assert_eq!(
            FileRef::parse("model-Order-"),
            Err(FileRefError::EmptyAction("model-Order-".to_string()))
        );
        assert!(FileRef::parse("nonsense").is_err());
    }

    #[test]
    fn test_language_by_kind() {
        assert_eq!(FileRef::core("Bootstrap").language(), "php");
        assert_eq!(FileRef::blade("login").language(), "html");
        assert_eq!(FileRef::js("dashboard").language(), "javascript");
        assert_eq!(
            FileRef::model_action("Order", ModelAction::Migration).language(),
            "php"
        );
    }

    #[test]
    fn test_display_name() {
        assert_eq!(FileRef::core("Bootstrap").display_name(), "Bootstrap.php");
        assert_eq!(FileRef::blade("login").display_name(), "login.blade.php");
        assert_eq!(
            FileRef::model_action("Order", ModelAction::Alter).display_name(),
            "Order (alter)"
        );
    }

    #[test]
    fn test_strip_extension() {
        assert_eq!(strip_extension(FileKind::Blade, "login.blade.php"), "login");
        assert_eq!(strip_extension(FileKind::Js, "dashboard.js"), "dashboard");
        assert_eq!(strip_extension(FileKind::Core, "Bootstrap.php"), "Bootstrap");
        assert_eq!(strip_extension(FileKind::Model, "Order"), "Order");
    }

    proptest! {
        #[test]
        fn prop_plain_ids_round_trip(
            kind in prop::sample::select(vec!["core", "blade", "js"]),
            name in "[A-Za-z0-9_][A-Za-z0-9_\\-]{0,24}",
        ) {
            let id = format!("{kind}-{name}");
            let parsed = FileRef::parse(&id).unwrap();
            prop_assert_eq!(parsed.to_string(), id);
        }

        #[test]
        fn prop_model_ids_round_trip(
            model in "[A-Z][A-Za-z0-9_]{0,16}",
            action in prop::option::of("[a-z][a-z0-9_]{0,10}"),
        ) {
            let id = match &action {
                Some(action) => format!("model-{model}-{action}"),
                None => format!("model-{model}"),
            };
            let parsed = FileRef::parse(&id).unwrap();
            prop_assert_eq!(parsed.name(), model.as_str());
            prop_assert_eq!(parsed.to_string(), id);
        }

        #[test]
        fn prop_parse_never_panics(s in "\\PC{0,40}") {
            if let Ok(parsed) = FileRef::parse(&s) {
                prop_assert_eq!(parsed.to_string(), s);
            }
        }
    }
}
