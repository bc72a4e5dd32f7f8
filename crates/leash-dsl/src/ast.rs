//! AST produced by the parser, matching the grammar excerpt in spec.md §6.

/// `permit` or `forbid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// `permit (...)`
    Permit,
    /// `forbid (...)`
    Forbid,
}

/// The action family named in a statement's `action == Action::"..."` head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionName {
    /// `Action::"FileOpen"`
    FileOpen,
    /// `Action::"FileOpenReadOnly"`
    FileOpenReadOnly,
    /// `Action::"FileOpenReadWrite"`
    FileOpenReadWrite,
    /// `Action::"Exec"`
    Exec,
    /// `Action::"NetConnect"`
    NetConnect,
    /// `Action::"HttpRewrite"`
    HttpRewrite,
    /// `Action::"McpCall"`
    McpCall,
    /// Anything else — preserved verbatim so the lint engine can flag it by
    /// name rather than the parser silently rejecting forward-compatible
    /// action identifiers.
    Unknown(String),
}

impl ActionName {
    /// Parse the identifier inside `Action::"..."`.
    #[must_use]
    pub fn from_ident(ident: &str) -> Self {
        match ident {
            "FileOpen" => Self::FileOpen,
            "FileOpenReadOnly" => Self::FileOpenReadOnly,
            "FileOpenReadWrite" => Self::FileOpenReadWrite,
            "Exec" => Self::Exec,
            "NetConnect" => Self::NetConnect,
            "HttpRewrite" => Self::HttpRewrite,
            "McpCall" => Self::McpCall,
            other => Self::Unknown(other.to_string()),
        }
    }
}

impl std::fmt::Display for ActionName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::FileOpen => "FileOpen",
            Self::FileOpenReadOnly => "FileOpenReadOnly",
            Self::FileOpenReadWrite => "FileOpenReadWrite",
            Self::Exec => "Exec",
            Self::NetConnect => "NetConnect",
            Self::HttpRewrite => "HttpRewrite",
            Self::McpCall => "McpCall",
            Self::Unknown(s) => s,
        };
        write!(f, "{s}")
    }
}

/// `Namespace::"value"` (e.g. `Dir::"/workspace"`, `Host::"example.com"`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    /// Entity namespace (`Dir`, `File`, `Host`, `Ip`, `Mcp`, ...).
    pub namespace: String,
    /// Entity value.
    pub value: String,
}

/// The `when { ... }` guard clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Guard {
    /// `resource in [ Entity, ... ]`
    ResourceIn(Vec<Entity>),
    /// `context.header == "..."` with optional `&& context.value == "..."`.
    Header {
        /// Header name to match.
        header: String,
        /// Required value, if the guard constrains it.
        value: Option<String>,
    },
}

/// A single `permit`/`forbid` statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    /// Allow or deny.
    pub effect: Effect,
    /// Action family.
    pub action: ActionName,
    /// Direct `resource == Entity` equality, when present (as opposed to a
    /// bare `resource` or a `when { resource in [...] }` guard).
    pub resource: Option<Entity>,
    /// Optional `when { ... }` guard.
    pub guard: Option<Guard>,
    /// 1-based source line this statement started on (for lint spans).
    pub line: usize,
    /// Index of this statement in the source program, preserved across
    /// translation so "deny beats allow" vs "allow beats deny" ordering
    /// intent is never lost (spec.md §4.2).
    pub sequence: usize,
}

/// A parsed program: an ordered list of statements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Program {
    /// Statements in source order.
    pub statements: Vec<Statement>,
}
