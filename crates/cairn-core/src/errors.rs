use miette::Diagnostic;
use thiserror::Error;

/// Unified error type for all Cairn operations.
#[derive(Debug, Error, Diagnostic)]
pub enum CairnError {
    /// I/O operation failed (recipe directory or config read).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A recipe failed load-time validation. No partial registry is
    /// admitted: the whole load aborts on the first malformed recipe.
    #[error("malformed recipe `{package}`: {message}")]
    #[diagnostic(help("Fix the recipe file and reload; nothing was admitted to the registry"))]
    MalformedRecipe { package: String, message: String },

    /// A supplied variant value is outside the declared allowed set.
    #[error("invalid value `{value}` for variant `{variant}` of `{package}`: {allowed}")]
    InvalidVariantValue {
        package: String,
        variant: String,
        value: String,
        allowed: String,
    },

    /// A constraint string uses syntax the evaluator cannot interpret.
    #[error("unsupported constraint syntax `{clause}` in {context}")]
    #[diagnostic(help(
        "Clauses are `@range`, `%compiler[@range]`, `+variant`, `~variant`, or `variant=value`"
    ))]
    UnsupportedPredicate { clause: String, context: String },

    /// No declared version satisfies the combined range and conflict
    /// constraints.
    #[error("no version of `{package}` satisfies `{requested}`{reason}")]
    NoSatisfyingVersion {
        package: String,
        requested: String,
        reason: String,
    },

    /// A resolved configuration violates a conflict rule or a dependency
    /// edge that the already-concretized node cannot satisfy.
    #[error("conflicting constraint on `{package}`: {message} (via {chain})")]
    ConflictingConstraint {
        package: String,
        message: String,
        chain: String,
    },

    /// A request or dependency edge names a recipe the registry does not hold.
    #[error("package `{name}` not found in the recipe registry")]
    PackageNotFound { name: String },

    /// Invalid workspace configuration (`cairn.toml`).
    #[error("configuration error: {message}")]
    #[diagnostic(help("Check your cairn.toml"))]
    Config { message: String },
}

/// Convenience alias used throughout the Cairn crates.
pub type CairnResult<T> = Result<T, CairnError>;
