use std::path::PathBuf;

/// Errors from dereferencing `$ref` / `allOf` in a schema document.
///
/// Resolution is strict by default: a broken reference is an error naming
/// the reference and the file it appeared in, never a silent `null`.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// The `$ref` points at a fragment that does not exist in its document.
    #[error("unresolvable reference '{reference}' in {file}")]
    MissingTarget { file: String, reference: String },

    /// A cross-file `$ref` names a file that cannot be read.
    #[error("failed to read referenced file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A cross-file `$ref` target is not parseable YAML.
    #[error("referenced file {path} is not valid YAML: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// A chain of `$ref`s revisited the same (file, fragment) pair.
    #[error("circular reference detected at {file}#{fragment}")]
    CircularReference { file: String, fragment: String },
}

/// Errors from discovering and loading resource specifications.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to read spec directory {path}: {source}")]
    Discover {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("failed to read spec file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("spec file {path} is not valid YAML: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// Resolution of an individual `$ref` aborts the whole load: specs
    /// fail fast at startup, not at request time.
    #[error("schema resolution failed for {path}: {source}")]
    Resolve {
        path: PathBuf,
        #[source]
        source: ResolveError,
    },

    #[error("spec file {path} is missing required field '{field}'")]
    MissingField { path: PathBuf, field: String },

    #[error("behavioral contract {path} is invalid: {message}")]
    Contract { path: PathBuf, message: String },

    #[error("schema for resource '{resource}' failed to compile: {message}")]
    SchemaCompile { resource: String, message: String },
}
