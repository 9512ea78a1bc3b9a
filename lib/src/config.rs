//! Configuration model and file parsing.

use std::{
    collections::HashSet,
    env,
    fs,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

#[cfg(feature = "clap")]
/// Re-export.
pub use clap;
#[cfg(feature = "clap")]
use clap::parser::ValueSource;

use anyhow::Context;

/// Re-export.
pub use toml_edit;
use toml_edit::{
    DocumentMut,
    Item,
    Value,
};

use crate::Result;
use crate::hash::HashAlgorithm;

mod verbosity;
pub use verbosity::Verbosity;

/// The environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "PGP_AMEND_CONFIG";

/// The default number of seconds an engine call may take.
pub const DEFAULT_ENGINE_TIMEOUT: u64 = 60;

/// Where a configuration setting got its value from.
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub enum Source {
    /// Unset (the default value).
    #[default]
    Default,
    /// Set in the configuration file.
    ConfigFile,
    /// Set on the command line.
    CommandLine,
}

/// Holds the runtime configuration.
///
/// [`Config::default`] returns the default configuration.  To read
/// the configuration from a file, use [`ConfigFile::parse_file`]:
///
/// ```rust,no_run
/// use pgp_amend::config::ConfigFile;
///
/// # fn main() -> anyhow::Result<()> {
/// let config = ConfigFile::parse_default()?.into_config();
/// # Ok(()) }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// How verbose the UI should be.
    verbosity: Verbosity,
    verbosity_source: Source,

    /// The secret keys to sign with.
    sign_signer_files: Vec<PathBuf>,
    sign_signer_files_source: Source,

    /// The digest for documents that are not yet signed.
    sign_hash: HashAlgorithm,
    sign_hash_source: Source,

    /// The certificates to verify signatures with.
    verify_keyrings: Vec<PathBuf>,
    verify_keyrings_source: Source,

    /// Seconds per engine call, 0 disables the limit.
    engine_timeout: u64,
    engine_timeout_source: Source,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            verbosity: Default::default(),
            verbosity_source: Default::default(),
            sign_signer_files: Default::default(),
            sign_signer_files_source: Default::default(),
            sign_hash: Default::default(),
            sign_hash_source: Default::default(),
            verify_keyrings: Default::default(),
            verify_keyrings_source: Default::default(),
            engine_timeout: DEFAULT_ENGINE_TIMEOUT,
            engine_timeout_source: Default::default(),
        }
    }
}

/// Returns whether a command-line value was given explicitly.
#[cfg(feature = "clap")]
fn given(source: Option<ValueSource>) -> bool {
    ! matches!(source, None | Some(ValueSource::DefaultValue))
}

/// Formats a list of paths as a TOML array.
fn paths_config_value(paths: &[PathBuf]) -> String {
    format!(
        "[ {} ]",
        paths.iter()
            .map(|p| format!("{:?}", p.display().to_string()))
            .collect::<Vec<String>>()
            .join(", "))
}

impl Config {
    /// Returns the verbosity setting.
    pub fn verbosity(&self) -> Verbosity {
        self.verbosity.clone()
    }

    /// Returns where the setting was set.
    pub fn verbosity_source(&self) -> Source {
        self.verbosity_source.clone()
    }

    /// Returns the configuration key for the verbosity setting.
    pub const fn verbosity_config_key() -> &'static str {
        "ui.verbosity"
    }

    /// Returns the configuration value for the verbosity setting.
    ///
    /// The returned value can be written directly to the
    /// configuration file; additional quoting is not required.
    pub fn verbosity_config_value(&self) -> String {
        format!("{:?}", self.verbosity)
    }

    /// Sets the verbose setting.
    ///
    /// If the flag is given, it wins.  Otherwise, the value from the
    /// configuration file (if any) or the default is kept.
    #[cfg(feature = "clap")]
    pub fn init_verbose(&mut self, cli: bool, source: Option<ValueSource>) {
        if given(source) {
            self.verbosity_source = Source::CommandLine;
            self.verbosity = if cli {
                Verbosity::Verbose
            } else {
                Verbosity::Default
            };
        }
    }

    /// Returns the verbose setting.
    pub fn verbose(&self) -> bool {
        self.verbosity == Verbosity::Verbose
    }

    /// Sets the quiet setting.
    ///
    /// If the flag is given, it wins.  Otherwise, the value from the
    /// configuration file (if any) or the default is kept.
    #[cfg(feature = "clap")]
    pub fn init_quiet(&mut self, cli: bool, source: Option<ValueSource>) {
        if given(source) {
            self.verbosity_source = Source::CommandLine;
            self.verbosity = if cli {
                Verbosity::Quiet
            } else {
                Verbosity::Default
            };
        }
    }

    /// Returns the quiet setting.
    pub fn quiet(&self) -> bool {
        self.verbosity == Verbosity::Quiet
    }

    /// Returns the files with the keys to sign with.
    pub fn sign_signer_files(&self) -> &[PathBuf] {
        &self.sign_signer_files
    }

    /// Returns where the setting was set.
    pub fn sign_signer_files_source(&self) -> Source {
        self.sign_signer_files_source.clone()
    }

    /// Returns the files with the keys to sign with.
    ///
    /// Files given on the command line replace those from the
    /// configuration file.
    #[cfg(feature = "clap")]
    pub fn resolve_sign_signer_files<'s>(&'s self, cli: &'s [PathBuf],
                                         source: Option<ValueSource>)
        -> &'s [PathBuf]
    {
        if given(source) {
            cli
        } else {
            &self.sign_signer_files
        }
    }

    /// Returns the configuration key for the signer files setting.
    pub const fn sign_signer_files_config_key() -> &'static str {
        "sign.signer-files"
    }

    /// Returns the configuration value for the signer files setting.
    ///
    /// The returned value can be written directly to the
    /// configuration file; additional quoting is not required.
    pub fn sign_signer_files_config_value(&self) -> String {
        paths_config_value(&self.sign_signer_files)
    }

    /// Returns the digest for documents that are not yet signed.
    pub fn sign_hash(&self) -> HashAlgorithm {
        self.sign_hash.clone()
    }

    /// Returns where the setting was set.
    pub fn sign_hash_source(&self) -> Source {
        self.sign_hash_source.clone()
    }

    /// Returns the digest for documents that are not yet signed.
    ///
    /// If the flag is given, use the given value.  Otherwise, use the
    /// value from the configuration file (if any), or the default.
    #[cfg(feature = "clap")]
    pub fn resolve_sign_hash(&self, cli: &HashAlgorithm,
                             source: Option<ValueSource>)
        -> HashAlgorithm
    {
        if given(source) {
            cli
        } else {
            &self.sign_hash
        }.clone()
    }

    /// Returns the configuration key for the hash setting.
    pub const fn sign_hash_config_key() -> &'static str {
        "sign.hash"
    }

    /// Returns the configuration value for the hash setting.
    ///
    /// The returned value can be written directly to the
    /// configuration file; additional quoting is not required.
    pub fn sign_hash_config_value(&self) -> String {
        format!("{:?}", self.sign_hash)
    }

    /// Returns the files with certificates to verify with.
    pub fn verify_keyrings(&self) -> &[PathBuf] {
        &self.verify_keyrings
    }

    /// Returns where the setting was set.
    pub fn verify_keyrings_source(&self) -> Source {
        self.verify_keyrings_source.clone()
    }

    /// Returns the files with certificates to verify with.
    ///
    /// Files given on the command line replace those from the
    /// configuration file.
    #[cfg(feature = "clap")]
    pub fn resolve_verify_keyrings<'s>(&'s self, cli: &'s [PathBuf],
                                       source: Option<ValueSource>)
        -> &'s [PathBuf]
    {
        if given(source) {
            cli
        } else {
            &self.verify_keyrings
        }
    }

    /// Returns the configuration key for the keyrings setting.
    pub const fn verify_keyrings_config_key() -> &'static str {
        "verify.keyrings"
    }

    /// Returns the configuration value for the keyrings setting.
    ///
    /// The returned value can be written directly to the
    /// configuration file; additional quoting is not required.
    pub fn verify_keyrings_config_value(&self) -> String {
        paths_config_value(&self.verify_keyrings)
    }

    /// Returns the engine timeout in seconds.
    pub fn engine_timeout_secs(&self) -> u64 {
        self.engine_timeout
    }

    /// Returns the engine timeout, or `None` if calls are unbounded.
    pub fn engine_timeout(&self) -> Option<Duration> {
        timeout(self.engine_timeout)
    }

    /// Returns where the setting was set.
    pub fn engine_timeout_source(&self) -> Source {
        self.engine_timeout_source.clone()
    }

    /// Returns the engine timeout, or `None` if calls are unbounded.
    ///
    /// If the flag is given, use the given value.  Otherwise, use the
    /// value from the configuration file (if any), or the default.
    #[cfg(feature = "clap")]
    pub fn resolve_engine_timeout(&self, cli: u64,
                                  source: Option<ValueSource>)
        -> Option<Duration>
    {
        timeout(if given(source) { cli } else { self.engine_timeout })
    }

    /// Returns the configuration key for the timeout setting.
    pub const fn engine_timeout_config_key() -> &'static str {
        "engine.timeout"
    }

    /// Returns the configuration value for the timeout setting.
    ///
    /// The returned value can be written directly to the
    /// configuration file; additional quoting is not required.
    pub fn engine_timeout_config_value(&self) -> String {
        self.engine_timeout.to_string()
    }
}

/// Maps a number of seconds to a timeout, 0 meaning none.
fn timeout(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

/// Holds the document tree of the configuration file.
///
/// The tree is kept around so that it can be written back out
/// unchanged.
#[derive(Debug, Default, Clone)]
pub struct ConfigFile {
    doc: DocumentMut,
    config: Config,
}

impl ConfigFile {
    /// A template for the configuration containing the default
    /// values.
    ///
    /// Not all of the commented out values are valid.  Those that
    /// are not valid are prefixed with "example".
    const TEMPLATE: &'static str = "\
# Configuration template for pgp-amend <VERSION>
<CONFIG-PATH-HINT>

[ui]
#verbosity = \"default\" # or \"verbose\" or \"quiet\"

[sign]
example#signer-files = [\"/absolute/path/to/your/key.pgp\"]
#hash = <DEFAULT-SIGN-HASH>

[verify]
example#keyrings = [\"/absolute/path/to/certificates.pgp\"]

[engine]
#timeout = <DEFAULT-ENGINE-TIMEOUT> # seconds, 0 disables the limit
";

    /// Returns a configuration template with the defaults.
    fn config_template(path: Option<&Path>, uncomment_defaults: bool)
        -> String
    {
        let hint = if let Some(path) = path {
            format!("\n\
                     # To use it, edit it to your liking and write it to\n\
                     # {}",
                    path.display())
        } else {
            "".into()
        };

        let template = Self::TEMPLATE
            .replace("<VERSION>", env!("CARGO_PKG_VERSION"))
            .replace("<CONFIG-PATH-HINT>", &hint)
            .replace("<DEFAULT-SIGN-HASH>",
                     &format!("{:?}", HashAlgorithm::default()))
            .replace("<DEFAULT-ENGINE-TIMEOUT>",
                     &DEFAULT_ENGINE_TIMEOUT.to_string());

        let mut out = String::with_capacity(template.len());
        for line in template.lines() {
            let line = match line.strip_prefix('#') {
                // Enable all defaults by commenting-in.
                Some(rest) if uncomment_defaults
                    && ! rest.is_empty() && ! rest.starts_with(' ') => rest,
                _ => line,
            };
            // Remove the example tag.
            let line = line.strip_prefix("example").unwrap_or(line);
            out.push_str(line);
            out.push('\n');
        }
        out
    }

    /// Returns the default configuration in template form.
    ///
    /// All the configuration options with their defaults are
    /// commented out.
    pub fn default_template(path: Option<&Path>) -> Result<Self> {
        Self::parse(&Self::config_template(path, false))
            .context("Parsing default configuration failed")
    }

    /// Returns the default configuration.
    ///
    /// Unlike [`ConfigFile::default_template`], the default
    /// configuration options are explicitly set.
    pub fn default_config(path: Option<&Path>) -> Result<Self> {
        Self::parse(&Self::config_template(path, true))
            .context("Parsing default configuration failed")
    }

    /// Returns the location of the configuration file.
    ///
    /// This is `$PGP_AMEND_CONFIG` if set, otherwise
    /// `$XDG_CONFIG_HOME/pgp-amend/config.toml`, falling back to
    /// `$HOME/.config`.
    pub fn default_path() -> Option<PathBuf> {
        if let Some(p) = env::var_os(CONFIG_ENV).filter(|p| ! p.is_empty()) {
            return Some(PathBuf::from(p));
        }

        env::var_os("XDG_CONFIG_HOME")
            .filter(|p| ! p.is_empty())
            .map(PathBuf::from)
            .or_else(|| {
                env::var_os("HOME")
                    .filter(|p| ! p.is_empty())
                    .map(|h| PathBuf::from(h).join(".config"))
            })
            .map(|d| d.join("pgp-amend").join("config.toml"))
    }

    /// Reads and validates the configuration file from the default
    /// location.
    ///
    /// If the configuration file does not exist, the default
    /// configuration is returned.  Any other error that occurs while
    /// reading the configuration is propagated to the caller.
    pub fn parse_default() -> Result<Self> {
        let path = match Self::default_path() {
            Some(p) => p,
            None => return Self::default_template(None),
        };

        if path.exists() {
            Self::parse_file(&path)
        } else {
            Self::default_template(Some(&path))
        }
    }

    /// Reads and validates the specified configuration file.
    ///
    /// The file must exist, and must contain a valid toml document
    /// which is consistent with the schema.
    pub fn parse_file(path: &Path) -> Result<Self> {
        let config = fs::read_to_string(path)
            .with_context(|| format!("Reading configuration file {} failed",
                                     path.display()))?;

        Self::parse(&config)
            .with_context(|| {
                format!("Reading configuration file {}", path.display())
            })
    }

    /// Parses and validates the configuration.
    fn parse(doc: &str) -> Result<Self> {
        let doc: DocumentMut = doc.parse()
            .map_err(|e| Error::ParseError(format!("{}", e)))?;

        Self::from_doc(doc)
    }

    /// Uses and validates the document tree.
    ///
    /// This returns an error if the document tree does not contain a
    /// valid configuration.
    pub fn from_doc(doc: DocumentMut) -> Result<Self> {
        let mut config = Config::default();
        apply_schema(&mut Some(&mut config), None, doc.iter(),
                     TOP_LEVEL_SCHEMA)?;

        Ok(Self {
            doc,
            config,
        })
    }

    /// Returns the parsed `Config`.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the parsed `Config`.
    pub fn into_config(self) -> Config {
        self.config
    }

    /// Returns the document tree.
    pub fn as_doc(&self) -> &DocumentMut {
        &self.doc
    }
}

/// Validates a configuration section using a schema, and optionally
/// applies changes to the configuration.
///
/// Returns an error if a key is unknown.
fn apply_schema<'toml>(config: &mut Option<&mut Config>,
                       path: Option<&str>,
                       section: toml_edit::Iter<'toml>,
                       schema: Schema) -> Result<()> {
    let section = section.collect::<Vec<_>>();
    let known_keys: Vec<_> =
        schema.iter().map(|(key, _)| *key).collect();

    debug_assert!(known_keys.iter().all(|&s| &s.to_lowercase() == s),
                  "keys in schema must be lowercase");
    debug_assert!(known_keys.windows(2).all(|v| v[0] <= v[1]),
                  "keys in schema must be sorted");

    let prefix = if let Some(path) = path {
        format!("{}.", path)
    } else {
        "".to_string()
    };

    let keys: HashSet<&str> = section
        .iter().map(|(key, _value)| *key)
        .collect();

    // The set of allowed keys are the known keys, plus
    // "ignore_invalid", and the value of "ignore_invalid".
    let mut allowed_keys: Vec<&str> = known_keys.to_vec();
    if let Some(ignore) = section.iter()
        .find_map(|(k, v)| (*k == "ignore_invalid").then_some(*v))
    {
        allowed_keys.push("ignore_invalid");
        match ignore {
            Item::Value(Value::String(k)) =>
                allowed_keys.push(k.value().as_str()),
            Item::Value(Value::Array(ks)) => {
                for k in ks {
                    if let Value::String(k) = k {
                        allowed_keys.push(k.value().as_str());
                    } else {
                        return Err(Error::ParseError(format!(
                            "'{}ignore_invalid' takes a string \
                             or an array of strings",
                            prefix)).into());
                    }
                }
            }
            _ => {
                return Err(Error::ParseError(format!(
                    "Invalid value for '{}ignore_invalid': {}, \
                     expected a string or an array of strings",
                    prefix, ignore)).into());
            }
        }
    }

    let allowed: HashSet<&str> = allowed_keys.into_iter().collect();
    let mut unknown_keys = keys.difference(&allowed)
        .copied()
        .collect::<Vec<_>>();
    unknown_keys.sort();
    if ! unknown_keys.is_empty() {
        return Err(Error::ParseError(format!(
            "{} has unknown keys: {}, valid keys are: {}",
            path.unwrap_or("top-level section"),
            unknown_keys.join(", "),
            // We don't include the keys listed in ignore_invalid.
            known_keys.join(", "))).into());
    }

    // Now validate the values.  Keys listed in ignore_invalid are
    // not in the schema, and are skipped.
    for (key, value) in &section {
        if let Ok(i) = schema.binary_search_by_key(key, |(k, _)| k) {
            let apply = schema[i].1;
            (apply)(config, &format!("{}{}", prefix, key), value)
                .with_context(|| format!("Error validating {:?}", key))?;
        }
    }

    Ok(())
}

/// Errors used in this module.
///
/// Note: This enum cannot be exhaustively matched to allow future
/// extensions.
#[non_exhaustive]
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Parse error
    #[error("Parse error: {0}")]
    ParseError(String),

    /// A relative path was provided where an absolute path was
    /// expected.
    #[error("Relative path not allowed: {}", .0.display())]
    RelativePathError(PathBuf),

    #[error("Configuration item {0:?} is not a {1} but a {2}")]
    BadType(String, &'static str, &'static str),
}

impl Error {
    /// Returns an `Error::BadType` given an item.
    fn bad_item_type(path: &str, i: &Item, want_type: &'static str)
                     -> anyhow::Error
    {
        Error::BadType(path.into(), want_type, i.type_name()).into()
    }

    /// Returns an `Error::BadType` given a value.
    fn bad_value_type(path: &str, v: &Value, want_type: &'static str)
                      -> anyhow::Error
    {
        Error::BadType(path.into(), want_type, v.type_name()).into()
    }
}

/// A function that validates a node in the configuration tree with
/// the given path.
type Applicator = fn(&mut Option<&mut Config>, &str, &Item) -> Result<()>;

/// A [`Schema`] maps keys to [`Applicator`]s.
type Schema = &'static [(&'static str, Applicator)];

/// Schema for the toplevel.
const TOP_LEVEL_SCHEMA: Schema = &[
    ("engine", apply_engine),
    ("sign", apply_sign),
    ("ui", apply_ui),
    ("verify", apply_verify),
];

/// Validates a table, and applies `schema` to it.
fn apply_table(config: &mut Option<&mut Config>, path: &str, item: &Item,
               schema: Schema)
    -> Result<()>
{
    let section = item.as_table_like()
        .ok_or_else(|| Error::bad_item_type(path, item, "table"))?;
    apply_schema(config, Some(path), section.iter(), schema)
}

/// Validates an array of absolute paths.
fn paths(path: &str, item: &Item) -> Result<Vec<PathBuf>> {
    let list = item.as_array()
        .ok_or_else(|| Error::bad_item_type(path, item, "array"))?;

    let mut values = Vec::new();
    for (i, v) in list.iter().enumerate() {
        let s = v.as_str()
            .ok_or_else(|| Error::bad_value_type(&format!("{}.{}", path, i),
                                                 v, "string"))?;
        let p = PathBuf::from(s);
        if ! p.is_absolute() {
            return Err(Error::RelativePathError(p).into());
        }
        values.push(p);
    }

    Ok(values)
}

/// Schema for the `ui` section.
const UI_SCHEMA: Schema = &[
    ("verbosity", apply_ui_verbosity),
];

/// Validates the `ui` section.
fn apply_ui(config: &mut Option<&mut Config>, path: &str, item: &Item)
            -> Result<()>
{
    apply_table(config, path, item, UI_SCHEMA)
}

/// Validates the `ui.verbosity` value.
fn apply_ui_verbosity(config: &mut Option<&mut Config>,
                      path: &str, item: &Item)
    -> Result<()>
{
    let s = item.as_str()
        .ok_or_else(|| Error::bad_item_type(path, item, "string"))?;
    let verbosity = Verbosity::from_str(s)?;

    if let Some(config) = config {
        config.verbosity = verbosity;
        config.verbosity_source = Source::ConfigFile;
    }

    Ok(())
}

/// Schema for the `sign` section.
const SIGN_SCHEMA: Schema = &[
    ("hash", apply_sign_hash),
    ("signer-files", apply_sign_signer_files),
];

/// Validates the `sign` section.
fn apply_sign(config: &mut Option<&mut Config>, path: &str, item: &Item)
              -> Result<()>
{
    apply_table(config, path, item, SIGN_SCHEMA)
}

/// Validates the `sign.hash` value.
fn apply_sign_hash(config: &mut Option<&mut Config>,
                   path: &str, item: &Item)
    -> Result<()>
{
    let s = item.as_str()
        .ok_or_else(|| Error::bad_item_type(path, item, "string"))?;
    let hash = HashAlgorithm::from_str(s)?;

    if let Some(config) = config {
        config.sign_hash = hash;
        config.sign_hash_source = Source::ConfigFile;
    }

    Ok(())
}

/// Validates the `sign.signer-files` value.
fn apply_sign_signer_files(config: &mut Option<&mut Config>,
                           path: &str, item: &Item)
    -> Result<()>
{
    let values = paths(path, item)?;

    if let Some(config) = config {
        config.sign_signer_files = values;
        config.sign_signer_files_source = Source::ConfigFile;
    }

    Ok(())
}

/// Schema for the `verify` section.
const VERIFY_SCHEMA: Schema = &[
    ("keyrings", apply_verify_keyrings),
];

/// Validates the `verify` section.
fn apply_verify(config: &mut Option<&mut Config>, path: &str, item: &Item)
                -> Result<()>
{
    apply_table(config, path, item, VERIFY_SCHEMA)
}

/// Validates the `verify.keyrings` value.
fn apply_verify_keyrings(config: &mut Option<&mut Config>,
                         path: &str, item: &Item)
    -> Result<()>
{
    let values = paths(path, item)?;

    if let Some(config) = config {
        config.verify_keyrings = values;
        config.verify_keyrings_source = Source::ConfigFile;
    }

    Ok(())
}

/// Schema for the `engine` section.
const ENGINE_SCHEMA: Schema = &[
    ("timeout", apply_engine_timeout),
];

/// Validates the `engine` section.
fn apply_engine(config: &mut Option<&mut Config>, path: &str, item: &Item)
                -> Result<()>
{
    apply_table(config, path, item, ENGINE_SCHEMA)
}

/// Validates the `engine.timeout` value.
fn apply_engine_timeout(config: &mut Option<&mut Config>,
                        path: &str, item: &Item)
    -> Result<()>
{
    let s = item.as_integer()
        .ok_or_else(|| Error::bad_item_type(path, item, "integer"))?;
    let secs = u64::try_from(s)
        .map_err(|_| anyhow::anyhow!("value must not be negative"))?;

    if let Some(config) = config {
        config.engine_timeout = secs;
        config.engine_timeout_source = Source::ConfigFile;
    }

    Ok(())
}
