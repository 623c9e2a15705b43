//! Parameter tables describing GitHub workflow matrices.
//!
//! The types in this module mirror the YAML catalog compiled into the binary.
//! Every workflow owns an optional matrix block and an optional config block,
//! and each block carries a standard map plus an optional expanded overlay.
//! The catalog is parsed once at startup and never mutated afterwards.

use std::{collections::BTreeMap, fmt, fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{
    devices::DeviceRegistry,
    error::{self, Error},
};

/// Catalog shipped with the binary.
const BUILTIN_CATALOG: &str = include_str!("catalog.yaml");

/// Workflow used as the fallback when no explicit workflow is given.
pub const DEFAULT_WORKFLOW: &str = "desktop";

/// Category of parameter block searched by a lookup.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Hash,)]
#[serde(rename_all = "snake_case")]
pub enum ParameterKind
{
    /// List-valued keys that fan out into parallel jobs.
    Matrix,
    /// String-valued keys used for dispatch-time configuration.
    Config,
}

impl ParameterKind
{
    /// Selects the config kind when `config_only` is set, matrix otherwise.
    pub fn from_config_flag(config_only: bool,) -> Self
    {
        if config_only { Self::Config } else { Self::Matrix }
    }

    /// Name of the block as it appears in the catalog.
    pub fn as_str(self,) -> &'static str
    {
        match self {
            Self::Matrix => "matrix",
            Self::Config => "config",
        }
    }
}

impl fmt::Display for ParameterKind
{
    fn fmt(&self, f: &mut fmt::Formatter<'_,>,) -> fmt::Result
    {
        f.write_str(self.as_str(),)
    }
}

/// Value stored under a parameter key.
///
/// # Examples
///
/// ```
/// use gha_tools::ParamValue;
///
/// let value: ParamValue = serde_yaml::from_str("[ubuntu-latest, macos-latest]",)?;
/// assert_eq!(value.as_list(), Some(&["ubuntu-latest".to_owned(), "macos-latest".to_owned()][..]));
/// # Ok::<(), serde_yaml::Error>(())
/// ```
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq,)]
#[serde(untagged)]
pub enum ParamValue
{
    /// Matrix parameter expanded into one job per entry.
    List(Vec<String,>,),
    /// Config parameter passed through as a single string.
    Text(String,),
}

impl ParamValue
{
    /// Returns the entries when the value is a list.
    pub fn as_list(&self,) -> Option<&[String],>
    {
        match self {
            Self::List(values,) => Some(values,),
            Self::Text(_,) => None,
        }
    }

    /// Returns the string when the value is text.
    pub fn as_text(&self,) -> Option<&str,>
    {
        match self {
            Self::Text(value,) => Some(value,),
            Self::List(_,) => None,
        }
    }
}

impl From<Vec<String,>,> for ParamValue
{
    fn from(values: Vec<String,>,) -> Self
    {
        Self::List(values,)
    }
}

impl From<String,> for ParamValue
{
    fn from(value: String,) -> Self
    {
        Self::Text(value,)
    }
}

/// Key to value mapping inside one block.
pub type ParamMap = BTreeMap<String, ParamValue,>;

/// Standard parameters with an optional expanded overlay.
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq, Eq,)]
#[serde(deny_unknown_fields)]
pub struct ParamBlock
{
    /// Parameters used for regular runs.
    #[serde(default)]
    pub standard: ParamMap,

    /// Parameters that take precedence when broader coverage is requested.
    #[serde(default)]
    pub expanded: Option<ParamMap,>,
}

/// Matrix and config blocks of a single workflow.
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq, Eq,)]
#[serde(deny_unknown_fields)]
pub struct WorkflowParameters
{
    /// Job fan-out parameters.
    #[serde(default)]
    pub matrix: Option<ParamBlock,>,

    /// Dispatch configuration parameters.
    #[serde(default)]
    pub config: Option<ParamBlock,>,
}

impl WorkflowParameters
{
    /// Returns the block of the requested kind if the workflow defines it.
    pub fn block(&self, kind: ParameterKind,) -> Option<&ParamBlock,>
    {
        match kind {
            ParameterKind::Matrix => self.matrix.as_ref(),
            ParameterKind::Config => self.config.as_ref(),
        }
    }
}

/// Parameter blocks for every known workflow.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq,)]
pub struct ParameterTable
{
    /// Workflow consulted after the requested one.
    #[serde(default = "default_workflow_name")]
    pub default_workflow: String,

    /// Blocks keyed by workflow name.
    #[serde(default)]
    pub workflows: BTreeMap<String, WorkflowParameters,>,
}

fn default_workflow_name() -> String
{
    DEFAULT_WORKFLOW.to_owned()
}

impl ParameterTable
{
    /// Returns the parameters of a workflow.
    pub fn workflow(&self, name: &str,) -> Option<&WorkflowParameters,>
    {
        self.workflows.get(name,)
    }

    /// Returns the parameters of the fallback workflow.
    pub fn default_parameters(&self,) -> Option<&WorkflowParameters,>
    {
        self.workflows.get(&self.default_workflow,)
    }
}

/// Ordered matrix keys that describe each platform's build configuration.
///
/// Test result reports use the list to label jobs; nothing here derives the
/// values.
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq, Eq,)]
#[serde(transparent)]
pub struct BuildConfigs(BTreeMap<String, Vec<String,>,>,);

impl BuildConfigs
{
    /// Returns the key list for a platform.
    pub fn keys_for(&self, platform: &str,) -> Option<&[String],>
    {
        self.0.get(platform,).map(Vec::as_slice,)
    }

    /// Iterates over the known platform names in sorted order.
    pub fn platforms(&self,) -> impl Iterator<Item = &str,>
    {
        self.0.keys().map(String::as_str,)
    }
}

/// Complete set of static tables consulted by the resolver.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq,)]
pub struct Catalog
{
    /// Workflow parameter blocks.
    #[serde(flatten)]
    pub parameters: ParameterTable,

    /// Build configuration keys per platform.
    #[serde(default)]
    pub build_configs: BuildConfigs,

    /// Registered test devices.
    #[serde(default)]
    pub devices: DeviceRegistry,
}

impl Catalog
{
    /// Parses the catalog compiled into the binary.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] only if the embedded document is malformed.
    pub fn builtin() -> Result<Self, Error,>
    {
        parse_catalog(BUILTIN_CATALOG,)
    }
}

/// Loads a catalog from the provided YAML file path.
///
/// # Errors
///
/// Returns an [`Error`] when the file cannot be read, the YAML cannot be
/// deserialized, or the default workflow has no matrix block.
pub fn load_catalog(path: &Path,) -> Result<Catalog, Error,>
{
    let contents = fs::read_to_string(path,).map_err(|source| error::io_error(path, source,),)?;
    parse_catalog(&contents,)
}

/// Parses a catalog from a YAML document string.
///
/// # Errors
///
/// Propagates [`Error::Parse`](Error::Parse) when the YAML cannot be decoded
/// and [`Error::Validation`](Error::Validation) when the default workflow is
/// missing or lacks a matrix block.
///
/// # Examples
///
/// ```
/// use gha_tools::parse_catalog;
///
/// let yaml = r#"
/// workflows:
///   desktop:
///     matrix:
///       standard:
///         os: [ubuntu-latest]
/// "#;
/// let catalog = parse_catalog(yaml,)?;
/// assert_eq!(catalog.parameters.default_workflow, "desktop");
/// # Ok::<(), gha_tools::Error>(())
/// ```
pub fn parse_catalog(contents: &str,) -> Result<Catalog, Error,>
{
    let catalog: Catalog = serde_yaml::from_str(contents,)?;
    validate(&catalog,)?;
    Ok(catalog,)
}

fn validate(catalog: &Catalog,) -> Result<(), Error,>
{
    let table = &catalog.parameters;
    let default = table.default_parameters().ok_or_else(|| {
        Error::validation(format!(
            "default workflow '{}' is not defined",
            table.default_workflow
        ),)
    },)?;

    if default.matrix.is_none() {
        return Err(Error::validation(format!(
            "default workflow '{}' has no matrix block",
            table.default_workflow
        ),),);
    }

    for (workflow, parameters,) in &table.workflows {
        if let Some(block,) = parameters.matrix.as_ref() {
            ensure_kind(workflow, ParameterKind::Matrix, block,)?;
        }
        if let Some(block,) = parameters.config.as_ref() {
            ensure_kind(workflow, ParameterKind::Config, block,)?;
        }
    }

    Ok((),)
}

fn ensure_kind(workflow: &str, kind: ParameterKind, block: &ParamBlock,) -> Result<(), Error,>
{
    let entries = block.standard.iter().chain(block.expanded.iter().flatten(),);
    for (key, value,) in entries {
        let matches = match kind {
            ParameterKind::Matrix => value.as_list().is_some(),
            ParameterKind::Config => value.as_text().is_some(),
        };
        if !matches {
            let expected = match kind {
                ParameterKind::Matrix => "a list",
                ParameterKind::Config => "a string",
            };
            return Err(Error::validation(format!(
                "{kind} parameter '{key}' of workflow '{workflow}' must be {expected}"
            ),),);
        }
    }
    Ok((),)
}
