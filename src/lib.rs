//! Support utilities for GitHub Actions workflows.
//!
//! The library resolves matrix and config parameters for named workflows,
//! narrows test matrices based on a branch diff, and wraps the GitHub REST
//! endpoints the CI scripts use to file issues, comment on them and fetch
//! workflow artifacts. Parameter tables are static and loaded once; API calls
//! are single requests with no retries.

mod devices;
mod diff;
mod error;
mod github;
mod matrix;
mod parameters;

pub use devices::{DeviceKind, DeviceRegistry, TestDevice, parse_device_kinds};
pub use diff::{
    APIS_KEY, FilterOutcome, PLATFORM_KEY, changed_files, changed_files_in, filter_on_changes,
    filter_values_on_diff, filter_values_on_diff_in,
};
pub use error::{Error, io_error};
pub use github::{
    DEFAULT_API_URL, DEFAULT_OWNER, DEFAULT_REPO, GITHUB_V3_MEDIA_TYPE, GithubClient, GithubConfig,
};
pub use matrix::{get_value, override_value, print_value};
pub use parameters::{
    BuildConfigs, Catalog, DEFAULT_WORKFLOW, ParamBlock, ParamMap, ParamValue, ParameterKind,
    ParameterTable, WorkflowParameters, load_catalog, parse_catalog,
};
