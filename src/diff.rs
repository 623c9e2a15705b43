// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Narrowing of test parameters based on a branch diff.
//!
//! Only two keys are filtered. `apis` maps each changed top-level directory
//! to the APIs it affects, and `platform` matches changed paths against
//! per-platform patterns. Any path the rules do not recognize aborts the
//! narrowing and the full requested value is tested instead.

use std::{
    collections::BTreeSet,
    path::Path,
    process::Command,
    sync::LazyLock,
};

use masterror::AppError;
use regex::Regex;
use tracing::{debug, warn};

use crate::{error::Error, parameters::ParamValue};

/// Key holding the comma separated list of APIs under test.
pub const APIS_KEY: &str = "apis";
/// Key holding the list of platforms under test.
pub const PLATFORM_KEY: &str = "platform";

/// Effect of a top-level directory on the API list.
#[derive(Debug, Clone, Copy, PartialEq, Eq,)]
enum ApiTrigger
{
    /// Changes here never require API tests.
    Ignore,
    /// Changes here require testing every listed API.
    Adds(&'static [&'static str],),
}

/// Directories with special handling, checked before requested API names.
const API_TRIGGERS: &[(&str, ApiTrigger,)] = &[
    ("external", ApiTrigger::Ignore,),
    ("release_build_files", ApiTrigger::Ignore,),
    ("auth", ApiTrigger::Adds(&["auth", "functions", "database", "firestore", "storage",],),),
];

/// Pattern group that recognizes changes relevant to one platform.
struct PlatformRule
{
    /// Platform enabled by a match, `None` for paths that need no tests.
    platform: Option<&'static str,>,
    patterns: Vec<Regex,>,
}

impl PlatformRule
{
    fn new(platform: Option<&'static str,>, patterns: &[&str],) -> Self
    {
        let patterns = patterns
            .iter()
            .map(|pattern| Regex::new(pattern,).expect("valid platform pattern",),)
            .collect();
        Self {
            platform,
            patterns,
        }
    }

    fn matches(&self, path: &str,) -> bool
    {
        self.patterns.iter().any(|pattern| pattern.is_match(path,),)
    }
}

static PLATFORM_RULES: LazyLock<Vec<PlatformRule,>,> = LazyLock::new(|| {
    vec![
        PlatformRule::new(None, &[r"^external/", r"^release_build_files/", r"(?i)readme"],),
        PlatformRule::new(Some("Android",), &[r"(?i)android", r"\.java$", r"gradle"],),
        PlatformRule::new(
            Some("iOS",),
            &[r"(?i)[_./]ios[_./]", r"(?i)apple", r"\.mm$", r"(?i)xcode", r"Pod"],
        ),
        PlatformRule::new(Some("Desktop",), &[r"desktop"],),
    ]
});

/// Result of filtering a value against a diff.
#[derive(Debug, Clone, PartialEq, Eq,)]
pub enum FilterOutcome
{
    /// Every changed path was recognized and the value was narrowed.
    Autodetected(ParamValue,),
    /// An unrecognized path was found and the full requested value is kept.
    Defaulted(ParamValue,),
    /// The key is not subject to diff filtering.
    Untouched(ParamValue,),
}

impl FilterOutcome
{
    /// Borrows the resulting value.
    pub fn value(&self,) -> &ParamValue
    {
        match self {
            Self::Autodetected(value,) | Self::Defaulted(value,) | Self::Untouched(value,) => value,
        }
    }

    /// Consumes the outcome and returns the resulting value.
    pub fn into_value(self,) -> ParamValue
    {
        match self {
            Self::Autodetected(value,) | Self::Defaulted(value,) | Self::Untouched(value,) => value,
        }
    }

    /// Line written to standard error describing the outcome.
    ///
    /// Narrowed values use the GitHub Actions `::warning::` annotation so
    /// they surface in the run summary.
    pub fn annotation(&self, key: &str,) -> Option<String,>
    {
        let subject = match key {
            APIS_KEY => "APIs",
            PLATFORM_KEY => "platforms",
            _ => return None,
        };
        match self {
            Self::Autodetected(value,) => {
                Some(format!("::warning::Autodetected {subject}: {}", display(value)),)
            }
            Self::Defaulted(value,) => Some(format!("Defaulting to all {subject}: {}", display(value)),),
            Self::Untouched(_,) => None,
        }
    }
}

fn display(value: &ParamValue,) -> String
{
    match value {
        ParamValue::List(values,) => values.join(",",),
        ParamValue::Text(value,) => value.clone(),
    }
}

/// Lists paths changed relative to `base_branch` in the current directory.
///
/// # Errors
///
/// Returns [`AppError`] when git cannot be spawned or exits unsuccessfully.
pub fn changed_files(base_branch: &str,) -> Result<Vec<String,>, AppError,>
{
    changed_files_in(Path::new(".",), base_branch,)
}

/// Lists paths changed relative to `base_branch` in the repository at `dir`.
///
/// Paths are reported once each, in git's order.
///
/// # Errors
///
/// Returns [`AppError`] when git cannot be spawned or exits unsuccessfully.
pub fn changed_files_in(dir: &Path, base_branch: &str,) -> Result<Vec<String,>, AppError,>
{
    let output = Command::new("git",)
        .current_dir(dir,)
        .args(["diff", "--name-only", base_branch],)
        .output()
        .map_err(|e| AppError::service(format!("git diff failed: {e}"),),)?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr,);
        return Err(AppError::service(format!(
            "git diff --name-only {base_branch} failed: {stderr}"
        ),),);
    }

    let stdout = String::from_utf8_lossy(&output.stdout,);
    let mut seen = BTreeSet::new();
    let files = stdout
        .lines()
        .map(str::trim,)
        .filter(|line| !line.is_empty(),)
        .filter(|line| seen.insert(line.to_string(),),)
        .map(str::to_owned,)
        .collect::<Vec<_,>>();

    debug!("{} paths changed relative to {}", files.len(), base_branch);
    Ok(files,)
}

/// Filters `value` against the paths changed relative to `base_branch`.
///
/// # Errors
///
/// Returns [`Error::Service`] when the changed paths cannot be listed.
pub fn filter_values_on_diff(
    key: &str,
    value: ParamValue,
    base_branch: &str,
) -> Result<FilterOutcome, Error,>
{
    filter_values_on_diff_in(Path::new(".",), key, value, base_branch,)
}

/// Filters `value` against the paths changed in the repository at `dir`.
///
/// # Errors
///
/// Returns [`Error::Service`] when the changed paths cannot be listed.
pub fn filter_values_on_diff_in(
    dir: &Path,
    key: &str,
    value: ParamValue,
    base_branch: &str,
) -> Result<FilterOutcome, Error,>
{
    if key != APIS_KEY && key != PLATFORM_KEY {
        return Ok(FilterOutcome::Untouched(value,),);
    }
    let changed = changed_files_in(dir, base_branch,)?;
    Ok(filter_on_changes(key, value, &changed,),)
}

/// Filters `value` against an explicit list of changed paths.
///
/// # Examples
///
/// ```
/// use gha_tools::{FilterOutcome, ParamValue, filter_on_changes};
///
/// let outcome = filter_on_changes(
///     "apis",
///     ParamValue::Text("auth,functions".to_owned(),),
///     &["auth/foo.cc".to_owned()],
/// );
/// assert_eq!(
///     outcome,
///     FilterOutcome::Autodetected(ParamValue::Text(
///         "auth,database,firestore,functions,storage".to_owned(),
///     ),),
/// );
/// ```
pub fn filter_on_changes<S: AsRef<str,>,>(key: &str, value: ParamValue, changed: &[S],) -> FilterOutcome
{
    match (key, value,) {
        (APIS_KEY, ParamValue::Text(requested,),) => filter_apis(requested, changed,),
        (PLATFORM_KEY, ParamValue::List(requested,),) => filter_platforms(requested, changed,),
        (APIS_KEY | PLATFORM_KEY, other,) => {
            warn!("{} value has an unexpected shape, skipping diff filter", key);
            FilterOutcome::Untouched(other,)
        }
        (_, other,) => FilterOutcome::Untouched(other,),
    }
}

fn filter_apis<S: AsRef<str,>,>(requested: String, changed: &[S],) -> FilterOutcome
{
    let requested_apis: BTreeSet<&str,> = requested.split(',',).collect();
    let mut selected = BTreeSet::new();

    for path in changed.iter().map(S::as_ref,).filter(|path| !path.is_empty(),) {
        let topdir = path.split('/',).next().unwrap_or(path,);
        let trigger = API_TRIGGERS.iter().find(|(dir, _,)| *dir == topdir,).map(|(_, trigger,)| *trigger,);

        if trigger == Some(ApiTrigger::Ignore,) {
            continue;
        }
        if let Some(ApiTrigger::Adds(apis,),) = trigger {
            selected.extend(apis.iter().copied(),);
        }
        if requested_apis.contains(topdir,) {
            selected.insert(topdir,);
        } else {
            debug!("{} is outside the requested API directories", path);
            return FilterOutcome::Defaulted(ParamValue::Text(requested.clone(),),);
        }
    }

    let joined = selected.into_iter().collect::<Vec<_,>>().join(",",);
    FilterOutcome::Autodetected(ParamValue::Text(joined,),)
}

fn filter_platforms<S: AsRef<str,>,>(requested: Vec<String,>, changed: &[S],) -> FilterOutcome
{
    let requested: BTreeSet<String,> = requested.into_iter().collect();
    let mut selected = BTreeSet::new();

    for path in changed.iter().map(S::as_ref,).filter(|path| !path.is_empty(),) {
        let mut matched = false;
        for rule in PLATFORM_RULES.iter() {
            match rule.platform {
                None if rule.matches(path,) => matched = true,
                Some(platform,) if requested.contains(platform,) && rule.matches(path,) => {
                    selected.insert(platform.to_owned(),);
                    matched = true;
                }
                _ => {}
            }
        }

        if !matched {
            debug!("{} matches no platform rule", path);
            return FilterOutcome::Defaulted(ParamValue::List(requested.into_iter().collect(),),);
        }
    }

    FilterOutcome::Autodetected(ParamValue::List(selected.into_iter().collect(),),)
}
