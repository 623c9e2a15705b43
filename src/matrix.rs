//! Resolution of matrix and config parameters for a workflow.
//!
//! Lookups walk a fixed priority chain: the workflow's expanded block, the
//! workflow's standard block, the default workflow's expanded block and the
//! default workflow's standard block. Blocks that do not exist are skipped,
//! so an unknown workflow silently resolves against the defaults. Expanded
//! blocks only join the chain when the caller asks for them.

use std::io;

use serde::Serialize;
use tracing::debug;

use crate::{
    error::Error,
    parameters::{ParamMap, ParamValue, ParameterKind, ParameterTable},
};

/// Collects the blocks consulted for a lookup in priority order.
fn search_chain<'a,>(
    table: &'a ParameterTable,
    workflow: &str,
    use_expanded: bool,
    kind: ParameterKind,
) -> Vec<(&'static str, &'a ParamMap,),>
{
    let mut chain = Vec::with_capacity(4,);

    if workflow != table.default_workflow
        && let Some(block,) = table.workflow(workflow,).and_then(|params| params.block(kind,),)
    {
        if use_expanded && let Some(expanded,) = block.expanded.as_ref() {
            chain.push(("workflow expanded", expanded,),);
        }
        chain.push(("workflow standard", &block.standard,),);
    }

    if let Some(block,) = table.default_parameters().and_then(|params| params.block(kind,),) {
        if use_expanded && let Some(expanded,) = block.expanded.as_ref() {
            chain.push(("default expanded", expanded,),);
        }
        chain.push(("default standard", &block.standard,),);
    }

    chain
}

/// Fetches the value of `key` for `workflow`.
///
/// # Errors
///
/// Returns [`Error::ParameterNotFound`] when no block of the chain defines
/// the key.
///
/// # Examples
///
/// ```
/// use gha_tools::{Catalog, ParamValue, ParameterKind, get_value};
///
/// let catalog = Catalog::builtin()?;
/// let os = get_value(&catalog.parameters, "android", true, "os", ParameterKind::Matrix,)?;
/// assert_eq!(
///     os.as_list().map(<[String]>::len),
///     Some(3),
/// );
/// # Ok::<(), gha_tools::Error>(())
/// ```
pub fn get_value<'a,>(
    table: &'a ParameterTable,
    workflow: &str,
    use_expanded: bool,
    key: &str,
    kind: ParameterKind,
) -> Result<&'a ParamValue, Error,>
{
    for (label, block,) in search_chain(table, workflow, use_expanded, kind,) {
        if let Some(value,) = block.get(key,) {
            debug!("resolved {} '{}' for workflow '{}' from {} block", kind, key, workflow, label);
            return Ok(value,);
        }
    }

    Err(Error::ParameterNotFound {
        key: key.to_owned(),
        kind,
        workflow: workflow.to_owned(),
        expanded: use_expanded,
    },)
}

/// Builds the value printed for an `--override` argument.
///
/// Matrix overrides are comma separated lists; config overrides are kept as
/// a single string.
pub fn override_value(raw: &str, kind: ParameterKind,) -> ParamValue
{
    match kind {
        ParameterKind::Matrix => {
            ParamValue::List(raw.split(',',).map(str::to_owned,).collect(),)
        }
        ParameterKind::Config => ParamValue::Text(raw.to_owned(),),
    }
}

/// Writes the JSON encoding of `value` followed by a newline.
///
/// Lists render as `["a", "b"]` and strings as `"a"`, which is what GitHub
/// workflow expressions such as `fromJson` consume.
///
/// # Errors
///
/// Returns [`Error::Serialize`] when encoding fails and [`Error::Service`]
/// when the writer rejects the output.
pub fn print_value<W, T,>(writer: &mut W, value: &T,) -> Result<(), Error,>
where
    W: io::Write,
    T: Serialize + ?Sized,
{
    serde_json::to_writer(&mut *writer, value,)?;
    writeln!(writer).map_err(|e| Error::service(format!("failed to write value: {e}"),),)?;
    Ok((),)
}

#[cfg(test)]
mod tests
{
    use proptest::prelude::*;

    use super::*;
    use crate::{Catalog, parse_catalog};

    fn table() -> ParameterTable
    {
        Catalog::builtin().expect("embedded catalog must parse",).parameters
    }

    fn list(values: &[&str],) -> ParamValue
    {
        ParamValue::List(values.iter().map(|value| (*value).to_owned(),).collect(),)
    }

    #[test]
    fn default_workflow_resolves_standard_value()
    {
        let table = table();
        let value = get_value(&table, "desktop", false, "os", ParameterKind::Matrix,)
            .expect("os is defined",);
        assert_eq!(value, &list(&["ubuntu-latest", "macos-latest"]));
    }

    #[test]
    fn default_workflow_prefers_expanded_value()
    {
        let table = table();
        let value = get_value(&table, "desktop", true, "os", ParameterKind::Matrix,)
            .expect("os is defined",);
        assert_eq!(value, &list(&["ubuntu-latest", "macos-latest", "windows-latest"]));
    }

    #[test]
    fn workflow_value_overrides_default()
    {
        let table = table();
        let value = get_value(&table, "android", false, "architecture", ParameterKind::Matrix,)
            .expect("architecture is defined",);
        assert_eq!(value, &list(&["x64"]));
    }

    #[test]
    fn missing_workflow_key_falls_back_to_default()
    {
        let table = table();
        let value = get_value(&table, "android", false, "build_type", ParameterKind::Matrix,)
            .expect("build_type comes from desktop",);
        assert_eq!(value, &list(&["Release", "Debug"]));
    }

    #[test]
    fn every_default_key_is_inherited_by_named_workflows()
    {
        let table = table();
        let defaults = table
            .default_parameters()
            .and_then(|params| params.block(ParameterKind::Matrix,),)
            .expect("desktop matrix",)
            .standard
            .clone();

        for (name, params,) in &table.workflows {
            let own = params.block(ParameterKind::Matrix,).map(|block| &block.standard,);
            for (key, expected,) in &defaults {
                if own.is_some_and(|block| block.contains_key(key,),) {
                    continue;
                }
                let value = get_value(&table, name, false, key, ParameterKind::Matrix,)
                    .expect("inherited key resolves",);
                assert_eq!(value, expected, "{name}/{key}");
            }
        }
    }

    #[test]
    fn expanded_overrides_win_for_every_workflow()
    {
        let table = table();
        for (name, params,) in &table.workflows {
            let Some(expanded,) =
                params.block(ParameterKind::Matrix,).and_then(|block| block.expanded.as_ref(),)
            else {
                continue;
            };
            for (key, expected,) in expanded {
                let value = get_value(&table, name, true, key, ParameterKind::Matrix,)
                    .expect("expanded key resolves",);
                assert_eq!(value, expected, "{name}/{key}");
            }
        }
    }

    #[test]
    fn workflow_expanded_beats_default_expanded()
    {
        let table = table();
        let value = get_value(&table, "ios", true, "xcode_version", ParameterKind::Matrix,)
            .expect("xcode_version is defined",);
        assert_eq!(value, &list(&["12", "12.4"]));

        let standard = get_value(&table, "ios", false, "xcode_version", ParameterKind::Matrix,)
            .expect("xcode_version is defined",);
        assert_eq!(standard, &list(&["12"]));
    }

    #[test]
    fn workflow_standard_beats_default_expanded()
    {
        let table = table();
        let value = get_value(
            &table,
            "integration_tests",
            true,
            "xcode_version",
            ParameterKind::Matrix,
        )
        .expect("xcode_version is defined",);
        assert_eq!(value, &list(&["12"]));
    }

    #[test]
    fn unknown_workflow_uses_default_block()
    {
        let table = table();
        let value = get_value(&table, "nonexistent_workflow", false, "os", ParameterKind::Matrix,)
            .expect("unknown workflows fall back",);
        assert_eq!(value, &list(&["ubuntu-latest", "macos-latest"]));
    }

    #[test]
    fn unknown_key_is_reported_with_query()
    {
        let table = table();
        for expanded in [false, true] {
            let error =
                get_value(&table, "android", expanded, "not_a_real_key", ParameterKind::Matrix,)
                    .expect_err("key does not exist",);
            match error {
                Error::ParameterNotFound {
                    key,
                    kind,
                    workflow,
                    expanded: flag,
                } => {
                    assert_eq!(key, "not_a_real_key");
                    assert_eq!(kind, ParameterKind::Matrix);
                    assert_eq!(workflow, "android");
                    assert_eq!(flag, expanded);
                }
                other => panic!("unexpected error variant: {other:?}"),
            }
        }
    }

    #[test]
    fn config_lookup_reads_config_block()
    {
        let table = table();
        let value = get_value(&table, "integration_tests", false, "apis", ParameterKind::Config,)
            .expect("apis is defined",);
        assert_eq!(
            value.as_text(),
            Some(
                "admob,analytics,auth,database,dynamic_links,firestore,functions,installations,\
                 messaging,remote_config,storage"
            )
        );
    }

    #[test]
    fn config_lookup_without_config_block_fails()
    {
        let table = table();
        let error = get_value(&table, "desktop", false, "apis", ParameterKind::Config,)
            .expect_err("desktop has no config block",);
        assert!(matches!(error, Error::ParameterNotFound { kind: ParameterKind::Config, .. }));
    }

    #[test]
    fn matrix_lookup_ignores_config_keys()
    {
        let table = table();
        let error = get_value(&table, "integration_tests", false, "apis", ParameterKind::Matrix,)
            .expect_err("apis is a config key",);
        assert!(matches!(error, Error::ParameterNotFound { .. }));
    }

    #[test]
    fn custom_default_workflow_is_used_for_fallback()
    {
        let catalog = parse_catalog(
            r"
default_workflow: base
workflows:
  base:
    matrix:
      standard:
        os: [ubuntu-22.04]
  linux:
    matrix:
      standard:
        arch: [arm64]
",
        )
        .expect("catalog parses",);
        let value = get_value(&catalog.parameters, "linux", false, "os", ParameterKind::Matrix,)
            .expect("os comes from base",);
        assert_eq!(value, &list(&["ubuntu-22.04"]));
    }

    #[test]
    fn override_value_splits_matrix_lists()
    {
        assert_eq!(
            override_value("my_os,other_os", ParameterKind::Matrix,),
            list(&["my_os", "other_os"])
        );
        assert_eq!(
            override_value("auth,storage", ParameterKind::Config,),
            ParamValue::Text("auth,storage".to_owned(),)
        );
    }

    #[test]
    fn print_value_writes_json_line()
    {
        let mut buffer = Vec::new();
        print_value(&mut buffer, &list(&["ubuntu-latest", "macos-latest"],),)
            .expect("print succeeds",);
        assert_eq!(String::from_utf8(buffer,).expect("utf8",), "[\"ubuntu-latest\",\"macos-latest\"]\n");

        let mut buffer = Vec::new();
        print_value(&mut buffer, &ParamValue::Text("flame".to_owned(),),).expect("print succeeds",);
        assert_eq!(String::from_utf8(buffer,).expect("utf8",), "\"flame\"\n");
    }

    #[test]
    fn every_builtin_list_survives_print_round_trip()
    {
        let table = table();
        for (name, params,) in &table.workflows {
            let Some(block,) = params.block(ParameterKind::Matrix,) else {
                continue;
            };
            for key in block.standard.keys() {
                let value = get_value(&table, name, false, key, ParameterKind::Matrix,)
                    .expect("key resolves",);
                let mut buffer = Vec::new();
                print_value(&mut buffer, value,).expect("print succeeds",);
                let decoded: Vec<String,> =
                    serde_json::from_slice(&buffer,).expect("printed value is JSON",);
                assert_eq!(Some(decoded.as_slice()), value.as_list());
            }
        }
    }

    proptest! {
        #[test]
        fn printed_lists_decode_to_the_same_list(values in proptest::collection::vec(".*", 0..8))
        {
            let mut buffer = Vec::new();
            print_value(&mut buffer, &ParamValue::List(values.clone()),).expect("print succeeds",);
            let decoded: Vec<String,> = serde_json::from_slice(&buffer,).expect("valid JSON",);
            prop_assert_eq!(decoded, values);
        }
    }
}
