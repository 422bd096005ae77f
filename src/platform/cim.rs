use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde_json::{Map, Value};

use crate::platform::{CommandRunOptions, run_command_with_options};

const QUERY_ENV: &str = "AUDIODIAG_WQL";

// The query travels through the environment so PowerShell never re-parses it.
// Datetime properties are flattened to DMTF strings to match what WMI returns natively.
const CIM_SCRIPT: &str = r#"$ErrorActionPreference = 'Stop'
[Console]::OutputEncoding = [System.Text.Encoding]::UTF8
$rows = foreach ($item in @(Get-CimInstance -Query $env:AUDIODIAG_WQL)) {
  $row = [ordered]@{}
  foreach ($p in $item.CimInstanceProperties) {
    $v = $p.Value
    if ($v -is [datetime]) { $v = $v.ToUniversalTime().ToString('yyyyMMddHHmmss.ffffff') + '+000' }
    $row[$p.Name] = $v
  }
  [pscustomobject]$row
}
ConvertTo-Json -InputObject @($rows) -Depth 3 -Compress"#;

pub type CimObject = Map<String, Value>;

/// Runs a WQL query through PowerShell and returns one JSON object per instance.
pub fn query(powershell: &str, wql: &str, timeout: Duration) -> Result<Vec<CimObject>> {
    let output = run_command_with_options(
        powershell,
        &["-NoProfile", "-NonInteractive", "-Command", CIM_SCRIPT],
        timeout,
        &CommandRunOptions {
            env: vec![(QUERY_ENV.to_string(), wql.to_string())],
        },
    )?;

    if output.exit_code != 0 {
        let stderr = output.stderr.trim();
        if stderr.is_empty() {
            return Err(anyhow!("CIM query failed (exit_code={})", output.exit_code));
        }
        return Err(anyhow!(
            "CIM query failed (exit_code={}): {}",
            output.exit_code,
            first_line(stderr)
        ));
    }

    parse_query_output(&output.stdout).with_context(|| format!("unexpected CIM output for: {wql}"))
}

pub fn parse_query_output(stdout: &str) -> Result<Vec<CimObject>> {
    let stdout = stdout.trim_start_matches('\u{feff}').trim();
    if stdout.is_empty() {
        return Ok(Vec::new());
    }

    let value: Value = serde_json::from_str(stdout).context("failed to parse JSON")?;
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Object(obj) => Ok(vec![obj]),
        Value::Array(items) => items
            .into_iter()
            .filter(|item| !item.is_null())
            .map(|item| match item {
                Value::Object(obj) => Ok(obj),
                other => Err(anyhow!("expected an object, got: {other}")),
            })
            .collect(),
        other => Err(anyhow!("expected an array of objects, got: {other}")),
    }
}

fn first_line(s: &str) -> &str {
    s.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or(s)
}
