use std::time::Duration;

use crate::core::OsInfo;
use crate::platform::run_command;

pub fn os_info(timeout: Duration) -> OsInfo {
    let output = run_command("cmd", &["/C", "ver"], timeout);
    match output {
        Ok(output) if output.exit_code == 0 => OsInfo {
            name: "Windows".to_string(),
            version: parse_ver_output(&output.stdout).unwrap_or_else(|| "unknown".to_string()),
        },
        _ => OsInfo {
            name: "Windows".to_string(),
            version: "unknown".to_string(),
        },
    }
}

// "Microsoft Windows [Version 10.0.19045.4046]"
fn parse_ver_output(stdout: &str) -> Option<String> {
    let start = stdout.find("Version ")? + "Version ".len();
    let rest = &stdout[start..];
    let end = rest.find(']').unwrap_or(rest.len());
    let version = rest[..end].trim();
    if version.is_empty() {
        None
    } else {
        Some(version.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_ver_output_extracts_version() {
        let stdout = "\r\nMicrosoft Windows [Version 10.0.19045.4046]\r\n";
        assert_eq!(parse_ver_output(stdout).as_deref(), Some("10.0.19045.4046"));
    }
}
