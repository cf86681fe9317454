//! Printer enumeration from the operating system's spooler.
//! （從作業系統列印佇列列舉印表機。）
//!
//! Windows: local and connected printers via `EnumPrintersW`.
//! Elsewhere: CUPS destinations via `lpstat -e`.

use thiserror::Error;
use tracing::{debug, warn};

use crate::target::PrinterCatalog;

#[derive(Debug, Error)]
pub enum SpoolerError {
    #[error("printer enumeration command failed: {0}")]
    Command(#[from] batchprint_runexec::RunError),
    #[error("printer enumeration exited unsuccessfully: {0}")]
    Status(String),
    #[cfg(windows)]
    #[error("Windows spooler error: {0}")]
    Win32(String),
}

/// Lists installed printers in spooler order.
pub fn list_printers() -> Result<PrinterCatalog, SpoolerError> {
    let names = enumerate()?;
    debug!(count = names.len(), "enumerated printers");
    Ok(PrinterCatalog::new(names))
}

/// Like [`list_printers`], but an unavailable spooler yields an empty catalog.
pub fn list_printers_or_empty() -> PrinterCatalog {
    list_printers().unwrap_or_else(|err| {
        warn!(error = %err, "printer enumeration failed");
        PrinterCatalog::default()
    })
}

#[cfg(not(windows))]
fn enumerate() -> Result<Vec<String>, SpoolerError> {
    use batchprint_runexec::{CommandSpec, RunExecutor};
    use std::time::Duration;

    let spec = CommandSpec::new("lpstat")
        .arg("-e")
        .with_timeout(Duration::from_secs(10));
    let output = RunExecutor::execute(&spec)?;
    if !output.success() {
        let stderr = output.stderr_text();
        // lpstat exits non-zero when CUPS has no destinations at all.
        if stderr.contains("No destinations added") {
            return Ok(Vec::new());
        }
        return Err(SpoolerError::Status(stderr));
    }
    Ok(parse_lpstat(&String::from_utf8_lossy(&output.stdout)))
}

#[cfg(windows)]
fn enumerate() -> Result<Vec<String>, SpoolerError> {
    use windows::core::PWSTR;
    use windows::Win32::Graphics::Printing::{
        EnumPrintersW, PRINTER_ENUM_CONNECTIONS, PRINTER_ENUM_LOCAL, PRINTER_INFO_4W,
    };

    unsafe {
        let flags = PRINTER_ENUM_LOCAL | PRINTER_ENUM_CONNECTIONS;
        let mut needed: u32 = 0;
        let mut returned: u32 = 0;

        let _ = EnumPrintersW(flags, None, 4, None, &mut needed, &mut returned);
        if needed == 0 {
            return Ok(Vec::new());
        }

        let mut buf: Vec<u8> = vec![0; needed as usize];
        EnumPrintersW(
            flags,
            None,
            4,
            Some(buf.as_mut_slice()),
            &mut needed,
            &mut returned,
        )
        .map_err(|err| SpoolerError::Win32(format!("EnumPrintersW failed: {err}")))?;

        let ptr = buf.as_ptr() as *const PRINTER_INFO_4W;
        let slice = std::slice::from_raw_parts(ptr, returned as usize);

        let mut names = Vec::with_capacity(slice.len());
        for info in slice {
            if info.pPrinterName.is_null() {
                continue;
            }
            let name = PWSTR(info.pPrinterName.0).to_string().unwrap_or_default();
            if !name.is_empty() {
                names.push(name);
            }
        }
        Ok(names)
    }
}

/// Parses `lpstat -e` output: one destination per line.
#[cfg_attr(windows, allow(dead_code))]
fn parse_lpstat(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lpstat_lines_become_names() {
        let names = parse_lpstat("EPSON_L3210_Series\n\n  Office_Laser \nPDF\n");
        assert_eq!(names, vec!["EPSON_L3210_Series", "Office_Laser", "PDF"]);
    }

    #[test]
    fn empty_lpstat_output_is_empty_catalog() {
        assert!(parse_lpstat("").is_empty());
    }
}
