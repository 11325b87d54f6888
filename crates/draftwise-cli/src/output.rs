//! Shared output helpers.

use anyhow::Result;
use draftwise::{Notice, NoticeLevel};
use serde::Serialize;
use std::io::Write;

/// Global output flags.
#[derive(Debug, Clone, Copy, Default)]
pub struct Options {
    pub json: bool,
    pub pretty: bool,
}

pub fn write_json<T: Serialize + ?Sized>(out: &mut impl Write, value: &T, pretty: bool) -> Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    writeln!(out, "{}", json)?;
    Ok(())
}

/// Info notices go to stderr so stdout stays machine-readable. Error
/// notices are skipped; the failing operation already returned them.
pub fn report_notices(notices: Vec<Notice>) {
    for notice in notices {
        if notice.level == NoticeLevel::Info {
            eprintln!("{}", notice.message);
        }
    }
}
