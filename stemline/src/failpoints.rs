use fail::fail_point;

use crate::bail;
use crate::error::{ErrorKind, StemResult};

pub const SOURCE_BEFORE_READ_LINE: &str = "source.before_read_line";
pub const SINK_BEFORE_WRITE_LINE: &str = "sink.before_write_line";

/// Evaluates the failpoint `name`, returning an error when it is configured with `return`.
///
/// The optional parameter selects the error kind: `io` maps to [`ErrorKind::IoError`] and
/// anything else to [`ErrorKind::FailPoint`].
pub fn stem_fail_point(name: &str) -> StemResult<()> {
    fail_point!(name, |parameter| {
        let error_kind = match parameter.as_deref() {
            Some("io") => ErrorKind::IoError,
            _ => ErrorKind::FailPoint,
        };

        bail!(
            error_kind,
            "An error occurred in a fail point",
            format!("The failpoint '{name}' returned an error")
        );
    });

    Ok(())
}
