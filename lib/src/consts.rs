use std::time::Duration;

/// Number of columns the fragment matrix of a file is split into; each column
/// is one worker slice. Fixed across the deployment.
pub const PROVIDE_TASK_GROUP_NUM: usize = 12;

/// Cadence of the provide-task reconciliation sweep. A claimed slice whose
/// timestamp has not advanced for twice this duration is reclaimed.
pub const PROVIDE_TASK_CHECK_TIME: Duration = Duration::from_secs(300);

/// Entropy bytes behind task ids and claim tokens; both render as hex twice
/// this length.
pub const TID_BYTES_LEN: usize = 16;

/// Maximum age of a signed claim request.
pub const REQUEST_EXPIRY: Duration = Duration::from_secs(15);

/// Canonical timestamp layout for everything that crosses the wire or the
/// store.
pub const TIME_LAYOUT: &str = "%Y-%m-%d %H:%M:%S";

/// Bus channel carrying task announcements to storage workers.
pub const CHANNEL_PROVIDE: &str = "sower:provide";
