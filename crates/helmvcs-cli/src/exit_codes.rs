//! Exit codes returned by `helm-vcs`
//!
//! These follow Unix conventions and sysexits.h where applicable.

/// General error - unspecified failure
pub const ERROR: i32 = 1;

/// Configuration error - registry or Helm files unreadable, unknown repository
pub const CONFIG_ERROR: i32 = 2;

/// VCS error - clone, fetch or tag listing failed, or the VCS is unknown
pub const VCS_ERROR: i32 = 3;

/// Chart error - an index or chart could not be read
pub const CHART_ERROR: i32 = 4;

/// IO error - file not found, permission denied, etc.
pub const IO_ERROR: i32 = 5;

/// Usage error - invalid arguments or options (following sysexits.h convention)
pub const USAGE_ERROR: i32 = 64;
