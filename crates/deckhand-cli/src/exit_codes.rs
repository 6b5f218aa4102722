//! Process exit codes
//!
//! These follow Unix conventions and sysexits.h where applicable.

/// General error - unspecified failure
pub const ERROR: i32 = 1;

/// Validation error - advisory problems found in `--strict` mode
pub const VALIDATION_ERROR: i32 = 2;

/// Definition error - unreadable or invalid `deckhand.yaml`
pub const DEFINITION_ERROR: i32 = 3;

/// Render error - an output renderer failed
pub const RENDER_ERROR: i32 = 4;

/// IO error - file not found, permission denied, etc.
pub const IO_ERROR: i32 = 5;

/// kubectl failed or could not be started
pub const APPLY_ERROR: i32 = 6;
