//! CLI Exit Code Registry
//!
//! Single source of truth for `otrace` exit codes. Scripts and schedulers
//! branch on these, so a code never changes meaning once released.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain     | Description                                   |
//! |---------|------------|-----------------------------------------------|
//! | 0       | Universal  | Success                                       |
//! | 1       | Universal  | General error (unspecified)                   |
//! | 2       | Universal  | Usage error (bad flags, invalid settings)     |
//! | 3       | Universal  | Filesystem I/O error                          |
//! | 10-19   | extract    | Credentials, bridge and store failures        |
//! | 20-29   | recon      | Config, discrepancies and failed months       |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant in the appropriate range
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Map it from the library error in the functions at the bottom

use ordertrace_config::ConfigError;
use ordertrace_extract::ExtractError;
use ordertrace_io::StoreError;
use ordertrace_recon::ReconError;

// =============================================================================
// Universal (0-3)
// =============================================================================

/// Success - command completed, nothing to report.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Prefer a specific code where one exists.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, invalid settings values.
pub const EXIT_USAGE: u8 = 2;

/// Cannot read or write a file or directory.
pub const EXIT_IO: u8 = 3;

// =============================================================================
// Extract (10-19)
// =============================================================================

/// No username or password available from flags or environment.
pub const EXIT_AUTH_MISSING: u8 = 10;

/// The console rejected the credentials, or revoked the session mid-run.
pub const EXIT_AUTH_REJECTED: u8 = 11;

/// The browser bridge could not be reached.
pub const EXIT_BRIDGE_UNREACHABLE: u8 = 12;

/// Writing a day partition failed. Earlier days remain valid.
pub const EXIT_STORE: u8 = 13;

// =============================================================================
// Recon (20-29)
// =============================================================================

/// Reconciliation config is unreadable or incomplete.
pub const EXIT_RECON_CONFIG: u8 = 20;

/// Reconciliation completed and found differences.
/// Like `diff(1)`, a non-zero code here means "datasets differ".
pub const EXIT_RECON_DIFFS: u8 = 21;

/// At least one month could not be reconciled. Takes precedence over
/// [`EXIT_RECON_DIFFS`].
pub const EXIT_RECON_FAILED_MONTHS: u8 = 22;

// =============================================================================
// Mappings
// =============================================================================

pub fn config_exit_code(err: &ConfigError) -> u8 {
    match err {
        ConfigError::Io { .. } => EXIT_IO,
        ConfigError::Parse { .. } | ConfigError::Invalid(_) => EXIT_USAGE,
        ConfigError::MissingCredential { .. } => EXIT_AUTH_MISSING,
    }
}

pub fn store_exit_code(_err: &StoreError) -> u8 {
    EXIT_STORE
}

/// Map an ExtractError to its exit code.
pub fn extract_exit_code(err: &ExtractError) -> u8 {
    match err {
        ExtractError::Auth(_) => EXIT_AUTH_REJECTED,
        ExtractError::Unreachable { .. } => EXIT_BRIDGE_UNREACHABLE,
        ExtractError::Store(e) => store_exit_code(e),
        ExtractError::Config(e) => config_exit_code(e),
        ExtractError::Navigation { .. }
        | ExtractError::Timeout { .. }
        | ExtractError::Protocol(_)
        | ExtractError::IncompleteListing { .. } => EXIT_ERROR,
    }
}

pub fn recon_exit_code(err: &ReconError) -> u8 {
    match err {
        ReconError::ConfigParse { .. } | ReconError::ConfigValidation(_) => EXIT_RECON_CONFIG,
        ReconError::Load { .. } | ReconError::Io { .. } | ReconError::Csv { .. } => EXIT_IO,
        ReconError::Json(_) => EXIT_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_errors_map_into_their_range() {
        assert_eq!(extract_exit_code(&ExtractError::Auth("401".into())), EXIT_AUTH_REJECTED);
        assert_eq!(
            extract_exit_code(&ExtractError::Unreachable {
                endpoint: "http://127.0.0.1:9".into(),
                detail: "refused".into()
            }),
            EXIT_BRIDGE_UNREACHABLE
        );
        let missing = ExtractError::Config(ConfigError::MissingCredential {
            what: "password",
            env: "OTRACE_PASSWORD".into(),
        });
        assert_eq!(extract_exit_code(&missing), EXIT_AUTH_MISSING);
    }

    #[test]
    fn recon_config_errors_are_twenty() {
        let err = ReconError::ConfigValidation("range.from and range.to are required".into());
        assert_eq!(recon_exit_code(&err), EXIT_RECON_CONFIG);
    }

    #[test]
    fn codes_are_distinct() {
        let codes = [
            EXIT_SUCCESS,
            EXIT_ERROR,
            EXIT_USAGE,
            EXIT_IO,
            EXIT_AUTH_MISSING,
            EXIT_AUTH_REJECTED,
            EXIT_BRIDGE_UNREACHABLE,
            EXIT_STORE,
            EXIT_RECON_CONFIG,
            EXIT_RECON_DIFFS,
            EXIT_RECON_FAILED_MONTHS,
        ];
        let mut sorted = codes.to_vec();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), codes.len());
    }
}
