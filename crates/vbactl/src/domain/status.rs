//! Classification of raw interop status codes.

use std::fmt;

use serde::Serialize;

pub const E_FAIL: u32 = 0x8000_4005;
pub const E_ACCESSDENIED: u32 = 0x8007_0005;
pub const MK_E_UNAVAILABLE: u32 = 0x8004_01E3;
pub const CO_E_SERVER_EXEC_FAILURE: u32 = 0x8008_0005;
pub const RPC_E_DISCONNECTED: u32 = 0x8001_0108;
pub const RPC_S_SERVER_UNAVAILABLE: u32 = 0x8007_06BA;
pub const RPC_E_CALL_REJECTED: u32 = 0x8001_0001;
pub const RPC_E_SERVERCALL_RETRYLATER: u32 = 0x8001_010A;
pub const DISP_E_MEMBERNOTFOUND: u32 = 0x8002_0003;
pub const DISP_E_TYPEMISMATCH: u32 = 0x8002_0005;
pub const DISP_E_UNKNOWNNAME: u32 = 0x8002_0006;
pub const DISP_E_BADINDEX: u32 = 0x8002_000B;
pub const CTL_E_PERMISSIONDENIED: u32 = 0x800A_0046;
pub const VB_E_SUBSCRIPT_OUT_OF_RANGE: u32 = 0x800A_0009;
pub const VB_E_TYPE_MISMATCH: u32 = 0x800A_000D;

/// Stable categories for host-reported failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StatusCategory {
    NotRunning,
    AccessDenied,
    MemberNotFound,
    BadIndex,
    TypeMismatch,
    /// The host is alive but refused the call for now.
    Busy,
    GenericFailure,
}

impl StatusCategory {
    /// Classify a raw status code.
    pub fn classify(status: u32) -> Self {
        match status {
            MK_E_UNAVAILABLE
            | CO_E_SERVER_EXEC_FAILURE
            | RPC_E_DISCONNECTED
            | RPC_S_SERVER_UNAVAILABLE => StatusCategory::NotRunning,
            E_ACCESSDENIED | CTL_E_PERMISSIONDENIED => StatusCategory::AccessDenied,
            DISP_E_MEMBERNOTFOUND | DISP_E_UNKNOWNNAME => StatusCategory::MemberNotFound,
            DISP_E_BADINDEX | VB_E_SUBSCRIPT_OUT_OF_RANGE => StatusCategory::BadIndex,
            DISP_E_TYPEMISMATCH | VB_E_TYPE_MISMATCH => StatusCategory::TypeMismatch,
            RPC_E_CALL_REJECTED | RPC_E_SERVERCALL_RETRYLATER => StatusCategory::Busy,
            _ => StatusCategory::GenericFailure,
        }
    }

    /// Whether retrying the same call later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, StatusCategory::Busy)
    }

    /// Failures a line-membership query raises for lines outside any procedure.
    pub fn is_expected_for_line_query(&self) -> bool {
        matches!(
            self,
            StatusCategory::MemberNotFound
                | StatusCategory::BadIndex
                | StatusCategory::TypeMismatch
                | StatusCategory::GenericFailure
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StatusCategory::NotRunning => "not-running",
            StatusCategory::AccessDenied => "access-denied",
            StatusCategory::MemberNotFound => "member-not-found",
            StatusCategory::BadIndex => "bad-index",
            StatusCategory::TypeMismatch => "type-mismatch",
            StatusCategory::Busy => "busy",
            StatusCategory::GenericFailure => "generic-failure",
        }
    }
}

impl fmt::Display for StatusCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
