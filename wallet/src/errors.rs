use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum WalletError {
    // Cryptographic errors
    CryptoError(String),
    InvalidKey(String),
    SignatureError(String),

    // Network errors
    NetworkError(String),
    ConnectionTimeout,
    InvalidResponse(String),
    RpcError { code: i64, message: String },

    // Transaction errors
    TransactionFailed(String),
    BlockhashExpired,
    InsufficientFunds { required: u64, available: u64 },

    // Storage errors
    StorageError(String),
    FileNotFound(String),
    PermissionDenied(String),

    // Validation errors
    ValidationError(String),
    InvalidAddress(String),
    InvalidAmount(String),

    // Identity provider errors
    AuthError { kind: String, message: String },

    // Application errors
    NoWallet,
    AlreadyExists(String),
    NotFound(String),
}

impl fmt::Display for WalletError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            WalletError::CryptoError(msg) => write!(f, "Cryptographic error: {}", msg),
            WalletError::InvalidKey(msg) => write!(f, "Invalid key: {}", msg),
            WalletError::SignatureError(msg) => write!(f, "Signature error: {}", msg),

            WalletError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            WalletError::ConnectionTimeout => write!(f, "Connection timeout"),
            WalletError::InvalidResponse(msg) => write!(f, "Invalid response: {}", msg),
            WalletError::RpcError { code, message } => {
                write!(f, "RPC error {}: {}", code, message)
            }

            WalletError::TransactionFailed(msg) => write!(f, "Transaction failed: {}", msg),
            WalletError::BlockhashExpired => {
                write!(f, "Transaction expired before it was confirmed")
            }
            WalletError::InsufficientFunds {
                required,
                available,
            } => write!(
                f,
                "Insufficient funds: {} lamports required, {} lamports available",
                required, available
            ),

            WalletError::StorageError(msg) => write!(f, "Storage error: {}", msg),
            WalletError::FileNotFound(msg) => write!(f, "File not found: {}", msg),
            WalletError::PermissionDenied(msg) => write!(f, "Permission denied: {}", msg),

            WalletError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            WalletError::InvalidAddress(msg) => write!(f, "Invalid address: {}", msg),
            WalletError::InvalidAmount(msg) => write!(f, "Invalid amount: {}", msg),

            WalletError::AuthError { kind, message } => {
                write!(f, "Authentication failed ({}): {}", kind, message)
            }

            WalletError::NoWallet => write!(f, "No wallet connected or created"),
            WalletError::AlreadyExists(msg) => write!(f, "Already exists: {}", msg),
            WalletError::NotFound(msg) => write!(f, "Not found: {}", msg),
        }
    }
}

impl std::error::Error for WalletError {}

impl WalletError {
    /// Failures where no node answered, so another endpoint may succeed.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            WalletError::NetworkError(_) | WalletError::ConnectionTimeout
        )
    }
}

pub type WalletResult<T> = Result<T, WalletError>;

// Helper macro for easy error creation
#[macro_export]
macro_rules! wallet_error {
    ($variant:ident, $msg:expr) => {
        $crate::errors::WalletError::$variant($msg.to_string())
    };
    ($variant:ident) => {
        $crate::errors::WalletError::$variant
    };
}

// Conversion helpers
impl From<std::io::Error> for WalletError {
    fn from(error: std::io::Error) -> Self {
        match error.kind() {
            std::io::ErrorKind::NotFound => WalletError::FileNotFound(error.to_string()),
            std::io::ErrorKind::PermissionDenied => {
                WalletError::PermissionDenied(error.to_string())
            }
            _ => WalletError::StorageError(error.to_string()),
        }
    }
}

impl From<serde_json::Error> for WalletError {
    fn from(error: serde_json::Error) -> Self {
        WalletError::ValidationError(format!("JSON error: {}", error))
    }
}

impl From<reqwest::Error> for WalletError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            WalletError::ConnectionTimeout
        } else {
            WalletError::NetworkError(error.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_not_found_maps_to_file_not_found() {
        let err: WalletError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(err, WalletError::FileNotFound(_)));
    }

    #[test]
    fn macro_builds_variants() {
        let err = wallet_error!(InvalidAmount, "negative");
        assert_eq!(err, WalletError::InvalidAmount("negative".to_string()));
        assert_eq!(wallet_error!(NoWallet), WalletError::NoWallet);
    }

    #[test]
    fn display_matches_user_facing_messages() {
        assert_eq!(
            WalletError::NoWallet.to_string(),
            "No wallet connected or created"
        );
        let err = WalletError::InsufficientFunds {
            required: 10,
            available: 3,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient funds: 10 lamports required, 3 lamports available"
        );
    }
}
