use crate::blockchain::{Lamports, Pubkey};
use crate::errors::{WalletError, WalletResult};
use regex::Regex;

const COMMON_PASSWORDS: &[&str] = &[
    "password",
    "password1",
    "password123",
    "12345678",
    "123456789",
    "qwertyuiop",
    "qwerty123",
    "iloveyou",
    "welcome123",
    "administrator",
    "solana123",
];

/// Input validation for wallet and sign-up form fields
pub struct InputValidator {
    address_pattern: Regex,
    wallet_name_pattern: Regex,
    username_pattern: Regex,
    email_pattern: Regex,
    code_pattern: Regex,
}

fn compile(pattern: &str) -> WalletResult<Regex> {
    Regex::new(pattern)
        .map_err(|e| WalletError::ValidationError(format!("Invalid pattern {}: {}", pattern, e)))
}

impl InputValidator {
    pub fn new() -> WalletResult<Self> {
        Ok(InputValidator {
            // base58 alphabet, 32-byte keys encode to 32..=44 characters
            address_pattern: compile(r"^[1-9A-HJ-NP-Za-km-z]{32,44}$")?,
            wallet_name_pattern: compile(r"^[a-zA-Z0-9\s\-_]+$")?,
            username_pattern: compile(r"^[A-Za-z0-9._+\-@]+$")?,
            email_pattern: compile(r"^[^\s@]+@[^\s@]+\.[^\s@]+$")?,
            code_pattern: compile(r"^[0-9]{6}$")?,
        })
    }

    /// Validate and parse a recipient address
    pub fn validate_address(&self, address: &str) -> WalletResult<Pubkey> {
        let address = address.trim();
        if address.is_empty() {
            return Err(WalletError::InvalidAddress(
                "Address cannot be empty".to_string(),
            ));
        }

        if !self.address_pattern.is_match(address) {
            return Err(WalletError::InvalidAddress(
                "Address must be 32-44 base58 characters".to_string(),
            ));
        }

        Pubkey::from_string(address)
    }

    /// Validate and parse a SOL amount; must be positive
    pub fn validate_amount(&self, amount: &str) -> WalletResult<Lamports> {
        let amount = amount.trim();
        if amount.is_empty() {
            return Err(WalletError::InvalidAmount(
                "Amount cannot be empty".to_string(),
            ));
        }

        let lamports = Lamports::from_sol_str(amount)?;
        if lamports.is_zero() {
            return Err(WalletError::InvalidAmount(
                "Amount must be positive".to_string(),
            ));
        }
        Ok(lamports)
    }

    /// Vault password: length and a small deny-list
    pub fn validate_password(&self, password: &str) -> WalletResult<()> {
        let length = password.chars().count();
        if length < 8 {
            return Err(WalletError::ValidationError(
                "Password must be at least 8 characters".to_string(),
            ));
        }

        if length > 256 {
            return Err(WalletError::ValidationError(
                "Password too long".to_string(),
            ));
        }

        if COMMON_PASSWORDS.contains(&password.to_lowercase().as_str()) {
            return Err(WalletError::ValidationError(
                "Password is too common, please choose a stronger password".to_string(),
            ));
        }

        Ok(())
    }

    /// Account password for the identity provider (default user pool policy)
    pub fn validate_account_password(&self, password: &str) -> WalletResult<()> {
        self.validate_password(password)?;

        let has_upper = password.chars().any(|c| c.is_uppercase());
        let has_lower = password.chars().any(|c| c.is_lowercase());
        let has_digit = password.chars().any(|c| c.is_ascii_digit());
        let has_symbol = password
            .chars()
            .any(|c| !c.is_alphanumeric() && !c.is_whitespace());

        if !(has_upper && has_lower && has_digit && has_symbol) {
            return Err(WalletError::ValidationError(
                "Password must contain uppercase, lowercase, number, and symbol".to_string(),
            ));
        }
        Ok(())
    }

    /// Validate wallet name/label
    pub fn validate_wallet_name(&self, name: &str) -> WalletResult<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(WalletError::ValidationError(
                "Wallet name cannot be empty".to_string(),
            ));
        }

        if name.len() > 50 {
            return Err(WalletError::ValidationError(
                "Wallet name too long".to_string(),
            ));
        }

        if !self.wallet_name_pattern.is_match(name) {
            return Err(WalletError::ValidationError(
                "Wallet name contains invalid characters".to_string(),
            ));
        }

        Ok(())
    }

    pub fn validate_username(&self, username: &str) -> WalletResult<()> {
        if username.len() < 3 || username.len() > 128 {
            return Err(WalletError::ValidationError(
                "Username must be 3-128 characters".to_string(),
            ));
        }
        if !self.username_pattern.is_match(username) {
            return Err(WalletError::ValidationError(
                "Username may only contain letters, digits and . _ + - @".to_string(),
            ));
        }
        Ok(())
    }

    pub fn validate_email(&self, email: &str) -> WalletResult<()> {
        if email.len() > 254 || !self.email_pattern.is_match(email) {
            return Err(WalletError::ValidationError(
                "Email address is invalid".to_string(),
            ));
        }
        Ok(())
    }

    /// Sign-up confirmation code sent by the identity provider
    pub fn validate_confirmation_code(&self, code: &str) -> WalletResult<()> {
        if !self.code_pattern.is_match(code.trim()) {
            return Err(WalletError::ValidationError(
                "Confirmation code must be 6 digits".to_string(),
            ));
        }
        Ok(())
    }
}
