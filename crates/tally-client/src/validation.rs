//! Checks done before any request, with the app's user-facing messages.

use tally_types::Person;
use tally_types::ledger::is_blank;

pub const PROFILE_REQUIRED: &str = "Por favor, escolhe quem és (Filipe ou Carlota)";
pub const PASSWORD_MISMATCH: &str = "As passwords não coincidem";
pub const PASSWORD_TOO_SHORT: &str = "A password deve ter pelo menos 6 caracteres";
pub const DISPUTE_REASON_REQUIRED: &str = "Precisas de dar uma razão para contestar este ponto!";
pub const REASON_REQUIRED: &str = "A razão não pode estar vazia!";
pub const INVALID_CREDENTIALS: &str = "Email ou password incorretos";
pub const EMAIL_NOT_CONFIRMED: &str = "Por favor confirma o teu email antes de entrar";

pub const MIN_PASSWORD_LEN: usize = 6;

/// Checked in this order: profile chosen, passwords match, password length.
pub fn validate_sign_up(
    profile: Option<Person>,
    password: &str,
    confirm_password: &str,
) -> Result<Person, &'static str> {
    let profile = profile.ok_or(PROFILE_REQUIRED)?;
    if password != confirm_password {
        return Err(PASSWORD_MISMATCH);
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(PASSWORD_TOO_SHORT);
    }
    Ok(profile)
}

pub fn validate_dispute_reason(reason: &str) -> Result<(), &'static str> {
    if is_blank(reason) { Err(DISPUTE_REASON_REQUIRED) } else { Ok(()) }
}

pub fn validate_reason(reason: &str) -> Result<(), &'static str> {
    if is_blank(reason) { Err(REASON_REQUIRED) } else { Ok(()) }
}

/// Map the two known provider messages to friendlier text; anything else is
/// shown as-is.
pub fn translate_auth_error(message: &str) -> String {
    if message.contains("Invalid login credentials") {
        INVALID_CREDENTIALS.to_string()
    } else if message.contains("Email not confirmed") {
        EMAIL_NOT_CONFIRMED.to_string()
    } else {
        message.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_up_checks_in_order() {
        assert_eq!(validate_sign_up(None, "a", "b"), Err(PROFILE_REQUIRED));
        assert_eq!(validate_sign_up(Some(Person::Filipe), "abcdef", "abcdeg"), Err(PASSWORD_MISMATCH));
        assert_eq!(validate_sign_up(Some(Person::Filipe), "abc", "abc"), Err(PASSWORD_TOO_SHORT));
        assert_eq!(validate_sign_up(Some(Person::Carlota), "abcdef", "abcdef"), Ok(Person::Carlota));
    }

    #[test]
    fn test_translate_auth_error() {
        assert_eq!(translate_auth_error("Invalid login credentials"), INVALID_CREDENTIALS);
        assert_eq!(translate_auth_error("AuthApiError: Email not confirmed"), EMAIL_NOT_CONFIRMED);
        assert_eq!(translate_auth_error("User already registered"), "User already registered");
    }

    #[test]
    fn test_reason_checks() {
        assert_eq!(validate_dispute_reason("  "), Err(DISPUTE_REASON_REQUIRED));
        assert_eq!(validate_reason(""), Err(REASON_REQUIRED));
        assert!(validate_reason("ok").is_ok());
    }
}
