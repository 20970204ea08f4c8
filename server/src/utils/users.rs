pub const MIN_NAME_LENGTH: usize = 2;
pub const MIN_PASSWORD_LENGTH: usize = 8;
const MAX_EMAIL_LENGTH: usize = 320;

pub fn is_valid_email(value: &str) -> bool {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed.len() > MAX_EMAIL_LENGTH {
        return false;
    }

    let Some((local, domain)) = trimmed.split_once('@') else {
        return false;
    };

    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return false;
    }

    let forbidden = |ch: u8| ch <= b' ' || matches!(ch, b';' | b',' | b'"');
    if local.bytes().any(forbidden) || domain.bytes().any(forbidden) {
        return false;
    }

    let Some((host, tld)) = domain.rsplit_once('.') else {
        return false;
    };
    !host.is_empty() && !tld.is_empty()
}

/// Character count, so multi-byte names are not penalised.
pub fn name_is_long_enough(name: &str) -> bool {
    name.trim().chars().count() >= MIN_NAME_LENGTH
}

pub fn password_is_long_enough(password: &str) -> bool {
    password.chars().count() >= MIN_PASSWORD_LENGTH
}
