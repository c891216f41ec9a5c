use std::sync::LazyLock;

use regex::Regex;

pub use crate::error::FieldErrors;

const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email regex"));
static HTML_TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>?").expect("tag regex"));

// -- Sanitization --

/// Strip HTML tags.
pub fn sanitize_html(input: &str) -> String {
    HTML_TAG_RE.replace_all(input, "").into_owned()
}

/// Strip tags and escape the remaining special characters.
pub fn sanitize_input(input: &str) -> String {
    sanitize_html(input)
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#039;")
}

/// Replace characters that are unsafe in file names.
pub fn sanitize_filename(filename: &str) -> String {
    filename.replace(
        ['/', '\\', '?', '%', '*', ':', '|', '"', '<', '>'],
        "_",
    )
}

// -- Validators --
//
// Each validator mirrors one input schema: it checks every field and
// returns either the typed input or the full set of per-field messages.

struct Errors(FieldErrors);

impl Errors {
    fn new() -> Self {
        Self(FieldErrors::new())
    }

    fn push(&mut self, field: &str, message: &str) {
        self.0.entry(field.to_string()).or_default().push(message.to_string());
    }

    fn finish<T>(self, value: T) -> Result<T, FieldErrors> {
        if self.0.is_empty() { Ok(value) } else { Err(self.0) }
    }
}

#[derive(Debug, Clone)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

pub fn validate_login(email: &str, password: &str) -> Result<LoginInput, FieldErrors> {
    let mut errors = Errors::new();

    if email.is_empty() {
        errors.push("email", "email address is required");
    } else if !EMAIL_RE.is_match(email) {
        errors.push("email", "enter a valid email address");
    }

    if password.is_empty() {
        errors.push("password", "password is required");
    } else if password.chars().count() < 8 {
        errors.push("password", "password must be at least 8 characters");
    }

    errors.finish(LoginInput {
        email: email.to_string(),
        password: password.to_string(),
    })
}

#[derive(Debug, Clone)]
pub struct RegistrationInput {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Password rule: at least 8 characters drawn from letters, digits and
/// `@$!%*?&`, with at least one lowercase, one uppercase, one digit and
/// one special character. (The regex crate has no lookahead, so the
/// classes are checked directly.)
fn password_complexity_ok(password: &str) -> bool {
    const SPECIALS: &str = "@$!%*?&";

    password.chars().count() >= 8
        && password
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || SPECIALS.contains(c))
        && password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().any(|c| c.is_ascii_digit())
        && password.chars().any(|c| SPECIALS.contains(c))
}

pub fn validate_registration(
    name: &str,
    email: &str,
    password: &str,
    confirm_password: &str,
) -> Result<RegistrationInput, FieldErrors> {
    let mut errors = Errors::new();

    if name.is_empty() {
        errors.push("name", "name is required");
    } else if name.chars().count() > 50 {
        errors.push("name", "name must be at most 50 characters");
    }

    if email.is_empty() {
        errors.push("email", "email address is required");
    } else if !EMAIL_RE.is_match(email) {
        errors.push("email", "enter a valid email address");
    }

    if password.is_empty() {
        errors.push("password", "password is required");
    } else if !password_complexity_ok(password) {
        errors.push(
            "password",
            "password must be at least 8 characters and contain an uppercase letter, \
             a lowercase letter, a digit and a special character",
        );
    }

    if confirm_password.is_empty() {
        errors.push("confirm_password", "password confirmation is required");
    } else if password != confirm_password {
        errors.push("confirm_password", "passwords do not match");
    }

    errors.finish(RegistrationInput {
        name: name.to_string(),
        email: email.to_string(),
        password: password.to_string(),
    })
}

#[derive(Debug, Clone)]
pub struct ProfileInput {
    pub name: String,
    pub bio: Option<String>,
}

pub fn validate_profile(name: &str, bio: Option<&str>) -> Result<ProfileInput, FieldErrors> {
    let mut errors = Errors::new();

    if name.is_empty() {
        errors.push("name", "name is required");
    } else if name.chars().count() > 50 {
        errors.push("name", "name must be at most 50 characters");
    }

    if let Some(bio) = bio {
        if bio.chars().count() > 500 {
            errors.push("bio", "bio must be at most 500 characters");
        }
    }

    errors.finish(ProfileInput {
        name: name.to_string(),
        bio: bio.map(str::to_string),
    })
}

#[derive(Debug, Clone)]
pub struct PostInput {
    pub title: String,
    pub content: String,
    pub published: bool,
}

pub fn validate_post(title: &str, content: &str, published: bool) -> Result<PostInput, FieldErrors> {
    let mut errors = Errors::new();

    if title.is_empty() {
        errors.push("title", "title is required");
    } else if title.chars().count() > 100 {
        errors.push("title", "title must be at most 100 characters");
    }

    if content.is_empty() {
        errors.push("content", "content is required");
    } else if content.chars().count() > 10_000 {
        errors.push("content", "content must be at most 10000 characters");
    }

    errors.finish(PostInput {
        title: title.to_string(),
        content: content.to_string(),
        published,
    })
}

pub fn validate_comment(content: &str) -> Result<String, FieldErrors> {
    let mut errors = Errors::new();

    if content.is_empty() {
        errors.push("content", "comment content is required");
    } else if content.chars().count() > 1_000 {
        errors.push("content", "comment must be at most 1000 characters");
    }

    errors.finish(content.to_string())
}

#[derive(Debug, Clone)]
pub struct ChatInput {
    pub name: Option<String>,
}

pub fn validate_chat(name: Option<&str>, participant_count: usize) -> Result<ChatInput, FieldErrors> {
    let mut errors = Errors::new();

    if let Some(name) = name {
        if name.chars().count() > 100 {
            errors.push("name", "chat name must be at most 100 characters");
        }
    }

    if participant_count == 0 {
        errors.push("participant_ids", "select at least one participant");
    }

    errors.finish(ChatInput {
        name: name.filter(|n| !n.is_empty()).map(str::to_string),
    })
}

pub fn validate_chat_message(content: &str) -> Result<String, FieldErrors> {
    let mut errors = Errors::new();

    if content.is_empty() {
        errors.push("content", "message content is required");
    } else if content.chars().count() > 5_000 {
        errors.push("content", "message must be at most 5000 characters");
    }

    errors.finish(content.to_string())
}

#[derive(Debug, Clone)]
pub struct FileUploadInput {
    pub filename: String,
    pub content_type: String,
}

pub fn validate_file_upload(
    filename: &str,
    content_type: &str,
    size: u64,
) -> Result<FileUploadInput, FieldErrors> {
    let mut errors = Errors::new();

    if filename.is_empty() {
        errors.push("filename", "file name is required");
    } else if filename.chars().count() > 255 {
        errors.push("filename", "file name must be at most 255 characters");
    }

    if content_type.is_empty() {
        errors.push("content_type", "content type is required");
    }

    if size == 0 {
        errors.push("size", "file must not be empty");
    } else if size > MAX_FILE_SIZE {
        errors.push("size", "file must be at most 10MB");
    }

    errors.finish(FileUploadInput {
        filename: filename.to_string(),
        content_type: content_type.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_tags_and_escapes() {
        assert_eq!(sanitize_html("<b>bold</b> text"), "bold text");
        assert_eq!(
            sanitize_input("<script>x</script> & \"q\""),
            "x &amp; &quot;q&quot;"
        );
        assert_eq!(sanitize_filename("a/b\\c:d.txt"), "a_b_c_d.txt");
    }

    #[test]
    fn registration_field_errors_are_keyed_by_field() {
        let errors =
            validate_registration("", "not-an-email", "weak", "different").unwrap_err();

        assert!(errors.contains_key("name"));
        assert!(errors.contains_key("email"));
        assert!(errors.contains_key("password"));
        assert!(errors.contains_key("confirm_password"));
    }

    #[test]
    fn password_complexity() {
        assert!(password_complexity_ok("Str0ng!pass"));
        assert!(!password_complexity_ok("alllowercase1!"));
        assert!(!password_complexity_ok("NoDigits!!"));
        assert!(!password_complexity_ok("NoSpecial1"));
        assert!(!password_complexity_ok("Sh0rt!a"));
        // Characters outside the allowed set are rejected.
        assert!(!password_complexity_ok("Str0ng!pass with space"));
    }

    #[test]
    fn valid_registration_passes_through() {
        let input =
            validate_registration("Alice", "a@example.com", "Str0ng!pass", "Str0ng!pass").unwrap();
        assert_eq!(input.name, "Alice");
        assert_eq!(input.email, "a@example.com");
    }

    #[test]
    fn post_limits() {
        assert!(validate_post("Title", "Body", true).is_ok());

        let errors = validate_post("", &"x".repeat(10_001), true).unwrap_err();
        assert!(errors.contains_key("title"));
        assert!(errors.contains_key("content"));
    }

    #[test]
    fn chat_requires_participants() {
        assert!(validate_chat(Some("friends"), 2).is_ok());
        let errors = validate_chat(None, 0).unwrap_err();
        assert!(errors.contains_key("participant_ids"));
    }

    #[test]
    fn empty_chat_name_becomes_none() {
        let input = validate_chat(Some(""), 1).unwrap();
        assert!(input.name.is_none());
    }

    #[test]
    fn file_upload_limits() {
        assert!(validate_file_upload("notes.txt", "text/plain", 1024).is_ok());

        let errors = validate_file_upload("", "", 0).unwrap_err();
        assert!(errors.contains_key("filename"));
        assert!(errors.contains_key("content_type"));
        assert!(errors.contains_key("size"));

        let too_big = validate_file_upload("big.bin", "application/octet-stream", MAX_FILE_SIZE + 1)
            .unwrap_err();
        assert!(too_big.contains_key("size"));
    }
}
