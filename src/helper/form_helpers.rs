use crate::error::{AppError, AppResult};
use crate::helper::media_helpers::{image_extension, matches_image_signature, UploadedImage};
use crate::models::{Group, Post};
use actix_multipart::Multipart;
use actix_web::{http::header, web, HttpRequest};
use futures_util::StreamExt;
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;
use url::form_urlencoded;

pub const REQUIRED_MESSAGE: &str = "This field is required.";
pub const INVALID_CHOICE_MESSAGE: &str = "Select a valid choice. That choice is not one of the available choices.";
pub const INVALID_IMAGE_MESSAGE: &str =
    "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";

/// Upper bound for a URL-encoded body and for each text part of a multipart body.
const MAX_TEXT_BODY_BYTES: usize = 256 * 1024;

/// Parses URL-encoded form data from bytes, handling potential UTF-8 errors gracefully.
pub fn parse_form(form_bytes: &web::Bytes) -> AppResult<HashMap<String, String>> {
    let body = String::from_utf8(form_bytes.to_vec())
        .map_err(|_| AppError::BadRequest("Invalid UTF-8 in request body.".to_string()))?;
    Ok(form_urlencoded::parse(body.as_bytes()).into_owned().collect())
}

/// Raw values submitted with the post form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostFormInput {
    pub text: String,
    pub group: String,
    pub image: Option<UploadedImage>,
}

/// A post form that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidPostForm {
    pub text: String,
    pub group_id: Option<i64>,
    pub image: Option<UploadedImage>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        FieldError { field, message: message.into() }
    }
}

/// Binds and checks a submitted post form against the groups that exist.
pub fn validate_post_form(
    input: PostFormInput,
    groups: &[Group],
    max_image_bytes: u64,
) -> Result<ValidPostForm, Vec<FieldError>> {
    let mut errors = Vec::new();

    let text = input.text.trim().to_string();
    if text.is_empty() {
        errors.push(FieldError::new("text", REQUIRED_MESSAGE));
    }

    let group_raw = input.group.trim();
    let group_id = if group_raw.is_empty() {
        None
    } else {
        match group_raw.parse::<i64>() {
            Ok(id) if groups.iter().any(|g| g.id == id) => Some(id),
            _ => {
                errors.push(FieldError::new("group", INVALID_CHOICE_MESSAGE));
                None
            }
        }
    };

    if let Some(image) = &input.image {
        if image.size > max_image_bytes {
            errors.push(FieldError::new(
                "image",
                format!("File is too large. Maximum size is {} MB.", max_image_bytes / (1024 * 1024)),
            ));
        } else if image_extension(&image.content_type).is_none()
            || !matches_image_signature(&image.content_type, &image.data)
        {
            errors.push(FieldError::new("image", INVALID_IMAGE_MESSAGE));
        }
    }

    if errors.is_empty() {
        Ok(ValidPostForm { text, group_id, image: input.image })
    } else {
        Err(errors)
    }
}

/// What the post form template needs to draw itself.
#[derive(Debug, Clone, Serialize, PartialEq, Default)]
pub struct PostFormView {
    pub text: String,
    pub group: String,
    pub image: Option<String>,
    pub errors: BTreeMap<&'static str, Vec<String>>,
}

impl PostFormView {
    pub fn empty() -> Self {
        PostFormView::default()
    }

    pub fn from_post(post: &Post) -> Self {
        PostFormView {
            text: post.text.clone(),
            group: post.group.as_ref().map(|g| g.id.to_string()).unwrap_or_default(),
            image: post.image.clone(),
            errors: BTreeMap::new(),
        }
    }

    /// Re-fills the form with what was submitted, plus the errors to show.
    pub fn with_errors(text: String, group: String, image: Option<String>, errors: Vec<FieldError>) -> Self {
        let mut grouped: BTreeMap<&'static str, Vec<String>> = BTreeMap::new();
        for error in errors {
            grouped.entry(error.field).or_default().push(error.message);
        }
        PostFormView { text, group, image, errors: grouped }
    }
}

pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_USERNAME_LEN: usize = 150;

fn username_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9@.+_-]+$").expect("username pattern is valid"))
}

/// Group slugs appear in URLs: letters, digits, underscores and hyphens only.
pub fn is_valid_slug(slug: &str) -> bool {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^[-a-zA-Z0-9_]+$").expect("slug pattern is valid"))
        .is_match(slug)
}

/// Checks signup fields that do not need the database.
pub fn validate_signup(username: &str, password1: &str, password2: &str) -> Result<(), Vec<FieldError>> {
    let mut errors = Vec::new();

    if username.is_empty() {
        errors.push(FieldError::new("username", REQUIRED_MESSAGE));
    } else if username.len() > MAX_USERNAME_LEN || !username_pattern().is_match(username) {
        errors.push(FieldError::new(
            "username",
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
        ));
    }

    if password1.chars().count() < MIN_PASSWORD_LEN {
        errors.push(FieldError::new(
            "password1",
            format!("This password is too short. It must contain at least {} characters.", MIN_PASSWORD_LEN),
        ));
    }
    if password1 != password2 {
        errors.push(FieldError::new("password2", "The two password fields didn't match."));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn is_multipart(req: &HttpRequest) -> bool {
    req.headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim_start().to_ascii_lowercase().starts_with("multipart/form-data"))
        .unwrap_or(false)
}

/// Reads the post form from either a multipart or a URL-encoded body.
///
/// Image bytes past `max_image_bytes` are counted but not kept, so an
/// oversized upload becomes a field error instead of a failed request.
pub async fn read_post_form(req: &HttpRequest, mut payload: web::Payload, max_image_bytes: u64) -> AppResult<PostFormInput> {
    if !is_multipart(req) {
        let mut body = web::BytesMut::new();
        while let Some(chunk) = payload.next().await {
            let chunk = chunk?;
            if body.len() + chunk.len() > MAX_TEXT_BODY_BYTES {
                return Err(AppError::BadRequest("Form body is too large.".to_string()));
            }
            body.extend_from_slice(&chunk);
        }
        let parsed = parse_form(&body.freeze())?;
        return Ok(PostFormInput {
            text: parsed.get("text").cloned().unwrap_or_default(),
            group: parsed.get("group").cloned().unwrap_or_default(),
            image: None,
        });
    }

    let mut multipart = Multipart::new(req.headers(), payload);
    let mut input = PostFormInput::default();

    while let Some(item) = multipart.next().await {
        let mut field = item?;
        let field_name = field.content_disposition().get_name().unwrap_or_default().to_string();

        match field_name.as_str() {
            "image" => {
                let filename = field.content_disposition().get_filename().unwrap_or_default().to_string();
                let content_type = field.content_type().map(|m| m.essence_str().to_string()).unwrap_or_default();
                let mut data = Vec::new();
                let mut size: u64 = 0;
                while let Some(chunk) = field.next().await {
                    let chunk = chunk?;
                    size += chunk.len() as u64;
                    if size <= max_image_bytes {
                        data.extend_from_slice(&chunk);
                    }
                }
                // An untouched file input still sends an empty, nameless part.
                if !filename.is_empty() || size > 0 {
                    input.image = Some(UploadedImage { filename, content_type, data, size });
                }
            }
            "text" | "group" => {
                let mut data = web::BytesMut::new();
                while let Some(chunk) = field.next().await {
                    let chunk = chunk?;
                    if data.len() + chunk.len() > MAX_TEXT_BODY_BYTES {
                        return Err(AppError::BadRequest(format!("Field '{}' is too large.", field_name)));
                    }
                    data.extend_from_slice(&chunk);
                }
                let value = String::from_utf8(data.to_vec())
                    .map_err(|_| AppError::BadRequest("Invalid UTF-8 in form field.".to_string()))?;
                if field_name == "text" {
                    input.text = value;
                } else {
                    input.group = value;
                }
            }
            _ => {
                while let Some(chunk) = field.next().await {
                    chunk?;
                }
            }
        }
    }

    Ok(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MB: u64 = 1024 * 1024;

    fn groups() -> Vec<Group> {
        vec![Group {
            id: 7,
            title: "Cats".to_string(),
            slug: "cats".to_string(),
            description: String::new(),
        }]
    }

    fn input(text: &str, group: &str) -> PostFormInput {
        PostFormInput { text: text.to_string(), group: group.to_string(), image: None }
    }

    fn png(size: usize) -> UploadedImage {
        let mut data = b"\x89PNG\r\n\x1a\n".to_vec();
        data.resize(size.max(8), 0);
        UploadedImage {
            filename: "pic.png".to_string(),
            content_type: "image/png".to_string(),
            size: data.len() as u64,
            data,
        }
    }

    #[test]
    fn text_is_required() {
        let errors = validate_post_form(input("   \n", ""), &groups(), MB).unwrap_err();
        assert_eq!(errors, vec![FieldError::new("text", REQUIRED_MESSAGE)]);
    }

    #[test]
    fn text_is_trimmed_and_group_is_optional() {
        let valid = validate_post_form(input("  Hello  ", ""), &groups(), MB).unwrap();
        assert_eq!(valid.text, "Hello");
        assert_eq!(valid.group_id, None);
    }

    #[test]
    fn group_must_exist() {
        assert_eq!(validate_post_form(input("Hi", "7"), &groups(), MB).unwrap().group_id, Some(7));
        for bad in ["8", "cats", "-1"] {
            let errors = validate_post_form(input("Hi", bad), &groups(), MB).unwrap_err();
            assert_eq!(errors[0].field, "group");
        }
    }

    #[test]
    fn image_must_be_a_real_image_within_limit() {
        let mut form = input("Hi", "");
        form.image = Some(png(64));
        assert!(validate_post_form(form.clone(), &groups(), MB).unwrap().image.is_some());

        form.image = Some(png(2 * MB as usize));
        let errors = validate_post_form(form.clone(), &groups(), MB).unwrap_err();
        assert_eq!(errors[0].field, "image");
        assert!(errors[0].message.starts_with("File is too large"));

        let mut fake = png(64);
        fake.data = b"<script>".to_vec();
        form.image = Some(fake);
        let errors = validate_post_form(form, &groups(), MB).unwrap_err();
        assert_eq!(errors, vec![FieldError::new("image", INVALID_IMAGE_MESSAGE)]);
    }

    #[test]
    fn all_errors_are_reported_together() {
        let errors = validate_post_form(input("", "99"), &groups(), MB).unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field).collect();
        assert_eq!(fields, vec!["text", "group"]);
    }

    #[test]
    fn form_view_groups_errors_by_field() {
        let view = PostFormView::with_errors(
            String::new(),
            "99".to_string(),
            None,
            vec![FieldError::new("text", REQUIRED_MESSAGE), FieldError::new("group", INVALID_CHOICE_MESSAGE)],
        );
        assert_eq!(view.errors.len(), 2);
        assert_eq!(view.errors["text"], vec![REQUIRED_MESSAGE.to_string()]);
        assert_eq!(view.group, "99");
    }

    #[test]
    fn signup_rules() {
        assert!(validate_signup("new.user+1@site", "long enough", "long enough").is_ok());

        let errors = validate_signup("bad name!", "short", "other").unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field).collect();
        assert_eq!(fields, vec!["username", "password1", "password2"]);

        let errors = validate_signup("", "long enough", "long enough").unwrap_err();
        assert_eq!(errors, vec![FieldError::new("username", REQUIRED_MESSAGE)]);
        assert!(validate_signup(&"a".repeat(151), "long enough", "long enough").is_err());
    }

    #[test]
    fn slug_rules() {
        assert!(is_valid_slug("test-slug_2"));
        assert!(!is_valid_slug(""));
        assert!(!is_valid_slug("with space"));
        assert!(!is_valid_slug("../up"));
    }

    #[test]
    fn parse_form_decodes_fields() {
        let parsed = parse_form(&web::Bytes::from_static(b"text=Hello+world&group=3")).unwrap();
        assert_eq!(parsed["text"], "Hello world");
        assert_eq!(parsed["group"], "3");
    }
}
