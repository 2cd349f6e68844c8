//! Template personalization — per-contact message rendering.

use crate::contact::Contact;

/// Placeholders substituted with the contact's organization name.
/// `{OrganizationName}` is the documented form; the short forms survive from
/// hand-written templates.
pub const ORG_PLACEHOLDERS: [&str; 3] = ["{OrganizationName}", "{organization}", "{company}"];

/// Salutation used when the contact has no stored name.
pub const FALLBACK_SALUTATION: &str = "dear company";

/// Render a message template for one contact.
///
/// Every occurrence of every placeholder is replaced (case-sensitive); names
/// are operator-provided trusted input, so no escaping is applied.
pub fn render(template: &str, contact: &Contact) -> String {
    let replacement = contact.name.as_deref().unwrap_or(FALLBACK_SALUTATION);

    let mut message = template.to_string();
    for placeholder in ORG_PLACEHOLDERS {
        message = message.replace(placeholder, replacement);
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contact::Contact;

    fn named(name: &str) -> Contact {
        Contact::new("+77011112222".into(), Some(name.into()), None)
    }

    fn unnamed() -> Contact {
        Contact::new("+77011112222".into(), None, None)
    }

    #[test]
    fn test_render_with_name() {
        let out = render("Hello {OrganizationName}", &named("Acme"));
        assert_eq!(out, "Hello Acme");
    }

    #[test]
    fn test_render_fallback_without_name() {
        let out = render("Hello {OrganizationName}", &unnamed());
        assert_eq!(out, format!("Hello {FALLBACK_SALUTATION}"));
    }

    #[test]
    fn test_render_replaces_all_occurrences() {
        let out = render("{OrganizationName}, meet {OrganizationName}!", &named("Acme"));
        assert_eq!(out, "Acme, meet Acme!");
    }

    #[test]
    fn test_render_synonyms() {
        let out = render("{organization} / {company}", &named("Acme"));
        assert_eq!(out, "Acme / Acme");
    }

    #[test]
    fn test_render_case_sensitive() {
        let out = render("{organizationname}", &named("Acme"));
        assert_eq!(out, "{organizationname}");
    }

    #[test]
    fn test_render_no_placeholder_passthrough() {
        let out = render("Plain text", &named("Acme"));
        assert_eq!(out, "Plain text");
    }
}
