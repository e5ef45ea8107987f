use ammonia::Builder;

/// Strip all HTML from user-supplied text.
///
/// Titles, descriptions and question text are plain text in this portal, so
/// instead of whitelisting safe tags we reject every tag and keep only the
/// text content. This is the stored-XSS fail-safe for anything a student
/// types into a form.
pub fn clean_text(input: &str) -> String {
    Builder::empty().clean(input).to_string()
}
