//! Rename-template rendering for save paths and archive entry names.
//!
//! Templates use `%placeholder%` tokens (`%id%`, `%user_id%`, `%title%`,
//! `%page_num%`). Rendered context values are sanitized so they cannot
//! introduce path separators; unknown placeholders render verbatim so a
//! typo stays visible in the produced name instead of silently vanishing.

/// Naming context supplied by the provider for one work.
#[derive(Debug, Clone, Default)]
pub struct RenameContext {
    pub id: String,
    pub user_id: String,
    pub title: String,
    /// Zero-based page cursor; None outside a sequence.
    pub page_num: Option<usize>,
}

impl RenameContext {
    fn value(&self, name: &str) -> Option<String> {
        match name {
            "id" => Some(self.id.clone()),
            "user_id" => Some(self.user_id.clone()),
            "title" => Some(self.title.clone()),
            "page_num" => self.page_num.map(|n| n.to_string()),
            _ => None,
        }
    }
}

/// Render `template`, substituting `%name%` tokens from `ctx`.
pub fn render(template: &str, ctx: &RenameContext) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('%') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        match after.find('%') {
            Some(end) => {
                let name = &after[..end];
                match ctx.value(name) {
                    Some(value) => out.push_str(&sanitize_component(&value)),
                    None => {
                        out.push('%');
                        out.push_str(name);
                        out.push('%');
                    }
                }
                rest = &after[end + 1..];
            }
            None => {
                // Unpaired trailing '%': emit as-is.
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

/// Strip characters that would change the path shape of a rendered value.
fn sanitize_component(value: &str) -> String {
    value
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

/// File extension from a resource URL's final path segment, lowercased.
/// Query strings are ignored, matching how providers append cache busters.
pub fn extension_from_url(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let file = parsed.path_segments()?.last()?;
    let (stem, ext) = file.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}
