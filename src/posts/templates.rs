//! Per-service status templates.
//!
//! Template selection depends on the channel's service (each service has its
//! own character budget) and on whether the filing carries a document number
//! (new-entry vs. initial-complaint phrasing). When the rendered message
//! would overflow the service's budget, the entry description is moved into
//! an inline [`TextImage`] and the message references the attachment instead.

use crate::types::Service;

/// An image carrying text that did not fit in the status body.
///
/// Rasterization is the posting connector's concern; the pipeline only
/// decides when one is needed and what it says.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextImage {
    pub title: String,
    pub text: String,
}

/// Inputs to template rendering.
#[derive(Debug, Clone, Copy)]
pub struct TemplateFields<'a> {
    /// Case name with summary, from the subscription.
    pub docket: &'a str,
    /// Docket-entry description.
    pub description: &'a str,
    /// Entry number, when the filing has one.
    pub doc_num: Option<u64>,
    /// Link to the PDF or its source-system page.
    pub pdf_link: &'a str,
    /// Link to the docket page.
    pub docket_link: &'a str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phrasing {
    /// A numbered docket entry with a document behind it.
    NewFiling,
    /// An entry with no document number (minute entries, initial notices).
    NewEntry,
    /// A case the bot just started following; no filing event exists.
    NewCase,
}

/// A message template bound to a service's character budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusTemplate {
    phrasing: Phrasing,
    max_characters: usize,
}

/// Character budget per service.
fn character_budget(service: Service) -> usize {
    match service {
        Service::Mastodon => 500,
        Service::Twitter => 280,
        Service::Bluesky => 300,
    }
}

/// Selects the template for a filing post on the given service.
pub fn template_for_channel(service: Service, document_number: Option<u64>) -> StatusTemplate {
    StatusTemplate {
        phrasing: if document_number.is_some() {
            Phrasing::NewFiling
        } else {
            Phrasing::NewEntry
        },
        max_characters: character_budget(service),
    }
}

/// Selects the template for a brand-new-case post on the given service.
pub fn new_case_template(service: Service) -> StatusTemplate {
    StatusTemplate {
        phrasing: Phrasing::NewCase,
        max_characters: character_budget(service),
    }
}

impl StatusTemplate {
    pub fn max_characters(&self) -> usize {
        self.max_characters
    }

    /// Renders the message, spilling the description into a [`TextImage`]
    /// when the full message would overflow the service's budget.
    pub fn render(&self, fields: &TemplateFields<'_>) -> (String, Option<TextImage>) {
        let full = self.format(fields, fields.description);
        if full.chars().count() <= self.max_characters {
            return (full, None);
        }

        let message = self.format(fields, "see attached");
        let image = TextImage {
            title: fields.docket.to_string(),
            text: fields.description.to_string(),
        };
        (message, Some(image))
    }

    fn format(&self, fields: &TemplateFields<'_>, description: &str) -> String {
        match self.phrasing {
            Phrasing::NewFiling => format!(
                "New filing in {}\n\nDoc #{}: {}\n\nPDF: {}\nDocket: {}",
                fields.docket,
                fields.doc_num.unwrap_or(0),
                description,
                fields.pdf_link,
                fields.docket_link,
            ),
            Phrasing::NewEntry => format!(
                "New docket entry in {}: {}\n\nDocket: {}",
                fields.docket, description, fields.docket_link,
            ),
            Phrasing::NewCase => format!(
                "{} is now on the docket!\n\nFollow here: {}",
                fields.docket, fields.docket_link,
            ),
        }
    }
}
