use mailparse::{MailAddr, MailHeaderMap, MailParseError};
use serde::{Deserialize, Serialize};

/// Addressing information for a message, separate from its body.
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    from: Option<String>,
    to: Vec<String>,
}

impl Envelope {
    #[must_use]
    pub fn new(from: Option<String>, to: Vec<String>) -> Self {
        Self { from, to }
    }

    /// Derive an envelope from the headers of a composed message.
    ///
    /// The sender comes from `Sender`, falling back to `From`. Recipients are
    /// collected from `To`, `Cc` and `Bcc`, in that order, with group syntax
    /// flattened into its members.
    ///
    /// # Errors
    ///
    /// If the header block or one of the address headers cannot be parsed.
    pub fn from_message(raw: &[u8]) -> Result<Self, MailParseError> {
        let (headers, _) = mailparse::parse_headers(raw)?;

        let from = match headers
            .get_first_value("Sender")
            .or_else(|| headers.get_first_value("From"))
        {
            Some(value) => addresses(&value)?.into_iter().next(),
            None => None,
        };

        let mut to = Vec::new();
        for name in ["To", "Cc", "Bcc"] {
            for value in headers.get_all_values(name) {
                to.extend(addresses(&value)?);
            }
        }

        Ok(Self { from, to })
    }

    /// Returns the sender for this [`Envelope`]
    #[inline]
    pub fn sender(&self) -> Option<&str> {
        self.from.as_deref()
    }

    /// Returns a mutable reference to the [`Envelope`] sender
    #[inline]
    pub const fn sender_mut(&mut self) -> &mut Option<String> {
        &mut self.from
    }

    /// Returns the recipients for this [`Envelope`]
    #[inline]
    pub fn recipients(&self) -> &[String] {
        &self.to
    }

    /// Returns a mutable reference to the [`Envelope`] recipients
    #[inline]
    pub const fn recipients_mut(&mut self) -> &mut Vec<String> {
        &mut self.to
    }
}

fn addresses(value: &str) -> Result<Vec<String>, MailParseError> {
    let list = mailparse::addrparse(value)?;

    Ok(list
        .iter()
        .flat_map(|addr| match addr {
            MailAddr::Single(single) => vec![single.addr.clone()],
            MailAddr::Group(group) => group.addrs.iter().map(|a| a.addr.clone()).collect(),
        })
        .collect())
}
